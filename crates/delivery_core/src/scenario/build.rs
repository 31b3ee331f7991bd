use std::collections::HashSet;

use bevy_ecs::prelude::World;
use tracing::info;

use crate::clock::SimulationClock;
use crate::courier::CourierSelectionResource;
use crate::ecs::{Courier, Menu, OrderIdSequence, Restaurant, User};
use crate::error::ScenarioError;
use crate::output::EventOutbox;
use crate::rng::SimRng;
use crate::scenario::params::SimulationParams;
use crate::spatial::{GeoPoint, SpatialIndex};
use crate::telemetry::SimTelemetry;
use crate::traffic::TrafficConditions;
use crate::weather::WeatherState;

/// Already-built entities to place into the world. Constructing them (random
/// factories, loading from files) is up to the caller.
#[derive(Debug, Clone, Default)]
pub struct Population {
    pub users: Vec<User>,
    pub restaurants: Vec<(Restaurant, Menu)>,
    pub couriers: Vec<Courier>,
}

impl Population {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.users.push(user);
        self
    }

    pub fn with_restaurant(mut self, restaurant: Restaurant, menu: Menu) -> Self {
        self.restaurants.push((restaurant, menu));
        self
    }

    pub fn with_courier(mut self, courier: Courier) -> Self {
        self.couriers.push(courier);
        self
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.users.is_empty() {
            return Err(ScenarioError::EmptyPopulation("users"));
        }
        if self.restaurants.is_empty() {
            return Err(ScenarioError::EmptyPopulation("restaurants"));
        }

        check_entities("user", self.users.iter().map(|u| (u.id.as_str(), u.location)))?;
        check_entities(
            "restaurant",
            self.restaurants
                .iter()
                .map(|(r, _)| (r.id.as_str(), r.location)),
        )?;
        check_entities(
            "courier",
            self.couriers.iter().map(|c| (c.id.as_str(), c.location)),
        )?;

        if let Some((r, _)) = self.restaurants.iter().find(|(r, _)| r.capacity == 0) {
            return Err(ScenarioError::ZeroCapacity(r.id.clone()));
        }
        Ok(())
    }
}

fn valid_location(p: GeoPoint) -> bool {
    p.lat.is_finite()
        && p.lon.is_finite()
        && (-90.0..=90.0).contains(&p.lat)
        && (-180.0..=180.0).contains(&p.lon)
}

fn check_entities<'a>(
    kind: &'static str,
    entities: impl Iterator<Item = (&'a str, GeoPoint)>,
) -> Result<(), ScenarioError> {
    let mut seen = HashSet::new();
    for (id, location) in entities {
        if !seen.insert(id) {
            return Err(ScenarioError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
        if !valid_location(location) {
            return Err(ScenarioError::InvalidLocation {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

/// Insert every simulation resource and spawn the population.
///
/// Nothing is written to the world when validation fails.
pub fn build_scenario(
    world: &mut World,
    params: SimulationParams,
    population: Population,
) -> Result<(), ScenarioError> {
    params.validate()?;
    population.validate()?;

    let latitude = params.city.centre.lat;
    world.insert_resource(SimulationClock::new(params.epoch_ms()));
    world.insert_resource(SimRng::new(params.seed));
    world.insert_resource(WeatherState::new(
        params.weather.initial_condition,
        params.weather.initial_duration_ms,
        latitude,
        params.seed,
    ));
    world.insert_resource(TrafficConditions::new(
        &params.traffic.profile,
        params.traffic.variability,
        params.seed,
    ));
    world.insert_resource(SimTelemetry::default());
    world.insert_resource(EventOutbox::default());
    world.insert_resource(OrderIdSequence::default());
    world.insert_resource(CourierSelectionResource::new(params.courier.selection.build()));

    let mut index = SpatialIndex::new();
    let Population {
        users,
        restaurants,
        couriers,
    } = population;
    let (user_count, restaurant_count, courier_count) =
        (users.len(), restaurants.len(), couriers.len());

    for user in users {
        world.spawn(user);
    }
    for (restaurant, menu) in restaurants {
        let location = restaurant.location;
        let entity = world.spawn((restaurant, menu)).id();
        index.insert_restaurant(entity, location);
    }
    for courier in couriers {
        let location = courier.location;
        let entity = world.spawn(courier).id();
        index.insert_courier(entity, location);
    }
    world.insert_resource(index);

    info!(
        users = user_count,
        restaurants = restaurant_count,
        couriers = courier_count,
        start = %params.start_date,
        end = %params.end_date,
        "scenario built"
    );
    world.insert_resource(params);
    Ok(())
}
