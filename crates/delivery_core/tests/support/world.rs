#![allow(dead_code)]

use bevy_ecs::prelude::{Component, Entity, World};
use delivery_core::clock::{EventPayload, SimulationClock};
use delivery_core::ecs::{Courier, Order, Restaurant, User};
use delivery_core::output::MemorySink;
use delivery_core::runner::{initialize_simulation, SimulationDriver};
use delivery_core::scenario::{build_scenario, Population, SimulationParams};
use delivery_core::test_helpers::grid_population;

/// Builder for reproducible test worlds.
///
/// Defaults: seed 42, one simulated day, demand generation off, and a grid
/// population of 20 users, 4 restaurants and 3 couriers.
#[derive(Debug, Clone)]
pub struct TestWorldBuilder {
    params: SimulationParams,
    population: Population,
}

impl Default for TestWorldBuilder {
    fn default() -> Self {
        Self {
            params: SimulationParams::default()
                .with_seed(42)
                .with_duration_hours(24)
                .with_demand_enabled(false),
            population: grid_population(20, 4, 3),
        }
    }
}

impl TestWorldBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.params = self.params.with_seed(seed);
        self
    }

    pub fn with_demand(mut self, enabled: bool) -> Self {
        self.params = self.params.with_demand_enabled(enabled);
        self
    }

    pub fn with_duration_hours(mut self, hours: u64) -> Self {
        self.params = self.params.with_duration_hours(hours);
        self
    }

    /// Arbitrary parameter tweaks.
    pub fn with_params<F>(mut self, f: F) -> Self
    where
        F: FnOnce(SimulationParams) -> SimulationParams,
    {
        self.params = f(self.params);
        self
    }

    pub fn with_population(mut self, population: Population) -> Self {
        self.population = population;
        self
    }

    /// Build the world and schedule the initial events.
    pub fn build(self) -> World {
        let mut world = World::new();
        build_scenario(&mut world, self.params, self.population).expect("scenario builds");
        initialize_simulation(&mut world);
        world
    }

    /// Build a driver that records output in memory.
    pub fn build_driver(self) -> SimulationDriver<MemorySink> {
        let mut world = World::new();
        build_scenario(&mut world, self.params, self.population).expect("scenario builds");
        SimulationDriver::new(world, MemorySink::new()).expect("driver")
    }
}

/// Entity of the component whose `id` matches.
pub fn find<T: Component>(world: &mut World, id: &str, id_of: fn(&T) -> &str) -> Entity {
    world
        .query::<(Entity, &T)>()
        .iter(world)
        .find(|(_, c)| id_of(c) == id)
        .map(|(e, _)| e)
        .unwrap_or_else(|| panic!("no entity with id {id}"))
}

pub fn user(world: &mut World, id: &str) -> Entity {
    find::<User>(world, id, |u| &u.id)
}

pub fn restaurant(world: &mut World, id: &str) -> Entity {
    find::<Restaurant>(world, id, |r| &r.id)
}

pub fn courier(world: &mut World, id: &str) -> Entity {
    find::<Courier>(world, id, |c| &c.id)
}

pub fn orders(world: &mut World) -> Vec<(Entity, Order)> {
    world
        .query::<(Entity, &Order)>()
        .iter(world)
        .map(|(e, o)| (e, o.clone()))
        .collect()
}

/// Queue a placement for `user` at the current time.
pub fn place_order(world: &mut World, user: Entity) {
    let mut clock = world.resource_mut::<SimulationClock>();
    let now = clock.now();
    clock.schedule_at(now, EventPayload::PlaceOrder { user });
}

/// Courier/order pairing must hold in both directions.
pub fn assert_pairing(world: &mut World) {
    let orders = orders(world);
    let couriers: Vec<(Entity, Courier)> = world
        .query::<(Entity, &Courier)>()
        .iter(world)
        .map(|(e, c)| (e, c.clone()))
        .collect();

    for (courier_entity, courier) in &couriers {
        assert_eq!(
            courier.is_available(),
            courier.current_order.is_none(),
            "courier {} status/order mismatch",
            courier.id
        );
        if let Some(order_entity) = courier.current_order {
            let (_, order) = orders
                .iter()
                .find(|(e, _)| *e == order_entity)
                .unwrap_or_else(|| panic!("courier {} points at a missing order", courier.id));
            assert!(!order.status.is_terminal(), "courier {} holds finished order", courier.id);
            assert_eq!(order.courier, Some(*courier_entity));
        }
    }
    for (order_entity, order) in &orders {
        if order.status.is_terminal() {
            continue;
        }
        if let Some(courier_entity) = order.courier {
            let (_, courier) = couriers
                .iter()
                .find(|(e, _)| *e == courier_entity)
                .unwrap_or_else(|| panic!("order {} points at a missing courier", order.id));
            assert_eq!(courier.current_order, Some(*order_entity), "order {}", order.id);
        }
    }
}
