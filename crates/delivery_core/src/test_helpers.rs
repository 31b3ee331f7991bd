//! Test helpers for common test setup and utilities.
//!
//! Deterministic, hand-placed populations for tests, benches and the demo.
//! Nothing here draws random numbers.

use crate::ecs::{Courier, Menu, MenuCategory, MenuItem, Restaurant, RestaurantCluster, User};
use crate::scenario::Population;
use crate::segment::CustomerSegment;
use crate::spatial::GeoPoint;

/// City centre used across tests (Berlin Mitte).
pub const TEST_CENTRE: GeoPoint = GeoPoint::new(52.52, 13.405);

const KM_PER_DEG_LAT: f64 = 111.19;

/// Point `north_km` / `east_km` away from [TEST_CENTRE].
pub fn offset_km(north_km: f64, east_km: f64) -> GeoPoint {
    let lat = TEST_CENTRE.lat + north_km / KM_PER_DEG_LAT;
    let lon = TEST_CENTRE.lon + east_km / (KM_PER_DEG_LAT * TEST_CENTRE.lat.to_radians().cos());
    GeoPoint::new(lat, lon)
}

/// Spot `i` of `n` on a square grid spanning `span_km` around the centre.
fn grid_spot(i: usize, n: usize, span_km: f64) -> GeoPoint {
    let side = (n as f64).sqrt().ceil().max(1.0) as usize;
    let step = if side > 1 { span_km / (side - 1) as f64 } else { 0.0 };
    let row = (i / side) as f64;
    let col = (i % side) as f64;
    offset_km(row * step - span_km / 2.0, col * step - span_km / 2.0)
}

/// A small menu covering every course.
pub fn sample_menu(prefix: &str) -> Menu {
    Menu(vec![
        MenuItem::new(format!("{prefix}-pancakes"), MenuCategory::Breakfast, 8.5),
        MenuItem::new(format!("{prefix}-soup"), MenuCategory::Appetizer, 6.0),
        MenuItem::new(format!("{prefix}-burger"), MenuCategory::Main, 12.5).with_popularity(0.8),
        MenuItem::new(format!("{prefix}-curry"), MenuCategory::Main, 14.0).with_complexity(1.4),
        MenuItem::new(format!("{prefix}-fries"), MenuCategory::Side, 4.0),
        MenuItem::new(format!("{prefix}-cola"), MenuCategory::Drink, 3.0).with_hot(false),
        MenuItem::new(format!("{prefix}-brownie"), MenuCategory::Dessert, 5.5).with_hot(false),
    ])
}

const CLUSTERS: [RestaurantCluster; 3] = [
    RestaurantCluster::QuickService,
    RestaurantCluster::Casual,
    RestaurantCluster::FineDining,
];

const SEGMENTS: [CustomerSegment; 3] = [
    CustomerSegment::Frequent,
    CustomerSegment::Regular,
    CustomerSegment::Occasional,
];

/// Users, restaurants and couriers laid out on grids within a few km of the
/// centre. Restaurants cycle through clusters, users through segments.
pub fn grid_population(users: usize, restaurants: usize, couriers: usize) -> Population {
    let mut population = Population::new();
    for i in 0..users {
        population = population.with_user(User::new(
            format!("u-{i}"),
            grid_spot(i, users, 6.0),
            SEGMENTS[i % SEGMENTS.len()],
        ));
    }
    for i in 0..restaurants {
        let id = format!("r-{i}");
        let restaurant = Restaurant::new(id.clone(), grid_spot(i, restaurants, 4.0), CLUSTERS[i % 3])
            .with_price_tier((i % 4) as u8 + 1)
            .with_cuisines([["pizza", "burgers", "thai", "sushi"][i % 4]]);
        population = population.with_restaurant(restaurant, sample_menu(&id));
    }
    for i in 0..couriers {
        population = population.with_courier(Courier::new(
            format!("c-{i}"),
            grid_spot(i, couriers, 4.0),
            18.0 + (i % 5) as f64,
        ));
    }
    population
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_roughly_metric() {
        let p = offset_km(1.0, 1.0);
        let d = TEST_CENTRE.distance_km(&p);
        assert!((d - 2f64.sqrt()).abs() < 0.01, "d={d}");
    }

    #[test]
    fn grid_population_is_valid() {
        let population = grid_population(10, 4, 3);
        assert_eq!(population.users.len(), 10);
        assert_eq!(population.restaurants.len(), 4);
        assert_eq!(population.couriers.len(), 3);
        population.validate().expect("valid population");
    }
}
