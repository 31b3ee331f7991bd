//! Time estimates: kitchen preparation, courier travel and delivery ETAs.

use rand::Rng;

use crate::calendar::{is_overnight, is_peak_hour};
use crate::clock::{ONE_HOUR_MS, ONE_MIN_MS};
use crate::ecs::Restaurant;

/// Inputs to the preparation-time model beyond the restaurant itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrepRequest {
    pub item_count: usize,
    /// Mean `prep_complexity` of the ordered items.
    pub avg_complexity: f64,
    pub hour: u32,
    /// Weight of kitchen load in the load multiplier.
    pub load_factor: f64,
    pub max_prep_mins: f64,
}

/// Rush-hour kitchens are slower, overnight kitchens quicker.
pub fn time_of_day_prep_multiplier(hour: u32) -> f64 {
    if is_peak_hour(hour) {
        1.2
    } else if is_overnight(hour) {
        0.9
    } else {
        1.0
    }
}

pub fn complexity_multiplier(item_count: usize, avg_complexity: f64) -> f64 {
    let n = item_count.max(1) as f64;
    1.0 + 0.15 * n.ln() * avg_complexity.max(0.0)
}

/// Preparation time in minutes before noise and bounds.
pub fn expected_prep_mins(restaurant: &Restaurant, request: &PrepRequest) -> f64 {
    let base = (restaurant.cluster.base_prep_mins() + restaurant.prep_time_mins) / 2.0;
    let load = 1.0 + request.load_factor * restaurant.load();
    let efficiency = restaurant.pickup_efficiency.max(0.1);
    base * load * time_of_day_prep_multiplier(request.hour)
        * complexity_multiplier(request.item_count, request.avg_complexity)
        / efficiency
}

/// Sampled preparation time in minutes, bounded by the restaurant minimum
/// and the configured maximum.
pub fn sample_prep_mins<R: Rng + ?Sized>(rng: &mut R, restaurant: &Restaurant, request: &PrepRequest) -> f64 {
    let amplitude = rng.gen_range(0.1..0.2);
    let noise = rng.gen_range((1.0 - amplitude)..(1.0 + amplitude));
    let minutes = expected_prep_mins(restaurant, request) * noise;
    let floor = restaurant.min_prep_time_mins.max(0.0);
    let cap = request.max_prep_mins.max(floor);
    minutes.clamp(floor, cap)
}

pub fn mins_to_ms(minutes: f64) -> u64 {
    (minutes.max(0.0) * ONE_MIN_MS as f64).round() as u64
}

/// Time to cover `distance_km` at `speed_kmh`.
pub fn travel_time_ms(distance_km: f64, speed_kmh: f64) -> u64 {
    if speed_kmh <= 0.0 || !speed_kmh.is_finite() {
        return 0;
    }
    (distance_km.max(0.0) / speed_kmh * ONE_HOUR_MS as f64).round() as u64
}

/// Courier arrival estimate: straight-line distance at base speed, with the
/// speed varied by `U(1 - v, 1 + v)`.
pub fn courier_eta_ms<R: Rng + ?Sized>(
    rng: &mut R,
    distance_km: f64,
    base_speed_kmh: f64,
    variability: f64,
) -> u64 {
    let v = variability.clamp(0.0, 0.9);
    let factor = if v > 0.0 { rng.gen_range((1.0 - v)..=(1.0 + v)) } else { 1.0 };
    travel_time_ms(distance_km, base_speed_kmh * factor)
}

/// Expected hand-over time: the later of food ready and courier arrival, plus
/// the ride to the customer at the effective speed.
pub fn estimate_delivery_time(
    food_ready_at: u64,
    courier_at_restaurant: u64,
    delivery_distance_km: f64,
    effective_speed_kmh: f64,
) -> u64 {
    food_ready_at
        .max(courier_at_restaurant)
        .saturating_add(travel_time_ms(delivery_distance_km, effective_speed_kmh))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::RestaurantCluster;
    use crate::spatial::GeoPoint;
    use bevy_ecs::prelude::Entity;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn request(hour: u32) -> PrepRequest {
        PrepRequest {
            item_count: 3,
            avg_complexity: 1.5,
            hour,
            load_factor: 0.5,
            max_prep_mins: 120.0,
        }
    }

    #[test]
    fn prep_time_stays_within_bounds() {
        let mut rng = StdRng::seed_from_u64(17);
        let mut restaurant = Restaurant::new("r", GeoPoint::new(52.5, 13.4), RestaurantCluster::FineDining)
            .with_capacity(2);
        restaurant.pickup_efficiency = 0.5;
        restaurant.current_orders = vec![Entity::from_raw(1); 6];
        for hour in 0..24 {
            let mins = sample_prep_mins(&mut rng, &restaurant, &request(hour));
            assert!(mins >= restaurant.min_prep_time_mins && mins <= 120.0, "mins={mins}");
        }
    }

    #[test]
    fn rush_and_load_slow_the_kitchen() {
        let idle = Restaurant::new("r", GeoPoint::new(52.5, 13.4), RestaurantCluster::Casual);
        let mut busy = idle.clone();
        busy.current_orders = vec![Entity::from_raw(1); 10];
        assert!(expected_prep_mins(&idle, &request(12)) > expected_prep_mins(&idle, &request(15)));
        assert!(expected_prep_mins(&idle, &request(15)) > expected_prep_mins(&idle, &request(3)));
        let ratio = expected_prep_mins(&busy, &request(15)) / expected_prep_mins(&idle, &request(15));
        assert!((ratio - 1.5).abs() < 1e-9);
    }

    #[test]
    fn single_item_has_no_complexity_penalty() {
        assert_eq!(complexity_multiplier(1, 3.0), 1.0);
        assert!(complexity_multiplier(4, 2.0) > complexity_multiplier(2, 2.0));
    }

    #[test]
    fn travel_time_matches_speed() {
        assert_eq!(travel_time_ms(15.0, 30.0), 30 * ONE_MIN_MS);
        assert_eq!(travel_time_ms(1.0, 0.0), 0);
    }

    #[test]
    fn eta_variability_is_bounded() {
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..200 {
            let eta = courier_eta_ms(&mut rng, 10.0, 20.0, 0.2);
            assert!(eta >= travel_time_ms(10.0, 24.0) && eta <= travel_time_ms(10.0, 16.0));
        }
    }

    #[test]
    fn delivery_estimate_waits_for_later_of_food_and_courier() {
        let t = estimate_delivery_time(10 * ONE_MIN_MS, 15 * ONE_MIN_MS, 5.0, 30.0);
        assert_eq!(t, 25 * ONE_MIN_MS);
    }
}
