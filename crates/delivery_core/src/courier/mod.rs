//! Courier/order pairing, movement and assignment radius.
//!
//! Pairing is only ever changed through [assign_pair] and [release_pair], both
//! called from inside a single system run that holds mutable access to the
//! order and the courier, so no other system observes a half-updated pair.

pub mod policy;

use bevy_ecs::prelude::Entity;
use rand::Rng;

pub use policy::{
    CourierCandidate, CourierSelection, CourierSelectionPolicy, CourierSelectionResource,
    ScoredSelection, UniformSelection,
};

use crate::clock::ONE_HOUR_MS;
use crate::ecs::{Courier, CourierStatus, Order};
use crate::spatial::{haversine_km, move_towards, GeoPoint, MoveStep};

/// Pair an order with a courier: courier en route to pickup, both sides
/// pointing at each other.
pub fn assign_pair(order_entity: Entity, order: &mut Order, courier_entity: Entity, courier: &mut Courier) {
    courier.status = CourierStatus::EnRoutePickup;
    courier.current_order = Some(order_entity);
    order.courier = Some(courier_entity);
    order.assignment_pending = false;
}

/// Free `courier` if it is working on `order_entity`. Returns whether the
/// courier was released.
pub fn release_pair(courier: &mut Courier, order_entity: Entity) -> bool {
    if courier.current_order != Some(order_entity) {
        return false;
    }
    courier.status = CourierStatus::Available;
    courier.current_order = None;
    true
}

/// Speed multipliers applied to a courier's nominal speed for one movement step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementConditions {
    pub traffic_factor: f64,
    pub weather_factor: f64,
}

impl Default for MovementConditions {
    fn default() -> Self {
        Self {
            traffic_factor: 1.0,
            weather_factor: 1.0,
        }
    }
}

/// Effective speed for a step, with `U(0.9, 1.1)` jitter.
pub fn effective_speed_kmh<R: Rng + ?Sized>(rng: &mut R, courier: &Courier, conditions: MovementConditions) -> f64 {
    let jitter = rng.gen_range(0.9..=1.1);
    (courier.speed_kmh * conditions.traffic_factor * conditions.weather_factor * jitter).max(0.0)
}

/// Catch the courier's position up to `now` while heading for `target`.
/// Moving twice for the same `now` is a no-op, so every handler that needs a
/// fresh position can call this.
pub fn advance_courier<R: Rng + ?Sized>(
    rng: &mut R,
    courier: &mut Courier,
    target: GeoPoint,
    now: u64,
    conditions: MovementConditions,
) -> MoveStep {
    let elapsed_ms = now.saturating_sub(courier.last_moved_at);
    courier.last_moved_at = courier.last_moved_at.max(now);
    if elapsed_ms == 0 {
        let remaining_km = haversine_km(courier.location, target);
        return MoveStep {
            position: courier.location,
            remaining_km,
            arrived: remaining_km <= 0.0,
        };
    }
    let speed = effective_speed_kmh(rng, courier, conditions);
    let step_km = speed * elapsed_ms as f64 / ONE_HOUR_MS as f64;
    let before = courier.location;
    let step = move_towards(before, target, step_km);
    courier.distance_travelled_km += haversine_km(before, step.position);
    courier.location = step.position;
    step
}

/// Where a busy courier is heading, if anywhere.
pub fn courier_target(courier: &Courier, order: &Order) -> Option<GeoPoint> {
    match courier.status {
        CourierStatus::Available => None,
        CourierStatus::EnRoutePickup => Some(order.pickup_location),
        CourierStatus::EnRouteDelivery => Some(order.delivery_location),
    }
}

/// Radius within which couriers are considered for a pickup: wider off-peak,
/// tighter in the dense urban core.
pub fn assignment_radius_km(
    base_km: f64,
    peak: bool,
    restaurant: GeoPoint,
    city_centre: GeoPoint,
    urban_radius_km: f64,
) -> f64 {
    let mut radius = base_km;
    if !peak {
        radius *= 1.5;
    }
    if haversine_km(restaurant, city_centre) <= urban_radius_km {
        radius *= 0.8;
    }
    radius
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::OrderStatus;
    use crate::pricing::OrderPricing;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const RESTAURANT: GeoPoint = GeoPoint::new(52.520, 13.405);
    const CUSTOMER: GeoPoint = GeoPoint::new(52.540, 13.405);

    fn order() -> Order {
        Order::placed(
            "ord-1".into(),
            Entity::from_raw(1),
            Entity::from_raw(2),
            vec![],
            OrderPricing::default(),
            RESTAURANT,
            CUSTOMER,
            0,
        )
    }

    #[test]
    fn pairing_round_trip() {
        let order_entity = Entity::from_raw(10);
        let courier_entity = Entity::from_raw(11);
        let mut order = order();
        order.assignment_pending = true;
        let mut courier = Courier::new("c-1", RESTAURANT, 20.0);

        assign_pair(order_entity, &mut order, courier_entity, &mut courier);
        assert_eq!(courier.status, CourierStatus::EnRoutePickup);
        assert_eq!(courier.current_order, Some(order_entity));
        assert_eq!(order.courier, Some(courier_entity));
        assert!(!order.assignment_pending);

        assert!(!release_pair(&mut courier, Entity::from_raw(99)));
        assert_eq!(courier.status, CourierStatus::EnRoutePickup);
        assert!(release_pair(&mut courier, order_entity));
        assert!(courier.is_available());
        assert_eq!(courier.current_order, None);
        assert_eq!(order.status, OrderStatus::Placed);
    }

    #[test]
    fn catch_up_moves_by_elapsed_time_only_once() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut courier = Courier::new("c-1", RESTAURANT, 20.0);
        // 3 minutes at ~20 km/h is ~1 km, well short of the 2.2 km trip.
        let step = advance_courier(&mut rng, &mut courier, CUSTOMER, 3 * 60_000, MovementConditions::default());
        assert!(!step.arrived);
        let travelled = haversine_km(RESTAURANT, courier.location);
        assert!((0.85..=1.15).contains(&travelled), "travelled={travelled}");

        let again = advance_courier(&mut rng, &mut courier, CUSTOMER, 3 * 60_000, MovementConditions::default());
        assert_eq!(again.position, step.position);

        let done = advance_courier(&mut rng, &mut courier, CUSTOMER, 60 * 60_000, MovementConditions::default());
        assert!(done.arrived);
        assert_eq!(courier.location, CUSTOMER);
    }

    #[test]
    fn slow_conditions_shorten_steps() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut courier = Courier::new("c-1", RESTAURANT, 20.0);
        let slow = MovementConditions {
            traffic_factor: 0.5,
            weather_factor: 0.5,
        };
        advance_courier(&mut rng, &mut courier, CUSTOMER, 3 * 60_000, slow);
        assert!(haversine_km(RESTAURANT, courier.location) < 0.3);
    }

    #[test]
    fn radius_widens_off_peak_and_narrows_downtown() {
        let centre = GeoPoint::new(52.52, 13.405);
        let suburb = GeoPoint::new(52.70, 13.405);
        assert_eq!(assignment_radius_km(4.0, true, suburb, centre, 5.0), 4.0);
        assert_eq!(assignment_radius_km(4.0, false, suburb, centre, 5.0), 6.0);
        assert!((assignment_radius_km(4.0, true, centre, centre, 5.0) - 3.2).abs() < 1e-12);
    }

    #[test]
    fn target_follows_status() {
        let order = order();
        let mut courier = Courier::new("c-1", RESTAURANT, 20.0);
        assert_eq!(courier_target(&courier, &order), None);
        courier.status = CourierStatus::EnRoutePickup;
        assert_eq!(courier_target(&courier, &order), Some(RESTAURANT));
        courier.status = CourierStatus::EnRouteDelivery;
        assert_eq!(courier_target(&courier, &order), Some(CUSTOMER));
    }
}
