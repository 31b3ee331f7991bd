mod support;

use delivery_core::clock::{CancelReason, ONE_HOUR_MS, ONE_MIN_MS};
use delivery_core::ecs::{Courier, OrderStatus, Restaurant, RestaurantCluster, User};
use delivery_core::scenario::Population;
use delivery_core::segment::CustomerSegment;
use delivery_core::spatial::SpatialIndex;
use delivery_core::telemetry::{RepairKind, SimTelemetry};
use delivery_core::test_helpers::{offset_km, sample_menu};
use support::schedule::TickRunner;
use support::world::{courier, orders, place_order, user, TestWorldBuilder};

fn kitchen_and_customer() -> Population {
    Population::new()
        .with_user(User::new("u-1", offset_km(0.0, 0.0), CustomerSegment::Regular))
        .with_restaurant(
            Restaurant::new("r-1", offset_km(1.0, 0.0), RestaurantCluster::QuickService),
            sample_menu("r-1"),
        )
}

#[test]
fn stuck_order_is_cancelled_and_courier_released() {
    // Two km out at 0.2 km/h: assigned, but never reaches the restaurant.
    let population = kitchen_and_customer().with_courier(Courier::new("c-slow", offset_km(3.0, 0.0), 0.2));
    let mut world = TestWorldBuilder::new()
        .with_population(population)
        .with_duration_hours(6)
        .build();
    let u = user(&mut world, "u-1");
    place_order(&mut world, u);
    let mut runner = TickRunner::new();

    runner.run_until(&mut world, 2 * ONE_HOUR_MS);
    let (_, order) = orders(&mut world).pop().expect("order");
    assert_eq!(order.status, OrderStatus::Ready);
    assert!(order.courier.is_some(), "slow courier should be assigned");

    let deadline = order.placed_at + 3 * ONE_HOUR_MS;
    runner.run_until(&mut world, deadline + ONE_MIN_MS);

    // Timed-out orders leave the world in the tick they are cancelled.
    assert!(orders(&mut world).is_empty());
    let telemetry = world.resource::<SimTelemetry>();
    let record = telemetry.completed_orders.first().expect("record");
    assert_eq!(record.status, OrderStatus::Cancelled);
    assert_eq!(record.cancel_reason, Some(CancelReason::Timeout));
    assert_eq!(record.courier_id.as_deref(), Some("c-slow"));
    assert!(record.cancelled_at.expect("cancelled_at") <= deadline + ONE_MIN_MS);

    let c = courier(&mut world, "c-slow");
    let c = world.get::<Courier>(c).expect("courier");
    assert!(c.is_available());
    assert_eq!(c.current_order, None);
    assert_eq!(world.resource::<SimTelemetry>().cancelled(CancelReason::Timeout), 1);
}

#[test]
fn assignment_retries_every_two_minutes_until_the_limit() {
    let mut world = TestWorldBuilder::new()
        .with_population(kitchen_and_customer())
        .with_duration_hours(6)
        .build();
    let u = user(&mut world, "u-1");
    place_order(&mut world, u);
    let mut runner = TickRunner::new();

    let mut attempt_times: Vec<(u32, u64)> = Vec::new();
    runner.run_until_with(&mut world, 3 * ONE_HOUR_MS, |world| {
        let now = world
            .resource::<delivery_core::clock::SimulationClock>()
            .now();
        if let Some((_, order)) = orders(world).pop() {
            let seen = attempt_times.last().map_or(0, |(a, _)| *a);
            if order.assignment_attempts > seen {
                attempt_times.push((order.assignment_attempts, now));
            }
        }
    });

    let max = 15;
    let attempts: Vec<u32> = attempt_times.iter().map(|(a, _)| *a).collect();
    assert_eq!(attempts, (1..=max).collect::<Vec<_>>());
    assert!(attempt_times
        .windows(2)
        .all(|w| w[1].1 - w[0].1 == 2 * ONE_MIN_MS));

    let telemetry = world.resource::<SimTelemetry>();
    assert_eq!(telemetry.assignment_retries, u64::from(max - 1));
    assert_eq!(telemetry.assignments_abandoned, 1);
}

#[test]
fn order_without_couriers_times_out() {
    let mut world = TestWorldBuilder::new()
        .with_population(kitchen_and_customer())
        .with_duration_hours(6)
        .build();
    let u = user(&mut world, "u-1");
    place_order(&mut world, u);
    let mut runner = TickRunner::new();
    runner.run_until(&mut world, 3 * ONE_HOUR_MS + 2 * ONE_MIN_MS);

    let telemetry = world.resource::<SimTelemetry>();
    assert_eq!(telemetry.cancelled(CancelReason::Timeout), 1);
    assert_eq!(telemetry.completed_orders[0].status, OrderStatus::Cancelled);
    let restaurant = world
        .query::<&Restaurant>()
        .iter(&world)
        .next()
        .expect("restaurant");
    assert!(restaurant.current_orders.is_empty());
}

#[test]
fn courier_arriving_after_retries_ran_out_still_gets_the_order() {
    let population = kitchen_and_customer().with_courier(Courier::new("c-far", offset_km(40.0, 0.0), 20.0));
    let mut world = TestWorldBuilder::new()
        .with_population(population)
        .with_duration_hours(6)
        .build();
    let u = user(&mut world, "u-1");
    place_order(&mut world, u);
    let mut runner = TickRunner::new();

    runner.run_until(&mut world, 90 * ONE_MIN_MS);
    let (_, order) = orders(&mut world).pop().expect("order");
    assert_eq!(order.status, OrderStatus::Ready);
    assert_eq!(order.assignment_attempts, 15);
    assert_eq!(world.resource::<SimTelemetry>().assignments_abandoned, 1);

    // The courier shows up at the kitchen, idle.
    let c = courier(&mut world, "c-far");
    let kitchen = order.pickup_location;
    world.get_mut::<Courier>(c).expect("courier").location = kitchen;
    world
        .resource_mut::<SpatialIndex>()
        .update_courier_position(c, kitchen);

    runner.run_until(&mut world, 3 * ONE_HOUR_MS);

    let telemetry = world.resource::<SimTelemetry>();
    assert_eq!(telemetry.orders_delivered, 1);
    assert_eq!(telemetry.cancelled(CancelReason::Timeout), 0);
    assert!(telemetry.repairs_of(RepairKind::AssignmentReissued) >= 1);
    let courier = world.get::<Courier>(c).expect("courier");
    assert!(courier.is_available());
    assert_eq!(courier.experience, 1);
}
