mod support;

use delivery_core::clock::ONE_HOUR_MS;
use delivery_core::ecs::Courier;
use delivery_core::telemetry::SimTelemetry;
use delivery_core::test_helpers::grid_population;
use support::schedule::TickRunner;
use support::world::{assert_pairing, TestWorldBuilder};

#[test]
fn pairing_holds_after_every_tick_of_a_busy_run() {
    let mut world = TestWorldBuilder::new()
        .with_seed(3)
        .with_population(grid_population(80, 6, 4))
        .with_demand(true)
        .with_duration_hours(12)
        .build();
    let mut runner = TickRunner::new();

    let ticks = runner.run_until_with(&mut world, 12 * ONE_HOUR_MS, assert_pairing);

    assert!(ticks > 0);
    let telemetry = world.resource::<SimTelemetry>();
    assert!(telemetry.orders_placed > 0, "demand should produce orders");
    assert!(telemetry.orders_delivered > 0);
}

#[test]
fn couriers_are_all_free_once_demand_stops() {
    let mut world = TestWorldBuilder::new()
        .with_seed(5)
        .with_population(grid_population(40, 4, 4))
        .with_demand(true)
        .with_duration_hours(10)
        .build();
    let mut runner = TickRunner::new();
    runner.run_until(&mut world, 4 * ONE_HOUR_MS);

    world
        .resource_mut::<delivery_core::scenario::SimulationParams>()
        .demand
        .enabled = false;
    runner.run_until_with(&mut world, 10 * ONE_HOUR_MS, assert_pairing);

    let busy = world
        .query::<&Courier>()
        .iter(&world)
        .filter(|c| !c.is_available())
        .count();
    assert_eq!(busy, 0);
}
