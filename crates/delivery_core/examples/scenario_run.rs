//! Run one simulated day over a small hand-made city and print the event
//! stream as JSON lines on stdout. A summary goes to stderr.
//!
//! Run with: cargo run -p delivery_core --example scenario_run > events.jsonl
//! Log level via RUST_LOG, e.g. RUST_LOG=delivery_core=debug.

use std::io::{self, BufWriter};

use bevy_ecs::prelude::World;
use delivery_core::ecs::{
    Courier, Menu, MenuCategory, MenuItem, Restaurant, RestaurantCluster, User,
};
use delivery_core::output::JsonLinesSink;
use delivery_core::runner::SimulationDriver;
use delivery_core::scenario::{build_scenario, Population, SimulationParams};
use delivery_core::segment::CustomerSegment;
use delivery_core::spatial::GeoPoint;
use delivery_core::telemetry::SimTelemetry;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SEED: u64 = 123;

fn menu(prefix: &str, mains: &[(&str, f64)]) -> Menu {
    let mut items: Vec<MenuItem> = mains
        .iter()
        .map(|(name, price)| {
            MenuItem::new(format!("{prefix}-{name}"), MenuCategory::Main, *price).with_name(*name)
        })
        .collect();
    items.push(MenuItem::new(format!("{prefix}-salad"), MenuCategory::Side, 5.5).with_hot(false));
    items.push(MenuItem::new(format!("{prefix}-lemonade"), MenuCategory::Drink, 3.5).with_hot(false));
    items.push(MenuItem::new(format!("{prefix}-tiramisu"), MenuCategory::Dessert, 6.0).with_hot(false));
    Menu(items)
}

fn population() -> Population {
    let restaurants = [
        ("r-mitte-pizza", 52.5200, 13.4050, RestaurantCluster::Casual, "pizza", 2, &[("margherita", 9.5), ("diavola", 11.0)][..]),
        ("r-kreuzberg-doner", 52.4990, 13.4180, RestaurantCluster::QuickService, "turkish", 1, &[("doner", 6.5), ("lahmacun", 5.0)][..]),
        ("r-prenzlauer-thai", 52.5390, 13.4240, RestaurantCluster::Casual, "thai", 2, &[("pad-thai", 12.0), ("green-curry", 13.5)][..]),
        ("r-charlottenburg-bistro", 52.5160, 13.3040, RestaurantCluster::FineDining, "french", 4, &[("duck", 28.0), ("sole", 32.0)][..]),
    ];

    let mut population = Population::new();
    for (id, lat, lon, cluster, cuisine, tier, mains) in restaurants {
        population = population.with_restaurant(
            Restaurant::new(id, GeoPoint::new(lat, lon), cluster)
                .with_cuisines([cuisine])
                .with_price_tier(tier),
            menu(id, mains),
        );
    }

    let segments = [
        CustomerSegment::Frequent,
        CustomerSegment::Regular,
        CustomerSegment::Regular,
        CustomerSegment::Occasional,
    ];
    for i in 0..120 {
        let lat = 52.49 + (i % 12) as f64 * 0.006;
        let lon = 13.33 + (i / 12) as f64 * 0.012;
        population = population.with_user(User::new(
            format!("u-{i:03}"),
            GeoPoint::new(lat, lon),
            segments[i % segments.len()],
        ));
    }

    for i in 0..15 {
        let lat = 52.50 + (i % 5) as f64 * 0.01;
        let lon = 13.35 + (i / 5) as f64 * 0.03;
        population = population.with_courier(Courier::new(
            format!("c-{i:02}"),
            GeoPoint::new(lat, lon),
            16.0 + (i % 4) as f64 * 2.0,
        ));
    }
    population
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "delivery_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let params = SimulationParams::default()
        .with_seed(SEED)
        .with_duration_hours(24);
    let mut world = World::new();
    build_scenario(&mut world, params, population())?;

    let sink = JsonLinesSink::new(BufWriter::new(io::stdout()));
    let mut driver = SimulationDriver::new(world, sink)?;
    let ticks = driver.run();
    let (world, _) = driver.finish()?;

    let telemetry = world.resource::<SimTelemetry>();
    eprintln!("--- Scenario run (seed {SEED}, {ticks} ticks) ---");
    eprintln!("Orders placed:     {}", telemetry.orders_placed);
    eprintln!("Orders delivered:  {}", telemetry.orders_delivered);
    eprintln!("Orders cancelled:  {}", telemetry.total_cancelled());
    eprintln!("Reviews:           {}", telemetry.reviews_generated);
    eprintln!("Assignment retries {}", telemetry.assignment_retries);
    eprintln!("Events processed:  {}", telemetry.events_processed);
    if let Some(mean) = telemetry.mean_delivery_duration_ms() {
        eprintln!("Mean delivery time: {:.1} min", mean / 60_000.0);
    }
    Ok(())
}
