//! Simulation runner: advances the clock tick by tick and routes events into the ECS.
//!
//! Clock progression and event routing happen here, outside systems. Each tick
//! advances [SimulationClock] by the tick size, drains every due event (each is
//! inserted as [CurrentEvent] before the event schedule runs), runs the
//! maintenance passes, drains again for the events they queued, reconciles,
//! and finally hands the tick's output to the sink.

use bevy_ecs::prelude::{Entity, Res, Schedule, With, World};
use bevy_ecs::schedule::{apply_deferred, IntoSystemConfigs};
use rayon::ThreadPool;
use tracing::{debug, info, warn};

use crate::clock::{CancelReason, CurrentEvent, Event, EventKind, EventPayload, SimulationClock};
use crate::ecs::{Courier, Order, Restaurant, User};
use crate::error::SinkError;
use crate::output::{build_pool, flush_outbox, EventOutbox, FlushStats, OutputSink};
use crate::scenario::SimulationParams;
use crate::systems::{
    assign_courier::assign_courier_system,
    cancel_order::cancel_order_system,
    check_delivery_status::check_delivery_status_system,
    deliver_order::deliver_order_system,
    demand_generation::demand_generation_system,
    environment::environment_system,
    generate_review::generate_review_system,
    movement::movement_system,
    order_in_transit::order_in_transit_system,
    order_ready::order_ready_system,
    pick_up_order::pick_up_order_system,
    place_order::place_order_system,
    prepare_order::prepare_order_system,
    reconcile::reconcile_system,
    update_courier_location::update_courier_location_system,
    update_restaurant_status::update_restaurant_status_system,
    update_user_behaviour::update_user_behaviour_system,
};
use crate::telemetry::{SimCounts, SimTelemetry};

// Condition functions for each event kind
fn is_place_order(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind() == EventKind::PlaceOrder)
        .unwrap_or(false)
}

fn is_prepare_order(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind() == EventKind::PrepareOrder)
        .unwrap_or(false)
}

fn is_order_ready(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind() == EventKind::OrderReady)
        .unwrap_or(false)
}

fn is_assign_courier(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind() == EventKind::AssignCourier)
        .unwrap_or(false)
}

fn is_pick_up_order(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind() == EventKind::PickUpOrder)
        .unwrap_or(false)
}

fn is_order_in_transit(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind() == EventKind::OrderInTransit)
        .unwrap_or(false)
}

fn is_check_delivery_status(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind() == EventKind::CheckDeliveryStatus)
        .unwrap_or(false)
}

fn is_deliver_order(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind() == EventKind::DeliverOrder)
        .unwrap_or(false)
}

fn is_cancel_order(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind() == EventKind::CancelOrder)
        .unwrap_or(false)
}

fn is_update_courier_location(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind() == EventKind::UpdateCourierLocation)
        .unwrap_or(false)
}

fn is_update_user_behaviour(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind() == EventKind::UpdateUserBehaviour)
        .unwrap_or(false)
}

fn is_update_restaurant_status(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind() == EventKind::UpdateRestaurantStatus)
        .unwrap_or(false)
}

fn is_generate_review(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind() == EventKind::GenerateReview)
        .unwrap_or(false)
}

/// All event handlers plus [apply_deferred] so that spawned orders exist
/// before the next event is dispatched.
pub fn event_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems((
        place_order_system.run_if(is_place_order),
        prepare_order_system.run_if(is_prepare_order),
        order_ready_system.run_if(is_order_ready),
        assign_courier_system.run_if(is_assign_courier),
        pick_up_order_system.run_if(is_pick_up_order),
        order_in_transit_system.run_if(is_order_in_transit),
        check_delivery_status_system.run_if(is_check_delivery_status),
        deliver_order_system.run_if(is_deliver_order),
        cancel_order_system.run_if(is_cancel_order),
        update_courier_location_system.run_if(is_update_courier_location),
        update_user_behaviour_system.run_if(is_update_user_behaviour),
        update_restaurant_status_system.run_if(is_update_restaurant_status),
        generate_review_system.run_if(is_generate_review),
        apply_deferred,
    ));
    schedule
}

/// Per-tick passes, in order: environment refresh, courier movement
/// scheduling, demand generation.
pub fn maintenance_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems(
        (
            environment_system,
            movement_system,
            demand_generation_system,
            apply_deferred,
        )
            .chain(),
    );
    schedule
}

pub fn reconcile_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems((reconcile_system, apply_deferred).chain());
    schedule
}

/// The three schedules a tick runs.
pub struct SimulationSchedules {
    pub events: Schedule,
    pub maintenance: Schedule,
    pub reconcile: Schedule,
}

impl SimulationSchedules {
    pub fn new() -> Self {
        Self {
            events: event_schedule(),
            maintenance: maintenance_schedule(),
            reconcile: reconcile_schedule(),
        }
    }
}

impl Default for SimulationSchedules {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the event schedule for one event. Events whose subject entity is gone
/// are logged, counted and dropped. Returns `true` if the event was handled.
pub fn dispatch_event(world: &mut World, schedule: &mut Schedule, event: Event) -> bool {
    let subject = event.payload.subject();
    if world.get_entity(subject).is_none() {
        warn!(
            kind = ?event.kind(),
            ?subject,
            timestamp = event.timestamp,
            "dropping event for missing entity"
        );
        world.resource_mut::<SimTelemetry>().record_dropped(event.kind());
        return false;
    }
    world.insert_resource(CurrentEvent(event));
    schedule.run(world);
    world.resource_mut::<SimTelemetry>().events_processed += 1;
    true
}

/// Pops the next event regardless of the tick boundary (moving `now` to its
/// timestamp) and dispatches it. Returns `false` if the queue was empty.
pub fn run_next_event(world: &mut World, schedule: &mut Schedule) -> bool {
    let event = match world.resource_mut::<SimulationClock>().pop_next() {
        Some(e) => e,
        None => return false,
    };
    dispatch_event(world, schedule, event);
    true
}

/// Runs events until the queue is empty or `max_steps` is reached.
/// Returns the number of steps executed.
pub fn run_until_empty(world: &mut World, schedule: &mut Schedule, max_steps: usize) -> usize {
    let mut steps = 0;
    while steps < max_steps && run_next_event(world, schedule) {
        steps += 1;
    }
    steps
}

/// Dispatches every event due at or before `now`, including the ones handlers
/// enqueue while the drain is running. Returns the number of handled events.
pub fn drain_due_events(world: &mut World, schedule: &mut Schedule, batch_size: usize) -> usize {
    let mut handled = 0;
    loop {
        let batch = world
            .resource_mut::<SimulationClock>()
            .pop_due_batch(batch_size.max(1));
        if batch.is_empty() {
            break;
        }
        for event in batch {
            if dispatch_event(world, schedule, event) {
                handled += 1;
            }
        }
    }
    world.remove_resource::<CurrentEvent>();
    handled
}

/// Runs one tick. Returns `false` without doing anything once the clock has
/// reached the end of the simulated period.
pub fn run_tick(world: &mut World, schedules: &mut SimulationSchedules) -> bool {
    let (tick_ms, end_ms, batch_size) = {
        let params = world.resource::<SimulationParams>();
        (params.tick_ms, params.end_ms(), params.event_batch_size)
    };
    let now = world.resource::<SimulationClock>().now();
    if now >= end_ms {
        return false;
    }
    world
        .resource_mut::<SimulationClock>()
        .advance_to(now.saturating_add(tick_ms).min(end_ms));

    let mut handled = drain_due_events(world, &mut schedules.events, batch_size);
    schedules.maintenance.run(world);
    handled += drain_due_events(world, &mut schedules.events, batch_size);
    schedules.reconcile.run(world);

    let mut telemetry = world.resource_mut::<SimTelemetry>();
    telemetry.ticks += 1;
    debug!(tick = telemetry.ticks, handled, "tick complete");
    true
}

/// Schedules the first status refresh of every restaurant, spread evenly over
/// one refresh interval. Call once after building the scenario.
pub fn initialize_simulation(world: &mut World) {
    let interval = world
        .resource::<SimulationParams>()
        .timing
        .restaurant_status_interval_ms;
    let restaurants: Vec<Entity> = world
        .query_filtered::<Entity, With<Restaurant>>()
        .iter(world)
        .collect();
    let count = restaurants.len() as u64;
    let mut clock = world.resource_mut::<SimulationClock>();
    let now = clock.now();
    for (i, restaurant) in restaurants.into_iter().enumerate() {
        let offset = interval * i as u64 / count.max(1);
        clock.schedule_at(now + offset, EventPayload::UpdateRestaurantStatus { restaurant });
    }
    info!(restaurants = count, "simulation initialised");
}

/// Queues a customer cancellation for `order` at the current time. Returns
/// `false` if the order does not exist or has already finished.
pub fn request_cancellation(world: &mut World, order: Entity) -> bool {
    let live = world
        .get::<Order>(order)
        .is_some_and(|o| !o.status.is_terminal());
    if live {
        let mut clock = world.resource_mut::<SimulationClock>();
        let now = clock.now();
        clock.schedule_at(
            now,
            EventPayload::CancelOrder {
                order,
                reason: CancelReason::CustomerRequest,
            },
        );
    }
    live
}

pub fn sim_counts(world: &mut World) -> SimCounts {
    let users = world.query::<&User>().iter(world).count();
    let restaurants = world.query::<&Restaurant>().iter(world).count();
    let (couriers_available, couriers_busy) = world
        .query::<&Courier>()
        .iter(world)
        .fold((0, 0), |(free, busy), c| {
            if c.is_available() {
                (free + 1, busy)
            } else {
                (free, busy + 1)
            }
        });
    let orders_active = world
        .query::<&Order>()
        .iter(world)
        .filter(|o| !o.status.is_terminal())
        .count();
    let pending_events = world.resource::<SimulationClock>().len();
    SimCounts {
        users,
        restaurants,
        couriers_available,
        couriers_busy,
        orders_active,
        pending_events,
    }
}

/// Owns a built world, its schedules and the output sink, and runs the
/// simulation tick by tick until the end date.
pub struct SimulationDriver<S: OutputSink> {
    world: World,
    schedules: SimulationSchedules,
    sink: S,
    pool: ThreadPool,
}

impl<S: OutputSink> SimulationDriver<S> {
    /// Takes a world prepared by [crate::scenario::build_scenario] and
    /// schedules the initial events.
    pub fn new(mut world: World, sink: S) -> Result<Self, SinkError> {
        let threads = world.resource::<SimulationParams>().worker_threads;
        let pool = build_pool(threads)?;
        initialize_simulation(&mut world);
        Ok(Self {
            world,
            schedules: SimulationSchedules::new(),
            sink,
            pool,
        })
    }

    /// Runs one tick and flushes its output. Returns `false` once the end
    /// date has been reached.
    pub fn step(&mut self) -> bool {
        if !run_tick(&mut self.world, &mut self.schedules) {
            return false;
        }
        self.flush();
        true
    }

    /// Runs ticks until the clock reaches `until_ms` or the end date.
    pub fn run_until(&mut self, until_ms: u64) -> u64 {
        let mut ticks = 0;
        while self.now() < until_ms && self.step() {
            ticks += 1;
        }
        ticks
    }

    /// Runs to the end date. Returns the number of ticks executed.
    pub fn run(&mut self) -> u64 {
        let mut ticks = 0;
        while self.step() {
            ticks += 1;
        }
        ticks
    }

    pub fn now(&self) -> u64 {
        self.world.resource::<SimulationClock>().now()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn telemetry(&self) -> &SimTelemetry {
        self.world.resource::<SimTelemetry>()
    }

    pub fn counts(&mut self) -> SimCounts {
        sim_counts(&mut self.world)
    }

    /// Flushes pending output, closes the sink and hands back the world and
    /// the sink.
    pub fn finish(mut self) -> Result<(World, S), SinkError> {
        self.flush();
        self.sink.close()?;
        Ok((self.world, self.sink))
    }

    fn flush(&mut self) -> FlushStats {
        let mut outbox = std::mem::take(&mut *self.world.resource_mut::<EventOutbox>());
        let stats = flush_outbox(&mut outbox, &mut self.sink, Some(&self.pool));
        if stats.failed > 0 {
            self.world.resource_mut::<SimTelemetry>().output_errors += stats.failed as u64;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ONE_HOUR_MS, ONE_MIN_MS};
    use crate::ecs::{Menu, MenuCategory, MenuItem, RestaurantCluster};
    use crate::scenario::{build_scenario, Population};
    use crate::segment::CustomerSegment;
    use crate::spatial::GeoPoint;

    const HERE: GeoPoint = GeoPoint::new(52.52, 13.405);

    fn world(restaurants: usize) -> World {
        let mut population =
            Population::new().with_user(User::new("u-1", HERE, CustomerSegment::Regular));
        for i in 0..restaurants {
            population = population.with_restaurant(
                Restaurant::new(format!("r-{i}"), HERE, RestaurantCluster::Casual),
                Menu(vec![MenuItem::new(format!("m-{i}"), MenuCategory::Main, 10.0)]),
            );
        }
        let params = SimulationParams::default()
            .with_seed(1)
            .with_duration_hours(1)
            .with_demand_enabled(false);
        let mut world = World::new();
        build_scenario(&mut world, params, population).expect("scenario");
        world
    }

    #[test]
    fn events_for_missing_entities_are_dropped() {
        let mut world = world(1);
        let gone = world.spawn_empty().id();
        world.despawn(gone);
        world
            .resource_mut::<SimulationClock>()
            .schedule_at(0, EventPayload::PrepareOrder { order: gone });

        let mut schedule = event_schedule();
        assert!(run_next_event(&mut world, &mut schedule));

        let telemetry = world.resource::<SimTelemetry>();
        assert_eq!(telemetry.dropped_events.get(&EventKind::PrepareOrder), Some(&1));
        assert_eq!(telemetry.events_processed, 0);
    }

    #[test]
    fn restaurant_refreshes_are_staggered() {
        let mut world = world(4);
        initialize_simulation(&mut world);
        let mut times: Vec<u64> = world
            .resource::<SimulationClock>()
            .pending()
            .map(|e| e.timestamp)
            .collect();
        times.sort_unstable();
        let step = 30 * ONE_MIN_MS / 4;
        assert_eq!(times, vec![0, step, 2 * step, 3 * step]);
    }

    #[test]
    fn ticks_stop_at_the_end_date() {
        let mut world = world(1);
        let mut schedules = SimulationSchedules::new();
        let mut ticks = 0;
        while run_tick(&mut world, &mut schedules) {
            ticks += 1;
        }
        assert_eq!(ticks, 60);
        assert_eq!(world.resource::<SimulationClock>().now(), ONE_HOUR_MS);
        assert_eq!(world.resource::<SimTelemetry>().ticks, 60);
        assert!(!run_tick(&mut world, &mut schedules));
    }

    #[test]
    fn same_tick_follow_ups_are_drained() {
        let mut world = world(1);
        let user = world
            .query_filtered::<Entity, With<User>>()
            .iter(&world)
            .next()
            .expect("user");
        world
            .resource_mut::<SimulationClock>()
            .schedule_at(0, EventPayload::PlaceOrder { user });
        let mut schedules = SimulationSchedules::new();
        run_tick(&mut world, &mut schedules);

        let counts = sim_counts(&mut world);
        assert_eq!(counts.orders_active, 1);
        assert_eq!(counts.users, 1);
        assert_eq!(world.resource::<SimTelemetry>().orders_placed, 1);
        assert!(world
            .resource::<SimulationClock>()
            .pending()
            .all(|e| e.timestamp > world.resource::<SimulationClock>().now()));
    }

    #[test]
    fn cancellation_requests_need_a_live_order() {
        let mut world = world(1);
        assert!(!request_cancellation(&mut world, Entity::from_raw(12_345)));
    }
}
