use bevy_ecs::prelude::{Query, Res, ResMut};
use tracing::{debug, warn};

use crate::clock::{CurrentEvent, EventPayload, SimulationClock};
use crate::ecs::{Order, OrderStatus, Restaurant};
use crate::output::wire::{EventBody, OrderPreparation};
use crate::output::{EventOutbox, OutputEvent};

/// Placed -> Preparing once the restaurant has accepted the order.
pub fn prepare_order_system(
    event: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    mut outbox: ResMut<EventOutbox>,
    mut orders: Query<&mut Order>,
    restaurants: Query<&Restaurant>,
) {
    let EventPayload::PrepareOrder { order: order_entity } = event.0.payload else {
        return;
    };
    let Ok(mut order) = orders.get_mut(order_entity) else {
        warn!(?order_entity, "prepare for unknown order");
        return;
    };
    if order.status != OrderStatus::Placed {
        debug!(order = %order.id, status = order.status.as_str(), "prepare skipped");
        return;
    }

    let now = clock.now();
    if now < order.prep_start_time {
        clock.schedule_at(order.prep_start_time, event.0.payload);
        return;
    }

    if let Err(err) = order.advance_to(OrderStatus::Preparing, now) {
        warn!(order = %order.id, %err, "rejected transition");
        return;
    }
    let ready_at = now.saturating_add(order.prep_duration_ms);
    order.pickup_time = Some(ready_at);
    clock.schedule_at(ready_at, EventPayload::OrderReady { order: order_entity });

    let mut out = OutputEvent::new(
        clock.unix_secs_at(now),
        EventBody::OrderPreparation(OrderPreparation {
            order_id: order.id.clone(),
            status: OrderStatus::Preparing.as_str(),
            prep_start_time: clock.unix_secs_at(now),
            estimated_ready_time: clock.unix_secs_at(ready_at),
        }),
    );
    if let Ok(restaurant) = restaurants.get(order.restaurant) {
        out = out.with_restaurant(restaurant.id.clone());
    }
    outbox.push(out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_ecs::prelude::{Entity, Schedule, World};

    use crate::clock::{Event, EventKind};
    use crate::pricing::OrderPricing;
    use crate::spatial::GeoPoint;

    fn spawn_order(world: &mut World, prep_start: u64) -> Entity {
        let mut order = Order::placed(
            "ord-1".into(),
            Entity::from_raw(900),
            Entity::from_raw(901),
            vec!["m-1".into()],
            OrderPricing::default(),
            GeoPoint::new(52.52, 13.40),
            GeoPoint::new(52.53, 13.40),
            0,
        );
        order.prep_start_time = prep_start;
        order.prep_duration_ms = 600_000;
        world.spawn(order).id()
    }

    fn run_at(world: &mut World, now: u64, order: Entity) {
        world.resource_mut::<SimulationClock>().advance_to(now);
        world.insert_resource(CurrentEvent(Event {
            timestamp: now,
            seq: 0,
            payload: EventPayload::PrepareOrder { order },
        }));
        let mut schedule = Schedule::default();
        schedule.add_systems(prepare_order_system);
        schedule.run(world);
    }

    #[test]
    fn starts_preparation_and_schedules_ready() {
        let mut world = World::new();
        world.insert_resource(SimulationClock::default());
        world.insert_resource(EventOutbox::default());
        let order = spawn_order(&mut world, 60_000);

        run_at(&mut world, 60_000, order);

        let o = world.get::<Order>(order).expect("order");
        assert_eq!(o.status, OrderStatus::Preparing);
        assert_eq!(o.pickup_time, Some(660_000));
        let next = world.resource_mut::<SimulationClock>().pop_next().expect("ready");
        assert_eq!(next.kind(), EventKind::OrderReady);
        assert_eq!(next.timestamp, 660_000);
        assert_eq!(world.resource::<EventOutbox>().len(), 1);
    }

    #[test]
    fn early_event_is_deferred_to_prep_start() {
        let mut world = World::new();
        world.insert_resource(SimulationClock::default());
        world.insert_resource(EventOutbox::default());
        let order = spawn_order(&mut world, 120_000);

        run_at(&mut world, 30_000, order);

        assert_eq!(world.get::<Order>(order).map(|o| o.status), Some(OrderStatus::Placed));
        let next = world.resource_mut::<SimulationClock>().pop_next().expect("deferred");
        assert_eq!(next.kind(), EventKind::PrepareOrder);
        assert_eq!(next.timestamp, 120_000);
    }
}
