use bevy_ecs::prelude::{Query, Res, ResMut};
use tracing::{debug, warn};

use crate::clock::{CurrentEvent, EventPayload, SimulationClock, ONE_MIN_MS};
use crate::ecs::{Order, OrderStatus, Restaurant};
use crate::output::wire::{EventBody, OrderReady};
use crate::output::{EventOutbox, OutputEvent};
use crate::scenario::SimulationParams;

/// Preparing -> Ready. Requests a courier when none is assigned and arms the
/// pickup re-check.
pub fn order_ready_system(
    event: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    params: Res<SimulationParams>,
    mut outbox: ResMut<EventOutbox>,
    mut orders: Query<&mut Order>,
    mut restaurants: Query<&mut Restaurant>,
) {
    let EventPayload::OrderReady { order: order_entity } = event.0.payload else {
        return;
    };
    let Ok(mut order) = orders.get_mut(order_entity) else {
        warn!(?order_entity, "ready for unknown order");
        return;
    };
    if order.status != OrderStatus::Preparing {
        debug!(order = %order.id, status = order.status.as_str(), "ready skipped");
        return;
    }

    let now = clock.now();
    if let Some(ready_at) = order.pickup_time.filter(|t| now < *t) {
        clock.schedule_at(ready_at, event.0.payload);
        return;
    }
    if let Err(err) = order.advance_to(OrderStatus::Ready, now) {
        warn!(order = %order.id, %err, "rejected transition");
        return;
    }
    order.pickup_time = Some(now);

    let restaurant_id = match restaurants.get_mut(order.restaurant) {
        Ok(mut restaurant) => {
            let prep_mins = now.saturating_sub(order.prep_start_time) as f64 / ONE_MIN_MS as f64;
            restaurant.observed_prep_mins.push(prep_mins);
            Some(restaurant.id.clone())
        }
        Err(_) => None,
    };

    let awaiting_courier = order.courier.is_none();
    if awaiting_courier && !order.assignment_pending {
        order.assignment_pending = true;
        clock.schedule_at(
            now,
            EventPayload::AssignCourier {
                order: order_entity,
                attempt: order.assignment_attempts + 1,
            },
        );
    }
    clock.schedule_in(
        params.timing.pickup_recheck_ms,
        EventPayload::PickUpOrder { order: order_entity },
    );

    let mut out = OutputEvent::new(
        clock.unix_secs_at(now),
        EventBody::OrderReady(OrderReady {
            order_id: order.id.clone(),
            status: OrderStatus::Ready.as_str(),
            ready_at: clock.unix_secs_at(now),
            awaiting_courier,
        }),
    );
    if let Some(id) = restaurant_id {
        out = out.with_restaurant(id);
    }
    outbox.push(out);
}
