use bevy_ecs::prelude::{Query, Res, ResMut};
use tracing::{debug, info, warn};

use crate::clock::{CancelReason, CurrentEvent, EventPayload, SimulationClock};
use crate::courier::release_pair;
use crate::ecs::{Courier, Order, OrderOutcome, OrderStatus, Restaurant, User};
use crate::output::wire::{EventBody, OrderCancellation};
use crate::output::{EventOutbox, OutputEvent};
use crate::scenario::SimulationParams;
use crate::telemetry::SimTelemetry;

/// Any live status -> Cancelled. Releases the courier if it is still working
/// on the order. Cancelling a terminal order is a no-op.
#[allow(clippy::too_many_arguments)]
pub fn cancel_order_system(
    event: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    params: Res<SimulationParams>,
    mut telemetry: ResMut<SimTelemetry>,
    mut outbox: ResMut<EventOutbox>,
    mut orders: Query<&mut Order>,
    mut couriers: Query<&mut Courier>,
    mut users: Query<&mut User>,
    mut restaurants: Query<&mut Restaurant>,
) {
    let EventPayload::CancelOrder {
        order: order_entity,
        reason,
    } = event.0.payload
    else {
        return;
    };
    let Ok(mut order) = orders.get_mut(order_entity) else {
        warn!(?order_entity, "cancel for unknown order");
        return;
    };
    if order.status.is_terminal() {
        debug!(order = %order.id, status = order.status.as_str(), "cancel ignored");
        return;
    }

    let now = clock.now();
    let max_duration = params.timing.max_order_duration_ms;
    if reason == CancelReason::Timeout && !order.is_overdue(now, max_duration) {
        clock.schedule_at(order.timeout_at(max_duration), event.0.payload);
        return;
    }

    let previous = order.status;
    if let Err(err) = order.advance_to(OrderStatus::Cancelled, now) {
        warn!(order = %order.id, %err, "rejected transition");
        return;
    }
    order.cancel_reason = Some(reason);

    let mut partner_id = None;
    if let Some(courier_entity) = order.courier {
        if let Ok(mut courier) = couriers.get_mut(courier_entity) {
            if release_pair(&mut courier, order_entity) {
                partner_id = Some(courier.id.clone());
            }
        }
    }
    let restaurant_id = match restaurants.get_mut(order.restaurant) {
        Ok(mut restaurant) => {
            restaurant.remove_order(order_entity);
            Some(restaurant.id.clone())
        }
        Err(_) => None,
    };
    let user_id = match users.get_mut(order.customer) {
        Ok(mut user) => {
            user.cancelled_orders += 1;
            user.recent_outcomes.push(OrderOutcome::Cancelled);
            clock.schedule_at(now, EventPayload::UpdateUserBehaviour { user: order.customer });
            Some(user.id.clone())
        }
        Err(_) => None,
    };
    telemetry.record_cancel(reason);

    info!(
        order = %order.id,
        reason = reason.as_str(),
        previous = previous.as_str(),
        "order cancelled"
    );
    let mut out = OutputEvent::new(
        clock.unix_secs_at(now),
        EventBody::OrderCancellation(OrderCancellation {
            order_id: order.id.clone(),
            status: OrderStatus::Cancelled.as_str(),
            previous_status: previous.as_str(),
            reason: reason.as_str(),
            cancelled_at: clock.unix_secs_at(now),
        }),
    )
    .with_partner(partner_id.as_deref());
    if let Some(id) = user_id {
        out = out.with_user(id);
    }
    if let Some(id) = restaurant_id {
        out = out.with_restaurant(id);
    }
    outbox.push(out);
}
