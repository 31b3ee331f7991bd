use bevy_ecs::prelude::{Query, Res, ResMut};
use tracing::{debug, warn};

use crate::clock::{CurrentEvent, EventPayload, SimulationClock};
use crate::courier::release_pair;
use crate::ecs::{Courier, Order, OrderOutcome, OrderStatus, Restaurant, User};
use crate::output::wire::{EventBody, OrderDelivery};
use crate::output::{EventOutbox, OutputEvent};
use crate::review::LATE_THRESHOLD_MINS;
use crate::scenario::SimulationParams;
use crate::telemetry::SimTelemetry;
use crate::timing::mins_to_ms;

/// InTransit -> Delivered: frees the courier, queues the review and the
/// customer's behaviour update.
#[allow(clippy::too_many_arguments)]
pub fn deliver_order_system(
    event: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    params: Res<SimulationParams>,
    mut telemetry: ResMut<SimTelemetry>,
    mut outbox: ResMut<EventOutbox>,
    mut orders: Query<&mut Order>,
    mut couriers: Query<&mut Courier>,
    mut users: Query<&mut User>,
    restaurants: Query<&Restaurant>,
) {
    let EventPayload::DeliverOrder { order: order_entity } = event.0.payload else {
        return;
    };
    let Ok(mut order) = orders.get_mut(order_entity) else {
        warn!(?order_entity, "delivery for unknown order");
        return;
    };
    if order.status != OrderStatus::InTransit {
        return;
    }
    let now = clock.now();
    if let Err(err) = order.advance_to(OrderStatus::Delivered, now) {
        warn!(order = %order.id, %err, "rejected transition");
        return;
    }

    let mut partner_id = None;
    if let Some(courier_entity) = order.courier {
        if let Ok(mut courier) = couriers.get_mut(courier_entity) {
            if release_pair(&mut courier, order_entity) {
                courier.experience += 1;
            }
            partner_id = Some(courier.id.clone());
        }
    }

    let review_at = now.saturating_add(params.timing.review_delay_ms);
    order.review_due_at = Some(review_at);
    clock.schedule_at(review_at, EventPayload::GenerateReview { order: order_entity });

    let on_time = order
        .delivered_on_time(mins_to_ms(LATE_THRESHOLD_MINS))
        .unwrap_or(false);
    let user_id = match users.get_mut(order.customer) {
        Ok(mut user) => {
            user.recent_outcomes.push(if on_time {
                OrderOutcome::OnTime
            } else {
                OrderOutcome::Late
            });
            clock.schedule_at(now, EventPayload::UpdateUserBehaviour { user: order.customer });
            Some(user.id.clone())
        }
        Err(_) => None,
    };
    telemetry.orders_delivered += 1;

    debug!(order = %order.id, on_time, "order delivered");
    let mut out = OutputEvent::new(
        clock.unix_secs_at(now),
        EventBody::OrderDelivery(OrderDelivery {
            order_id: order.id.clone(),
            partner_id: partner_id.clone().unwrap_or_default(),
            status: OrderStatus::Delivered.as_str(),
            actual_delivery_time: clock.unix_secs_at(now),
            estimated_delivery_time: clock.unix_secs_at(order.estimated_delivery_time),
            on_time,
        }),
    )
    .with_partner(partner_id.as_deref());
    if let Some(id) = user_id {
        out = out.with_user(id);
    }
    if let Ok(restaurant) = restaurants.get(order.restaurant) {
        out = out.with_restaurant(restaurant.id.clone());
    }
    outbox.push(out);
}
