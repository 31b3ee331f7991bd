use bevy_ecs::prelude::{Query, Res, ResMut};
use tracing::warn;

use super::movement_conditions;
use crate::clock::{CurrentEvent, EventPayload, SimulationClock};
use crate::courier::advance_courier;
use crate::ecs::{Courier, Order, OrderStatus};
use crate::output::wire::{DeliveryStatusCheck, EventBody};
use crate::output::{EventOutbox, OutputEvent};
use crate::rng::SimRng;
use crate::scenario::SimulationParams;
use crate::spatial::SpatialIndex;
use crate::traffic::TrafficConditions;
use crate::weather::WeatherState;

/// Move the courier toward the customer and hand over once within the
/// delivery threshold; otherwise check again later.
#[allow(clippy::too_many_arguments)]
pub fn check_delivery_status_system(
    event: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    params: Res<SimulationParams>,
    mut rng: ResMut<SimRng>,
    traffic: Res<TrafficConditions>,
    weather: Res<WeatherState>,
    mut index: ResMut<SpatialIndex>,
    mut outbox: ResMut<EventOutbox>,
    orders: Query<&Order>,
    mut couriers: Query<&mut Courier>,
) {
    let EventPayload::CheckDeliveryStatus { order: order_entity } = event.0.payload else {
        return;
    };
    let Ok(order) = orders.get(order_entity) else {
        warn!(?order_entity, "delivery check for unknown order");
        return;
    };
    if order.status != OrderStatus::InTransit {
        return;
    }
    let Some(courier_entity) = order.courier else {
        warn!(order = %order.id, "order in transit without a courier");
        return;
    };
    let Ok(mut courier) = couriers.get_mut(courier_entity) else {
        warn!(order = %order.id, ?courier_entity, "assigned courier is missing");
        return;
    };

    let now = clock.now();
    let step = advance_courier(
        rng.rng(),
        &mut courier,
        order.delivery_location,
        now,
        movement_conditions(&traffic, &weather),
    );
    index.update_courier_position(courier_entity, step.position);

    let arrived = step.remaining_km <= params.timing.delivery_threshold_km;
    if arrived {
        clock.schedule_at(now, EventPayload::DeliverOrder { order: order_entity });
    } else {
        clock.schedule_in(params.timing.delivery_check_interval_ms, event.0.payload);
    }

    outbox.push(
        OutputEvent::new(
            clock.unix_secs_at(now),
            EventBody::DeliveryStatusCheck(DeliveryStatusCheck {
                order_id: order.id.clone(),
                partner_id: courier.id.clone(),
                status: order.status.as_str(),
                current_location: step.position,
                remaining_distance_km: step.remaining_km,
                arrived,
            }),
        )
        .with_partner(Some(courier.id.as_str())),
    );
}
