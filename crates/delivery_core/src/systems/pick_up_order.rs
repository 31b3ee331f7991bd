use bevy_ecs::prelude::{Query, Res, ResMut};
use tracing::{debug, warn};

use super::movement_conditions;
use crate::clock::{CurrentEvent, EventPayload, SimulationClock};
use crate::courier::advance_courier;
use crate::ecs::{Courier, CourierStatus, Order, OrderStatus, Restaurant};
use crate::output::wire::{EventBody, OrderPickup};
use crate::output::{EventOutbox, OutputEvent};
use crate::rng::SimRng;
use crate::scenario::SimulationParams;
use crate::spatial::SpatialIndex;
use crate::traffic::TrafficConditions;
use crate::weather::WeatherState;

/// Ready -> PickedUp once the assigned courier has reached the restaurant;
/// otherwise check again after the pickup re-check interval.
#[allow(clippy::too_many_arguments)]
pub fn pick_up_order_system(
    event: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    params: Res<SimulationParams>,
    mut rng: ResMut<SimRng>,
    traffic: Res<TrafficConditions>,
    weather: Res<WeatherState>,
    mut index: ResMut<SpatialIndex>,
    mut outbox: ResMut<EventOutbox>,
    mut orders: Query<&mut Order>,
    mut couriers: Query<&mut Courier>,
    restaurants: Query<&Restaurant>,
) {
    let EventPayload::PickUpOrder { order: order_entity } = event.0.payload else {
        return;
    };
    let Ok(mut order) = orders.get_mut(order_entity) else {
        warn!(?order_entity, "pickup for unknown order");
        return;
    };
    if order.status != OrderStatus::Ready {
        return;
    }
    let Some(courier_entity) = order.courier else {
        debug!(order = %order.id, "pickup check before a courier was assigned");
        return;
    };
    let Ok(mut courier) = couriers.get_mut(courier_entity) else {
        warn!(order = %order.id, ?courier_entity, "assigned courier is missing");
        return;
    };
    if courier.current_order != Some(order_entity) {
        warn!(order = %order.id, courier = %courier.id, "courier is not working on this order");
        return;
    }

    let now = clock.now();
    let step = advance_courier(
        rng.rng(),
        &mut courier,
        order.pickup_location,
        now,
        movement_conditions(&traffic, &weather),
    );
    index.update_courier_position(courier_entity, step.position);

    if step.remaining_km > params.timing.pickup_threshold_km {
        clock.schedule_in(params.timing.pickup_recheck_ms, event.0.payload);
        return;
    }
    if let Err(err) = order.advance_to(OrderStatus::PickedUp, now) {
        warn!(order = %order.id, %err, "rejected transition");
        return;
    }
    courier.status = CourierStatus::EnRouteDelivery;
    clock.schedule_at(now, EventPayload::OrderInTransit { order: order_entity });

    debug!(order = %order.id, courier = %courier.id, "order picked up");
    let mut out = OutputEvent::new(
        clock.unix_secs_at(now),
        EventBody::OrderPickup(OrderPickup {
            order_id: order.id.clone(),
            partner_id: courier.id.clone(),
            status: OrderStatus::PickedUp.as_str(),
            pickup_time: clock.unix_secs_at(now),
        }),
    )
    .with_partner(Some(courier.id.as_str()));
    if let Ok(restaurant) = restaurants.get(order.restaurant) {
        out = out.with_restaurant(restaurant.id.clone());
    }
    outbox.push(out);
}
