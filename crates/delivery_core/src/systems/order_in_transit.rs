use bevy_ecs::prelude::{Query, Res, ResMut};
use tracing::warn;

use super::movement_conditions;
use crate::clock::{CurrentEvent, EventPayload, SimulationClock};
use crate::ecs::{Courier, Order, OrderStatus, Restaurant};
use crate::output::wire::{EventBody, OrderInTransit};
use crate::output::{EventOutbox, OutputEvent};
use crate::scenario::SimulationParams;
use crate::spatial::haversine_km;
use crate::timing::travel_time_ms;
use crate::traffic::TrafficConditions;
use crate::weather::WeatherState;

/// PickedUp -> InTransit: the order leaves the kitchen and the delivery
/// estimate is refreshed from the courier's live position.
#[allow(clippy::too_many_arguments)]
pub fn order_in_transit_system(
    event: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    params: Res<SimulationParams>,
    traffic: Res<TrafficConditions>,
    weather: Res<WeatherState>,
    mut outbox: ResMut<EventOutbox>,
    mut orders: Query<&mut Order>,
    couriers: Query<&Courier>,
    mut restaurants: Query<&mut Restaurant>,
) {
    let EventPayload::OrderInTransit { order: order_entity } = event.0.payload else {
        return;
    };
    let Ok(mut order) = orders.get_mut(order_entity) else {
        warn!(?order_entity, "transit for unknown order");
        return;
    };
    if order.status != OrderStatus::PickedUp {
        return;
    }
    let now = clock.now();
    if let Err(err) = order.advance_to(OrderStatus::InTransit, now) {
        warn!(order = %order.id, %err, "rejected transition");
        return;
    }

    let restaurant_id = match restaurants.get_mut(order.restaurant) {
        Ok(mut restaurant) => {
            restaurant.remove_order(order_entity);
            restaurant.completed_orders += 1;
            Some(restaurant.id.clone())
        }
        Err(_) => None,
    };

    let courier = order.courier.and_then(|c| couriers.get(c).ok());
    let (partner_id, remaining_km) = match courier {
        Some(courier) => {
            let remaining = haversine_km(courier.location, order.delivery_location);
            let conditions = movement_conditions(&traffic, &weather);
            let speed = courier.speed_kmh * conditions.traffic_factor * conditions.weather_factor;
            order.estimated_delivery_time = now.saturating_add(travel_time_ms(remaining, speed));
            (Some(courier.id.clone()), remaining)
        }
        None => (None, order.distance_km),
    };
    clock.schedule_in(
        params.timing.delivery_check_interval_ms,
        EventPayload::CheckDeliveryStatus { order: order_entity },
    );

    let mut out = OutputEvent::new(
        clock.unix_secs_at(now),
        EventBody::OrderInTransit(OrderInTransit {
            order_id: order.id.clone(),
            partner_id: partner_id.clone().unwrap_or_default(),
            status: OrderStatus::InTransit.as_str(),
            remaining_distance_km: remaining_km,
            estimated_delivery_time: clock.unix_secs_at(order.estimated_delivery_time),
        }),
    )
    .with_partner(partner_id.as_deref());
    if let Some(id) = restaurant_id {
        out = out.with_restaurant(id);
    }
    outbox.push(out);
}
