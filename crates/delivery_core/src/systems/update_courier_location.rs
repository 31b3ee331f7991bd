use bevy_ecs::prelude::{Query, Res, ResMut};
use tracing::warn;

use super::movement_conditions;
use crate::clock::{CurrentEvent, EventPayload, SimulationClock};
use crate::courier::{advance_courier, courier_target};
use crate::ecs::{Courier, Order};
use crate::output::wire::{EventBody, PartnerLocation};
use crate::output::{EventOutbox, OutputEvent};
use crate::rng::SimRng;
use crate::spatial::SpatialIndex;
use crate::traffic::TrafficConditions;
use crate::weather::WeatherState;

/// Catch a busy courier's position up to `now` and publish it.
#[allow(clippy::too_many_arguments)]
pub fn update_courier_location_system(
    event: Res<CurrentEvent>,
    clock: Res<SimulationClock>,
    mut rng: ResMut<SimRng>,
    traffic: Res<TrafficConditions>,
    weather: Res<WeatherState>,
    mut index: ResMut<SpatialIndex>,
    mut outbox: ResMut<EventOutbox>,
    mut couriers: Query<&mut Courier>,
    orders: Query<&Order>,
) {
    let EventPayload::UpdateCourierLocation { courier: courier_entity } = event.0.payload else {
        return;
    };
    let Ok(mut courier) = couriers.get_mut(courier_entity) else {
        warn!(?courier_entity, "location update for unknown courier");
        return;
    };
    let Some(order_entity) = courier.current_order else {
        return;
    };
    let Ok(order) = orders.get(order_entity) else {
        return;
    };
    let Some(target) = courier_target(&courier, order) else {
        return;
    };

    let now = clock.now();
    let conditions = movement_conditions(&traffic, &weather);
    let step = advance_courier(rng.rng(), &mut courier, target, now, conditions);
    index.update_courier_position(courier_entity, step.position);

    outbox.push(
        OutputEvent::new(
            clock.unix_secs_at(now),
            EventBody::PartnerLocation(PartnerLocation {
                partner_id: courier.id.clone(),
                new_location: step.position,
                status: courier.status.as_str(),
                speed: courier.speed_kmh * conditions.traffic_factor * conditions.weather_factor,
                order_id: Some(order.id.clone()),
            }),
        )
        .with_partner(Some(courier.id.as_str())),
    );
}
