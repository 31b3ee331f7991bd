use bevy_ecs::prelude::{Query, Res, ResMut};
use chrono::Timelike;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::calendar::is_peak_hour;
use crate::clock::{CurrentEvent, EventPayload, SimulationClock};
use crate::courier::{assign_pair, assignment_radius_km, CourierCandidate, CourierSelectionResource};
use crate::ecs::{Courier, Order, OrderStatus, Restaurant};
use crate::output::wire::{CourierAssignment, EventBody};
use crate::output::{EventOutbox, OutputEvent};
use crate::rng::SimRng;
use crate::scenario::SimulationParams;
use crate::spatial::{haversine_km, SpatialIndex};
use crate::telemetry::SimTelemetry;
use crate::timing::{courier_eta_ms, estimate_delivery_time};

/// Pair a ready order with an available courier near the restaurant, or
/// retry later while attempts remain.
#[allow(clippy::too_many_arguments)]
pub fn assign_courier_system(
    event: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    params: Res<SimulationParams>,
    mut rng: ResMut<SimRng>,
    selection: Res<CourierSelectionResource>,
    index: Res<SpatialIndex>,
    mut telemetry: ResMut<SimTelemetry>,
    mut outbox: ResMut<EventOutbox>,
    mut orders: Query<&mut Order>,
    mut couriers: Query<&mut Courier>,
    restaurants: Query<&Restaurant>,
) {
    let EventPayload::AssignCourier {
        order: order_entity,
        attempt,
    } = event.0.payload
    else {
        return;
    };
    let Ok(mut order) = orders.get_mut(order_entity) else {
        warn!(?order_entity, "assignment for unknown order");
        return;
    };
    order.assignment_pending = false;
    if order.status != OrderStatus::Ready || order.courier.is_some() {
        debug!(order = %order.id, status = order.status.as_str(), "assignment no longer needed");
        return;
    }
    order.assignment_attempts = order.assignment_attempts.max(attempt);

    let now = clock.now();
    let pickup = order.pickup_location;
    let cfg = &params.courier;
    let radius_km = assignment_radius_km(
        cfg.assignment_radius_km,
        is_peak_hour(clock.datetime().hour()),
        pickup,
        params.city.centre,
        params.city.urban_radius_km,
    );

    let candidates: Vec<CourierCandidate> = index
        .couriers_near(pickup, radius_km)
        .into_iter()
        .filter_map(|entity| {
            let courier = couriers.get(entity).ok()?;
            let distance_km = haversine_km(courier.location, pickup);
            (courier.is_available() && distance_km <= radius_km).then_some(CourierCandidate {
                entity,
                distance_km,
                rating: courier.rating,
                experience: courier.experience,
            })
        })
        .collect();

    let rng = rng.rng();
    let Some(courier_entity) = selection.select(&candidates, &mut *rng) else {
        if attempt < cfg.max_assignment_retries {
            let jitter = if cfg.assignment_retry_jitter_ms > 0 {
                rng.gen_range(0..=cfg.assignment_retry_jitter_ms)
            } else {
                0
            };
            order.assignment_pending = true;
            clock.schedule_in(
                cfg.assignment_retry_delay_ms + jitter,
                EventPayload::AssignCourier {
                    order: order_entity,
                    attempt: attempt + 1,
                },
            );
            telemetry.assignment_retries += 1;
            debug!(order = %order.id, attempt, radius_km, "no courier available; retrying");
        } else {
            telemetry.assignments_abandoned += 1;
            info!(order = %order.id, attempt, "no courier found; giving up on assignment");
        }
        return;
    };
    let Ok(mut courier) = couriers.get_mut(courier_entity) else {
        return;
    };

    // Idle couriers do not move, so their clock just catches up.
    courier.last_moved_at = now;
    assign_pair(order_entity, &mut order, courier_entity, &mut courier);

    let distance_km = haversine_km(courier.location, pickup);
    let arrival = now + courier_eta_ms(rng, distance_km, cfg.base_speed_kmh, cfg.speed_variability);
    let food_ready = order.pickup_time.unwrap_or(now);
    order.estimated_pickup_time = arrival.max(food_ready);
    order.estimated_delivery_time =
        estimate_delivery_time(food_ready, arrival, order.distance_km, cfg.base_speed_kmh);
    clock.schedule_at(arrival, EventPayload::PickUpOrder { order: order_entity });

    debug!(order = %order.id, courier = %courier.id, distance_km, "courier assigned");
    let mut out = OutputEvent::new(
        clock.unix_secs_at(now),
        EventBody::CourierAssignment(CourierAssignment {
            order_id: order.id.clone(),
            partner_id: courier.id.clone(),
            status: courier.status.as_str(),
            attempt,
            distance_to_restaurant_km: distance_km,
            estimated_pickup_time: clock.unix_secs_at(order.estimated_pickup_time),
            estimated_delivery_time: clock.unix_secs_at(order.estimated_delivery_time),
        }),
    )
    .with_partner(Some(courier.id.as_str()));
    if let Ok(restaurant) = restaurants.get(order.restaurant) {
        out = out.with_restaurant(restaurant.id.clone());
    }
    outbox.push(out);
}
