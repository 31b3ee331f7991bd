//! Per-tick consistency pass.
//!
//! Handlers keep orders, couriers and restaurants consistent on their own;
//! this pass repairs whatever slipped through (lost events, references to
//! swept entities) and sweeps finished orders out of the world.

use bevy_ecs::prelude::{Commands, Entity, Query, Res, ResMut};
use chrono::Timelike;
use tracing::info;

use crate::calendar::is_peak_hour;
use crate::clock::{CancelReason, EventPayload, SimulationClock};
use crate::courier::assignment_radius_km;
use crate::ecs::{Courier, CourierStatus, Order, OrderStatus, Restaurant, User};
use crate::scenario::SimulationParams;
use crate::spatial::{haversine_km, GeoPoint, SpatialIndex};
use crate::telemetry::{CompletedOrderRecord, RepairKind, SimTelemetry};

fn repair(telemetry: &mut SimTelemetry, kind: RepairKind, subject: &str) {
    telemetry.record_repair(kind);
    info!(?kind, subject, "reconciler repair");
}

/// Orders that have not yet been handed to a courier, plus the one being
/// handed over this tick.
fn held_by_restaurant(status: OrderStatus) -> bool {
    matches!(
        status,
        OrderStatus::Placed | OrderStatus::Preparing | OrderStatus::Ready | OrderStatus::PickedUp
    )
}

/// Time from which a terminal order may leave the world. Waiting for the
/// order's own lifetime lets its pending timeout event land on a live entity.
fn sweep_due_at(order: &Order, max_order_duration_ms: u64) -> u64 {
    let lifetime_end = order.deadline(max_order_duration_ms);
    order.review_due_at.map_or(lifetime_end, |due| due.max(lifetime_end))
}

#[allow(clippy::too_many_arguments)]
pub fn reconcile_system(
    mut commands: Commands,
    mut clock: ResMut<SimulationClock>,
    params: Res<SimulationParams>,
    index: Res<SpatialIndex>,
    mut telemetry: ResMut<SimTelemetry>,
    mut orders: Query<(Entity, &mut Order)>,
    mut couriers: Query<(Entity, &mut Courier)>,
    mut restaurants: Query<&mut Restaurant>,
    users: Query<&User>,
) {
    let now = clock.now();
    let timing = &params.timing;

    for (courier_entity, mut courier) in couriers.iter_mut() {
        match courier.current_order {
            None if !courier.is_available() => {
                courier.status = CourierStatus::Available;
                repair(&mut telemetry, RepairKind::CourierStatusMismatch, &courier.id);
            }
            Some(_) if courier.is_available() => {
                courier.current_order = None;
                repair(&mut telemetry, RepairKind::CourierStatusMismatch, &courier.id);
            }
            Some(order_entity) => {
                let linked = orders
                    .get(order_entity)
                    .map(|(_, o)| !o.status.is_terminal() && o.courier == Some(courier_entity))
                    .unwrap_or(false);
                if !linked {
                    courier.status = CourierStatus::Available;
                    courier.current_order = None;
                    repair(&mut telemetry, RepairKind::DanglingCourier, &courier.id);
                }
            }
            None => {}
        }
    }

    let peak = is_peak_hour(clock.datetime().hour());
    let idle_courier_near = |pickup: GeoPoint| {
        let radius_km = assignment_radius_km(
            params.courier.assignment_radius_km,
            peak,
            pickup,
            params.city.centre,
            params.city.urban_radius_km,
        );
        index.couriers_near(pickup, radius_km).into_iter().any(|entity| {
            couriers
                .get(entity)
                .map(|(_, c)| c.is_available() && haversine_km(c.location, pickup) <= radius_km)
                .unwrap_or(false)
        })
    };

    for (order_entity, mut order) in orders.iter_mut() {
        if order.status.is_terminal() {
            continue;
        }
        if order.is_overdue(now, timing.max_order_duration_ms) {
            clock.schedule_at(
                now,
                EventPayload::CancelOrder {
                    order: order_entity,
                    reason: CancelReason::Timeout,
                },
            );
            repair(&mut telemetry, RepairKind::OrderTimedOut, &order.id);
            continue;
        }
        if let Some(courier_entity) = order.courier {
            let held = couriers
                .get(courier_entity)
                .map(|(_, c)| c.current_order == Some(order_entity))
                .unwrap_or(false);
            if !held {
                order.courier = None;
                repair(&mut telemetry, RepairKind::DanglingOrderCourier, &order.id);
                // The food left with that courier; nobody else can finish it.
                if matches!(order.status, OrderStatus::PickedUp | OrderStatus::InTransit) {
                    clock.schedule_at(
                        now,
                        EventPayload::CancelOrder {
                            order: order_entity,
                            reason: CancelReason::CourierLost,
                        },
                    );
                    continue;
                }
            }
        }
        if order.status != OrderStatus::Ready || order.courier.is_some() || order.assignment_pending {
            continue;
        }
        if order.assignment_attempts >= params.courier.max_assignment_retries {
            if !idle_courier_near(order.pickup_location) {
                continue;
            }
            // Retries ran out while nobody was around. Start a fresh round.
            order.assignment_attempts = 0;
        }
        order.assignment_pending = true;
        clock.schedule_at(
            now,
            EventPayload::AssignCourier {
                order: order_entity,
                attempt: order.assignment_attempts + 1,
            },
        );
        repair(&mut telemetry, RepairKind::AssignmentReissued, &order.id);
    }

    for mut restaurant in restaurants.iter_mut() {
        let before = restaurant.current_orders.len();
        restaurant.current_orders.retain(|e| {
            orders
                .get(*e)
                .map(|(_, o)| held_by_restaurant(o.status))
                .unwrap_or(false)
        });
        for _ in restaurant.current_orders.len()..before {
            repair(&mut telemetry, RepairKind::StaleRestaurantOrder, &restaurant.id);
        }
    }

    for (order_entity, order) in orders.iter() {
        if !order.status.is_terminal() || now < sweep_due_at(order, timing.max_order_duration_ms) {
            continue;
        }
        let record = CompletedOrderRecord {
            order_id: order.id.clone(),
            user_id: users
                .get(order.customer)
                .map(|u| u.id.clone())
                .unwrap_or_default(),
            restaurant_id: restaurants
                .get(order.restaurant)
                .map(|r| r.id.clone())
                .unwrap_or_default(),
            courier_id: order
                .courier
                .and_then(|c| couriers.get(c).ok())
                .map(|(_, c)| c.id.clone()),
            status: order.status,
            cancel_reason: order.cancel_reason,
            total_amount: order.total_amount(),
            placed_at: order.placed_at,
            picked_up_at: order.picked_up_at,
            delivered_at: order.actual_delivery_time,
            cancelled_at: order.cancelled_at,
            estimated_delivery_time: order.estimated_delivery_time,
            assignment_attempts: order.assignment_attempts,
            review_generated: order.review_generated,
        };
        telemetry.completed_orders.push(record);
        commands.entity(order_entity).despawn();
    }
}
