use bevy_ecs::prelude::{Commands, Entity, Query, Res, ResMut};
use chrono::Datelike;
use rand::Rng;
use tracing::{debug, warn};

use crate::clock::{CancelReason, CurrentEvent, EventPayload, SimulationClock, ONE_DAY_MS};
use crate::demand::menu::select_items;
use crate::demand::restaurant::{select_restaurant, Candidate};
use crate::demand::DemandContext;
use crate::ecs::{Menu, Order, OrderIdSequence, OrderStatus, Restaurant, User};
use crate::output::wire::{EventBody, OrderPlaced};
use crate::output::{EventOutbox, OutputEvent};
use crate::pricing::price_order;
use crate::rng::SimRng;
use crate::scenario::SimulationParams;
use crate::spatial::SpatialIndex;
use crate::telemetry::SimTelemetry;
use crate::timing::{estimate_delivery_time, mins_to_ms, sample_prep_mins, PrepRequest};
use crate::traffic::TrafficConditions;
use crate::weather::WeatherState;

/// Exponential inter-arrival with mean `24h / orders_per_day`.
fn next_order_delay_ms<R: Rng + ?Sized>(rng: &mut R, orders_per_day: f64) -> u64 {
    if orders_per_day.is_nan() || orders_per_day <= 0.0 {
        return ONE_DAY_MS;
    }
    let mean_ms = ONE_DAY_MS as f64 / orders_per_day;
    let u: f64 = rng.gen();
    (-mean_ms * (1.0 - u).ln()).round() as u64
}

#[allow(clippy::too_many_arguments)]
pub fn place_order_system(
    mut commands: Commands,
    event: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    params: Res<SimulationParams>,
    mut rng: ResMut<SimRng>,
    weather: Res<WeatherState>,
    traffic: Res<TrafficConditions>,
    index: Res<SpatialIndex>,
    mut ids: ResMut<OrderIdSequence>,
    mut telemetry: ResMut<SimTelemetry>,
    mut outbox: ResMut<EventOutbox>,
    mut users: Query<&mut User>,
    mut restaurants: Query<(&mut Restaurant, &Menu)>,
) {
    let EventPayload::PlaceOrder { user: user_entity } = event.0.payload else {
        return;
    };
    let Ok(mut user) = users.get_mut(user_entity) else {
        warn!(?user_entity, "place order for unknown user");
        return;
    };

    let now = clock.now();
    let datetime = clock.datetime();
    let ctx = DemandContext::new(
        &datetime,
        params.city.centre.lat,
        &weather,
        &traffic,
        &params.demand.special_days,
    );
    let reach_km = params.city.near_location_threshold_km;
    let rng = rng.rng();

    let chosen: Option<Entity> = {
        let candidates: Vec<Candidate<'_>> = index
            .restaurants_near(user.location, reach_km)
            .into_iter()
            .filter_map(|entity| {
                let (restaurant, menu) = restaurants.get(entity).ok()?;
                let distance_km = user.location.distance_km(&restaurant.location);
                (distance_km <= reach_km && !menu.is_empty()).then_some(Candidate {
                    entity,
                    restaurant,
                    distance_km,
                })
            })
            .collect();
        select_restaurant(rng, &candidates, &user, reach_km, &ctx)
    };

    let placement = chosen.and_then(|entity| {
        let (restaurant, menu) = restaurants.get(entity).ok()?;
        let picked = select_items(rng, menu, user.segment.profile(), &ctx);
        if picked.is_empty() {
            return None;
        }
        let items: Vec<_> = picked.iter().map(|&i| &menu.items()[i]).collect();
        let item_ids: Vec<String> = items.iter().map(|i| i.id.clone()).collect();
        let avg_complexity =
            items.iter().map(|i| i.prep_complexity).sum::<f64>() / items.len() as f64;
        let distance_km = restaurant.location.distance_km(&user.location);
        let pricing = price_order(&params.pricing, items.iter().map(|i| i.price), distance_km);
        Some((entity, item_ids, avg_complexity, pricing))
    });

    let Some((restaurant_entity, item_ids, avg_complexity, pricing)) = placement else {
        telemetry.placement_failures += 1;
        user.next_order_at = now.saturating_add(params.timing.placement_backoff_ms);
        debug!(user = %user.id, "no reachable restaurant with a menu; order skipped");
        return;
    };
    let Ok((mut restaurant, _)) = restaurants.get_mut(restaurant_entity) else {
        return;
    };

    let timing = &params.timing;
    let acceptance_ms = rng.gen_range(timing.acceptance_delay_min_ms..=timing.acceptance_delay_max_ms);
    let prep_start = now + acceptance_ms;
    let prep_mins = sample_prep_mins(
        rng,
        &restaurant,
        &PrepRequest {
            item_count: item_ids.len(),
            avg_complexity,
            hour: ctx.hour,
            load_factor: timing.restaurant_load_factor,
            max_prep_mins: timing.max_prep_mins,
        },
    );
    let prep_ms = mins_to_ms(prep_mins);
    let ready_at = prep_start + prep_ms;
    let expected_speed =
        params.courier.base_speed_kmh * traffic.speed_factor() * weather.speed_factor();

    let id = ids.next_id();
    let mut order = Order::placed(
        id.clone(),
        user_entity,
        restaurant_entity,
        item_ids.clone(),
        pricing,
        restaurant.location,
        user.location,
        now,
    );
    order.complexity = avg_complexity;
    order.prep_start_time = prep_start;
    order.prep_duration_ms = prep_ms;
    order.estimated_pickup_time = ready_at;
    order.estimated_delivery_time =
        estimate_delivery_time(ready_at, ready_at, order.distance_km, expected_speed);
    let estimated_delivery = order.estimated_delivery_time;
    let timeout_at = order.timeout_at(timing.max_order_duration_ms);

    let order_entity = commands.spawn(order).id();
    restaurant.current_orders.push(order_entity);

    clock.schedule_at(prep_start, EventPayload::PrepareOrder { order: order_entity });
    clock.schedule_at(
        timeout_at,
        EventPayload::CancelOrder {
            order: order_entity,
            reason: CancelReason::Timeout,
        },
    );

    user.last_order_time = Some(now);
    user.total_orders += 1;
    user.lifetime_spend += pricing.total;
    user.record_purchase(datetime.weekday(), ctx.hour);
    let frequency = user.order_frequency;
    user.next_order_at = now.saturating_add(next_order_delay_ms(rng, frequency));
    telemetry.orders_placed += 1;

    debug!(
        order = %id,
        user = %user.id,
        restaurant = %restaurant.id,
        total = pricing.total,
        "order placed"
    );
    outbox.push(
        OutputEvent::new(
            clock.unix_secs_at(now),
            EventBody::OrderPlaced(OrderPlaced {
                order_id: id,
                item_ids,
                subtotal: pricing.subtotal,
                delivery_fee: pricing.delivery_fee,
                total_amount: pricing.total,
                status: OrderStatus::Placed.as_str(),
                order_placed_at: clock.unix_secs_at(now),
                estimated_pickup_time: clock.unix_secs_at(ready_at),
                estimated_delivery_time: clock.unix_secs_at(estimated_delivery),
            }),
        )
        .with_user(user.id.clone())
        .with_restaurant(restaurant.id.clone()),
    );
}
