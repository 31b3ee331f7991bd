use bevy_ecs::prelude::{Query, Res, ResMut};
use rand::Rng;
use tracing::warn;

use crate::clock::{CurrentEvent, EventPayload, SimulationClock};
use crate::ecs::Restaurant;
use crate::output::wire::{EventBody, RestaurantStatus};
use crate::output::{EventOutbox, OutputEvent};
use crate::rng::SimRng;
use crate::scenario::SimulationParams;

/// Weight of freshly observed preparation times in the running average.
const PREP_SMOOTHING: f64 = 0.3;
/// Load at which the kitchen starts losing pickup efficiency.
const BUSY_LOAD: f64 = 0.8;
/// Largest step of the demand trend random walk.
const TREND_STEP: f64 = 0.05;

/// Fold observed preparation times into the average and nudge efficiency
/// and trend. Returns the new efficiency.
pub fn refresh_restaurant<R: Rng + ?Sized>(
    rng: &mut R,
    restaurant: &mut Restaurant,
    efficiency_adjust_rate: f64,
) -> f64 {
    if !restaurant.observed_prep_mins.is_empty() {
        let observed = restaurant.observed_prep_mins.iter().sum::<f64>()
            / restaurant.observed_prep_mins.len() as f64;
        restaurant.avg_prep_time_mins =
            PREP_SMOOTHING * observed + (1.0 - PREP_SMOOTHING) * restaurant.avg_prep_time_mins;
        restaurant.observed_prep_mins.clear();
    }

    let delta = if restaurant.load() >= BUSY_LOAD {
        -efficiency_adjust_rate
    } else {
        efficiency_adjust_rate
    };
    restaurant.pickup_efficiency = (restaurant.pickup_efficiency + delta).clamp(0.5, 1.5);
    restaurant.trend = (restaurant.trend + rng.gen_range(-TREND_STEP..=TREND_STEP)).clamp(0.5, 1.5);
    restaurant.pickup_efficiency
}

/// Periodic restaurant refresh; re-arms itself.
pub fn update_restaurant_status_system(
    event: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    params: Res<SimulationParams>,
    mut rng: ResMut<SimRng>,
    mut outbox: ResMut<EventOutbox>,
    mut restaurants: Query<&mut Restaurant>,
) {
    let EventPayload::UpdateRestaurantStatus { restaurant: entity } = event.0.payload else {
        return;
    };
    let Ok(mut restaurant) = restaurants.get_mut(entity) else {
        warn!(?entity, "status update for unknown restaurant");
        return;
    };

    refresh_restaurant(rng.rng(), &mut restaurant, params.timing.efficiency_adjust_rate);
    clock.schedule_in(params.timing.restaurant_status_interval_ms, event.0.payload);

    outbox.push(
        OutputEvent::new(
            clock.unix_secs_at(clock.now()),
            EventBody::RestaurantStatus(RestaurantStatus {
                avg_prep_time: restaurant.avg_prep_time_mins,
                pickup_efficiency: restaurant.pickup_efficiency,
                current_orders: restaurant.current_orders.len(),
                capacity: restaurant.capacity,
                trend: restaurant.trend,
                rating: restaurant.rating,
            }),
        )
        .with_restaurant(restaurant.id.clone()),
    );
}
