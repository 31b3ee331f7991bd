use bevy_ecs::prelude::{Res, ResMut};
use tracing::debug;

use crate::clock::SimulationClock;
use crate::traffic::TrafficConditions;
use crate::weather::WeatherState;

/// Advance weather and recompute traffic for the current tick.
pub fn environment_system(
    clock: Res<SimulationClock>,
    mut weather: ResMut<WeatherState>,
    mut traffic: ResMut<TrafficConditions>,
) {
    let now = clock.now();
    let datetime = clock.datetime();
    let before = weather.condition;
    weather.refresh(now, &datetime);
    if weather.condition != before {
        debug!(
            from = before.as_str(),
            to = weather.condition.as_str(),
            temperature_c = weather.temperature_c,
            "weather changed"
        );
    }
    traffic.refresh(now, &datetime);
}
