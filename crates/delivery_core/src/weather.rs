//! Weather state machine and temperature model.
//!
//! Weather evolves as a semi-Markov chain: each condition lasts for a sampled
//! duration, after which a successor is drawn from per-condition base
//! probabilities reweighted by season, hour, latitude band and temperature.
//! Temperature itself is a deterministic function of the calendar, the
//! latitude, the scenario seed and the current condition.

use std::f64::consts::PI;

use bevy_ecs::prelude::Resource;
use chrono::{DateTime, Datelike, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::calendar::{fractional_hour, Season};
use crate::clock::{ONE_HOUR_MS, ONE_MIN_MS};
use crate::rng::{stream, TEMPERATURE_STREAM, WEATHER_STREAM};
use crate::selection::weighted_index;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    #[default]
    Clear,
    Cloudy,
    Overcast,
    Rain,
    Snow,
    Storm,
    Fog,
}

impl WeatherCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherCondition::Clear => "clear",
            WeatherCondition::Cloudy => "cloudy",
            WeatherCondition::Overcast => "overcast",
            WeatherCondition::Rain => "rain",
            WeatherCondition::Snow => "snow",
            WeatherCondition::Storm => "storm",
            WeatherCondition::Fog => "fog",
        }
    }

    /// Conditions that slow couriers and make people stay in.
    pub fn is_adverse(&self) -> bool {
        matches!(
            self,
            WeatherCondition::Rain
                | WeatherCondition::Snow
                | WeatherCondition::Storm
                | WeatherCondition::Fog
        )
    }

    pub fn is_wet(&self) -> bool {
        matches!(
            self,
            WeatherCondition::Rain | WeatherCondition::Snow | WeatherCondition::Storm
        )
    }

    fn temperature_offset(&self) -> f64 {
        match self {
            WeatherCondition::Clear => 1.0,
            WeatherCondition::Cloudy => 0.0,
            WeatherCondition::Overcast => -1.0,
            WeatherCondition::Rain => -2.0,
            WeatherCondition::Snow => -3.0,
            WeatherCondition::Storm => -3.0,
            WeatherCondition::Fog => -1.5,
        }
    }
}

/// A candidate successor with its base probability and duration range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub to: WeatherCondition,
    pub probability: f64,
    pub min_minutes: u64,
    pub max_minutes: u64,
}

const fn t(to: WeatherCondition, probability: f64, min_minutes: u64, max_minutes: u64) -> Transition {
    Transition {
        to,
        probability,
        min_minutes,
        max_minutes,
    }
}

use WeatherCondition::{Clear, Cloudy, Fog, Overcast, Rain, Snow, Storm};

const FROM_CLEAR: [Transition; 4] = [
    t(Clear, 0.60, 120, 480),
    t(Cloudy, 0.30, 60, 240),
    t(Fog, 0.05, 30, 180),
    t(Overcast, 0.05, 60, 240),
];
const FROM_CLOUDY: [Transition; 5] = [
    t(Clear, 0.30, 120, 360),
    t(Cloudy, 0.30, 60, 240),
    t(Overcast, 0.25, 60, 300),
    t(Rain, 0.10, 30, 180),
    t(Fog, 0.05, 30, 120),
];
const FROM_OVERCAST: [Transition; 5] = [
    t(Cloudy, 0.30, 60, 240),
    t(Overcast, 0.25, 60, 300),
    t(Rain, 0.30, 30, 240),
    t(Snow, 0.10, 60, 300),
    t(Storm, 0.05, 30, 120),
];
const FROM_RAIN: [Transition; 5] = [
    t(Rain, 0.35, 30, 180),
    t(Overcast, 0.30, 60, 240),
    t(Cloudy, 0.20, 60, 240),
    t(Storm, 0.10, 30, 120),
    t(Fog, 0.05, 30, 120),
];
const FROM_SNOW: [Transition; 4] = [
    t(Snow, 0.45, 60, 360),
    t(Overcast, 0.35, 60, 240),
    t(Cloudy, 0.15, 60, 240),
    t(Clear, 0.05, 120, 360),
];
const FROM_STORM: [Transition; 3] = [
    t(Rain, 0.55, 30, 180),
    t(Overcast, 0.30, 60, 180),
    t(Storm, 0.15, 15, 60),
];
const FROM_FOG: [Transition; 4] = [
    t(Clear, 0.35, 120, 360),
    t(Cloudy, 0.35, 60, 240),
    t(Fog, 0.20, 30, 120),
    t(Overcast, 0.10, 60, 240),
];

/// Base successor table for a condition.
pub fn base_transitions(from: WeatherCondition) -> &'static [Transition] {
    match from {
        Clear => &FROM_CLEAR,
        Cloudy => &FROM_CLOUDY,
        Overcast => &FROM_OVERCAST,
        Rain => &FROM_RAIN,
        Snow => &FROM_SNOW,
        Storm => &FROM_STORM,
        Fog => &FROM_FOG,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatitudeBand {
    Tropical,
    Temperate,
    Polar,
}

impl LatitudeBand {
    pub fn for_latitude(latitude: f64) -> Self {
        let abs = latitude.abs();
        if abs < 23.5 {
            LatitudeBand::Tropical
        } else if abs > 66.5 {
            LatitudeBand::Polar
        } else {
            LatitudeBand::Temperate
        }
    }
}

/// Snow is impossible above this temperature.
pub const SNOW_MAX_TEMP_C: f64 = 2.0;
/// Thunderstorms are impossible below this temperature.
pub const STORM_MIN_TEMP_C: f64 = -5.0;

fn season_weight(to: WeatherCondition, season: Season) -> f64 {
    match (season, to) {
        (Season::Winter, Snow) => 2.5,
        (Season::Winter, Storm) => 0.4,
        (Season::Winter, Fog) => 1.3,
        (Season::Winter, Clear) => 0.8,
        (Season::Summer, Snow) => 0.0,
        (Season::Summer, Storm) => 1.8,
        (Season::Summer, Clear) => 1.3,
        (Season::Summer, Fog) => 0.6,
        (Season::Spring, Rain) => 1.3,
        (Season::Autumn, Fog) => 1.5,
        (Season::Autumn, Rain) => 1.2,
        _ => 1.0,
    }
}

fn hour_weight(to: WeatherCondition, hour: f64) -> f64 {
    match to {
        Fog if (5.0..10.0).contains(&hour) => 1.8,
        Fog if (12.0..18.0).contains(&hour) => 0.5,
        Storm if (13.0..19.0).contains(&hour) => 1.4,
        Clear if hour < 5.0 => 1.1,
        _ => 1.0,
    }
}

fn band_weight(to: WeatherCondition, band: LatitudeBand) -> f64 {
    match (band, to) {
        (LatitudeBand::Tropical, Snow) => 0.0,
        (LatitudeBand::Tropical, Storm) => 1.5,
        (LatitudeBand::Tropical, Rain) => 1.3,
        (LatitudeBand::Polar, Snow) => 2.0,
        (LatitudeBand::Polar, Storm) => 0.5,
        _ => 1.0,
    }
}

fn allowed_at(to: WeatherCondition, temperature_c: f64) -> bool {
    match to {
        Snow => temperature_c <= SNOW_MAX_TEMP_C,
        Storm => temperature_c >= STORM_MIN_TEMP_C,
        _ => true,
    }
}

/// Successor weights after seasonal, diurnal, latitude and temperature
/// adjustment, aligned with [base_transitions].
pub fn adjusted_weights(
    from: WeatherCondition,
    season: Season,
    hour: f64,
    latitude: f64,
    temperature_c: f64,
) -> Vec<f64> {
    let band = LatitudeBand::for_latitude(latitude);
    base_transitions(from)
        .iter()
        .map(|tr| {
            if !allowed_at(tr.to, temperature_c) {
                return 0.0;
            }
            tr.probability
                * season_weight(tr.to, season)
                * hour_weight(tr.to, hour)
                * band_weight(tr.to, band)
        })
        .collect()
}

fn annual_mean_c(latitude: f64) -> f64 {
    28.0 - 0.35 * latitude.abs()
}

fn annual_amplitude_c(latitude: f64) -> f64 {
    (2.0 + 0.2 * latitude.abs()).min(18.0)
}

fn diurnal_amplitude_c(latitude: f64, season: Season) -> f64 {
    let base = 3.0 + 0.03 * latitude.abs();
    match season {
        Season::Summer => base * 1.3,
        Season::Winter => base * 0.7,
        Season::Spring | Season::Autumn => base,
    }
}

fn hourly_jitter(seed: u64, datetime: &DateTime<Utc>) -> f64 {
    let absolute_hour = datetime.timestamp().div_euclid(3600) as u64;
    let mut rng = StdRng::seed_from_u64(seed ^ absolute_hour.wrapping_mul(TEMPERATURE_STREAM));
    rng.gen_range(-1.5..=1.5)
}

/// Temperature before the condition offset. Used for the hard transition
/// constraints so that the constraint does not depend on the outcome.
pub fn base_temperature_c(seed: u64, latitude: f64, datetime: &DateTime<Utc>) -> f64 {
    let peak_day = if latitude >= 0.0 { 200.0 } else { 15.0 };
    let day = datetime.ordinal() as f64;
    let annual = annual_amplitude_c(latitude) * (2.0 * PI * (day - peak_day) / 365.25).cos();
    let season = Season::at(datetime, latitude);
    let hour = fractional_hour(datetime);
    let diurnal = diurnal_amplitude_c(latitude, season) * (2.0 * PI * (hour - 15.0) / 24.0).cos();
    annual_mean_c(latitude) + annual + diurnal + hourly_jitter(seed, datetime)
}

/// Air temperature in °C, clamped to [-40, 50].
pub fn temperature_c(
    seed: u64,
    latitude: f64,
    datetime: &DateTime<Utc>,
    condition: WeatherCondition,
) -> f64 {
    (base_temperature_c(seed, latitude, datetime) + condition.temperature_offset()).clamp(-40.0, 50.0)
}

/// Current weather. Simulation-scoped; owns its random stream so a fixed seed
/// reproduces the same sequence of conditions.
#[derive(Debug, Resource)]
pub struct WeatherState {
    pub condition: WeatherCondition,
    pub start_time: u64,
    pub duration_ms: u64,
    pub intensity: f64,
    pub wind_speed_kmh: f64,
    pub humidity: f64,
    pub precipitation_mm: f64,
    pub temperature_c: f64,
    latitude: f64,
    temperature_seed: u64,
    rng: StdRng,
}

impl WeatherState {
    pub fn new(
        condition: WeatherCondition,
        initial_duration_ms: u64,
        latitude: f64,
        seed: Option<u64>,
    ) -> Self {
        let mut rng = stream(seed, WEATHER_STREAM);
        let temperature_seed = seed.unwrap_or_else(|| rng.gen());
        let mut state = Self {
            condition,
            start_time: 0,
            duration_ms: initial_duration_ms.max(ONE_MIN_MS),
            intensity: 0.0,
            wind_speed_kmh: 0.0,
            humidity: 0.0,
            precipitation_mm: 0.0,
            temperature_c: 0.0,
            latitude,
            temperature_seed,
            rng,
        };
        state.sample_attributes();
        state
    }

    pub fn ends_at(&self) -> u64 {
        self.start_time.saturating_add(self.duration_ms)
    }

    /// Advance the state machine to `now`, transitioning as many times as
    /// elapsed durations require, then refresh the temperature.
    pub fn refresh(&mut self, now: u64, datetime: &DateTime<Utc>) {
        while now >= self.ends_at() {
            let started = self.ends_at();
            self.transition(datetime);
            self.start_time = started;
        }
        self.temperature_c = temperature_c(self.temperature_seed, self.latitude, datetime, self.condition);
    }

    fn transition(&mut self, datetime: &DateTime<Utc>) {
        let season = Season::at(datetime, self.latitude);
        let hour = fractional_hour(datetime);
        let base_temp = base_temperature_c(self.temperature_seed, self.latitude, datetime);
        let table = base_transitions(self.condition);
        let weights = adjusted_weights(self.condition, season, hour, self.latitude, base_temp);
        let r: f64 = self.rng.gen();
        let next = weighted_index(&weights, r).map(|i| table[i]).unwrap_or(t(Cloudy, 1.0, 60, 240));
        let minutes = self.rng.gen_range(next.min_minutes..=next.max_minutes);
        self.condition = next.to;
        self.duration_ms = minutes * ONE_MIN_MS;
        self.sample_attributes();
    }

    fn sample_attributes(&mut self) {
        let rng = &mut self.rng;
        let (intensity, wind, humidity, precipitation) = match self.condition {
            Clear => (0.0, rng.gen_range(0.0..15.0), rng.gen_range(30.0..60.0), 0.0),
            Cloudy => (
                rng.gen_range(0.1..0.3),
                rng.gen_range(5.0..20.0),
                rng.gen_range(40.0..70.0),
                0.0,
            ),
            Overcast => (
                rng.gen_range(0.2..0.4),
                rng.gen_range(5.0..25.0),
                rng.gen_range(60.0..85.0),
                0.0,
            ),
            Rain => {
                let i = rng.gen_range(0.3..1.0);
                (i, rng.gen_range(10.0..35.0), rng.gen_range(75.0..100.0), i * rng.gen_range(0.5..10.0))
            }
            Snow => {
                let i = rng.gen_range(0.3..1.0);
                (i, rng.gen_range(5.0..30.0), rng.gen_range(70.0..95.0), i * rng.gen_range(0.2..5.0))
            }
            Storm => {
                let i = rng.gen_range(0.6..1.0);
                (i, rng.gen_range(40.0..90.0), rng.gen_range(80.0..100.0), i * rng.gen_range(5.0..30.0))
            }
            Fog => (
                rng.gen_range(0.2..0.8),
                rng.gen_range(0.0..8.0),
                rng.gen_range(90.0..100.0),
                0.0,
            ),
        };
        self.intensity = intensity;
        self.wind_speed_kmh = wind;
        self.humidity = humidity;
        self.precipitation_mm = precipitation;
    }

    /// Demand multiplier: bad weather and temperature extremes keep people
    /// home and ordering.
    pub fn order_multiplier(&self) -> f64 {
        let condition = match self.condition {
            Clear => 1.0,
            Cloudy => 1.02,
            Overcast => 1.05,
            Rain => 1.0 + 0.3 * self.intensity,
            Snow => 1.0 + 0.4 * self.intensity,
            Storm => 1.0 + 0.2 * self.intensity,
            Fog => 1.03,
        };
        let temperature = if self.temperature_c < 0.0 {
            1.1
        } else if self.temperature_c > 30.0 {
            1.05
        } else {
            1.0
        };
        condition * temperature
    }

    /// Courier speed multiplier in [0.4, 1.0].
    pub fn speed_factor(&self) -> f64 {
        let factor = match self.condition {
            Clear | Cloudy => 1.0,
            Overcast => 0.98,
            Rain => 1.0 - 0.25 * self.intensity,
            Snow => 1.0 - 0.4 * self.intensity,
            Storm => 1.0 - 0.5 * self.intensity,
            Fog => 1.0 - 0.3 * self.intensity,
        };
        factor.clamp(0.4, 1.0)
    }

    pub fn is_cold(&self) -> bool {
        self.temperature_c < 10.0
    }

    pub fn is_hot(&self) -> bool {
        self.temperature_c > 25.0
    }
}

impl Default for WeatherState {
    fn default() -> Self {
        Self::new(Clear, 2 * ONE_HOUR_MS, 52.52, Some(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const BERLIN_LAT: f64 = 52.52;

    fn run(seed: u64, hours: u64) -> Vec<(WeatherCondition, u64)> {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let mut weather = WeatherState::new(Clear, ONE_HOUR_MS, BERLIN_LAT, Some(seed));
        let mut seen = Vec::new();
        for step in 0..(hours * 4) {
            let now = step * 15 * ONE_MIN_MS;
            let dt = start + chrono::Duration::milliseconds(now as i64);
            weather.refresh(now, &dt);
            seen.push((weather.condition, weather.duration_ms));
        }
        seen
    }

    #[test]
    fn same_seed_reproduces_weather_sequence() {
        assert_eq!(run(42, 24 * 7), run(42, 24 * 7));
    }

    #[test]
    fn different_seeds_diverge() {
        assert_ne!(run(1, 24 * 7), run(2, 24 * 7));
    }

    #[test]
    fn temperature_is_deterministic_and_clamped() {
        let dt = Utc.with_ymd_and_hms(2024, 7, 20, 15, 0, 0).unwrap();
        let a = temperature_c(9, BERLIN_LAT, &dt, Clear);
        let b = temperature_c(9, BERLIN_LAT, &dt, Clear);
        assert_eq!(a, b);
        for lat in [-89.0, -40.0, 0.0, 52.5, 89.0] {
            for day in 1..=12 {
                let dt = Utc.with_ymd_and_hms(2024, day, 10, 4, 0, 0).unwrap();
                let temp = temperature_c(3, lat, &dt, Snow);
                assert!((-40.0..=50.0).contains(&temp), "lat={lat} temp={temp}");
            }
        }
    }

    #[test]
    fn summer_afternoon_is_warmer_than_winter_night() {
        let summer = Utc.with_ymd_and_hms(2024, 7, 20, 15, 0, 0).unwrap();
        let winter = Utc.with_ymd_and_hms(2024, 1, 20, 3, 0, 0).unwrap();
        assert!(
            temperature_c(1, BERLIN_LAT, &summer, Clear) > temperature_c(1, BERLIN_LAT, &winter, Clear) + 10.0
        );
        // Southern hemisphere peaks in January.
        let jan = Utc.with_ymd_and_hms(2024, 1, 20, 15, 0, 0).unwrap();
        let jul = Utc.with_ymd_and_hms(2024, 7, 20, 15, 0, 0).unwrap();
        assert!(temperature_c(1, -34.0, &jan, Clear) > temperature_c(1, -34.0, &jul, Clear));
    }

    #[test]
    fn hard_constraints_zero_out_snow_and_storm() {
        let warm = adjusted_weights(Overcast, Season::Winter, 12.0, BERLIN_LAT, 5.0);
        let frozen = adjusted_weights(Overcast, Season::Winter, 12.0, BERLIN_LAT, -10.0);
        for (i, tr) in base_transitions(Overcast).iter().enumerate() {
            if tr.to == Snow {
                assert_eq!(warm[i], 0.0);
                assert!(frozen[i] > 0.0);
            }
            if tr.to == Storm {
                assert!(warm[i] > 0.0);
                assert_eq!(frozen[i], 0.0);
            }
        }
    }

    #[test]
    fn tropics_never_snow() {
        let weights = adjusted_weights(Overcast, Season::Winter, 3.0, 1.3, -1.0);
        for (i, tr) in base_transitions(Overcast).iter().enumerate() {
            if tr.to == Snow {
                assert_eq!(weights[i], 0.0);
            }
        }
    }

    #[test]
    fn transitions_respect_duration_ranges() {
        let start = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        let mut weather = WeatherState::new(Cloudy, ONE_MIN_MS, BERLIN_LAT, Some(5));
        weather.refresh(ONE_MIN_MS, &start);
        assert!(weather.duration_ms >= 15 * ONE_MIN_MS);
        assert!(weather.duration_ms <= 480 * ONE_MIN_MS);
        assert_eq!(weather.start_time, ONE_MIN_MS);
    }

    #[test]
    fn bad_weather_slows_couriers_and_raises_demand() {
        let mut weather = WeatherState::default();
        weather.condition = Storm;
        weather.intensity = 1.0;
        weather.temperature_c = 15.0;
        assert_eq!(weather.speed_factor(), 0.5);
        assert!(weather.order_multiplier() > 1.0);
        weather.condition = Clear;
        assert_eq!(weather.speed_factor(), 1.0);
        assert_eq!(weather.order_multiplier(), 1.0);
    }
}
