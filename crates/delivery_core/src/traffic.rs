//! Traffic model: time-of-day road density and the courier speed factor it
//! implies.
//!
//! Density is a value in [0, 1] (0 = empty roads, 1 = gridlock). It is
//! recomputed every tick from the configured base curve plus a small random
//! perturbation, and feeds both courier movement and restaurant selection.

use bevy_ecs::prelude::Resource;
use chrono::{DateTime, Datelike, Timelike, Utc};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::calendar::{fractional_hour, is_weekend};
use crate::rng::{stream, TRAFFIC_STREAM};

/// Pre-defined base curves.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub enum TrafficProfileKind {
    /// Morning and evening rush with quieter weekends.
    #[default]
    Standard,
    /// Empty roads all day (speed factor 1.0 before perturbation).
    Flat,
    /// Custom per-hour densities (index 0 = midnight, index 23 = 11 PM).
    Custom([f64; 24]),
}

const BASELINE_DENSITY: f64 = 0.15;
const MORNING_PEAK_HOUR: f64 = 8.0;
const MORNING_PEAK_HEIGHT: f64 = 0.55;
const MORNING_PEAK_WIDTH: f64 = 1.0;
const EVENING_PEAK_HOUR: f64 = 17.5;
const EVENING_PEAK_HEIGHT: f64 = 0.6;
const EVENING_PEAK_WIDTH: f64 = 1.25;
const MIDDAY_HOUR: f64 = 13.0;
const MIDDAY_HEIGHT: f64 = 0.15;
const MIDDAY_WIDTH: f64 = 2.0;
/// Share of the rush peaks that survives on Saturdays and Sundays.
const WEEKEND_PEAK_SCALE: f64 = 0.45;

fn gaussian(x: f64, centre: f64, width: f64) -> f64 {
    let z = (x - centre) / width;
    (-0.5 * z * z).exp()
}

/// Base density for a fractional hour of day before any perturbation.
pub fn standard_density(hour: f64, weekend: bool) -> f64 {
    let peaks = MORNING_PEAK_HEIGHT * gaussian(hour, MORNING_PEAK_HOUR, MORNING_PEAK_WIDTH)
        + EVENING_PEAK_HEIGHT * gaussian(hour, EVENING_PEAK_HOUR, EVENING_PEAK_WIDTH);
    let peaks = if weekend { peaks * WEEKEND_PEAK_SCALE } else { peaks };
    let midday = MIDDAY_HEIGHT * gaussian(hour, MIDDAY_HOUR, MIDDAY_WIDTH);
    (BASELINE_DENSITY + peaks + midday).clamp(0.0, 1.0)
}

/// Courier speed multiplier for a density: 1.0 on empty roads, 0.5 in gridlock.
pub fn speed_factor_for_density(density: f64) -> f64 {
    1.0 - 0.5 * density.clamp(0.0, 1.0)
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrafficProfile {
    kind: TrafficProfileKind,
}

impl TrafficProfile {
    pub fn from_kind(kind: &TrafficProfileKind) -> Self {
        Self { kind: kind.clone() }
    }

    pub fn density_at(&self, datetime: &DateTime<Utc>) -> f64 {
        match &self.kind {
            TrafficProfileKind::Standard => {
                standard_density(fractional_hour(datetime), is_weekend(datetime.weekday()))
            }
            TrafficProfileKind::Flat => 0.0,
            TrafficProfileKind::Custom(hourly) => {
                hourly[datetime.hour() as usize % 24].clamp(0.0, 1.0)
            }
        }
    }
}

/// Current road conditions. Simulation-scoped; owns its random stream.
#[derive(Debug, Resource)]
pub struct TrafficConditions {
    pub density: f64,
    pub hour: u32,
    pub updated_at: Option<u64>,
    profile: TrafficProfile,
    variability: f64,
    rng: StdRng,
}

impl TrafficConditions {
    pub fn new(kind: &TrafficProfileKind, variability: f64, seed: Option<u64>) -> Self {
        Self {
            density: 0.0,
            hour: 0,
            updated_at: None,
            profile: TrafficProfile::from_kind(kind),
            variability: variability.max(0.0),
            rng: stream(seed, TRAFFIC_STREAM),
        }
    }

    /// Recompute density for the current tick. Idempotent for a given `now`.
    pub fn refresh(&mut self, now: u64, datetime: &DateTime<Utc>) {
        if self.updated_at == Some(now) {
            return;
        }
        let base = self.profile.density_at(datetime);
        let noise = if self.variability > 0.0 {
            self.rng.gen_range(-self.variability..=self.variability)
        } else {
            0.0
        };
        self.density = (base + noise).clamp(0.0, 1.0);
        self.hour = datetime.hour();
        self.updated_at = Some(now);
    }

    pub fn speed_factor(&self) -> f64 {
        speed_factor_for_density(self.density)
    }
}

impl Default for TrafficConditions {
    fn default() -> Self {
        Self::new(&TrafficProfileKind::Standard, 0.0, Some(0))
    }
}
