//! Customer reviews: whether one is written and what it says.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::clock::ONE_MIN_MS;
use crate::segment::CustomerSegment;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Weight of a new rating in the exponential moving average.
    pub smoothing_alpha: f64,
    /// Review probability of a neutral order before adjustments.
    pub base_probability: f64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            smoothing_alpha: 0.1,
            base_probability: 0.3,
        }
    }
}

/// Everything the review model looks at for one delivered order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewInputs {
    pub order_total: f64,
    /// Actual minus estimated delivery time (negative = early).
    pub lateness_ms: i64,
    pub customer_frequency: f64,
    pub segment: CustomerSegment,
    pub restaurant_rating: f64,
    pub item_count: usize,
    pub avg_complexity: f64,
    pub adverse_weather: bool,
    pub weather_intensity: f64,
}

impl ReviewInputs {
    pub fn lateness_mins(&self) -> f64 {
        self.lateness_ms as f64 / ONE_MIN_MS as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub food_rating: f64,
    pub delivery_rating: f64,
    pub overall_rating: f64,
}

/// Orders at least this late count as late for reviews and user behaviour.
pub const LATE_THRESHOLD_MINS: f64 = 15.0;

pub fn review_probability(config: &ReviewConfig, inputs: &ReviewInputs) -> f64 {
    let value = 1.0 + 0.3 * (inputs.order_total.max(0.0) / 50.0).min(1.0);
    let lateness = inputs.lateness_mins();
    // Very late and noticeably early orders both get talked about.
    let punctuality = if lateness >= LATE_THRESHOLD_MINS {
        1.5
    } else if lateness <= -5.0 {
        1.1
    } else {
        1.0
    };
    let frequency = 1.0 + 0.2 * inputs.customer_frequency.clamp(0.0, 2.0);
    let p = config.base_probability
        * value
        * punctuality
        * frequency
        * inputs.segment.profile().review_propensity;
    p.clamp(0.0, 1.0)
}

fn stars(value: f64) -> f64 {
    value.round().clamp(1.0, 5.0)
}

pub fn sample_review<R: Rng + ?Sized>(rng: &mut R, inputs: &ReviewInputs) -> Review {
    let profile = inputs.segment.profile();
    let bias = profile.rating_bias;

    let complexity_penalty = if inputs.item_count > 3 {
        0.15 * (inputs.avg_complexity - 1.5).max(0.0)
    } else {
        0.0
    };
    let food_mean = 0.6 * inputs.restaurant_rating.clamp(1.0, 5.0) + 0.4 * 4.2 + bias - complexity_penalty;
    let food_rating = stars(food_mean + rng.gen_range(-1.0..=1.0));

    let lateness = inputs.lateness_mins();
    let punctuality = if lateness > 0.0 {
        -(lateness / 10.0).min(3.0)
    } else if lateness <= -5.0 {
        0.2
    } else {
        0.0
    };
    let weather = if inputs.adverse_weather {
        -0.3 * inputs.weather_intensity.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let delivery_rating = stars(4.6 + punctuality + weather + bias + rng.gen_range(-0.75..=0.75));

    let w = profile.food_rating_weight;
    let overall = w * food_rating + (1.0 - w) * delivery_rating;
    Review {
        food_rating,
        delivery_rating,
        overall_rating: ((overall * 10.0).round() / 10.0).clamp(1.0, 5.0),
    }
}

/// Exponential moving average of a rating, clamped to [1, 5].
pub fn smooth_rating(old: f64, observed: f64, alpha: f64) -> f64 {
    let alpha = alpha.clamp(0.0, 1.0);
    (alpha * observed + (1.0 - alpha) * old).clamp(1.0, 5.0)
}
