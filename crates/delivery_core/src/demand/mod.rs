//! Demand engine: when users order, where from, and what.

pub mod menu;
pub mod probability;
pub mod restaurant;

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::calendar::{special_day_multiplier, MealPeriod, Season, SpecialDay};
use crate::segment::CustomerSegment;
use crate::traffic::TrafficConditions;
use crate::weather::{WeatherCondition, WeatherState};

/// Orders per month for each segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentRates {
    pub frequent: f64,
    pub regular: f64,
    pub occasional: f64,
}

impl SegmentRates {
    pub fn for_segment(&self, segment: CustomerSegment) -> f64 {
        match segment {
            CustomerSegment::Frequent => self.frequent,
            CustomerSegment::Regular => self.regular,
            CustomerSegment::Occasional => self.occasional,
        }
    }
}

impl Default for SegmentRates {
    fn default() -> Self {
        Self {
            frequent: CustomerSegment::Frequent.profile().orders_per_month,
            regular: CustomerSegment::Regular.profile().orders_per_month,
            occasional: CustomerSegment::Occasional.profile().orders_per_month,
        }
    }
}

/// Snapshot of the environment as the demand engine sees it for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct DemandContext {
    pub hour: u32,
    pub weekday: Weekday,
    pub season: Season,
    pub meal_period: MealPeriod,
    pub weather: WeatherCondition,
    pub weather_intensity: f64,
    pub weather_multiplier: f64,
    pub temperature_c: f64,
    pub traffic_density: f64,
    pub special_day_multiplier: f64,
}

impl DemandContext {
    pub fn new(
        datetime: &DateTime<Utc>,
        latitude: f64,
        weather: &WeatherState,
        traffic: &TrafficConditions,
        special_days: &[SpecialDay],
    ) -> Self {
        let hour = datetime.hour();
        Self {
            hour,
            weekday: datetime.weekday(),
            season: Season::at(datetime, latitude),
            meal_period: MealPeriod::from_hour(hour),
            weather: weather.condition,
            weather_intensity: weather.intensity,
            weather_multiplier: weather.order_multiplier(),
            temperature_c: weather.temperature_c,
            traffic_density: traffic.density,
            special_day_multiplier: special_day_multiplier(datetime, special_days),
        }
    }

    /// Neutral context at a given hour and weekday: clear weather, empty roads.
    pub fn neutral(hour: u32, weekday: Weekday) -> Self {
        Self {
            hour,
            weekday,
            season: Season::Spring,
            meal_period: MealPeriod::from_hour(hour),
            weather: WeatherCondition::Clear,
            weather_intensity: 0.0,
            weather_multiplier: 1.0,
            temperature_c: 18.0,
            traffic_density: 0.0,
            special_day_multiplier: 1.0,
        }
    }

    pub fn is_cold(&self) -> bool {
        self.temperature_c < 10.0
    }

    pub fn is_hot(&self) -> bool {
        self.temperature_c > 25.0
    }
}
