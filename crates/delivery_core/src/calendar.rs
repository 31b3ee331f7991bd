//! Calendar helpers: seasons, meal periods, rush hours and special days.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    /// Meteorological season for a month (1-12). Southern latitudes are shifted
    /// by half a year.
    pub fn for_month(month: u32, latitude: f64) -> Self {
        let northern = match month {
            12 | 1 | 2 => Season::Winter,
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            _ => Season::Autumn,
        };
        if latitude >= 0.0 {
            northern
        } else {
            match northern {
                Season::Winter => Season::Summer,
                Season::Spring => Season::Autumn,
                Season::Summer => Season::Winter,
                Season::Autumn => Season::Spring,
            }
        }
    }

    pub fn at(datetime: &DateTime<Utc>, latitude: f64) -> Self {
        Self::for_month(datetime.month(), latitude)
    }
}

/// Meal period driving menu preferences and demand curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealPeriod {
    Breakfast,
    Lunch,
    Dinner,
    LateNight,
}

impl MealPeriod {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=10 => MealPeriod::Breakfast,
            11..=15 => MealPeriod::Lunch,
            16..=21 => MealPeriod::Dinner,
            _ => MealPeriod::LateNight,
        }
    }
}

/// Lunch and dinner rush.
pub fn is_peak_hour(hour: u32) -> bool {
    matches!(hour, 11..=13 | 18..=20)
}

/// Overnight hours where kitchens and roads are quiet.
pub fn is_overnight(hour: u32) -> bool {
    hour < 6
}

pub fn is_weekend(weekday: Weekday) -> bool {
    matches!(weekday, Weekday::Sat | Weekday::Sun)
}

/// Fractional hour of day (e.g. 17.5 for 17:30).
pub fn fractional_hour(datetime: &DateTime<Utc>) -> f64 {
    datetime.hour() as f64 + datetime.minute() as f64 / 60.0
}

/// A calendar day with elevated (or depressed) ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialDay {
    pub name: String,
    pub month: u32,
    pub day: u32,
    pub multiplier: f64,
}

impl SpecialDay {
    pub fn new(name: &str, month: u32, day: u32, multiplier: f64) -> Self {
        Self {
            name: name.to_string(),
            month,
            day,
            multiplier,
        }
    }
}

pub fn default_special_days() -> Vec<SpecialDay> {
    vec![
        SpecialDay::new("new_years_day", 1, 1, 1.5),
        SpecialDay::new("valentines_day", 2, 14, 1.3),
        SpecialDay::new("halloween", 10, 31, 1.2),
        SpecialDay::new("christmas_eve", 12, 24, 0.8),
        SpecialDay::new("christmas_day", 12, 25, 0.7),
        SpecialDay::new("new_years_eve", 12, 31, 1.6),
    ]
}

/// Product of all special-day multipliers that match the date (1.0 if none).
pub fn special_day_multiplier(datetime: &DateTime<Utc>, days: &[SpecialDay]) -> f64 {
    days.iter()
        .filter(|d| d.month == datetime.month() && d.day == datetime.day())
        .map(|d| d.multiplier.max(0.0))
        .product()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn seasons_flip_in_southern_hemisphere() {
        assert_eq!(Season::for_month(1, 52.5), Season::Winter);
        assert_eq!(Season::for_month(1, -33.9), Season::Summer);
        assert_eq!(Season::for_month(7, 52.5), Season::Summer);
        assert_eq!(Season::for_month(10, 52.5), Season::Autumn);
    }

    #[test]
    fn meal_periods_cover_the_day() {
        assert_eq!(MealPeriod::from_hour(7), MealPeriod::Breakfast);
        assert_eq!(MealPeriod::from_hour(12), MealPeriod::Lunch);
        assert_eq!(MealPeriod::from_hour(19), MealPeriod::Dinner);
        assert_eq!(MealPeriod::from_hour(23), MealPeriod::LateNight);
        assert_eq!(MealPeriod::from_hour(2), MealPeriod::LateNight);
    }

    #[test]
    fn special_days_multiply() {
        let nye = Utc.with_ymd_and_hms(2024, 12, 31, 20, 0, 0).unwrap();
        let plain = Utc.with_ymd_and_hms(2024, 3, 5, 20, 0, 0).unwrap();
        let days = default_special_days();
        assert_eq!(special_day_multiplier(&nye, &days), 1.6);
        assert_eq!(special_day_multiplier(&plain, &days), 1.0);
    }

    #[test]
    fn fractional_hour_includes_minutes() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 5, 17, 30, 0).unwrap();
        assert_eq!(fractional_hour(&dt), 17.5);
    }
}
