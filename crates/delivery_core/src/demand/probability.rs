//! Per-user, per-tick ordering probability.

use chrono::Weekday;

use crate::calendar::Season;
use crate::clock::ONE_HOUR_MS;
use crate::demand::DemandContext;
use crate::ecs::User;

/// Relative ordering intensity by hour of day; averages 1.0 over the day.
pub const HOURLY_DEMAND: [f64; 24] = [
    0.3, 0.2, 0.15, 0.1, 0.1, 0.15, // 00-05
    0.4, 0.7, 0.8, 0.6, 0.7, 1.6, // 06-11
    2.4, 2.0, 1.0, 0.7, 0.8, 1.4, // 12-17
    2.6, 2.8, 2.0, 1.2, 0.8, 0.5, // 18-23
];

/// Pattern orders needed before the personal histogram is trusted at all.
const MIN_PATTERN_ORDERS: u32 = 5;
/// Orders at which the personal histogram reaches its maximum blend weight.
const PATTERN_SATURATION: f64 = 20.0;
const MAX_PATTERN_WEIGHT: f64 = 0.5;
/// Bounds on how far a user's adaptive frequency scales the segment rate.
const FREQUENCY_SCALE_MIN: f64 = 0.25;
const FREQUENCY_SCALE_MAX: f64 = 4.0;

pub fn day_of_week_multiplier(weekday: Weekday) -> f64 {
    match weekday {
        Weekday::Mon | Weekday::Tue => 0.85,
        Weekday::Wed => 0.9,
        Weekday::Thu => 0.95,
        Weekday::Fri => 1.2,
        Weekday::Sat => 1.25,
        Weekday::Sun => 1.0,
    }
}

pub fn season_multiplier(season: Season) -> f64 {
    match season {
        Season::Winter => 1.1,
        Season::Spring => 1.0,
        Season::Summer => 0.9,
        Season::Autumn => 1.05,
    }
}

/// Dampens re-ordering within `window_hours` of the previous order:
/// `0.1 + 0.9·(h/window)`.
pub fn cool_down_multiplier(hours_since_last: Option<f64>, window_hours: f64) -> f64 {
    match hours_since_last {
        Some(h) if window_hours > 0.0 && h < window_hours => 0.1 + 0.9 * (h.max(0.0) / window_hours),
        _ => 1.0,
    }
}

/// Hour-of-day multiplier: the global meal curve, blended with the user's own
/// weekday × hour histogram once it holds enough orders.
pub fn time_of_day_multiplier(user: &User, hour: u32, weekday: Weekday) -> f64 {
    let curve = HOURLY_DEMAND[(hour as usize) % 24];
    let total = user.pattern_total();
    if total < MIN_PATTERN_ORDERS {
        return curve;
    }
    let day = weekday.num_days_from_monday() as usize;
    let count = user.purchase_patterns[day][(hour as usize) % 24] as f64;
    // Smoothed share of this slot relative to a uniform week (168 slots).
    let personal = (count + 0.5) * 168.0 / (total as f64 + 84.0);
    let weight = (total as f64 / PATTERN_SATURATION).min(1.0) * MAX_PATTERN_WEIGHT;
    (1.0 - weight) * curve + weight * personal
}

/// Probability that `user` places an order during the current tick.
///
/// `orders_per_month` is the segment base rate; the user's adaptive
/// frequency scales it relative to the segment default.
pub fn order_probability(
    user: &User,
    orders_per_month: f64,
    ctx: &DemandContext,
    now: u64,
    tick_ms: u64,
    cool_down_hours: f64,
) -> f64 {
    if orders_per_month <= 0.0 || tick_ms == 0 {
        return 0.0;
    }
    let default_daily = orders_per_month / 30.0;
    let scale = (user.order_frequency / default_daily).clamp(FREQUENCY_SCALE_MIN, FREQUENCY_SCALE_MAX);
    let per_hour = default_daily / 24.0 * scale;
    let per_tick = per_hour * tick_ms as f64 / ONE_HOUR_MS as f64;

    let hours_since = user
        .last_order_time
        .map(|t| now.saturating_sub(t) as f64 / ONE_HOUR_MS as f64);

    let p = per_tick
        * time_of_day_multiplier(user, ctx.hour, ctx.weekday)
        * day_of_week_multiplier(ctx.weekday)
        * ctx.weather_multiplier
        * season_multiplier(ctx.season)
        * ctx.special_day_multiplier
        * cool_down_multiplier(hours_since, cool_down_hours);
    if p.is_finite() {
        p.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
