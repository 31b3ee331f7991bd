//! Restaurant scoring and selection for a placing user.

use bevy_ecs::prelude::Entity;
use rand::Rng;

use crate::calendar::{MealPeriod, Season};
use crate::demand::DemandContext;
use crate::ecs::{Restaurant, RestaurantCluster, User};
use crate::selection::choose_weighted_or_first;

/// A restaurant within reach of the user, with its distance.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub entity: Entity,
    pub restaurant: &'a Restaurant,
    pub distance_km: f64,
}

fn cuisine_matches(restaurant: &Restaurant, keywords: &[&str]) -> bool {
    restaurant.cuisines.iter().any(|c| {
        let c = c.to_ascii_lowercase();
        keywords.iter().any(|k| c.contains(k))
    })
}

/// Rating and general popularity.
pub fn popularity_factor(restaurant: &Restaurant) -> f64 {
    (restaurant.rating.clamp(1.0, 5.0) / 5.0) * (0.5 + restaurant.popularity.clamp(0.0, 1.0))
}

/// Strongest user preference among the restaurant's cuisines (1.0 if none).
pub fn cuisine_affinity(restaurant: &Restaurant, user: &User) -> f64 {
    restaurant
        .cuisines
        .iter()
        .filter_map(|c| user.cuisine_affinity(c))
        .fold(None, |best: Option<f64>, w| Some(best.map_or(w, |b| b.max(w))))
        .unwrap_or(1.0)
        .max(0.0)
}

/// Price-sensitive users shy away from expensive tiers.
pub fn price_affinity(restaurant: &Restaurant, price_sensitivity: f64) -> f64 {
    let tier = restaurant.price_tier.clamp(1, 4) as f64;
    (-price_sensitivity * (tier - 1.0) / 1.5).exp()
}

/// What people want to eat at this time of day.
pub fn time_of_day_factor(restaurant: &Restaurant, meal: MealPeriod) -> f64 {
    let cuisine = match meal {
        MealPeriod::Breakfast if cuisine_matches(restaurant, &["breakfast", "cafe", "bakery"]) => 1.5,
        MealPeriod::Lunch if cuisine_matches(restaurant, &["sandwich", "salad", "asian", "bowl"]) => 1.2,
        MealPeriod::Dinner if cuisine_matches(restaurant, &["italian", "indian", "sushi", "thai"]) => 1.2,
        MealPeriod::LateNight if cuisine_matches(restaurant, &["pizza", "burger", "kebab", "fast"]) => 1.4,
        _ => 1.0,
    };
    let cluster = match (meal, restaurant.cluster) {
        (MealPeriod::Breakfast, RestaurantCluster::FineDining) => 0.3,
        (MealPeriod::Lunch, RestaurantCluster::FineDining) => 0.7,
        (MealPeriod::Dinner, RestaurantCluster::FineDining) => 1.3,
        (MealPeriod::LateNight, RestaurantCluster::QuickService) => 1.3,
        (MealPeriod::LateNight, RestaurantCluster::FineDining) => 0.5,
        _ => 1.0,
    };
    cuisine * cluster
}

fn seasonal_factor(restaurant: &Restaurant, season: Season) -> f64 {
    match season {
        Season::Summer if cuisine_matches(restaurant, &["ice", "salad", "poke", "sushi"]) => 1.2,
        Season::Winter if cuisine_matches(restaurant, &["soup", "ramen", "indian", "curry"]) => 1.2,
        _ => 1.0,
    }
}

/// Distance decay, steeper in heavy traffic and bad weather, times the
/// seasonal cuisine factor.
pub fn live_demand_factor(
    restaurant: &Restaurant,
    distance_km: f64,
    reach_km: f64,
    ctx: &DemandContext,
) -> f64 {
    let weather_penalty = if ctx.weather.is_adverse() {
        0.5 * (1.0 + ctx.weather_intensity)
    } else {
        0.0
    };
    let steepness = 1.0 + ctx.traffic_density + weather_penalty;
    let reach = reach_km.max(0.1);
    (-steepness * distance_km.max(0.0) / reach).exp() * seasonal_factor(restaurant, ctx.season)
}

/// Combined attractiveness of `restaurant` for `user`.
pub fn score_restaurant(
    restaurant: &Restaurant,
    user: &User,
    distance_km: f64,
    reach_km: f64,
    ctx: &DemandContext,
) -> f64 {
    let sensitivity = user.segment.profile().price_sensitivity;
    popularity_factor(restaurant)
        * cuisine_affinity(restaurant, user)
        * price_affinity(restaurant, sensitivity)
        * time_of_day_factor(restaurant, ctx.meal_period)
        * restaurant.trend.clamp(0.5, 1.5)
        * live_demand_factor(restaurant, distance_km, reach_km, ctx)
}

/// Pick a restaurant proportionally to score. Falls back to the first candidate
/// when every score is degenerate; `None` only when there are no candidates.
pub fn select_restaurant<R: Rng + ?Sized>(
    rng: &mut R,
    candidates: &[Candidate<'_>],
    user: &User,
    reach_km: f64,
    ctx: &DemandContext,
) -> Option<Entity> {
    let scores: Vec<f64> = candidates
        .iter()
        .map(|c| score_restaurant(c.restaurant, user, c.distance_km, reach_km, ctx))
        .collect();
    choose_weighted_or_first(rng, &scores).map(|i| candidates[i].entity)
}
