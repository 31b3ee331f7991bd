//! Menu-item selection.
//!
//! The current meal pattern drives which categories are drawn; within a
//! category items are weighted by popularity, weather, season, price and
//! whether they complement what is already in the basket.

use rand::Rng;

use crate::calendar::{MealPeriod, Season};
use crate::demand::DemandContext;
use crate::ecs::{Menu, MenuCategory, MenuItem};
use crate::segment::SegmentProfile;
use crate::selection::{choose_uniform, choose_weighted};

/// Category preferences and basket-size adjustment for a meal period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MealPattern {
    pub categories: &'static [(MenuCategory, f64)],
    pub item_adjustment: i32,
}

const BREAKFAST: MealPattern = MealPattern {
    categories: &[
        (MenuCategory::Breakfast, 0.6),
        (MenuCategory::Drink, 0.25),
        (MenuCategory::Side, 0.1),
        (MenuCategory::Dessert, 0.05),
    ],
    item_adjustment: 0,
};

const LUNCH: MealPattern = MealPattern {
    categories: &[
        (MenuCategory::Main, 0.55),
        (MenuCategory::Side, 0.2),
        (MenuCategory::Drink, 0.15),
        (MenuCategory::Appetizer, 0.05),
        (MenuCategory::Dessert, 0.05),
    ],
    item_adjustment: 0,
};

const DINNER: MealPattern = MealPattern {
    categories: &[
        (MenuCategory::Main, 0.45),
        (MenuCategory::Appetizer, 0.15),
        (MenuCategory::Side, 0.15),
        (MenuCategory::Dessert, 0.15),
        (MenuCategory::Drink, 0.1),
    ],
    item_adjustment: 1,
};

const LATE_NIGHT: MealPattern = MealPattern {
    categories: &[
        (MenuCategory::Main, 0.5),
        (MenuCategory::Side, 0.25),
        (MenuCategory::Drink, 0.15),
        (MenuCategory::Dessert, 0.1),
    ],
    item_adjustment: 0,
};

pub fn meal_pattern(meal: MealPeriod) -> &'static MealPattern {
    match meal {
        MealPeriod::Breakfast => &BREAKFAST,
        MealPeriod::Lunch => &LUNCH,
        MealPeriod::Dinner => &DINNER,
        MealPeriod::LateNight => &LATE_NIGHT,
    }
}

/// Passes over the pattern's categories before topping up uniformly.
const MAX_PASSES: usize = 3;

fn time_of_day_weight(item: &MenuItem, meal: MealPeriod) -> f64 {
    match (item.category, meal) {
        (MenuCategory::Breakfast, MealPeriod::Breakfast) => 1.5,
        (MenuCategory::Breakfast, _) => 0.3,
        (MenuCategory::Main, MealPeriod::Breakfast) => 0.5,
        (MenuCategory::Dessert, MealPeriod::Dinner) => 1.2,
        _ => 1.0,
    }
}

fn weather_weight(item: &MenuItem, ctx: &DemandContext) -> f64 {
    let mut w = 1.0;
    if item.is_hot && (ctx.is_cold() || ctx.weather.is_wet()) {
        w *= 1.3;
    }
    if ctx.is_hot() {
        match item.category {
            MenuCategory::Drink => w *= 1.4,
            MenuCategory::Dessert => w *= 1.2,
            _ if item.is_hot => w *= 0.85,
            _ => {}
        }
    }
    w
}

fn season_weight(item: &MenuItem, season: Season) -> f64 {
    match season {
        Season::Winter if item.is_hot => 1.1,
        Season::Summer if matches!(item.category, MenuCategory::Drink | MenuCategory::Dessert) => 1.15,
        _ => 1.0,
    }
}

/// Unnormalized selection weight of `item` given the basket so far.
pub fn item_weight(
    item: &MenuItem,
    ctx: &DemandContext,
    has_main: bool,
    price_sensitivity: f64,
    average_price: f64,
) -> f64 {
    let complementary = if has_main && item.category.is_complementary() {
        1.5
    } else {
        1.0
    };
    let price = if average_price > 0.0 {
        (-price_sensitivity * item.price.max(0.0) / average_price).exp()
    } else {
        1.0
    };
    (0.1 + item.popularity.clamp(0.0, 1.0))
        * time_of_day_weight(item, ctx.meal_period)
        * weather_weight(item, ctx)
        * season_weight(item, ctx.season)
        * complementary
        * price
}

/// Basket size: segment base plus meal adjustment plus `U{-1,0,1}`, at least 1.
pub fn target_item_count<R: Rng + ?Sized>(rng: &mut R, profile: &SegmentProfile, pattern: &MealPattern) -> usize {
    let jitter: i32 = rng.gen_range(-1..=1);
    (profile.base_items as i32 + pattern.item_adjustment + jitter).max(1) as usize
}

/// Choose menu items for one order. Returns indices into the menu; empty only
/// when the menu is empty. Items repeat only once every item has been chosen.
pub fn select_items<R: Rng + ?Sized>(
    rng: &mut R,
    menu: &Menu,
    profile: &SegmentProfile,
    ctx: &DemandContext,
) -> Vec<usize> {
    let items = menu.items();
    if items.is_empty() {
        return Vec::new();
    }
    let pattern = meal_pattern(ctx.meal_period);
    let target = target_item_count(rng, profile, pattern);
    let average_price = menu.average_price();
    let mut chosen: Vec<usize> = Vec::with_capacity(target);

    'passes: for _ in 0..MAX_PASSES {
        for (category, preference) in pattern.categories {
            if chosen.len() >= target {
                break 'passes;
            }
            if rng.gen::<f64>() >= *preference {
                continue;
            }
            let has_main = chosen.iter().any(|&i| items[i].category == MenuCategory::Main);
            let pool: Vec<usize> = (0..items.len())
                .filter(|i| items[*i].category == *category && !chosen.contains(i))
                .collect();
            let weights: Vec<f64> = pool
                .iter()
                .map(|&i| item_weight(&items[i], ctx, has_main, profile.price_sensitivity, average_price))
                .collect();
            if let Some(pick) = choose_weighted(rng, &weights) {
                chosen.push(pool[pick]);
            }
        }
    }

    while chosen.len() < target {
        let remaining: Vec<usize> = (0..items.len()).filter(|i| !chosen.contains(i)).collect();
        let pick = if remaining.is_empty() {
            choose_uniform(rng, items.len())
        } else {
            choose_uniform(rng, remaining.len()).map(|k| remaining[k])
        };
        match pick {
            Some(i) => chosen.push(i),
            None => break,
        }
    }
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::CustomerSegment;
    use chrono::Weekday;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn menu() -> Menu {
        Menu(vec![
            MenuItem::new("pancakes", MenuCategory::Breakfast, 8.0),
            MenuItem::new("burger", MenuCategory::Main, 12.0).with_popularity(0.9),
            MenuItem::new("curry", MenuCategory::Main, 14.0),
            MenuItem::new("fries", MenuCategory::Side, 4.0),
            MenuItem::new("cola", MenuCategory::Drink, 3.0).with_hot(false),
            MenuItem::new("brownie", MenuCategory::Dessert, 5.0).with_hot(false),
        ])
    }

    #[test]
    fn baskets_are_non_empty_and_within_menu() {
        let mut rng = StdRng::seed_from_u64(21);
        let menu = menu();
        for hour in [8, 12, 19, 23] {
            let ctx = DemandContext::neutral(hour, Weekday::Thu);
            for segment in CustomerSegment::ALL {
                let picks = select_items(&mut rng, &menu, segment.profile(), &ctx);
                assert!(!picks.is_empty());
                assert!(picks.iter().all(|&i| i < menu.items().len()));
            }
        }
    }

    #[test]
    fn no_repeats_until_menu_is_exhausted() {
        let mut rng = StdRng::seed_from_u64(5);
        let menu = Menu(vec![
            MenuItem::new("a", MenuCategory::Main, 10.0),
            MenuItem::new("b", MenuCategory::Side, 3.0),
        ]);
        let ctx = DemandContext::neutral(19, Weekday::Sat);
        for _ in 0..50 {
            let picks = select_items(&mut rng, &menu, CustomerSegment::Frequent.profile(), &ctx);
            let distinct = picks.iter().collect::<std::collections::HashSet<_>>().len();
            assert_eq!(distinct, picks.len().min(2));
        }
    }

    #[test]
    fn empty_menu_selects_nothing() {
        let mut rng = StdRng::seed_from_u64(5);
        let ctx = DemandContext::neutral(12, Weekday::Sat);
        assert!(select_items(&mut rng, &Menu::default(), CustomerSegment::Regular.profile(), &ctx).is_empty());
    }

    #[test]
    fn mains_boost_complementary_items() {
        let ctx = DemandContext::neutral(19, Weekday::Sat);
        let fries = MenuItem::new("fries", MenuCategory::Side, 4.0);
        let with_main = item_weight(&fries, &ctx, true, 0.5, 8.0);
        let without = item_weight(&fries, &ctx, false, 0.5, 8.0);
        assert!((with_main / without - 1.5).abs() < 1e-12);
    }

    #[test]
    fn hot_food_favoured_in_cold_weather() {
        let mut cold = DemandContext::neutral(19, Weekday::Sat);
        cold.temperature_c = -2.0;
        let warm = DemandContext::neutral(19, Weekday::Sat);
        let soup = MenuItem::new("soup", MenuCategory::Main, 9.0);
        assert!(item_weight(&soup, &cold, false, 0.5, 8.0) > item_weight(&soup, &warm, false, 0.5, 8.0));
    }

    #[test]
    fn basket_size_follows_segment_and_meal() {
        let mut rng = StdRng::seed_from_u64(8);
        let frequent = CustomerSegment::Frequent.profile();
        for _ in 0..100 {
            let n = target_item_count(&mut rng, frequent, meal_pattern(MealPeriod::Dinner));
            assert!((3..=5).contains(&n));
            let n = target_item_count(&mut rng, CustomerSegment::Occasional.profile(), meal_pattern(MealPeriod::Lunch));
            assert!((1..=3).contains(&n));
        }
    }
}
