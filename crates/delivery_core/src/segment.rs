//! Customer segments and their behavioural profiles.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerSegment {
    Frequent,
    #[default]
    Regular,
    Occasional,
}

/// Static behaviour parameters of a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentProfile {
    /// Default ordering rate.
    pub orders_per_month: f64,
    /// 0 = indifferent to price, 1 = very price sensitive.
    pub price_sensitivity: f64,
    /// Typical number of items per order.
    pub base_items: u32,
    /// Bounds for the adaptive orders-per-day frequency.
    pub min_daily_frequency: f64,
    pub max_daily_frequency: f64,
    /// Weight of the food rating in the overall review rating; the delivery
    /// rating takes the rest.
    pub food_rating_weight: f64,
    /// Added to sampled review ratings.
    pub rating_bias: f64,
    /// Relative likelihood of leaving a review.
    pub review_propensity: f64,
}

/// Frequency at or above which a user is considered Frequent (orders/day).
pub const FREQUENT_THRESHOLD: f64 = 0.5;
/// Frequency at or above which a user is considered Regular (orders/day).
pub const REGULAR_THRESHOLD: f64 = 0.15;

const FREQUENT: SegmentProfile = SegmentProfile {
    orders_per_month: 20.0,
    price_sensitivity: 0.3,
    base_items: 3,
    min_daily_frequency: 0.4,
    max_daily_frequency: 3.0,
    food_rating_weight: 0.5,
    rating_bias: 0.2,
    review_propensity: 0.8,
};

const REGULAR: SegmentProfile = SegmentProfile {
    orders_per_month: 8.0,
    price_sensitivity: 0.5,
    base_items: 2,
    min_daily_frequency: 0.1,
    max_daily_frequency: 1.0,
    food_rating_weight: 0.6,
    rating_bias: 0.0,
    review_propensity: 1.0,
};

const OCCASIONAL: SegmentProfile = SegmentProfile {
    orders_per_month: 2.0,
    price_sensitivity: 0.8,
    base_items: 2,
    min_daily_frequency: 0.02,
    max_daily_frequency: 0.3,
    food_rating_weight: 0.7,
    rating_bias: -0.1,
    review_propensity: 1.2,
};

impl CustomerSegment {
    pub const ALL: [CustomerSegment; 3] = [
        CustomerSegment::Frequent,
        CustomerSegment::Regular,
        CustomerSegment::Occasional,
    ];

    pub fn profile(&self) -> &'static SegmentProfile {
        match self {
            CustomerSegment::Frequent => &FREQUENT,
            CustomerSegment::Regular => &REGULAR,
            CustomerSegment::Occasional => &OCCASIONAL,
        }
    }

    /// Orders per day implied by the segment's default monthly rate.
    pub fn default_daily_frequency(&self) -> f64 {
        self.profile().orders_per_month / 30.0
    }

    /// Segment a user belongs to at a given adaptive frequency.
    pub fn for_frequency(orders_per_day: f64) -> Self {
        if orders_per_day >= FREQUENT_THRESHOLD {
            CustomerSegment::Frequent
        } else if orders_per_day >= REGULAR_THRESHOLD {
            CustomerSegment::Regular
        } else {
            CustomerSegment::Occasional
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerSegment::Frequent => "frequent",
            CustomerSegment::Regular => "regular",
            CustomerSegment::Occasional => "occasional",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_partition_frequencies() {
        assert_eq!(CustomerSegment::for_frequency(2.0), CustomerSegment::Frequent);
        assert_eq!(CustomerSegment::for_frequency(0.5), CustomerSegment::Frequent);
        assert_eq!(CustomerSegment::for_frequency(0.3), CustomerSegment::Regular);
        assert_eq!(CustomerSegment::for_frequency(0.15), CustomerSegment::Regular);
        assert_eq!(CustomerSegment::for_frequency(0.05), CustomerSegment::Occasional);
    }

    #[test]
    fn default_frequency_lies_within_bounds() {
        for segment in CustomerSegment::ALL {
            let p = segment.profile();
            let f = segment.default_daily_frequency();
            assert!(p.min_daily_frequency <= f && f <= p.max_daily_frequency, "{segment:?}");
        }
    }
}
