//! Order pricing: subtotal, tax, service fee, discount and delivery fee.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub tax_rate: f64,
    pub service_fee_rate: f64,
    pub service_fee_min: f64,
    pub service_fee_max: f64,
    /// Share of the subtotal taken off once the subtotal reaches `discount_threshold`.
    pub discount_rate: f64,
    pub discount_threshold: f64,
    pub base_delivery_fee: f64,
    pub per_km_fee: f64,
    /// Delivery is free at or above this subtotal.
    pub free_delivery_threshold: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            tax_rate: 0.08,
            service_fee_rate: 0.05,
            service_fee_min: 1.0,
            service_fee_max: 5.0,
            discount_rate: 0.10,
            discount_threshold: 50.0,
            base_delivery_fee: 2.99,
            per_km_fee: 0.5,
            free_delivery_threshold: 35.0,
        }
    }
}

/// Price breakdown of one order. All amounts are rounded to cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderPricing {
    pub subtotal: f64,
    pub tax: f64,
    pub service_fee: f64,
    pub discount: f64,
    pub delivery_fee: f64,
    pub total: f64,
}

pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Price an order from its item prices and the restaurant-to-customer distance.
pub fn price_order<I>(config: &PricingConfig, item_prices: I, distance_km: f64) -> OrderPricing
where
    I: IntoIterator<Item = f64>,
{
    let subtotal = round_cents(item_prices.into_iter().map(|p| p.max(0.0)).sum());
    let tax = round_cents(subtotal * config.tax_rate);
    let service_fee = round_cents(
        (subtotal * config.service_fee_rate).clamp(config.service_fee_min, config.service_fee_max),
    );
    let discount = if subtotal >= config.discount_threshold {
        round_cents(subtotal * config.discount_rate)
    } else {
        0.0
    };
    let delivery_fee = if subtotal >= config.free_delivery_threshold {
        0.0
    } else {
        round_cents(config.base_delivery_fee + config.per_km_fee * distance_km.max(0.0))
    };
    let total = round_cents(subtotal + tax + service_fee + delivery_fee - discount);
    OrderPricing {
        subtotal,
        tax,
        service_fee,
        discount,
        delivery_fee,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_order_pays_delivery_and_minimum_fee() {
        let config = PricingConfig::default();
        let p = price_order(&config, [8.50, 4.00], 2.0);
        assert_eq!(p.subtotal, 12.5);
        assert_eq!(p.tax, 1.0);
        assert_eq!(p.service_fee, 1.0);
        assert_eq!(p.discount, 0.0);
        assert_eq!(p.delivery_fee, 3.99);
        assert_eq!(p.total, 18.49);
    }

    #[test]
    fn large_order_gets_free_delivery_and_discount() {
        let config = PricingConfig::default();
        let p = price_order(&config, [30.0, 25.0, 5.0], 4.0);
        assert_eq!(p.subtotal, 60.0);
        assert_eq!(p.delivery_fee, 0.0);
        assert_eq!(p.discount, 6.0);
        assert_eq!(p.service_fee, 3.0);
        assert_eq!(p.total, 61.8);
    }

    #[test]
    fn service_fee_is_capped() {
        let config = PricingConfig::default();
        let p = price_order(&config, [400.0], 1.0);
        assert_eq!(p.service_fee, config.service_fee_max);
    }

    #[test]
    fn rounding_is_to_cents() {
        assert_eq!(round_cents(1.005_1), 1.01);
        assert_eq!(round_cents(2.344), 2.34);
    }
}
