use bevy_ecs::prelude::Resource;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::{default_special_days, SpecialDay};
use crate::clock::{ONE_DAY_MS, ONE_HOUR_MS, ONE_MIN_MS};
use crate::courier::CourierSelectionPolicy;
use crate::demand::SegmentRates;
use crate::error::ConfigError;
use crate::pricing::PricingConfig;
use crate::review::ReviewConfig;
use crate::spatial::GeoPoint;
use crate::traffic::TrafficProfileKind;
use crate::weather::WeatherCondition;

/// Default city centre: Berlin, Germany.
const DEFAULT_CENTRE: GeoPoint = GeoPoint::new(52.520, 13.405);

/// Geography of the simulated city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CityConfig {
    pub centre: GeoPoint,
    /// Dense core where assignment radii are tightened.
    pub urban_radius_km: f64,
    /// Users only order from restaurants within this distance.
    pub near_location_threshold_km: f64,
}

impl Default for CityConfig {
    fn default() -> Self {
        Self {
            centre: DEFAULT_CENTRE,
            urban_radius_km: 5.0,
            near_location_threshold_km: 5.0,
        }
    }
}

/// Order lifecycle timings and kitchen behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderTimingConfig {
    /// Courier counts as arrived within this distance of the customer.
    pub delivery_threshold_km: f64,
    /// Courier counts as arrived within this distance of the restaurant.
    pub pickup_threshold_km: f64,
    /// Orders older than this are cancelled.
    pub max_order_duration_ms: u64,
    pub review_delay_ms: u64,
    /// Re-check interval while a ready order waits for its courier.
    pub pickup_recheck_ms: u64,
    pub delivery_check_interval_ms: u64,
    /// Restaurant acceptance delay range.
    pub acceptance_delay_min_ms: u64,
    pub acceptance_delay_max_ms: u64,
    pub max_prep_mins: f64,
    /// Weight of kitchen load in preparation time.
    pub restaurant_load_factor: f64,
    /// Step by which pickup efficiency moves each status update.
    pub efficiency_adjust_rate: f64,
    pub restaurant_status_interval_ms: u64,
    /// Wait before a user without reachable restaurants is considered again.
    pub placement_backoff_ms: u64,
}

impl Default for OrderTimingConfig {
    fn default() -> Self {
        Self {
            delivery_threshold_km: 0.1,
            pickup_threshold_km: 0.1,
            max_order_duration_ms: 3 * ONE_HOUR_MS,
            review_delay_ms: 30 * ONE_MIN_MS,
            pickup_recheck_ms: 3 * ONE_MIN_MS,
            delivery_check_interval_ms: 5 * ONE_MIN_MS,
            acceptance_delay_min_ms: ONE_MIN_MS,
            acceptance_delay_max_ms: 3 * ONE_MIN_MS,
            max_prep_mins: 120.0,
            restaurant_load_factor: 0.5,
            efficiency_adjust_rate: 0.02,
            restaurant_status_interval_ms: 30 * ONE_MIN_MS,
            placement_backoff_ms: 30 * ONE_MIN_MS,
        }
    }
}

/// Courier fleet behaviour and assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    /// Reference speed for arrival estimates.
    pub base_speed_kmh: f64,
    /// Relative spread of arrival estimates.
    pub speed_variability: f64,
    pub assignment_radius_km: f64,
    pub assignment_retry_delay_ms: u64,
    /// Extra uniform delay in `[0, jitter]` added to each retry.
    pub assignment_retry_jitter_ms: u64,
    pub max_assignment_retries: u32,
    pub selection: CourierSelectionPolicy,
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            base_speed_kmh: 20.0,
            speed_variability: 0.2,
            assignment_radius_km: 4.0,
            assignment_retry_delay_ms: 2 * ONE_MIN_MS,
            assignment_retry_jitter_ms: 0,
            max_assignment_retries: 15,
            selection: CourierSelectionPolicy::Uniform,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemandConfig {
    /// When false the per-tick demand pass places no orders.
    pub enabled: bool,
    pub segment_rates: SegmentRates,
    pub special_days: Vec<SpecialDay>,
    /// Window after an order during which re-ordering is dampened.
    pub cool_down_hours: f64,
}

impl Default for DemandConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            segment_rates: SegmentRates::default(),
            special_days: default_special_days(),
            cool_down_hours: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    pub profile: TrafficProfileKind,
    /// Half-width of the uniform density perturbation.
    pub variability: f64,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            profile: TrafficProfileKind::Standard,
            variability: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub initial_condition: WeatherCondition,
    pub initial_duration_ms: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            initial_condition: WeatherCondition::Clear,
            initial_duration_ms: 2 * ONE_HOUR_MS,
        }
    }
}

/// All simulation parameters. Inserted into the world as a single resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Resource)]
#[serde(default)]
pub struct SimulationParams {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub tick_ms: u64,
    pub seed: Option<u64>,
    /// Threads serializing output events.
    pub worker_threads: usize,
    /// Events dequeued per batch while draining a tick.
    pub event_batch_size: usize,
    pub city: CityConfig,
    pub timing: OrderTimingConfig,
    pub courier: CourierConfig,
    pub pricing: PricingConfig,
    pub demand: DemandConfig,
    pub traffic: TrafficConfig,
    pub weather: WeatherConfig,
    pub review: ReviewConfig,
}

fn default_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

impl Default for SimulationParams {
    fn default() -> Self {
        let start_date = default_start();
        Self {
            start_date,
            end_date: start_date + chrono::Duration::milliseconds(ONE_DAY_MS as i64),
            tick_ms: ONE_MIN_MS,
            seed: None,
            worker_threads: 4,
            event_batch_size: 1_000,
            city: CityConfig::default(),
            timing: OrderTimingConfig::default(),
            courier: CourierConfig::default(),
            pricing: PricingConfig::default(),
            demand: DemandConfig::default(),
            traffic: TrafficConfig::default(),
            weather: WeatherConfig::default(),
            review: ReviewConfig::default(),
        }
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NotFinite(name));
    }
    if value <= 0.0 {
        return Err(ConfigError::NonPositive(name));
    }
    Ok(())
}

fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NotFinite(name));
    }
    if value < min || value > max {
        return Err(ConfigError::OutOfRange { name, value, min, max });
    }
    Ok(())
}

impl SimulationParams {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_dates(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    /// Run for `hours` from the current start date.
    pub fn with_duration_hours(mut self, hours: u64) -> Self {
        self.end_date = self.start_date + chrono::Duration::milliseconds((hours * ONE_HOUR_MS) as i64);
        self
    }

    pub fn with_tick_ms(mut self, tick_ms: u64) -> Self {
        self.tick_ms = tick_ms;
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    pub fn with_event_batch_size(mut self, size: usize) -> Self {
        self.event_batch_size = size;
        self
    }

    pub fn with_city(mut self, city: CityConfig) -> Self {
        self.city = city;
        self
    }

    pub fn with_timing(mut self, timing: OrderTimingConfig) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_courier_config(mut self, courier: CourierConfig) -> Self {
        self.courier = courier;
        self
    }

    pub fn with_pricing(mut self, pricing: PricingConfig) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_demand(mut self, demand: DemandConfig) -> Self {
        self.demand = demand;
        self
    }

    /// Turn the automatic demand pass on or off (orders can still be placed
    /// by scheduling `PlaceOrder` events directly).
    pub fn with_demand_enabled(mut self, enabled: bool) -> Self {
        self.demand.enabled = enabled;
        self
    }

    pub fn with_traffic(mut self, traffic: TrafficConfig) -> Self {
        self.traffic = traffic;
        self
    }

    pub fn with_weather(mut self, weather: WeatherConfig) -> Self {
        self.weather = weather;
        self
    }

    pub fn with_review(mut self, review: ReviewConfig) -> Self {
        self.review = review;
        self
    }

    pub fn with_selection_policy(mut self, policy: CourierSelectionPolicy) -> Self {
        self.courier.selection = policy;
        self
    }

    /// Unix ms of simulation time zero.
    pub fn epoch_ms(&self) -> i64 {
        self.start_date.timestamp_millis()
    }

    /// Simulation time at which the run stops.
    pub fn end_ms(&self) -> u64 {
        (self.end_date - self.start_date).num_milliseconds().max(0) as u64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.end_date <= self.start_date {
            return Err(ConfigError::EmptyTimeRange {
                start: self.start_date.to_rfc3339(),
                end: self.end_date.to_rfc3339(),
            });
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::ZeroTick);
        }
        if self.worker_threads == 0 {
            return Err(ConfigError::NonPositive("worker_threads"));
        }
        if self.event_batch_size == 0 {
            return Err(ConfigError::NonPositive("event_batch_size"));
        }

        let city = &self.city;
        check_range("city.centre.lat", city.centre.lat, -90.0, 90.0)?;
        check_range("city.centre.lon", city.centre.lon, -180.0, 180.0)?;
        check_range("city.urban_radius_km", city.urban_radius_km, 0.0, f64::MAX)?;
        check_positive("city.near_location_threshold_km", city.near_location_threshold_km)?;

        let timing = &self.timing;
        check_positive("timing.delivery_threshold_km", timing.delivery_threshold_km)?;
        check_positive("timing.pickup_threshold_km", timing.pickup_threshold_km)?;
        for (name, value) in [
            ("timing.max_order_duration_ms", timing.max_order_duration_ms),
            ("timing.pickup_recheck_ms", timing.pickup_recheck_ms),
            ("timing.delivery_check_interval_ms", timing.delivery_check_interval_ms),
            ("timing.restaurant_status_interval_ms", timing.restaurant_status_interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::NonPositive(name));
            }
        }
        if timing.acceptance_delay_min_ms > timing.acceptance_delay_max_ms {
            return Err(ConfigError::InvertedRange("timing.acceptance_delay"));
        }
        check_positive("timing.max_prep_mins", timing.max_prep_mins)?;
        check_range("timing.restaurant_load_factor", timing.restaurant_load_factor, 0.0, 10.0)?;
        check_range("timing.efficiency_adjust_rate", timing.efficiency_adjust_rate, 0.0, 1.0)?;

        let courier = &self.courier;
        check_positive("courier.base_speed_kmh", courier.base_speed_kmh)?;
        check_range("courier.speed_variability", courier.speed_variability, 0.0, 0.9)?;
        check_positive("courier.assignment_radius_km", courier.assignment_radius_km)?;
        if courier.assignment_retry_delay_ms == 0 {
            return Err(ConfigError::NonPositive("courier.assignment_retry_delay_ms"));
        }

        let pricing = &self.pricing;
        for (name, value) in [
            ("pricing.tax_rate", pricing.tax_rate),
            ("pricing.service_fee_rate", pricing.service_fee_rate),
            ("pricing.discount_rate", pricing.discount_rate),
        ] {
            check_range(name, value, 0.0, 1.0)?;
        }
        for (name, value) in [
            ("pricing.service_fee_min", pricing.service_fee_min),
            ("pricing.service_fee_max", pricing.service_fee_max),
            ("pricing.discount_threshold", pricing.discount_threshold),
            ("pricing.base_delivery_fee", pricing.base_delivery_fee),
            ("pricing.per_km_fee", pricing.per_km_fee),
            ("pricing.free_delivery_threshold", pricing.free_delivery_threshold),
        ] {
            check_range(name, value, 0.0, f64::MAX)?;
        }
        if pricing.service_fee_min > pricing.service_fee_max {
            return Err(ConfigError::InvertedRange("pricing.service_fee"));
        }

        let rates = &self.demand.segment_rates;
        for (name, value) in [
            ("demand.segment_rates.frequent", rates.frequent),
            ("demand.segment_rates.regular", rates.regular),
            ("demand.segment_rates.occasional", rates.occasional),
        ] {
            check_range(name, value, 0.0, f64::MAX)?;
        }
        check_range("demand.cool_down_hours", self.demand.cool_down_hours, 0.0, f64::MAX)?;
        for day in &self.demand.special_days {
            check_range("demand.special_days.multiplier", day.multiplier, 0.0, f64::MAX)?;
        }

        check_range("traffic.variability", self.traffic.variability, 0.0, 1.0)?;
        if let TrafficProfileKind::Custom(hourly) = &self.traffic.profile {
            if hourly.iter().any(|v| !v.is_finite()) {
                return Err(ConfigError::NotFinite("traffic.profile"));
            }
        }
        if self.weather.initial_duration_ms == 0 {
            return Err(ConfigError::NonPositive("weather.initial_duration_ms"));
        }

        check_range("review.smoothing_alpha", self.review.smoothing_alpha, 0.0, 1.0)?;
        check_range("review.base_probability", self.review.base_probability, 0.0, 1.0)?;
        Ok(())
    }
}
