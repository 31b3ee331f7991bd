//! Scenario setup: simulation parameters and spawning of a caller-provided
//! population.

mod build;
mod params;

pub use build::{build_scenario, Population};
pub use params::{
    CityConfig, CourierConfig, DemandConfig, OrderTimingConfig, SimulationParams, TrafficConfig,
    WeatherConfig,
};
