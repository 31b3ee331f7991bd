//! Error types for the simulation engine.

use thiserror::Error;

use crate::ecs::OrderStatus;

/// Invalid simulation parameters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("end date {end} is not after start date {start}")]
    EmptyTimeRange { start: String, end: String },

    #[error("tick size must be positive")]
    ZeroTick,

    #[error("{0} must be positive")]
    NonPositive(&'static str),

    #[error("{name} must lie in [{min}, {max}], got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("invalid range for {0}: min exceeds max")]
    InvertedRange(&'static str),

    #[error("{0} must contain only finite values")]
    NotFinite(&'static str),
}

/// Failure to deliver an output message.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("sink is closed")]
    Closed,

    #[error("worker pool error: {0}")]
    Pool(String),
}

/// Problems building a scenario from parameters and a population.
#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("population has no {0}")]
    EmptyPopulation(&'static str),

    #[error("duplicate {kind} id: {id}")]
    DuplicateId { kind: &'static str, id: String },

    #[error("{kind} {id} has an invalid location")]
    InvalidLocation { kind: &'static str, id: String },

    #[error("restaurant {0} has zero capacity")]
    ZeroCapacity(String),
}

/// Attempted order status change that would move backward or leave a
/// terminal state.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cannot move order from {from:?} to {to:?}")]
pub struct InvalidTransition {
    pub from: OrderStatus,
    pub to: OrderStatus,
}
