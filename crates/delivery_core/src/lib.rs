pub mod calendar;
pub mod clock;
pub mod courier;
pub mod demand;
pub mod ecs;
pub mod error;
pub mod output;
pub mod pricing;
pub mod review;
pub mod rng;
pub mod runner;
pub mod scenario;
pub mod segment;
pub mod selection;
pub mod spatial;
pub mod systems;
pub mod telemetry;
pub mod timing;
pub mod traffic;
pub mod weather;

#[cfg(feature = "test-helpers")]
pub mod test_helpers;
