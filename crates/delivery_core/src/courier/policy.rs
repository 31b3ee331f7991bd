use bevy_ecs::prelude::{Entity, Resource};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::selection::{choose_uniform, choose_weighted_or_first};

/// An Available courier within the assignment radius of a restaurant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CourierCandidate {
    pub entity: Entity,
    pub distance_km: f64,
    pub rating: f64,
    pub experience: u32,
}

/// Policy choosing which eligible courier gets an order.
///
/// Candidates are already filtered to Available couriers within the
/// assignment radius; an empty slice means no assignment is possible.
pub trait CourierSelection: Send + Sync {
    fn select(&self, candidates: &[CourierCandidate], rng: &mut dyn RngCore) -> Option<Entity>;
}

/// Every eligible courier is equally likely.
#[derive(Debug, Default, Clone, Copy)]
pub struct UniformSelection;

impl CourierSelection for UniformSelection {
    fn select(&self, candidates: &[CourierCandidate], rng: &mut dyn RngCore) -> Option<Entity> {
        choose_uniform(rng, candidates.len()).map(|i| candidates[i].entity)
    }
}

/// Weighted draw favouring well-rated, experienced and nearby couriers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredSelection {
    pub rating_weight: f64,
    pub experience_weight: f64,
    pub proximity_weight: f64,
    /// Radius used to normalise proximity.
    pub radius_km: f64,
}

impl Default for ScoredSelection {
    fn default() -> Self {
        Self {
            rating_weight: 0.4,
            experience_weight: 0.2,
            proximity_weight: 0.4,
            radius_km: 5.0,
        }
    }
}

impl ScoredSelection {
    pub fn score(&self, candidate: &CourierCandidate) -> f64 {
        let rating = (candidate.rating.clamp(1.0, 5.0) - 1.0) / 4.0;
        // Saturates around a hundred deliveries.
        let experience = 1.0 - (-(candidate.experience as f64) / 50.0).exp();
        let proximity = 1.0 - (candidate.distance_km / self.radius_km.max(0.1)).clamp(0.0, 1.0);
        // Small floor keeps every eligible courier selectable.
        0.05 + self.rating_weight * rating
            + self.experience_weight * experience
            + self.proximity_weight * proximity
    }
}

impl CourierSelection for ScoredSelection {
    fn select(&self, candidates: &[CourierCandidate], rng: &mut dyn RngCore) -> Option<Entity> {
        let scores: Vec<f64> = candidates.iter().map(|c| self.score(c)).collect();
        choose_weighted_or_first(rng, &scores).map(|i| candidates[i].entity)
    }
}

/// Configured selection policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum CourierSelectionPolicy {
    #[default]
    Uniform,
    Scored(ScoredSelection),
}

impl CourierSelectionPolicy {
    pub fn build(&self) -> Box<dyn CourierSelection> {
        match self {
            CourierSelectionPolicy::Uniform => Box::new(UniformSelection),
            CourierSelectionPolicy::Scored(scored) => Box::new(*scored),
        }
    }
}

/// Resource wrapper for the courier selection trait object.
#[derive(Resource)]
pub struct CourierSelectionResource(pub Box<dyn CourierSelection>);

impl CourierSelectionResource {
    pub fn new(selection: Box<dyn CourierSelection>) -> Self {
        Self(selection)
    }
}

impl Default for CourierSelectionResource {
    fn default() -> Self {
        Self(Box::new(UniformSelection))
    }
}

impl std::ops::Deref for CourierSelectionResource {
    type Target = dyn CourierSelection;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}
