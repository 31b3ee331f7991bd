use bevy_ecs::prelude::Resource;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Offsets used to derive independent streams from the scenario seed, so that
/// e.g. adding a demand draw does not shift the weather sequence.
pub const WEATHER_STREAM: u64 = 0x5EA7_4E20;
pub const TRAFFIC_STREAM: u64 = 0x7AFF_1C00;
pub const TEMPERATURE_STREAM: u64 = 0x7E3D_0001;

/// Simulation-scoped random source shared by the event handlers.
#[derive(Debug, Resource)]
pub struct SimRng {
    rng: StdRng,
}

impl SimRng {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

impl Default for SimRng {
    fn default() -> Self {
        Self::new(Some(0))
    }
}

/// Seeded generator for a derived stream; entropy when no seed is configured.
pub fn stream(seed: Option<u64>, offset: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(offset)),
        None => StdRng::from_entropy(),
    }
}
