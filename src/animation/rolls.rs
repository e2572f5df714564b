//! Injectable random source for probabilistic cues

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform draws in [0, 1)
pub trait RollSource: Send {
    fn roll(&mut self) -> f32;
}

/// `RollSource` backed by a `rand` generator
#[derive(Debug, Clone)]
pub struct RandomRolls {
    rng: StdRng,
}

impl RandomRolls {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible sequence for a given seed
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RollSource for RandomRolls {
    fn roll(&mut self) -> f32 {
        self.rng.gen::<f32>()
    }
}
