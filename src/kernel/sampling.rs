use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Probabilistic gate for metric-measurement events. Errors and user actions are
/// never routed through it.
#[derive(Debug)]
pub struct Sampler {
    rng: StdRng,
}

impl Sampler {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draw uniformly in [0, 1) and emit iff the draw is below `sample_rate`.
    pub fn should_emit(&mut self, sample_rate: f64) -> bool {
        let draw: f64 = self.rng.gen();
        draw < sample_rate
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::from_entropy()
    }
}
