//! Deterministic random sampling for reproducible runs.

use std::time::Duration;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::TimeRange;

/// Deterministic random number generator for reproducible simulations.
///
/// Uses the ChaCha8 algorithm for fast, high-quality pseudorandom numbers
/// with seed-based generation. Every run owns its own stream, so
/// independent runs never share generator state.
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    rng: ChaCha8Rng,
    seed: u64,
}

impl DeterministicRng {
    /// Creates deterministic RNG from seed value.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Returns the seed used for this RNG.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Generates random number in range [0, 1].
    pub fn random_f64(&mut self) -> f64 {
        self.rng.next_u64() as f64 / u64::MAX as f64
    }

    /// Draws a Bernoulli outcome with the given success probability.
    ///
    /// A probability of 1.0 or above always succeeds, so a certain branch
    /// cannot be lost to the top-of-range draw.
    pub fn sample_probability(&mut self, probability: f64) -> bool {
        probability >= 1.0 || self.random_f64() < probability
    }

    /// Samples a duration uniformly from the given range.
    ///
    /// A zero-width or reversed range returns its lower bound.
    pub fn duration_in(&mut self, range: TimeRange) -> Duration {
        if range.min >= range.max {
            return range.min;
        }
        let span = (range.max - range.min).as_secs_f64();
        range.min + Duration::from_secs_f64(span * self.random_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut rng1 = DeterministicRng::from_seed(12345);
        let mut rng2 = DeterministicRng::from_seed(12345);

        let range = TimeRange::from_secs(7, 13);
        let values1: Vec<Duration> = (0..10).map(|_| rng1.duration_in(range)).collect();
        let values2: Vec<Duration> = (0..10).map(|_| rng2.duration_in(range)).collect();

        assert_eq!(values1, values2);
    }

    #[test]
    fn test_duration_in_stays_within_range() {
        let mut rng = DeterministicRng::from_seed(7);
        let range = TimeRange::from_secs(16, 20);

        for _ in 0..1000 {
            let sample = rng.duration_in(range);
            assert!(sample >= range.min);
            assert!(sample <= range.max);
        }
    }

    #[test]
    fn test_zero_width_range_returns_bound() {
        let mut rng = DeterministicRng::from_seed(1);
        let range = TimeRange::from_secs(3, 3);
        assert_eq!(rng.duration_in(range), Duration::from_secs(3));
    }

    #[test]
    fn test_certain_probability_always_succeeds() {
        let mut rng = DeterministicRng::from_seed(9);
        assert!((0..10_000).all(|_| rng.sample_probability(1.0)));
    }

    #[test]
    fn test_impossible_probability_never_succeeds() {
        let mut rng = DeterministicRng::from_seed(9);
        assert!((0..10_000).all(|_| !rng.sample_probability(0.0)));
    }
}
