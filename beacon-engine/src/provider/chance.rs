//! Randomness provider
//!
//! Supplies step durations and failure decisions. Tests use a seeded
//! generator for reproducible runs.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of randomized step timing and failure decisions
pub trait Chance: Send + Sync {
    /// Draws a value uniformly from `[low, high]`
    fn pick(&self, low: u64, high: u64) -> u64;

    /// Returns `true` with the given probability
    ///
    /// A probability of `0.0` never fires, `1.0` always does.
    fn roll(&self, probability: f64) -> bool;
}

/// `StdRng`-backed randomness
pub struct RandomChance {
    rng: Mutex<StdRng>,
}

impl RandomChance {
    /// Seeds from the operating system's entropy source
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic generator; the same seed yields the same sequence
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomChance {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl Chance for RandomChance {
    fn pick(&self, low: u64, high: u64) -> u64 {
        if low >= high {
            return low;
        }
        self.rng.lock().gen_range(low..=high)
    }

    fn roll(&self, probability: f64) -> bool {
        if probability <= 0.0 {
            return false;
        }
        if probability >= 1.0 {
            return true;
        }
        self.rng.lock().r#gen::<f64>() < probability
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_chance_is_deterministic() {
        let a = RandomChance::seeded(42);
        let b = RandomChance::seeded(42);

        let xs: Vec<u64> = (0..20).map(|_| a.pick(100, 900)).collect();
        let ys: Vec<u64> = (0..20).map(|_| b.pick(100, 900)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_pick_stays_in_range() {
        let chance = RandomChance::seeded(7);
        for _ in 0..1000 {
            let v = chance.pick(400, 900);
            assert!((400..=900).contains(&v));
        }
        assert_eq!(chance.pick(5, 5), 5);
    }

    #[test]
    fn test_roll_extremes() {
        let chance = RandomChance::seeded(1);
        for _ in 0..1000 {
            assert!(!chance.roll(0.0));
            assert!(chance.roll(1.0));
        }
    }

    #[test]
    fn test_roll_roughly_matches_probability() {
        let chance = RandomChance::seeded(99);
        let hits = (0..10_000).filter(|_| chance.roll(0.25)).count();
        assert!((2_000..3_000).contains(&hits), "hits = {}", hits);
    }
}
