//! xorshift64* random number generator
//!
//! Same seed → same sequence. The generator state is checkpointed alongside
//! the game state so a restored session continues the same sequence.

use serde::{Deserialize, Serialize};

/// Deterministic random number generator using xorshift64*
///
/// # Example
/// ```
/// use bank_run_core::RngManager;
///
/// let mut rng = RngManager::new(12345);
/// let position = rng.range(1_800, 2_700);
/// assert!((1_800..2_700).contains(&position));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngManager {
    state: u64,
}

impl RngManager {
    /// Create a new RNG; a zero seed is replaced with 1 (xorshift requirement)
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    /// Next raw 64-bit value
    pub fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Uniform value in `[min, max)`
    ///
    /// # Panics
    /// Panics if `min >= max`
    pub fn range(&mut self, min: i64, max: i64) -> i64 {
        assert!(min < max, "min must be less than max");
        let span = (max - min) as u64;
        min + (self.next() % span) as i64
    }

    /// Six-digit withdrawal queue reference, e.g. `#482913`
    pub fn queue_reference(&mut self) -> String {
        format!("#{}", self.range(100_000, 1_000_000))
    }

    /// Current state (for checkpointing)
    pub fn get_state(&self) -> u64 {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_seed_converted_to_nonzero() {
        let rng = RngManager::new(0);
        assert_ne!(rng.get_state(), 0, "Zero seed should be converted to 1");
    }

    #[test]
    #[should_panic(expected = "min must be less than max")]
    fn test_range_invalid_bounds() {
        let mut rng = RngManager::new(12345);
        rng.range(100, 50);
    }

    #[test]
    fn test_queue_reference_format() {
        let mut rng = RngManager::new(7);
        for _ in 0..100 {
            let reference = rng.queue_reference();
            assert!(reference.starts_with('#'));
            assert_eq!(reference.len(), 7);
        }
    }

    #[test]
    fn test_restored_state_continues_sequence() {
        let mut original = RngManager::new(99_999);
        original.next();
        let mut restored = RngManager::new(original.get_state());
        assert_eq!(original.next(), restored.next());
    }
}
