//! Room pin allocation
//!
//! Samples uniform 6-digit pins and rejects the ones already live.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::RoomError;
use crate::types::Pin;

/// Number of distinct 6-digit pins
pub const PIN_SPACE: u32 = 1_000_000;

/// Generates pins that are unique among live rooms
///
/// Owns its RNG so the actor holding it stays `Send`.
#[derive(Debug)]
pub struct PinAllocator {
    rng: StdRng,
}

impl PinAllocator {
    /// Create an allocator seeded from OS entropy
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Create a deterministic allocator
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draw one pin, ignoring collisions
    pub fn sample(&mut self) -> Pin {
        Pin::from_number(self.rng.gen_range(0..PIN_SPACE))
    }

    /// Draw pins until one is not a key of `live`
    ///
    /// The caller must insert the returned pin before releasing its borrow
    /// of `live`, otherwise two allocations can hand out the same pin.
    pub fn allocate<V>(&mut self, live: &HashMap<Pin, V>) -> Result<Pin, RoomError> {
        if live.len() >= PIN_SPACE as usize {
            return Err(RoomError::AllocatorExhausted);
        }

        loop {
            let pin = self.sample();
            if !live.contains_key(&pin) {
                return Ok(pin);
            }
        }
    }
}

impl Default for PinAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_is_six_digits() {
        let mut allocator = PinAllocator::with_seed(7);
        for _ in 0..1000 {
            assert!(allocator.sample().is_well_formed());
        }
    }

    #[test]
    fn test_allocate_skips_live_pin() {
        let first = PinAllocator::with_seed(42).sample();

        let mut live = HashMap::new();
        live.insert(first.clone(), ());

        // Same seed: the first draw collides and must be rejected
        let mut allocator = PinAllocator::with_seed(42);
        let pin = allocator.allocate(&live).unwrap();
        assert_ne!(pin, first);
        assert!(pin.is_well_formed());
    }

    #[test]
    fn test_allocate_distinct_when_inserted() {
        let mut allocator = PinAllocator::with_seed(1);
        let mut live = HashMap::new();
        for _ in 0..500 {
            let pin = allocator.allocate(&live).unwrap();
            assert!(live.insert(pin, ()).is_none());
        }
        assert_eq!(live.len(), 500);
    }
}
