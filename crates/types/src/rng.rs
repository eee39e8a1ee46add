//! Deterministic randomness for consensus shuffles.
//!
//! Every honest node must derive the identical proposer sequence and
//! committee from the same seed, so the random stream cannot depend on
//! platform, standard-library version, or build. This module pins a
//! 64-bit linear congruential generator with the MMIX constants
//! (multiplier `6364136223846793005`, increment `1442695040888963407`)
//! and a fixed output mapping. The constants and the swap loop in
//! [`DeterministicRng::shuffle`] are part of the consensus protocol:
//! changing either forks the committee schedule.

/// Portable 64-bit LCG.
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    state: u64,
}

const MULTIPLIER: u64 = 6364136223846793005;
const INCREMENT: u64 = 1442695040888963407;

impl DeterministicRng {
    /// Seed the stream. Seeds come from [`crate::Hash::seed60`], which
    /// is non-negative, but any value is accepted.
    pub fn new(seed: i64) -> Self {
        Self { state: seed as u64 }
    }

    /// Next raw 64-bit output.
    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(MULTIPLIER)
            .wrapping_add(INCREMENT);
        self.state
    }

    /// Uniform-ish draw in `0..bound`. The high 31 bits of the raw
    /// output are reduced modulo `bound`; the slight modulo bias is
    /// acceptable because reproducibility, not statistical quality, is
    /// the requirement here.
    ///
    /// # Panics
    ///
    /// Panics if `bound` is zero.
    pub fn next_bounded(&mut self, bound: usize) -> usize {
        assert!(bound > 0, "next_bounded requires a positive bound");
        ((self.next_u64() >> 33) as usize) % bound
    }

    /// In-place shuffle: for each index `i` in order, swap slot `i`
    /// with a full-range draw. This is deliberately not the
    /// shrinking-range Fisher-Yates variant; the full-range swap loop
    /// is what the network agreed on.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        let len = slice.len();
        if len == 0 {
            return;
        }
        for i in 0..len {
            let j = self.next_bounded(len);
            slice.swap(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = DeterministicRng::new(0x00ff_1234_5678);
        let mut b = DeterministicRng::new(0x00ff_1234_5678);
        for _ in 0..64 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = DeterministicRng::new(1);
        let mut b = DeterministicRng::new(2);
        let left: Vec<u64> = (0..8).map(|_| a.next_u64()).collect();
        let right: Vec<u64> = (0..8).map(|_| b.next_u64()).collect();
        assert_ne!(left, right);
    }

    #[test]
    fn bounded_draws_stay_in_range() {
        let mut rng = DeterministicRng::new(42);
        for bound in 1..64usize {
            for _ in 0..32 {
                assert!(rng.next_bounded(bound) < bound);
            }
        }
    }

    #[test]
    fn shuffle_is_reproducible_and_a_permutation() {
        let mut first: Vec<u32> = (0..100).collect();
        let mut second: Vec<u32> = (0..100).collect();
        DeterministicRng::new(777).shuffle(&mut first);
        DeterministicRng::new(777).shuffle(&mut second);
        assert_eq!(first, second);

        let mut sorted = first.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..100).collect::<Vec<u32>>());
    }

    #[test]
    fn shuffle_of_empty_slice_is_noop() {
        let mut empty: Vec<u8> = Vec::new();
        DeterministicRng::new(9).shuffle(&mut empty);
        assert!(empty.is_empty());
    }
}
