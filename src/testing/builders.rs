//! Test data builders for creating pipe inputs fluently.

use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::ops::Range;

/// Builder for variable-length token sequences, the usual input of
/// length-bucketed batching.
///
/// Every token is a fresh id, so no two non-empty sequences compare equal
/// and a batched output can be checked against its input with
/// [`assert_batches_cover`](crate::testing::assert_batches_cover).
///
/// # Example
///
/// ```
/// use ironpipe::testing::SequenceDataBuilder;
///
/// let seqs = SequenceDataBuilder::new(1)
///     .add_sequence(3)
///     .add_random(10, 1..8)
///     .build();
///
/// assert_eq!(seqs.len(), 11);
/// assert_eq!(seqs[0].len(), 3);
/// assert!(seqs[1..].iter().all(|s| (1..8).contains(&s.len())));
/// ```
pub struct SequenceDataBuilder {
    rng: StdRng,
    next_token: u32,
    seqs: Vec<Vec<u32>>,
}

impl SequenceDataBuilder {
    /// Lengths drawn by [`add_random`](Self::add_random) follow `seed`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            next_token: 0,
            seqs: Vec::new(),
        }
    }

    /// Add one sequence of exactly `len` tokens.
    #[must_use]
    pub fn add_sequence(mut self, len: usize) -> Self {
        let start = self.next_token;
        self.next_token = start.saturating_add(u32::try_from(len).unwrap_or(u32::MAX));
        self.seqs.push((start..self.next_token).collect());
        self
    }

    /// Add `count` sequences with lengths drawn uniformly from `lengths`.
    /// An empty range yields sequences of length `lengths.start`.
    #[must_use]
    pub fn add_random(mut self, count: usize, lengths: Range<usize>) -> Self {
        for _ in 0..count {
            let len = if lengths.is_empty() {
                lengths.start
            } else {
                self.rng.gen_range(lengths.clone())
            };
            self = self.add_sequence(len);
        }
        self
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.seqs.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    #[must_use]
    pub fn build(self) -> Vec<Vec<u32>> {
        self.seqs
    }
}

/// Builder for `(key, value)` records used to exercise the key zippers.
///
/// Keys are `0..n`. By default they appear in order; [`skew`](Self::skew)
/// displaces every key by less than `window` positions, which a key zipper
/// with a buffer of at least `window` can always bridge.
///
/// # Example
///
/// ```
/// use ironpipe::testing::KeyedDataBuilder;
///
/// let rows = KeyedDataBuilder::new(6).skew(3, 7).build(|k| k * 10);
/// assert_eq!(rows.len(), 6);
/// assert!(rows.iter().all(|(k, v)| *v == k * 10));
/// ```
pub struct KeyedDataBuilder {
    keys: Vec<u32>,
}

impl KeyedDataBuilder {
    #[must_use]
    pub fn new(n: u32) -> Self {
        Self {
            keys: (0..n).collect(),
        }
    }

    /// Shuffle keys within consecutive windows of `window` keys.
    #[must_use]
    pub fn skew(mut self, window: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        for chunk in self.keys.chunks_mut(window.max(1)) {
            chunk.shuffle(&mut rng);
        }
        self
    }

    /// Reverse the key order entirely.
    #[must_use]
    pub fn reversed(mut self) -> Self {
        self.keys.reverse();
        self
    }

    /// Keys in their current order.
    #[must_use]
    pub fn keys(&self) -> &[u32] {
        &self.keys
    }

    /// Produce `(key, value_fn(key))` records.
    pub fn build<V>(self, value_fn: impl Fn(u32) -> V) -> Vec<(u32, V)> {
        self.keys.into_iter().map(|k| (k, value_fn(k))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequences_never_share_tokens() {
        let seqs = SequenceDataBuilder::new(5).add_random(50, 0..6).build();
        let tokens: Vec<u32> = seqs.into_iter().flatten().collect();
        let expected: Vec<u32> = (0..u32::try_from(tokens.len()).unwrap()).collect();
        assert_eq!(tokens, expected);
    }

    #[test]
    fn skew_stays_within_window() {
        let b = KeyedDataBuilder::new(100).skew(5, 11);
        for (pos, k) in b.keys().iter().enumerate() {
            assert_eq!(pos / 5, *k as usize / 5, "key {k} left its window");
        }
    }
}
