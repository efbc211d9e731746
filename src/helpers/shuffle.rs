//! Shuffling helpers.
//!
//! - [`DataPipe::shuffle`]: streaming reservoir shuffle over a fixed-size
//!   buffer. The buffer is filled first; afterwards each incoming element
//!   takes the place of a uniformly chosen slot whose occupant is emitted.
//!   When the input ends the remaining buffer is permuted and drained.
//! - [`DataPipe::shuffle_chunks`]: uniform in-memory permutation of every
//!   chunk of a batched pipe.
//!
//! Each cursor owns its own RNG. With `seed: Some(s)` every pass reproduces
//! the same permutation; with `None` the RNG is seeded from OS entropy and
//! separate passes are independent.

use crate::error::{PipeError, Result};
use crate::helpers::batches::MAX_PREALLOC;
use crate::node::{Cursor, Node};
use crate::planner::ExplainStep;
use crate::{DataPipe, Element};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

pub(crate) fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

struct ReservoirShuffleOp<T> {
    source: DataPipe<T>,
    buffer_size: usize,
    seed: Option<u64>,
}

struct ReservoirCursor<T> {
    inner: Cursor<T>,
    buffer: Vec<T>,
    buffer_size: usize,
    rng: StdRng,
    drained: bool,
}

impl<T> Iterator for ReservoirCursor<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.drained {
            match self.inner.next() {
                Some(Ok(x)) => {
                    if self.buffer.len() == self.buffer_size {
                        let idx = self.rng.gen_range(0..self.buffer_size);
                        return Some(Ok(std::mem::replace(&mut self.buffer[idx], x)));
                    }
                    self.buffer.push(x);
                }
                Some(Err(e)) => return Some(Err(e)),
                None => {
                    self.drained = true;
                    self.buffer.shuffle(&mut self.rng);
                }
            }
        }
        self.buffer.pop().map(Ok)
    }
}

impl<T: Element> Node<T> for ReservoirShuffleOp<T> {
    fn open(&self) -> Cursor<T> {
        Box::new(ReservoirCursor {
            inner: self.source.iter(),
            buffer: Vec::with_capacity(self.buffer_size.min(MAX_PREALLOC)),
            buffer_size: self.buffer_size,
            rng: rng_for(self.seed),
            drained: false,
        })
    }

    fn len(&self) -> Option<usize> {
        self.source.len()
    }

    fn describe(&self) -> ExplainStep {
        ExplainStep::new(
            "Shuffle",
            format!("Reservoir shuffle over {} elements", self.buffer_size),
        )
        .with_buffer(self.buffer_size)
    }

    fn explain_upstream(&self, steps: &mut Vec<ExplainStep>) {
        self.source.explain_into(steps);
    }
}

struct ChunkShuffleOp<T> {
    source: DataPipe<Vec<T>>,
    seed: Option<u64>,
}

impl<T: Element> Node<Vec<T>> for ChunkShuffleOp<T> {
    fn open(&self) -> Cursor<Vec<T>> {
        let mut rng = rng_for(self.seed);
        Box::new(self.source.iter().map(move |r| {
            r.map(|mut chunk| {
                chunk.shuffle(&mut rng);
                chunk
            })
        }))
    }

    fn len(&self) -> Option<usize> {
        self.source.len()
    }

    fn describe(&self) -> ExplainStep {
        ExplainStep::new("ShuffleChunks", "Permute each chunk in memory")
    }

    fn explain_upstream(&self, steps: &mut Vec<ExplainStep>) {
        self.source.explain_into(steps);
    }
}

impl<T: Element> DataPipe<T> {
    /// Reservoir-shuffle the pipe through a buffer of `buffer_size` elements.
    ///
    /// # Errors
    /// [`PipeError::Configuration`] when `buffer_size` is zero.
    pub fn shuffle(self, buffer_size: usize, seed: Option<u64>) -> Result<Self> {
        if buffer_size == 0 {
            return Err(PipeError::config(
                "shuffle buffer size is required to be larger than 0",
            ));
        }
        Ok(Self::from_node(ReservoirShuffleOp {
            source: self,
            buffer_size,
            seed,
        }))
    }
}

impl<T: Element> DataPipe<Vec<T>> {
    /// Uniformly permute the contents of every chunk.
    #[must_use]
    pub fn shuffle_chunks(self, seed: Option<u64>) -> Self {
        Self::from_node(ChunkShuffleOp { source: self, seed })
    }
}

#[cfg(test)]
mod tests {
    use crate::*;

    fn sorted(mut v: Vec<u32>) -> Vec<u32> {
        v.sort_unstable();
        v
    }

    #[test]
    fn reservoir_shuffle_is_a_permutation() -> Result<()> {
        let input: Vec<u32> = (0..100).collect();
        for buffer in [1usize, 7, 100, 500] {
            let got = from_vec(input.clone()).shuffle(buffer, Some(3))?.collect()?;
            assert_eq!(sorted(got), input, "buffer={buffer}");
        }
        Ok(())
    }

    #[test]
    fn buffer_of_one_keeps_order() -> Result<()> {
        let input: Vec<u32> = (0..20).collect();
        let got = from_vec(input.clone()).shuffle(1, None)?.collect()?;
        assert_eq!(got, input);
        Ok(())
    }

    #[test]
    fn seeded_shuffle_repeats_across_passes() -> Result<()> {
        let p = from_vec((0..50u32).collect::<Vec<_>>()).shuffle(10, Some(42))?;
        assert_eq!(p.collect()?, p.collect()?);
        Ok(())
    }

    #[test]
    fn shuffle_chunks_keeps_chunk_contents() -> Result<()> {
        let p = from_vec((0..12u32).collect::<Vec<_>>())
            .batch(4, false)?
            .shuffle_chunks(Some(9));
        for (i, chunk) in p.collect()?.into_iter().enumerate() {
            let base = u32::try_from(i * 4).unwrap();
            assert_eq!(sorted(chunk), vec![base, base + 1, base + 2, base + 3]);
        }
        Ok(())
    }

    #[test]
    fn zero_buffer_is_rejected() {
        assert!(matches!(
            from_vec(vec![1u8]).shuffle(0, None),
            Err(PipeError::Configuration { .. })
        ));
    }
}
