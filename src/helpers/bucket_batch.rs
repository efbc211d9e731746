//! Bucketed batching.
//!
//! [`BucketBatcher`] chains shuffle, sort and batch stages into one lazy plan
//! at construction time:
//!
//! 1. **Pool shuffle** (when `bucket_num > 1` or there is no sort key):
//!    either permute chunks of `pool_size` in memory, or stream through a
//!    reservoir of `pool_size` elements.
//! 2. **Bucket sort** (with a sort key): apply the sort key to every chunk of
//!    `bucket_size` elements.
//! 3. **Batch** into `batch_size` chunks, honouring `drop_last`.
//! 4. **Batch shuffle** (with a sort key): shuffle whole batches in groups of
//!    `bucket_num` so the order inside each bucket is broken up without
//!    undoing the length-sorting the buckets were built for.
//!
//! ```
//! use ironpipe::*;
//!
//! # fn main() -> Result<()> {
//! let words: Vec<String> = ["a", "abc", "ab", "abcd", "b", "bcd"].iter().map(|s| s.to_string()).collect();
//! let batcher = BucketBatcher::new(
//!     from_vec(words),
//!     BucketBatchConfig::new(2).batch_num(3).seed(7),
//!     Some(sort_by_key(|s: &String| s.len())),
//! )?;
//!
//! let batches = batcher.collect()?;
//! assert_eq!(batches.len(), 3);
//! // every batch holds words of neighbouring lengths
//! for b in &batches {
//!     assert!(b[0].len() <= b[1].len());
//! }
//! # Ok(()) }
//! ```

use crate::config::BucketBatchConfig;
use crate::error::Result;
use crate::node::{Cursor, Node};
use crate::planner::{ExplainStep, PlanExplanation};
use crate::{DataPipe, Element, SortKey};
use log::debug;
use std::sync::{Arc, OnceLock};

/// Mixes the configured seed for the batch-level shuffle so it does not
/// replay the pool-level permutation.
const BATCH_SEED_MIX: u64 = 0xA24B_AED4_0B9C_497C;

/// A lazy pipe of batches built from shuffled, optionally sorted buckets.
pub struct BucketBatcher<T> {
    source: DataPipe<T>,
    config: BucketBatchConfig,
    sorted: bool,
    plan: DataPipe<Vec<T>>,
    length: Arc<OnceLock<Option<usize>>>,
}

impl<T> Clone for BucketBatcher<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            config: self.config,
            sorted: self.sorted,
            plan: self.plan.clone(),
            length: Arc::clone(&self.length),
        }
    }
}

impl<T: Element> BucketBatcher<T> {
    /// Build the plan. No element of `source` is pulled here.
    ///
    /// # Errors
    /// [`PipeError::Configuration`](crate::PipeError::Configuration) when any
    /// size in `config` is zero.
    pub fn new(
        source: DataPipe<T>,
        config: BucketBatchConfig,
        sort_key: Option<SortKey<T>>,
    ) -> Result<Self> {
        config.validate()?;
        let bucket_size = config.bucket_size();
        let pool_size = config.pool_size();

        let mut pipe = source.clone();
        if config.bucket_num > 1 || sort_key.is_none() {
            pipe = if config.in_batch_shuffle {
                pipe.batch(pool_size, false)?
                    .shuffle_chunks(config.seed)
                    .unbatch()
            } else {
                pipe.shuffle(pool_size, config.seed)?
            };
        }
        if let Some(sort_key) = &sort_key {
            pipe = pipe
                .batch(bucket_size, false)?
                .sort_chunks(Arc::clone(sort_key))
                .unbatch();
        }
        let mut plan = pipe.batch(config.batch_size, config.drop_last)?;
        if sort_key.is_some() {
            let seed = config.seed.map(|s| s.wrapping_mul(BATCH_SEED_MIX));
            plan = if config.in_batch_shuffle {
                plan.batch(config.bucket_num, false)?
                    .shuffle_chunks(seed)
                    .unbatch()
            } else {
                plan.shuffle(config.bucket_num, seed)?
            };
        }

        debug!(
            "built bucket batch plan: batch_size={}, bucket_size={bucket_size}, pool_size={pool_size}, sorted={}",
            config.batch_size,
            sort_key.is_some()
        );
        Ok(Self {
            source,
            config,
            sorted: sort_key.is_some(),
            plan,
            length: Arc::new(OnceLock::new()),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &BucketBatchConfig {
        &self.config
    }

    #[must_use]
    pub const fn bucket_size(&self) -> usize {
        self.config.bucket_size()
    }

    #[must_use]
    pub const fn pool_size(&self) -> usize {
        self.config.pool_size()
    }

    /// Number of batches one pass yields, derived from the source length
    /// and cached after the first call.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        *self.length.get_or_init(|| {
            let n = self.source.len()?;
            Some(if self.config.drop_last {
                n / self.config.batch_size
            } else {
                n.div_ceil(self.config.batch_size)
            })
        })
    }

    /// Open a fresh pass over the plan.
    #[must_use]
    pub fn iter(&self) -> Cursor<Vec<T>> {
        self.plan.iter()
    }

    /// Drain one pass.
    ///
    /// # Errors
    /// The first error raised by the source.
    pub fn collect(&self) -> Result<Vec<Vec<T>>> {
        self.plan.collect()
    }

    #[must_use]
    pub fn explain(&self) -> PlanExplanation {
        self.clone().into_pipe().explain()
    }

    /// The batcher as a plain pipe, keeping its length.
    #[must_use]
    pub fn into_pipe(self) -> DataPipe<Vec<T>> {
        DataPipe::from_node(self)
    }
}

impl<T: Element> Node<Vec<T>> for BucketBatcher<T> {
    fn open(&self) -> Cursor<Vec<T>> {
        self.plan.iter()
    }

    fn len(&self) -> Option<usize> {
        Self::len(self)
    }

    fn describe(&self) -> ExplainStep {
        let mode = if self.sorted { "sorted buckets" } else { "unsorted" };
        ExplainStep::new(
            "BucketBatch",
            format!(
                "Batches of {} from pools of {} ({mode})",
                self.config.batch_size,
                self.pool_size()
            ),
        )
    }

    fn explain_upstream(&self, steps: &mut Vec<ExplainStep>) {
        self.plan.explain_into(steps);
    }
}

impl<T: Element> DataPipe<T> {
    /// Shorthand for [`BucketBatcher::new`] followed by
    /// [`into_pipe`](BucketBatcher::into_pipe).
    ///
    /// # Errors
    /// [`PipeError::Configuration`](crate::PipeError::Configuration) for
    /// invalid sizes.
    pub fn bucket_batch(
        self,
        config: BucketBatchConfig,
        sort_key: Option<SortKey<T>>,
    ) -> Result<DataPipe<Vec<T>>> {
        Ok(BucketBatcher::new(self, config, sort_key)?.into_pipe())
    }
}
