//! # Ironpipe
//!
//! Lazy, pull-based **data-pipe transforms** for building training-data
//! pipelines in Rust. Ironpipe provides composable stages for reordering,
//! bucketed batching, and key-based joining of data streams, all with
//! explicit memory bounds and deterministic failure behaviour.
//!
//! ## Key Features
//!
//! - **Lazy, restartable pipes** - stages are cursor factories; nothing runs until you pull
//! - **Batching primitives** - batch, unbatch, whole-chunk sort
//! - **Shuffling** - streaming reservoir shuffle and in-memory chunk shuffle, optionally seeded
//! - **In-memory caching** - record the first pass, replay it on later passes
//! - **Bucket batching** - pool shuffle → bucket sort → batch → batch shuffle in one plan
//! - **Stream-stream joins** - the key zipper, with a bounded FIFO match buffer per source
//! - **Stream-table joins** - join against any random-access [`Lookup`] table
//! - **Plan explanation** - inspect every stage and its memory bound before iterating
//!
//! ## Quick Start
//!
//! ```
//! use ironpipe::*;
//!
//! # fn main() -> Result<()> {
//! let samples = from_vec((0..10u32).collect::<Vec<_>>());
//!
//! let batches = samples.bucket_batch(BucketBatchConfig::new(3).seed(1), None)?;
//! assert_eq!(batches.len(), Some(4));
//!
//! let sizes: Vec<usize> = batches.collect()?.iter().map(Vec::len).collect();
//! assert_eq!(sizes, vec![3, 3, 3, 1]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### DataPipe
//!
//! A [`DataPipe<T>`] is a single-pass, restartable sequence of `T`. Pipes are:
//! - **Lazy** - building stages never pulls data
//! - **Restartable** - every [`iter`](DataPipe::iter) opens a fresh pass with fresh buffers
//! - **Fallible** - cursors yield `Result<T>`; the first error ends the pass
//! - **Sized when possible** - [`len`](DataPipe::len) reports the cardinality if it is knowable
//!
//! ### Joins
//!
//! - [`zip_with_iter`](DataPipe::zip_with_iter) / [`KeyZipper`] - follow the primary pipe's
//!   order and find the matching element in each secondary pipe, buffering the ones pulled
//!   early. Duplicate keys and exhausted secondaries are terminal errors; an overflowing
//!   buffer evicts its oldest entry and logs a single warning.
//! - [`zip_with_map`](DataPipe::zip_with_map) / [`MapZipper`] - look each element's key up
//!   in a table; a miss is a terminal error.
//!
//! ### Bucket batching
//!
//! [`BucketBatcher`] groups a stream into batches while trading memory for shuffle quality:
//! a pool of `batch_size * batch_num * bucket_num` elements is shuffled, each bucket of
//! `batch_size * batch_num` is optionally sorted (e.g. by sequence length), and the resulting
//! batches are shuffled again in small groups.
//!
//! ## Logging
//!
//! Ironpipe logs through the [`log`] facade and installs no logger of its own.
//!
//! ## Module Overview
//!
//! - [`datapipe`] - `DataPipe` and in-memory / iterator sources
//! - [`node`] - the stage trait behind every pipe
//! - [`config`] - serde-backed configuration for zippers and batchers
//! - [`match_buffer`] - insertion-ordered store used by the key zipper
//! - [`planner`] - plan explanation
//! - [`error`] - error types
//! - [`testing`] - assertions and data builders for pipe tests

pub mod config;
pub mod datapipe;
pub mod error;
pub mod helpers;
pub mod match_buffer;
pub mod node;
pub mod planner;
pub mod testing;

// General re-exports
pub use config::{BucketBatchConfig, DEFAULT_BUFFER_SIZE, KeyZipConfig};
pub use datapipe::{DataPipe, Element, from_fallible_fn, from_fn, from_vec};
pub use error::{PipeError, Result};
pub use helpers::*;
pub use node::{Cursor, Node};
pub use planner::{ExplainStep, PlanExplanation};
