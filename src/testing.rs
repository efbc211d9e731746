//! Testing utilities for Ironpipe pipes.
//!
//! - **Assertions**: compare pipe outputs, check batch shapes, and verify
//!   that a shuffled or batched pipe is a permutation of its input
//! - **Test data builders**: generate plain and keyed datasets, including
//!   near-sorted key orders for exercising the key zipper's buffer, and
//!   variable-length sequences for length-bucketed batching
//!
//! # Quick Start
//!
//! ```
//! use ironpipe::*;
//! use ironpipe::testing::*;
//!
//! # fn main() -> Result<()> {
//! let input = SequenceDataBuilder::new(1).add_random(10, 1..20).build();
//! let batches = from_vec(input.clone())
//!     .bucket_batch(
//!         BucketBatchConfig::new(3).batch_num(4).seed(1),
//!         Some(sort_by_key(|s: &Vec<u32>| s.len())),
//!     )?
//!     .collect()?;
//!
//! assert_batch_sizes(&batches, &[3, 3, 3, 1]);
//! assert_batches_cover(&batches, &input);
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod builders;

pub use assertions::*;
pub use builders::*;
