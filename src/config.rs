//! Construction parameters for the key zipper and the bucket batcher.
//!
//! Both structs are plain data: they derive `serde` traits so they can be
//! loaded from JSON alongside the rest of a training job's settings, and
//! carry defaults matching the usual datapipe conventions. Functions (key,
//! merge, sort) are never part of a config; they are passed to the
//! constructors directly.
//!
//! ```
//! use ironpipe::BucketBatchConfig;
//!
//! let cfg = BucketBatchConfig::from_json(r#"{ "batch_size": 32, "bucket_num": 4 }"#).unwrap();
//! assert_eq!(cfg.batch_num, 100);
//! assert_eq!(cfg.pool_size(), 32 * 100 * 4);
//! ```

use crate::error::{PipeError, Result};
use serde::{Deserialize, Serialize};

/// Default bound on each secondary match buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 10_000;

/// Settings for a stream-stream [`KeyZipper`](crate::KeyZipper).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyZipConfig {
    /// Maximum number of unmatched elements held per secondary source.
    /// `None` means unbounded.
    pub buffer_size: Option<usize>,
}

impl Default for KeyZipConfig {
    fn default() -> Self {
        Self {
            buffer_size: Some(DEFAULT_BUFFER_SIZE),
        }
    }
}

impl KeyZipConfig {
    #[must_use]
    pub const fn unbounded() -> Self {
        Self { buffer_size: None }
    }

    #[must_use]
    pub const fn bounded(buffer_size: usize) -> Self {
        Self {
            buffer_size: Some(buffer_size),
        }
    }

    /// # Errors
    /// [`PipeError::Configuration`] for a zero buffer size.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == Some(0) {
            return Err(PipeError::config(
                "'buffer_size' is required to be either None or a positive integer",
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON config.
    ///
    /// # Errors
    /// Malformed JSON or invalid values, both as [`PipeError::Configuration`].
    pub fn from_json(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s)
            .map_err(|e| PipeError::config(format!("invalid key zip config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Settings for a [`BucketBatcher`](crate::BucketBatcher).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketBatchConfig {
    /// Elements per batch.
    pub batch_size: usize,
    /// Drop a final batch shorter than `batch_size`.
    pub drop_last: bool,
    /// Batches per bucket (`bucket_size = batch_size * batch_num`).
    pub batch_num: usize,
    /// Buckets per shuffle pool (`pool_size = bucket_size * bucket_num`).
    pub bucket_num: usize,
    /// Shuffle fully materialized chunks in memory instead of streaming
    /// them through a reservoir.
    pub in_batch_shuffle: bool,
    /// Fixed RNG seed; `None` draws fresh entropy on every pass.
    pub seed: Option<u64>,
}

impl Default for BucketBatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            drop_last: false,
            batch_num: 100,
            bucket_num: 1,
            in_batch_shuffle: true,
            seed: None,
        }
    }
}

impl BucketBatchConfig {
    #[must_use]
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    #[must_use]
    pub const fn batch_num(mut self, batch_num: usize) -> Self {
        self.batch_num = batch_num;
        self
    }

    #[must_use]
    pub const fn bucket_num(mut self, bucket_num: usize) -> Self {
        self.bucket_num = bucket_num;
        self
    }

    #[must_use]
    pub const fn in_batch_shuffle(mut self, in_batch_shuffle: bool) -> Self {
        self.in_batch_shuffle = in_batch_shuffle;
        self
    }

    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub const fn bucket_size(&self) -> usize {
        self.batch_size * self.batch_num
    }

    #[must_use]
    pub const fn pool_size(&self) -> usize {
        self.bucket_size() * self.bucket_num
    }

    /// # Errors
    /// [`PipeError::Configuration`] when any size is zero or the pool size
    /// overflows `usize`.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(PipeError::config("Batch size is required to be larger than 0"));
        }
        if self.batch_num == 0 {
            return Err(PipeError::config(
                "Number of batches is required to be larger than 0",
            ));
        }
        if self.bucket_num == 0 {
            return Err(PipeError::config(
                "Number of buckets is required to be larger than 0",
            ));
        }
        self.batch_size
            .checked_mul(self.batch_num)
            .and_then(|b| b.checked_mul(self.bucket_num))
            .ok_or_else(|| PipeError::config("pool size overflows usize"))?;
        Ok(())
    }

    /// Parse and validate a JSON config.
    ///
    /// # Errors
    /// Malformed JSON or invalid values, both as [`PipeError::Configuration`].
    pub fn from_json(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s)
            .map_err(|e| PipeError::config(format!("invalid bucket batch config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_zip_defaults_to_bounded_buffer() {
        let cfg = KeyZipConfig::from_json("{}").unwrap();
        assert_eq!(cfg.buffer_size, Some(DEFAULT_BUFFER_SIZE));
        let unbounded = KeyZipConfig::from_json(r#"{ "buffer_size": null }"#).unwrap();
        assert_eq!(unbounded, KeyZipConfig::unbounded());
    }

    #[test]
    fn zero_buffer_is_a_configuration_error() {
        assert!(matches!(
            KeyZipConfig::from_json(r#"{ "buffer_size": 0 }"#),
            Err(PipeError::Configuration { .. })
        ));
    }

    #[test]
    fn bucket_batch_rejects_zero_sizes() {
        for cfg in [
            BucketBatchConfig::new(0),
            BucketBatchConfig::new(4).batch_num(0),
            BucketBatchConfig::new(4).bucket_num(0),
        ] {
            assert!(cfg.validate().is_err(), "{cfg:?}");
        }
        assert!(BucketBatchConfig::new(usize::MAX).batch_num(2).validate().is_err());
    }

    #[test]
    fn derived_sizes() {
        let cfg = BucketBatchConfig::new(8).batch_num(4).bucket_num(3);
        assert_eq!(cfg.bucket_size(), 32);
        assert_eq!(cfg.pool_size(), 96);
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = BucketBatchConfig::from_json("{ batch_size: }").unwrap_err();
        assert!(err.to_string().contains("invalid bucket batch config"));
    }
}
