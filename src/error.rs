//! Error types shared by every pipe stage.
//!
//! Construction problems surface eagerly as [`PipeError::Configuration`].
//! Everything else is raised while iterating, at the exact element that
//! triggered it, and is terminal for that cursor.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, PipeError>;

/// Errors produced while building or iterating a pipe.
#[derive(Debug, Error)]
pub enum PipeError {
    /// Invalid construction parameters.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A secondary source yielded two elements with the same key.
    #[error("Duplicate key {key} is found in reference data pipe {source_index}")]
    DuplicateKey { key: String, source_index: usize },

    /// A secondary source was exhausted before the primary key showed up.
    #[error(
        "No matching key can be found from reference data pipe {source_index} for the data {element}. \
         Please consider increasing the buffer size or verifying the sort order."
    )]
    MatchNotFound { element: String, source_index: usize },

    /// A lookup table reported the key as absent.
    #[error("key_fn maps {element} to {key}, which is not a valid key in the given lookup table")]
    KeyNotFound { element: String, key: String },

    /// Length was requested from a pipe whose cardinality is not knowable.
    #[error("{pipe} instance doesn't have valid length")]
    LengthUnsupported { pipe: String },

    /// An upstream source failed to produce an element.
    #[error(transparent)]
    Source(#[from] anyhow::Error),
}

impl PipeError {
    /// Helper to create configuration errors
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// True for both the stream-stream and the stream-table miss.
    #[must_use]
    pub const fn is_match_not_found(&self) -> bool {
        matches!(self, Self::MatchNotFound { .. } | Self::KeyNotFound { .. })
    }
}
