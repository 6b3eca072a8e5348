//! Error types for Overdub

use std::io;
use thiserror::Error;

/// Result type for Overdub operations
pub type Result<T> = std::result::Result<T, OverdubError>;

/// Errors that can occur in Overdub
#[derive(Debug, Error)]
pub enum OverdubError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Replay was mandated but no cassette exists for the name
    #[error("no cassette named `{0}` and replay was required")]
    FixtureMissing(String),

    /// Cassette exists but holds no interaction matching the request
    #[error("no recorded interaction matches {method} {url} in cassette `{cassette}`")]
    FixtureMismatch {
        /// Cassette that was searched
        cassette: String,
        /// Request method
        method: String,
        /// Request URL
        url: String,
    },

    /// A real network call was required while recording is disabled
    #[error("recording is disabled and the request is not in the cassette")]
    RecordingDisabled,

    /// The backing transport completed without a response head
    #[error("backing transport returned no response")]
    EmptyReply,

    /// The backing transport failed to perform the request
    #[error("transport error: {0}")]
    Transport(String),

    /// Cassette could not be written to storage
    #[error("failed to persist cassette `{name}`: {reason}")]
    Persistence {
        /// Cassette name
        name: String,
        /// Underlying failure
        reason: String,
    },

    /// Invalid cassette name
    #[error("invalid cassette name: {0}")]
    InvalidCassetteName(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl OverdubError {
    /// Whether this error is a broken-fixture condition that a test harness
    /// should treat as an assertion failure rather than recover from.
    ///
    /// Covers missing fixtures, unmatched requests under a strict mode,
    /// disabled recording, and a transport reply without a response head.
    #[must_use]
    pub fn is_fixture_violation(&self) -> bool {
        matches!(
            self,
            Self::FixtureMissing(_)
                | Self::FixtureMismatch { .. }
                | Self::RecordingDisabled
                | Self::EmptyReply
        )
    }
}
