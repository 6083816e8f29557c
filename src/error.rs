// src/error.rs

//! Crate-wide error type and retryability classification
//!
//! Every fallible operation in the engine returns [`Result`]. The retry
//! supervisor never inspects error payloads; it branches on
//! [`Error::failure_kind`], which maps the two recoverable failure shapes
//! (command exited non-zero, command timed out) to their retryable kinds
//! and everything else to [`FailureKind::Fatal`].

use thiserror::Error;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// All errors produced by the build engine
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying I/O failure (file operations, process spawning)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required input could not be located
    #[error("{0}")]
    NotFound(String),

    /// Recipe file could not be parsed or failed validation
    #[error("parse error: {0}")]
    Parse(String),

    /// An auxiliary input became unreadable at digest time
    #[error("fingerprint error: {0}")]
    Fingerprint(String),

    /// A template render left unresolved placeholders
    #[error("template error: {0}")]
    Template(String),

    /// A step's command exited with a failure status (retryable)
    #[error("step '{description}' exited with status {code}")]
    CommandFailed { description: String, code: i32 },

    /// A step's command exceeded its allotted time (retryable)
    #[error("step '{description}' timed out after {secs}s")]
    CommandTimeout { description: String, secs: u64 },

    /// Final failure of a step after the retry budget was spent
    #[error("step '{description}' failed after {attempts} attempt(s): {source}")]
    StepFailed {
        description: String,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    /// `build()` called on a builder that already ran
    #[error("build for '{0}' already ran; create a new builder to rebuild")]
    AlreadyRan(String),
}

/// Failure classification consumed by the retry supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Command exited with a failure status
    RetryableExit,
    /// Command exceeded its time budget
    RetryableTimeout,
    /// Everything else; never retried
    Fatal,
}

impl Error {
    /// Classify this error for retry purposes
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::CommandFailed { .. } => FailureKind::RetryableExit,
            Self::CommandTimeout { .. } => FailureKind::RetryableTimeout,
            _ => FailureKind::Fatal,
        }
    }

    /// True for the two kinds the retry supervisor re-attempts
    pub fn is_retryable(&self) -> bool {
        self.failure_kind() != FailureKind::Fatal
    }
}
