//! Structured error types for the Verdant workspace.

use thiserror::Error;

/// Unified error type for all Verdant operations.
#[derive(Debug, Error)]
pub enum VerdantError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error (malformed Newick, malformed checkpoint)
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid input (bad arguments, out-of-range values)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Invalid operator, prior or model configuration, reported at construction
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON encoding or decoding failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A tree or state invariant no longer holds
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// The likelihood or a prior failed to produce a value
    #[error("oracle failure at step {step}: {source}")]
    Oracle {
        step: usize,
        #[source]
        source: Box<VerdantError>,
    },

    /// Catch-all for other errors
    #[error("{0}")]
    Other(String),
}

impl VerdantError {
    /// Wrap an error raised by the likelihood or a prior at `step`.
    pub fn oracle(step: usize, source: VerdantError) -> Self {
        Self::Oracle {
            step,
            source: Box::new(source),
        }
    }
}

/// Convenience alias used throughout the Verdant workspace.
pub type Result<T> = std::result::Result<T, VerdantError>;
