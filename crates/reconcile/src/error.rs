//! Error taxonomy for reconciliation runs

use remoting::RemotingError;
use thiserror::Error;

/// Errors surfaced by the reconciliation engine and handlers
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The template is malformed; local, never retried, stops the run
    /// before any remote call
    #[error("invalid template '{key}': {reason}")]
    Validation { key: String, reason: String },

    /// Configuration of one sub-target failed; remaining sub-targets in the
    /// sequence were not attempted
    #[error("sub-target '{target}' failed to configure")]
    Target {
        target: String,
        #[source]
        source: RemotingError,
    },

    /// A remote execution, staging or capture failure
    #[error(transparent)]
    Remoting(#[from] RemotingError),
}

impl ReconcileError {
    pub fn validation(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Whether this is a cooperative cancellation rather than a failure
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Remoting(source) | Self::Target { source, .. } => source.is_cancelled(),
            Self::Validation { .. } => false,
        }
    }
}
