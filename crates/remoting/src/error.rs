//! Error taxonomy for remote execution

use thiserror::Error;

/// Errors surfaced by the remoting subsystem
#[derive(Debug, Error)]
pub enum RemotingError {
    /// An asset reference could not be resolved to content
    #[error("asset reference '{reference}' not found")]
    NotFound { reference: String },

    /// Content staging I/O failed; fatal for the current run
    #[error("failed to stage content for '{asset}'")]
    StagingFailed {
        asset: String,
        #[source]
        source: std::io::Error,
    },

    /// The remote job terminated abnormally. Carries the captured log tail
    /// for diagnostics; partially captured outputs are discarded.
    #[error("remote job failed: {detail}")]
    ExecutionFailed {
        detail: String,
        log_tail: Vec<String>,
    },

    /// A required output variable was not produced
    #[error("job did not produce output variable '{name}'")]
    MissingOutput { name: String },

    /// An output variable could not be coerced to the expected shape
    #[error("output variable '{name}' is {actual}, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: String,
    },

    /// Execution was cancelled cooperatively; distinct from failure
    #[error("job was cancelled")]
    Cancelled,
}

impl RemotingError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
