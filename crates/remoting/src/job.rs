//! Job and result types for remote execution
//!
//! A [`Job`] is a data-only, single-use unit of remote work. It has no
//! identity beyond the execution call and is never retried by the framework.

use crate::value::Value;
use std::collections::BTreeMap;

/// Which output variables a job should capture
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputRequest {
    /// Capture nothing
    #[default]
    None,
    /// Capture only the named variables
    Named(Vec<String>),
    /// Capture every top-level variable the execution produced, as a mapping
    All,
}

impl OutputRequest {
    /// Whether a produced variable with this name should be retained
    pub fn wants(&self, name: &str) -> bool {
        match self {
            Self::None => false,
            Self::Named(names) => names.iter().any(|n| n == name),
            Self::All => true,
        }
    }
}

/// A single-use unit of remote work
#[derive(Debug, Clone, Default)]
pub struct Job {
    /// The script payload to execute
    pub script_text: String,
    /// Named input variables, exported to the execution environment
    pub variables: BTreeMap<String, Value>,
    /// Whether output variables are captured at all
    pub collect_output: bool,
    /// Whether the script's ordinary output is forwarded as log events
    pub log_output: bool,
    /// Whether the script's debug stream is forwarded to the debug log
    pub debug_logging: bool,
    /// Whether the script's verbose stream is forwarded to the debug log
    pub verbose_logging: bool,
    /// Which output variables to capture
    pub out_variables: OutputRequest,
}

impl Job {
    /// A job for the given payload, with output logging enabled
    pub fn new(script_text: impl Into<String>) -> Self {
        Self {
            script_text: script_text.into(),
            log_output: true,
            ..Self::default()
        }
    }

    /// Add an input variable
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Capture the named output variables
    pub fn collecting<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.collect_output = true;
        self.out_variables = OutputRequest::Named(names.into_iter().map(Into::into).collect());
        self
    }

    /// Capture everything the execution produces
    pub fn collecting_all(mut self) -> Self {
        self.collect_output = true;
        self.out_variables = OutputRequest::All;
        self
    }
}

/// Terminal status of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Succeeded,
    Failed,
    Cancelled,
}

/// Outcome of one job execution
#[derive(Debug, Clone)]
pub struct JobResult {
    /// Process exit code, when the execution mechanism has one
    pub exit_code: Option<i32>,
    /// Captured output variables; only explicitly requested names appear
    /// (or, in capture-all mode, every top-level name produced)
    pub outputs: BTreeMap<String, Value>,
    pub status: JobStatus,
}

impl JobResult {
    /// A successful result with the given outputs
    pub fn succeeded(outputs: BTreeMap<String, Value>) -> Self {
        Self {
            exit_code: Some(0),
            outputs,
            status: JobStatus::Succeeded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_request_filtering() {
        assert!(!OutputRequest::None.wants("x"));
        assert!(OutputRequest::All.wants("x"));
        let named = OutputRequest::Named(vec!["results".to_string()]);
        assert!(named.wants("results"));
        assert!(!named.wants("other"));
    }

    #[test]
    fn builder_sets_capture_flags() {
        let job = Job::new("true").collecting(["results"]);
        assert!(job.collect_output);
        assert!(job.out_variables.wants("results"));
        assert!(job.log_output);
    }
}
