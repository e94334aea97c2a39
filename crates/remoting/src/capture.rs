//! Typed extraction of job output variables
//!
//! The single chokepoint that coerces loosely-typed remote output into the
//! concrete shapes callers expect. Everything above this layer stays
//! strongly typed.

use crate::error::RemotingError;
use crate::job::JobResult;
use crate::value::Value;
use std::collections::BTreeMap;

/// Typed view over a job result's output variables
pub struct Capture<'a> {
    result: &'a JobResult,
}

impl<'a> Capture<'a> {
    pub fn new(result: &'a JobResult) -> Self {
        Self { result }
    }

    /// Raw value of a required output variable
    pub fn required(&self, name: &str) -> Result<&'a Value, RemotingError> {
        self.result
            .outputs
            .get(name)
            .ok_or_else(|| RemotingError::MissingOutput { name: name.into() })
    }

    pub fn text(&self, name: &str) -> Result<&'a str, RemotingError> {
        match self.required(name)? {
            Value::Text(s) => Ok(s),
            other => Err(mismatch(name, "text", other)),
        }
    }

    pub fn list(&self, name: &str) -> Result<&'a [Value], RemotingError> {
        match self.required(name)? {
            Value::List(items) => Ok(items),
            other => Err(mismatch(name, "list", other)),
        }
    }

    pub fn map(&self, name: &str) -> Result<&'a BTreeMap<String, Value>, RemotingError> {
        match self.required(name)? {
            Value::Map(entries) => Ok(entries),
            other => Err(mismatch(name, "map", other)),
        }
    }

    /// List coerced to strings; non-text items are a shape mismatch
    pub fn string_list(&self, name: &str) -> Result<Vec<String>, RemotingError> {
        self.list(name)?
            .iter()
            .map(|item| match item {
                Value::Text(s) => Ok(s.clone()),
                other => Err(mismatch(name, "list of text", other)),
            })
            .collect()
    }

    /// Strict boolean: only canonical true/false tokens, case-insensitively.
    /// Anything else is a type mismatch, never silently false.
    pub fn boolean(&self, name: &str) -> Result<bool, RemotingError> {
        parse_bool(self.text(name)?, name)
    }

    /// Map coerced to name -> boolean, with the same strict token rule
    pub fn bool_map(&self, name: &str) -> Result<BTreeMap<String, bool>, RemotingError> {
        self.map(name)?
            .iter()
            .map(|(key, value)| match value {
                Value::Text(raw) => Ok((key.clone(), parse_bool(raw, name)?)),
                other => Err(mismatch(name, "map of boolean", other)),
            })
            .collect()
    }
}

fn mismatch(name: &str, expected: &'static str, actual: &Value) -> RemotingError {
    RemotingError::TypeMismatch {
        name: name.into(),
        expected,
        actual: actual.shape().into(),
    }
}

fn parse_bool(raw: &str, name: &str) -> Result<bool, RemotingError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(RemotingError::TypeMismatch {
            name: name.into(),
            expected: "boolean",
            actual: format!("non-boolean text '{raw}'"),
        }),
    }
}
