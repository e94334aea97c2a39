//! Loosely-typed values crossing the remote execution boundary
//!
//! Remote scripts produce arbitrary shapes. Rather than reflecting into
//! object graphs, everything funnels through this tagged variant; typed
//! coercion happens in one place, at the capture layer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A value passed to or produced by a remote job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Scalar text
    Text(String),
    /// Ordered sequence
    List(Vec<Value>),
    /// String-keyed mapping
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Scalar text value
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Ordered list of text items
    pub fn string_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(|s| Self::Text(s.into())).collect())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Variant name, used in shape-mismatch diagnostics
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Self::string_list(items)
    }
}

/// Flat rendering used when exporting values into an environment:
/// lists are space-joined, maps render as `key=value` pairs.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Self::Map(entries) => {
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{key}={value}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_match_variant() {
        let text = Value::text("hello");
        assert_eq!(text.as_text(), Some("hello"));
        assert!(text.as_list().is_none());
        assert!(text.as_map().is_none());

        let list = Value::string_list(["a", "b"]);
        assert_eq!(list.as_list().map(<[Value]>::len), Some(2));
        assert_eq!(list.shape(), "list");
    }

    #[test]
    fn display_flattens_collections() {
        let list = Value::string_list(["one", "two"]);
        assert_eq!(list.to_string(), "one two");

        let mut entries = BTreeMap::new();
        entries.insert("a".to_string(), Value::text("1"));
        entries.insert("b".to_string(), Value::text("2"));
        assert_eq!(Value::Map(entries).to_string(), "a=1 b=2");
    }
}
