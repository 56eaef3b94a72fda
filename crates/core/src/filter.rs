//! Metadata filtering for shard search
//!
//! A filter is a conjunction of conditions on top-level metadata fields:
//! - `eq`: scalar equality; on an array field, any element may match
//! - `contains`: substring match on a string field, or on any string element
//!   of an array field
//!
//! Range queries and nested paths are not supported. Field names are
//! validated against the shard schema before a search runs.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Conjunctive metadata filter
///
/// BTreeMap keeps condition order deterministic for logging and validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    /// Top-level field equality (AND semantics)
    pub equals: BTreeMap<String, JsonScalar>,
    /// Top-level substring conditions (AND semantics)
    pub contains: BTreeMap<String, String>,
}

impl MetadataFilter {
    /// Create an empty filter (matches all)
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality condition
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<JsonScalar>) -> Self {
        self.equals.insert(field.into(), value.into());
        self
    }

    /// Add a substring condition
    pub fn contains(mut self, field: impl Into<String>, needle: impl Into<String>) -> Self {
        self.contains.insert(field.into(), needle.into());
        self
    }

    /// Every field name referenced by this filter
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.equals
            .keys()
            .chain(self.contains.keys())
            .map(String::as_str)
    }

    /// Check if metadata matches every condition
    ///
    /// Non-object metadata only matches the empty filter.
    pub fn matches(&self, metadata: &JsonValue) -> bool {
        if self.is_empty() {
            return true;
        }

        let Some(obj) = metadata.as_object() else {
            return false;
        };

        for (field, expected) in &self.equals {
            let Some(actual) = obj.get(field) else {
                return false;
            };
            let hit = match actual {
                JsonValue::Array(items) => items.iter().any(|item| expected.matches_json(item)),
                other => expected.matches_json(other),
            };
            if !hit {
                return false;
            }
        }

        for (field, needle) in &self.contains {
            let Some(actual) = obj.get(field) else {
                return false;
            };
            let hit = match actual {
                JsonValue::String(s) => s.contains(needle.as_str()),
                JsonValue::Array(items) => items
                    .iter()
                    .filter_map(JsonValue::as_str)
                    .any(|s| s.contains(needle.as_str())),
                _ => false,
            };
            if !hit {
                return false;
            }
        }

        true
    }

    /// Check if filter is empty (matches all)
    pub fn is_empty(&self) -> bool {
        self.equals.is_empty() && self.contains.is_empty()
    }

    /// Number of conditions in the filter
    pub fn len(&self) -> usize {
        self.equals.len() + self.contains.len()
    }
}

/// JSON scalar value for equality conditions
#[derive(Debug, Clone, PartialEq)]
pub enum JsonScalar {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Numeric value (stored as f64)
    Number(f64),
    /// String value
    String(String),
}

impl JsonScalar {
    /// Check if this scalar matches a JSON value
    pub fn matches_json(&self, value: &JsonValue) -> bool {
        match (self, value) {
            (JsonScalar::Null, JsonValue::Null) => true,
            (JsonScalar::Bool(a), JsonValue::Bool(b)) => a == b,
            (JsonScalar::Number(a), JsonValue::Number(b)) => {
                b.as_f64().is_some_and(|n| (a - n).abs() < f64::EPSILON)
            }
            (JsonScalar::String(a), JsonValue::String(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for JsonScalar {
    fn from(b: bool) -> Self {
        JsonScalar::Bool(b)
    }
}

impl From<i32> for JsonScalar {
    fn from(n: i32) -> Self {
        JsonScalar::Number(n as f64)
    }
}

impl From<i64> for JsonScalar {
    fn from(n: i64) -> Self {
        JsonScalar::Number(n as f64)
    }
}

impl From<f64> for JsonScalar {
    fn from(n: f64) -> Self {
        JsonScalar::Number(n)
    }
}

impl From<String> for JsonScalar {
    fn from(s: String) -> Self {
        JsonScalar::String(s)
    }
}

impl From<&str> for JsonScalar {
    fn from(s: &str) -> Self {
        JsonScalar::String(s.to_string())
    }
}
