//! Free-form attribute maps.
//!
//! Several entities carry open-ended key/value data (`properties`,
//! `reaction_conditions`, `test_conditions`, `additional_properties`). Values
//! are restricted to JSON scalars so they round-trip through every backend
//! and bundle format unchanged.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A scalar attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// JSON `null`.
    Null,
    /// A boolean flag.
    Bool(bool),
    /// An integral number.
    Integer(i64),
    /// A floating point number.
    Number(f64),
    /// A string.
    Text(String),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Ordered string-keyed attribute map.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// Returns `true` if every number in the map is finite.
pub(crate) fn all_finite(map: &PropertyMap) -> bool {
    map.values().all(|value| match value {
        PropertyValue::Number(n) => n.is_finite(),
        _ => true,
    })
}
