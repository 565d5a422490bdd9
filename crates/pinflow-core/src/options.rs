//! Options an approver attaches when accepting a request.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{PinError, PinResult};

/// A single option value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<OptionValue>),
    Map(BTreeMap<String, OptionValue>),
    /// A value whose type only exists in the sender's domain.
    Foreign { type_name: String },
}

impl OptionValue {
    fn find_foreign(&self) -> Option<&str> {
        match self {
            Self::Foreign { type_name } => Some(type_name),
            Self::List(values) => values.iter().find_map(Self::find_foreign),
            Self::Map(map) => map.values().find_map(Self::find_foreign),
            _ => None,
        }
    }
}

/// Options payload of an accept call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestOptions(pub BTreeMap<String, OptionValue>);

impl RequestOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: OptionValue) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    /// Number of top-level entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks that every value, at any depth, can cross the trust boundary.
    pub fn ensure_transportable(&self) -> PinResult<()> {
        for (key, value) in &self.0 {
            if let Some(type_name) = value.find_foreign() {
                return Err(PinError::InvalidArgument(format!(
                    "options cannot be unparceled: key {key:?} holds foreign type {type_name}"
                )));
            }
        }
        Ok(())
    }
}
