//! Caller-defined point payloads.
//!
//! A payload is an insertion-ordered map from string keys to scalar JSON
//! values. Nested arrays and objects are rejected so every payload stays a
//! flat record (path, line range, language, content and similar).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ConfigurationError, StoreError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Payload(Map<String, Value>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a scalar value, keeping insertion order for new keys.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ScalarValue>) -> &mut Self {
        self.0.insert(key.into(), value.into().0);
        self
    }

    /// Builder form of [`Payload::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

/// A JSON value that is a string, number, bool or null.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarValue(Value);

macro_rules! scalar_from {
    ($($ty:ty),*) => {
        $(impl From<$ty> for ScalarValue {
            fn from(value: $ty) -> Self {
                Self(Value::from(value))
            }
        })*
    };
}

scalar_from!(&str, String, bool, i32, i64, u32, u64, usize, f32, f64);

impl<T: Into<ScalarValue>> From<Option<T>> for ScalarValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self(Value::Null), Into::into)
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

impl TryFrom<Map<String, Value>> for Payload {
    type Error = StoreError;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        if let Some((key, _)) = map.iter().find(|(_, v)| !is_scalar(v)) {
            return Err(ConfigurationError::InvalidPayload {
                reason: format!("value for '{key}' must be a string, number, bool or null"),
            }
            .into());
        }
        Ok(Self(map))
    }
}

impl From<Payload> for Map<String, Value> {
    fn from(payload: Payload) -> Self {
        payload.0
    }
}
