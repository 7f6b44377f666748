use crate::error::{Result, TesiraError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single field of a parsed device response
///
/// Exactly one variant is populated. Typed accessors fail with
/// [`TesiraError::TypeMismatch`] instead of converting between variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value", into = "serde_json::Value")]
pub enum ControlValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<ControlValue>),
    Map(BTreeMap<String, ControlValue>),
}

impl ControlValue {
    /// Name of the populated variant
    pub fn kind(&self) -> &'static str {
        match self {
            ControlValue::Bool(_) => "bool",
            ControlValue::Int(_) => "int",
            ControlValue::Float(_) => "float",
            ControlValue::String(_) => "string",
            ControlValue::Array(_) => "array",
            ControlValue::Map(_) => "map",
        }
    }

    fn mismatch(&self, expected: &'static str) -> TesiraError {
        TesiraError::TypeMismatch {
            expected,
            found: self.kind(),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            ControlValue::Bool(value) => Ok(*value),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            ControlValue::Int(value) => Ok(*value),
            other => Err(other.mismatch("int")),
        }
    }

    pub fn as_float(&self) -> Result<f64> {
        match self {
            ControlValue::Float(value) => Ok(*value),
            other => Err(other.mismatch("float")),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            ControlValue::String(value) => Ok(value),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn as_array(&self) -> Result<&[ControlValue]> {
        match self {
            ControlValue::Array(items) => Ok(items),
            other => Err(other.mismatch("array")),
        }
    }

    /// Look up a key in a map value
    ///
    /// Returns `None` when the key is absent or the value is not a map; many
    /// responses are partial depending on the command that produced them.
    pub fn get(&self, key: &str) -> Option<&ControlValue> {
        match self {
            ControlValue::Map(entries) => entries.get(key),
            _ => None,
        }
    }

    /// Like [`ControlValue::get`], but an absent key is an error
    pub fn field(&self, key: &str) -> Result<&ControlValue> {
        self.get(key)
            .ok_or_else(|| TesiraError::MissingField(key.to_string()))
    }

    /// Decode a device token through a lookup table
    pub fn as_enum<T: Copy + PartialEq + fmt::Debug>(&self, table: &TokenTable<T>) -> Result<T> {
        table.value_for(self.as_str()?)
    }

    /// Encode a client value as its device token
    pub fn from_enum<T: Copy + PartialEq + fmt::Debug>(
        value: T,
        table: &TokenTable<T>,
    ) -> Result<ControlValue> {
        table
            .token_for(value)
            .map(|token| ControlValue::String(token.to_string()))
    }
}

impl From<bool> for ControlValue {
    fn from(value: bool) -> Self {
        ControlValue::Bool(value)
    }
}

impl From<i64> for ControlValue {
    fn from(value: i64) -> Self {
        ControlValue::Int(value)
    }
}

impl From<u32> for ControlValue {
    fn from(value: u32) -> Self {
        ControlValue::Int(i64::from(value))
    }
}

impl From<f64> for ControlValue {
    fn from(value: f64) -> Self {
        ControlValue::Float(value)
    }
}

impl From<String> for ControlValue {
    fn from(value: String) -> Self {
        ControlValue::String(value)
    }
}

impl From<&str> for ControlValue {
    fn from(value: &str) -> Self {
        ControlValue::String(value.to_string())
    }
}

impl TryFrom<serde_json::Value> for ControlValue {
    type Error = TesiraError;

    fn try_from(json: serde_json::Value) -> Result<Self> {
        match json {
            serde_json::Value::Null => Err(TesiraError::InvalidResponse(
                "null is not a control value".to_string(),
            )),
            serde_json::Value::Bool(value) => Ok(ControlValue::Bool(value)),
            serde_json::Value::Number(number) => {
                if let Some(value) = number.as_i64() {
                    Ok(ControlValue::Int(value))
                } else if let Some(value) = number.as_f64() {
                    Ok(ControlValue::Float(value))
                } else {
                    Err(TesiraError::InvalidResponse(format!(
                        "Unrepresentable number {}",
                        number
                    )))
                }
            }
            serde_json::Value::String(value) => Ok(ControlValue::String(value)),
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(ControlValue::try_from)
                .collect::<Result<Vec<_>>>()
                .map(ControlValue::Array),
            serde_json::Value::Object(entries) => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    // Null entries are treated as absent keys
                    if value.is_null() {
                        continue;
                    }
                    map.insert(key, ControlValue::try_from(value)?);
                }
                Ok(ControlValue::Map(map))
            }
        }
    }
}

impl From<ControlValue> for serde_json::Value {
    fn from(value: ControlValue) -> Self {
        match value {
            ControlValue::Bool(value) => serde_json::Value::Bool(value),
            ControlValue::Int(value) => serde_json::Value::from(value),
            ControlValue::Float(value) => serde_json::Number::from_f64(value)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ControlValue::String(value) => serde_json::Value::String(value),
            ControlValue::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            ControlValue::Map(entries) => serde_json::Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, value.into()))
                    .collect(),
            ),
        }
    }
}

/// Case-insensitive bidirectional mapping between device tokens and client values
///
/// Tables are plain immutable data handed to [`ControlValue::as_enum`] and
/// [`ControlValue::from_enum`], so a different firmware vocabulary is just a
/// different table.
#[derive(Debug, Clone, Copy)]
pub struct TokenTable<T: 'static> {
    entries: &'static [(&'static str, T)],
}

impl<T: Copy + PartialEq + fmt::Debug> TokenTable<T> {
    pub const fn new(entries: &'static [(&'static str, T)]) -> Self {
        Self { entries }
    }

    /// Client value for a device token
    pub fn value_for(&self, token: &str) -> Result<T> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(token))
            .map(|(_, value)| *value)
            .ok_or_else(|| TesiraError::UnknownToken(token.to_string()))
    }

    /// Canonical device token for a client value
    pub fn token_for(&self, value: T) -> Result<&'static str> {
        self.entries
            .iter()
            .find(|(_, candidate)| *candidate == value)
            .map(|(token, _)| *token)
            .ok_or_else(|| TesiraError::UnknownToken(format!("{:?}", value)))
    }

    pub fn entries(&self) -> &'static [(&'static str, T)] {
        self.entries
    }
}
