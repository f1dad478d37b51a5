//! Entity payloads as sent to and returned by the backend.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Fixed value set of `enumField`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnumField {
    A,
    B,
    C,
    D,
}

/// The tracked fields of an entity, without the server-assigned identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityFields {
    pub string_field: String,
    pub int_field: i64,
    pub enum_field: EnumField,
    pub string_array_field: Vec<String>,
    pub bool_field: bool,
}

/// Server-assigned entity identifier.
///
/// Backends hand out either numeric or string ids; both are carried as-is so
/// that a record can be compared byte-for-byte with a later retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Int(i64),
    UInt(u64),
    Str(String),
}

impl EntityId {
    /// Extract an id from a JSON value. Only integers and strings qualify;
    /// fractional numbers are not ids.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_u64().map(Self::UInt)),
            Value::String(s) => Some(Self::Str(s.clone())),
            _ => None,
        }
    }

    /// The id as it appears inside a list response, for membership checks.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Int(n) => Value::from(*n),
            Self::UInt(n) => Value::from(*n),
            Self::Str(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::UInt(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

/// A full entity record as returned by the backend.
///
/// The JSON object is kept verbatim (including keys this crate does not know
/// about, such as `fileName`) so equality is exact full-record equality.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity(Map<String, Value>);

impl Entity {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn id(&self) -> Option<EntityId> {
        self.0.get("id").and_then(EntityId::from_json)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Name of the attached file as reported by the backend, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.0
            .get("fileName")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
    }

    /// Decode the tracked fields. Extra keys are ignored.
    pub fn fields(&self) -> serde_json::Result<EntityFields> {
        serde_json::from_value(Value::Object(self.0.clone()))
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Entity {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
