use crate::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Identifier of a part.
///
/// Ids arrive from the backend as numbers, but anything string-typed is
/// accepted too. Comparison is strict: `Int(1)` and `Text("1")` differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Int(i64),
    Text(String),
}

impl EntityId {
    /// Read an id from a JSON value. Integral floats count as integers.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self::Int(i))
                } else {
                    let f = n.as_f64()?;
                    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                        Some(Self::Int(f as i64))
                    } else {
                        Some(Self::Text(n.to_string()))
                    }
                }
            }
            Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(i) => Value::from(*i),
            Self::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Parses digits as [`EntityId::Int`], anything else as text.
impl FromStr for EntityId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.parse::<i64>()
            .map_or_else(|_| Self::Text(s.to_string()), Self::Int))
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self::Text(id)
    }
}

/// A part as stored in a bucket.
///
/// The backend owns the schema, so this is an open JSON object. Fields the
/// core cares about (`id`, `category`, `amount`) have accessors; every other
/// field is carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity(Map<String, Value>);

impl Entity {
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wrap a JSON value, which must be an object.
    pub fn from_value(value: Value) -> ModelResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(ModelError::InvalidEntity(format!(
                "expected an object, got {other}"
            ))),
        }
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Builder-style field setter.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.to_string(), value.into())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    #[must_use]
    pub fn id(&self) -> Option<EntityId> {
        self.0.get("id").and_then(EntityId::from_value)
    }

    /// The bucket this part claims to belong to. Empty strings count as
    /// absent.
    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.get_str("category").filter(|c| !c.is_empty())
    }

    #[must_use]
    pub fn amount(&self) -> Option<u64> {
        self.0.get("amount").and_then(Value::as_u64)
    }
}

impl From<Entity> for Value {
    fn from(entity: Entity) -> Self {
        entity.into_value()
    }
}

impl TryFrom<Value> for Entity {
    type Error = ModelError;

    fn try_from(value: Value) -> ModelResult<Self> {
        Self::from_value(value)
    }
}

/// Id of a stored bucket element, if it is an object with an id.
pub(crate) fn id_of(value: &Value) -> Option<EntityId> {
    value.get("id").and_then(EntityId::from_value)
}
