use parking_lot::RwLock;
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub type SharedArray = Arc<RwLock<Vec<Payload>>>;
pub type SharedObject = Arc<RwLock<BTreeMap<String, Payload>>>;

/// Structured data attached to a log call or carried by an exception.
///
/// Containers are shared handles, so a payload may reference itself (directly
/// or through a nested child). Consumers never walk a payload directly: they go
/// through [`crate::sanitizer::decycle`], which turns the graph into a finite
/// `serde_json::Value` tree.
///
/// `Undefined` stands for "no value"; keys holding it are dropped on the way
/// out, while `Null` is kept.
#[derive(Clone, Default)]
pub enum Payload {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(SharedArray),
    Object(SharedObject),
}

impl Payload {
    /// An empty object.
    pub fn object() -> Self {
        Payload::Object(Arc::new(RwLock::new(BTreeMap::new())))
    }

    /// An empty array.
    pub fn array() -> Self {
        Payload::Array(Arc::new(RwLock::new(Vec::new())))
    }

    /// Builder-style insert; no-op on anything but an object.
    #[must_use]
    pub fn with(self, key: impl Into<String>, value: impl Into<Payload>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts a key through the shared handle. Returns `false` if `self` is not an object.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Payload>) -> bool {
        match self {
            Payload::Object(map) => {
                map.write().insert(key.into(), value.into());
                true
            }
            _ => false,
        }
    }

    /// Appends through the shared handle. Returns `false` if `self` is not an array.
    pub fn push(&self, value: impl Into<Payload>) -> bool {
        match self {
            Payload::Array(items) => {
                items.write().push(value.into());
                true
            }
            _ => false,
        }
    }

    /// Returns a handle to the value stored under `key`, if `self` is an object.
    pub fn get(&self, key: &str) -> Option<Payload> {
        match self {
            Payload::Object(map) => map.read().get(key).cloned(),
            _ => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Payload::Undefined)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Payload::Object(_))
    }

    /// Snapshot of an object's entries; `None` for non-objects.
    pub fn entries(&self) -> Option<Vec<(String, Payload)>> {
        match self {
            Payload::Object(map) => Some(
                map.read()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Identity of the underlying container, used for cycle detection.
    pub(crate) fn container_id(&self) -> Option<usize> {
        match self {
            Payload::Array(items) => Some(Arc::as_ptr(items) as *const () as usize),
            Payload::Object(map) => Some(Arc::as_ptr(map) as *const () as usize),
            _ => None,
        }
    }

    /// Finite JSON rendering; cycles become `$ref` markers.
    pub fn to_json(&self) -> Value {
        crate::sanitizer::decycle(self)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Undefined => f.write_str("Undefined"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Payload::Null,
            Value::Bool(b) => Payload::Bool(b),
            Value::Number(n) => Payload::Number(n),
            Value::String(s) => Payload::String(s),
            Value::Array(items) => Payload::Array(Arc::new(RwLock::new(
                items.into_iter().map(Payload::from).collect(),
            ))),
            Value::Object(map) => Payload::Object(Arc::new(RwLock::new(
                map.into_iter().map(|(k, v)| (k, Payload::from(v))).collect(),
            ))),
        }
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::String(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::String(value)
    }
}

impl From<bool> for Payload {
    fn from(value: bool) -> Self {
        Payload::Bool(value)
    }
}

impl From<i64> for Payload {
    fn from(value: i64) -> Self {
        Payload::Number(value.into())
    }
}

impl From<u64> for Payload {
    fn from(value: u64) -> Self {
        Payload::Number(value.into())
    }
}

impl From<i32> for Payload {
    fn from(value: i32) -> Self {
        Payload::Number(value.into())
    }
}

impl From<u16> for Payload {
    fn from(value: u16) -> Self {
        Payload::Number(value.into())
    }
}

impl From<f64> for Payload {
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(Payload::Null, Payload::Number)
    }
}

impl<T: Into<Payload>> From<Option<T>> for Payload {
    fn from(value: Option<T>) -> Self {
        value.map_or(Payload::Undefined, Into::into)
    }
}

impl<T: Into<Payload>> From<Vec<T>> for Payload {
    fn from(values: Vec<T>) -> Self {
        Payload::Array(Arc::new(RwLock::new(
            values.into_iter().map(Into::into).collect(),
        )))
    }
}
