//! # Readings and descriptors.
//!
//! A [`Reading`] is a value with its timestamp and alarm severity. Backends
//! produce typed readings (`Reading<f64>`, `Reading<String>`, ...); composites
//! merge them as JSON readings ([`Readings`]) so children of different value
//! types can share one map.

use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name-keyed readings, as returned by `read()`, in declaration order.
pub type Readings = IndexMap<String, Reading>;

/// Name-keyed descriptors, as returned by `describe()`, in declaration order.
pub type Descriptors = IndexMap<String, Descriptor>;

/// Seconds since the Unix epoch as a float.
pub fn timestamp_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// A value together with when it was taken and its alarm severity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading<T = Value> {
    /// The value.
    pub value: T,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    /// Alarm severity reported by the transport (`0` = no alarm).
    #[serde(default)]
    pub alarm_severity: i32,
}

impl<T> Reading<T> {
    /// A reading without alarm taken at `timestamp`.
    pub fn new(value: T, timestamp: f64) -> Self {
        Self {
            value,
            timestamp,
            alarm_severity: 0,
        }
    }

    /// A reading without alarm taken now.
    pub fn now(value: T) -> Self {
        Self::new(value, timestamp_now())
    }

    /// Attaches an alarm severity.
    #[must_use]
    pub fn with_severity(mut self, severity: i32) -> Self {
        self.alarm_severity = severity;
        self
    }
}

impl<T: Serialize> Reading<T> {
    /// Converts the value into JSON, keeping timestamp and severity.
    pub fn to_json(&self) -> Result<Reading, serde_json::Error> {
        Ok(Reading {
            value: serde_json::to_value(&self.value)?,
            timestamp: self.timestamp,
            alarm_severity: self.alarm_severity,
        })
    }
}

/// Metadata describing the values a key produces.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    /// Source address of the producing signal.
    pub source: String,
    /// One of `number`, `integer`, `string`, `boolean`, `array`, `object`, `null`.
    pub dtype: String,
    /// Array shape (empty for scalars).
    pub shape: Vec<usize>,
}

impl Descriptor {
    /// Derives a descriptor from a sample value.
    pub fn from_value(source: impl Into<String>, value: &Value) -> Self {
        let (dtype, shape) = match value {
            Value::Null => ("null", vec![]),
            Value::Bool(_) => ("boolean", vec![]),
            Value::Number(n) if n.is_f64() => ("number", vec![]),
            Value::Number(_) => ("integer", vec![]),
            Value::String(_) => ("string", vec![]),
            Value::Array(items) => ("array", vec![items.len()]),
            Value::Object(_) => ("object", vec![]),
        };
        Self {
            source: source.into(),
            dtype: dtype.to_string(),
            shape,
        }
    }
}
