use getset::Getters;
use serde::Serialize;
use serde_json::{Map, Value};
use std::{collections::BTreeMap, fmt};

/// Value of an indexed tag. Keep cardinality low: the sink indexes every tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum TagValue {
    Int(i64),
    Text(String),
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Int(value) => write!(f, "{}", value),
            TagValue::Text(value) => write!(f, "{}", value),
        }
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        TagValue::Text(value.to_string())
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        TagValue::Text(value)
    }
}

impl From<u32> for TagValue {
    fn from(value: u32) -> Self {
        TagValue::Int(i64::from(value))
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        TagValue::Int(value)
    }
}

/// An observed value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Text(String),
}

impl FieldValue {
    /// Scalars map onto a field; arrays, objects and `null` do not.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number
                .as_i64()
                .map(FieldValue::Int)
                .or_else(|| number.as_f64().map(FieldValue::Float)),
            Value::String(text) => Some(FieldValue::Text(text.clone())),
            Value::Bool(flag) => Some(FieldValue::Bool(*flag)),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::Int(i64::from(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

pub type Tags = BTreeMap<String, TagValue>;
pub type Fields = BTreeMap<String, FieldValue>;

/// A single time-series record: a name, identity tags and observed fields.
///
/// Measurements are assembled inside one collector invocation and are not
/// touched again once handed to the scheduler. A measurement without fields
/// carries no observation and is never written.
#[derive(Debug, Clone, PartialEq, Serialize, Getters)]
#[getset(get = "pub")]
pub struct Measurement {
    #[serde(rename = "measurement")]
    name: String,
    tags: Tags,
    fields: Fields,
}

impl Measurement {
    pub fn new(name: impl Into<String>, tags: Tags) -> Self {
        Self {
            name: name.into(),
            tags,
            fields: Fields::new(),
        }
    }

    /// Build a measurement whose fields are the scalar members of `object`.
    pub fn from_json_fields(name: impl Into<String>, tags: Tags, object: &Map<String, Value>) -> Self {
        let mut measurement = Self::new(name, tags);
        measurement.extend_from_json(object);
        measurement
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert_field(key, value);
        self
    }

    pub fn insert_field(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn extend_from_json(&mut self, object: &Map<String, Value>) {
        for (key, value) in object {
            if let Some(field) = FieldValue::from_json(value) {
                self.fields.insert(key.clone(), field);
            }
        }
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn tag(&self, key: &str) -> Option<&TagValue> {
        self.tags.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for (key, value) in &self.tags {
            write!(f, ",{}={}", key, value)?;
        }
        write!(f, " {} field(s)", self.fields.len())
    }
}

/// Push `measurement` unless it carries no fields.
pub(crate) fn push_observed(batch: &mut Vec<Measurement>, measurement: Measurement) {
    if !measurement.is_empty() {
        batch.push(measurement);
    }
}
