//! InfluxDB line protocol encoding.
//!
//! `measurement[,tag=value...] field=value[,field=value...]`, one record per
//! line. No timestamp is written; the server stamps each point on arrival.

use metrics::{FieldValue, Measurement};
use std::fmt::Write;

/// Escape a measurement name: commas and spaces.
fn escape_measurement(name: &str) -> String {
    escape(name, &[',', ' '])
}

/// Escape a tag key, tag value or field key: commas, equals signs and spaces.
fn escape_key(key: &str) -> String {
    escape(key, &[',', '=', ' '])
}

fn escape(text: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn encode_field_value(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Float(value) if value.is_finite() => Some(value.to_string()),
        FieldValue::Float(_) => None,
        FieldValue::Int(value) => Some(format!("{}i", value)),
        FieldValue::Bool(value) => Some(value.to_string()),
        FieldValue::Text(value) => Some(format!(
            "\"{}\"",
            value.replace('\\', "\\\\").replace('"', "\\\"")
        )),
    }
}

/// Encode one measurement. `None` when no field is representable.
pub fn encode(measurement: &Measurement) -> Option<String> {
    let fields: Vec<String> = measurement
        .fields()
        .iter()
        .filter_map(|(key, value)| {
            encode_field_value(value).map(|value| format!("{}={}", escape_key(key), value))
        })
        .collect();
    if fields.is_empty() {
        return None;
    }

    let mut line = escape_measurement(measurement.name());
    for (key, value) in measurement.tags() {
        let value = value.to_string();
        if value.is_empty() {
            continue;
        }
        let _ = write!(line, ",{}={}", escape_key(key), escape_key(&value));
    }
    line.push(' ');
    line.push_str(&fields.join(","));
    Some(line)
}

/// Encode a batch, one line per measurement.
pub fn encode_batch(batch: &[Measurement]) -> String {
    batch
        .iter()
        .filter_map(encode)
        .collect::<Vec<_>>()
        .join("\n")
}
