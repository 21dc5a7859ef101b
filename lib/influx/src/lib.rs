//! InfluxDB 1.x sink for polled measurements.

pub mod client;
pub mod line_protocol;

pub use client::{InfluxClient, InfluxError};
