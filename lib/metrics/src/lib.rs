//! Poll-and-transform engine: collectors turn appliance telemetry into
//! [`Measurement`]s and the [`Monitor`] schedules them and writes each batch.

pub mod collector;
pub mod context;
pub mod manager;
pub mod measurement;
pub mod sink;

#[cfg(test)]
pub(crate) mod testing;

pub use collector::{CollectorError, MetricCollector};
pub use context::{ActiveCell, SharedContext};
pub use manager::{Monitor, MonitorError};
pub use measurement::{FieldValue, Measurement, TagValue, Tags};
pub use sink::{MeasurementSink, MeasurementSinkRef};
