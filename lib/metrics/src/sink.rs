use crate::measurement::Measurement;
use async_trait::async_trait;
use std::sync::Arc;

/// Destination for each cycle's batch of measurements.
#[async_trait]
pub trait MeasurementSink: Send + Sync {
    /// Write one batch. Either the whole batch is accepted or an error is returned.
    async fn write(&self, batch: &[Measurement]) -> anyhow::Result<()>;
}

/// A reference-counted reference to a [`MeasurementSink`].
pub type MeasurementSinkRef = Arc<dyn MeasurementSink>;
