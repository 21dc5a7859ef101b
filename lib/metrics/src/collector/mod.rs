use crate::{context::SharedContext, measurement::Measurement};
use async_trait::async_trait;
use peplink::{ApiError, PeplinkApi};
use std::time::Duration;
use thiserror::Error;

pub mod cellular;
pub mod lan_client;
pub mod lan_client_usage;
pub mod wan_traffic;

pub use cellular::CellularCollector;
pub use lan_client::LanClientCollector;
pub use lan_client_usage::LanClientUsageCollector;
pub use wan_traffic::WanTrafficCollector;

/// Failures that abort one collector invocation. Everything else the
/// collectors encounter degrades to a logged error and missing fields.
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Unexpected unit for {quantity}: expected {expected}, found {found:?}")]
    UnexpectedUnit {
        quantity: &'static str,
        expected: &'static str,
        found: String,
    },

    #[error("Appliance omitted {quantity}")]
    MissingField { quantity: &'static str },

    #[error("Appliance request failed: {0}")]
    Api(#[from] ApiError),
}

/// A unit of polling work with its own refresh cadence.
#[async_trait]
pub trait MetricCollector: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Minimum time between two invocations.
    fn refresh_rate(&self) -> Duration;

    /// Poll the appliance once. The returned batch is final; the scheduler
    /// drains it before the next collector runs.
    async fn update(
        &self,
        api: &dyn PeplinkApi,
        context: &mut SharedContext,
    ) -> Result<Vec<Measurement>, CollectorError>;
}

/// Unit checks are contract checks: a mismatch fails the invocation.
pub(crate) fn ensure_unit(
    quantity: &'static str,
    expected: &'static str,
    found: &str,
) -> Result<(), CollectorError> {
    if found == expected {
        Ok(())
    } else {
        Err(CollectorError::UnexpectedUnit {
            quantity,
            expected,
            found: found.to_string(),
        })
    }
}
