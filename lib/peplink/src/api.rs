use crate::{
    error::Result,
    model::{ClientStatus, ClientUsage, TimeConfig, TrafficStatus, WanStatus},
};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::sync::Arc;

/// How much detail `status.client` returns per client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientWeight {
    Lite,
    Full,
}

impl ClientWeight {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientWeight::Lite => "lite",
            ClientWeight::Full => "full",
        }
    }
}

/// Aggregation period for client bandwidth usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsagePeriod {
    Monthly,
}

impl UsagePeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsagePeriod::Monthly => "monthly",
        }
    }
}

/// The appliance status calls the collectors consume.
///
/// Timestamps are wall-clock times in the appliance's own time zone.
#[async_trait]
pub trait PeplinkApi: Send + Sync {
    async fn wan_status(&self) -> Result<WanStatus>;

    async fn client_status(&self, weight: ClientWeight, active_only: bool) -> Result<ClientStatus>;

    async fn client_bandwidth_usage(
        &self,
        period: UsagePeriod,
        from: NaiveDateTime,
        to: Option<NaiveDateTime>,
    ) -> Result<ClientUsage>;

    async fn traffic_status(&self) -> Result<TrafficStatus>;

    async fn time_config(&self) -> Result<TimeConfig>;
}

/// A reference-counted reference to a [`PeplinkApi`].
pub type PeplinkApiRef = Arc<dyn PeplinkApi>;
