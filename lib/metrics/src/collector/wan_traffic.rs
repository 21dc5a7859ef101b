use super::{ensure_unit, CollectorError, MetricCollector};
use crate::{
    context::SharedContext,
    measurement::{push_observed, Measurement, TagValue, Tags},
};
use async_trait::async_trait;
use peplink::{
    model::{TrafficGroup, WanId},
    PeplinkApi,
};
use std::time::Duration;
use tracing::{error, instrument};

const REFRESH_RATE: Duration = Duration::from_secs(1);

/// Per-link bandwidth and usage, plus the device's lifetime usage.
#[derive(Debug, Clone, Copy, Default)]
pub struct WanTrafficCollector;

impl WanTrafficCollector {
    pub fn new() -> Self {
        Self
    }

    /// `wan`, plus the active SIM's `iccid` when the link is cellular.
    fn link_tags(wan: WanId, context: &SharedContext) -> Tags {
        let mut tags = Tags::new();
        tags.insert("wan".to_string(), TagValue::from(wan));
        if let Some(iccid) = context.active_cell(wan).and_then(|cell| cell.iccid().as_deref()) {
            tags.insert("iccid".to_string(), TagValue::from(iccid));
        }
        tags
    }

    fn link_measurements(
        name: &str,
        group: &TrafficGroup,
        context: &SharedContext,
        measurements: &mut Vec<Measurement>,
    ) {
        for (wan, entry) in group.links.iter() {
            match entry {
                Some(Ok(entry)) => push_observed(
                    measurements,
                    Measurement::from_json_fields(name, Self::link_tags(wan, context), &entry.overall),
                ),
                Some(Err(err)) => error!(wan, measurement = name, error = %err, "Malformed traffic entry"),
                None => error!(wan, measurement = name, "WAN link listed without traffic entry"),
            }
        }
    }
}

#[async_trait]
impl MetricCollector for WanTrafficCollector {
    fn name(&self) -> &'static str {
        "wan_traffic"
    }

    fn refresh_rate(&self) -> Duration {
        REFRESH_RATE
    }

    #[instrument(skip_all, name = "wan_traffic")]
    async fn update(
        &self,
        api: &dyn PeplinkApi,
        context: &mut SharedContext,
    ) -> Result<Vec<Measurement>, CollectorError> {
        let stats = api.traffic_status().await?;
        ensure_unit("bandwidth", "kbps", &stats.bandwidth.unit)?;
        ensure_unit("traffic", "MB", &stats.traffic.unit)?;
        ensure_unit("lifetime traffic", "MB", &stats.lifetime.unit)?;

        let mut measurements = Vec::new();
        push_observed(
            &mut measurements,
            Measurement::from_json_fields("wan.lifetime_usage", Tags::new(), &stats.lifetime.all.overall),
        );
        Self::link_measurements("wan.speed", &stats.bandwidth, context, &mut measurements);
        Self::link_measurements("wan.usage", &stats.traffic, context, &mut measurements);

        Ok(measurements)
    }
}
