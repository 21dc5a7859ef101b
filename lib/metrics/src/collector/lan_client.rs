use super::{ensure_unit, CollectorError, MetricCollector};
use crate::{
    context::SharedContext,
    measurement::{push_observed, Measurement, TagValue, Tags},
};
use async_trait::async_trait;
use peplink::{model::Client, ClientWeight, PeplinkApi};
use std::time::Duration;
use tracing::instrument;

const REFRESH_RATE: Duration = Duration::from_secs(1);

/// Tags identifying a LAN client: `ip`, `mac`, and `name` when known.
pub(crate) fn client_tags(ip: &str, mac: &str, name: Option<&str>) -> Tags {
    let mut tags = Tags::new();
    tags.insert("ip".to_string(), TagValue::from(ip));
    tags.insert("mac".to_string(), TagValue::from(mac));
    if let Some(name) = name {
        tags.insert("name".to_string(), TagValue::from(name));
    }
    tags
}

/// Live signal and speed of every active LAN client.
#[derive(Debug, Clone, Copy, Default)]
pub struct LanClientCollector;

impl LanClientCollector {
    pub fn new() -> Self {
        Self
    }

    fn client_measurements(
        &self,
        client: &Client,
        context: &mut SharedContext,
    ) -> Result<Vec<Measurement>, CollectorError> {
        let name = client.hostname();
        if let Some(name) = name {
            context.record_hostname(client.mac.as_str(), name);
        }
        let tags = client_tags(&client.ip, &client.mac, name);

        let mut measurements = Vec::with_capacity(2);
        if client.is_wireless() {
            if let Some(signal) = &client.signal {
                push_observed(
                    &mut measurements,
                    Measurement::from_json_fields("client.signal", tags.clone(), signal),
                );
            }
        }

        let Some(speed) = &client.speed else {
            return Err(CollectorError::MissingField {
                quantity: "client speed",
            });
        };
        ensure_unit("client speed", "kbps", &speed.unit)?;
        measurements.push(
            Measurement::new("client.speed", tags)
                .with_field("upload", speed.upload)
                .with_field("download", speed.download),
        );

        Ok(measurements)
    }
}

#[async_trait]
impl MetricCollector for LanClientCollector {
    fn name(&self) -> &'static str {
        "lan_client"
    }

    fn refresh_rate(&self) -> Duration {
        REFRESH_RATE
    }

    #[instrument(skip_all, name = "lan_client")]
    async fn update(
        &self,
        api: &dyn PeplinkApi,
        context: &mut SharedContext,
    ) -> Result<Vec<Measurement>, CollectorError> {
        let clients = api.client_status(ClientWeight::Full, true).await?.list;

        let mut measurements = Vec::with_capacity(clients.len() * 2);
        for client in &clients {
            measurements.extend(self.client_measurements(client, context)?);
        }

        Ok(measurements)
    }
}
