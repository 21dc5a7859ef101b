use super::{lan_client::client_tags, CollectorError, MetricCollector};
use crate::{context::SharedContext, measurement::Measurement};
use async_trait::async_trait;
use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use peplink::{ClientWeight, PeplinkApi, UsagePeriod};
use std::time::Duration;
use tracing::{debug, instrument, warn};

const REFRESH_RATE: Duration = Duration::from_secs(30);

/// The calendar month containing a given instant, in local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    start: NaiveDate,
    next: NaiveDate,
}

impl MonthWindow {
    pub fn containing<T: TimeZone>(now: &chrono::DateTime<T>) -> Self {
        let today = now.date_naive();
        let start = NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today);
        let next = if start.month() == 12 {
            NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
        }
        .unwrap_or(start);

        Self { start, next }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start.and_time(chrono::NaiveTime::MIN)
    }

    /// Last second of the month.
    pub fn end(&self) -> NaiveDateTime {
        self.next.and_time(chrono::NaiveTime::MIN) - ChronoDuration::seconds(1)
    }

    /// Key the appliance files this month's usage under.
    pub fn key(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }
}

/// Month-to-date upload/download per LAN client.
#[derive(Debug, Clone, Copy, Default)]
pub struct LanClientUsageCollector;

impl LanClientUsageCollector {
    pub fn new() -> Self {
        Self
    }

    /// Names are normally cached by the live client collector; on a cold
    /// start a lite listing is enough to label this collector's output.
    async fn seed_hostnames(
        &self,
        api: &dyn PeplinkApi,
        context: &mut SharedContext,
    ) -> Result<(), CollectorError> {
        let clients = api.client_status(ClientWeight::Lite, false).await?.list;
        for client in &clients {
            if let Some(name) = client.hostname() {
                context.record_hostname(client.mac.as_str(), name);
            }
        }
        debug!(clients = clients.len(), "Seeded hostname cache");
        Ok(())
    }

    async fn time_zone(
        &self,
        api: &dyn PeplinkApi,
        context: &mut SharedContext,
    ) -> Result<Tz, CollectorError> {
        if let Some(tz) = context.time_zone() {
            return Ok(tz);
        }

        let config = api.time_config().await?;
        match config.time_zone.as_deref().filter(|zone| !zone.is_empty()) {
            Some(zone) => match zone.parse::<Tz>() {
                Ok(tz) => Ok(context.resolve_time_zone(tz)),
                Err(err) => {
                    warn!(zone, error = %err, "Unknown device time zone, using UTC");
                    Ok(Tz::UTC)
                }
            },
            None => {
                warn!("Device reported no time zone, using UTC");
                Ok(Tz::UTC)
            }
        }
    }
}

#[async_trait]
impl MetricCollector for LanClientUsageCollector {
    fn name(&self) -> &'static str {
        "lan_client_usage"
    }

    fn refresh_rate(&self) -> Duration {
        REFRESH_RATE
    }

    #[instrument(skip_all, name = "lan_client_usage")]
    async fn update(
        &self,
        api: &dyn PeplinkApi,
        context: &mut SharedContext,
    ) -> Result<Vec<Measurement>, CollectorError> {
        if !context.has_hostnames() {
            self.seed_hostnames(api, context).await?;
        }

        let tz = self.time_zone(api, context).await?;
        let window = MonthWindow::containing(&Utc::now().with_timezone(&tz));
        let mut usage = api
            .client_bandwidth_usage(UsagePeriod::Monthly, window.start(), Some(window.end()))
            .await?;

        let Some(entries) = usage.monthly.remove(&window.key()) else {
            debug!(month = %window.key(), "No usage recorded for this month yet");
            return Ok(Vec::new());
        };

        Ok(entries
            .into_iter()
            .map(|entry| {
                let tags = client_tags(&entry.ip, &entry.mac, context.hostname(&entry.mac));
                Measurement::new("client.usage", tags)
                    .with_field("upload", entry.upload)
                    .with_field("download", entry.download)
            })
            .collect())
    }
}

#[cfg(test)]
mod lan_client_usage_tests {
    use super::*;
    use crate::{
        measurement::{FieldValue, TagValue},
        testing::FakeApi,
    };
    use serde_json::json;

    fn current_key() -> String {
        MonthWindow::containing(&Utc::now()).key()
    }

    #[test]
    fn month_window_bounds() {
        let now = Tz::America__Chicago
            .with_ymd_and_hms(2024, 2, 17, 9, 30, 0)
            .unwrap();
        let window = MonthWindow::containing(&now);

        assert_eq!(window.key(), "2024-02-01");
        assert_eq!(window.start().to_string(), "2024-02-01 00:00:00");
        assert_eq!(window.end().to_string(), "2024-02-29 23:59:59");
    }

    #[test]
    fn month_window_uses_local_date() {
        // 02:00 UTC on March 1st is still February in Chicago.
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 2, 0, 0).unwrap();
        assert_eq!(MonthWindow::containing(&now).key(), "2024-03-01");
        assert_eq!(
            MonthWindow::containing(&now.with_timezone(&Tz::America__Chicago)).key(),
            "2024-02-01"
        );
    }

    #[test]
    fn december_rolls_into_next_year() {
        let now = Utc.with_ymd_and_hms(2023, 12, 31, 23, 0, 0).unwrap();
        let window = MonthWindow::containing(&now);
        assert_eq!(window.end().to_string(), "2023-12-31 23:59:59");
    }

    #[tokio::test]
    async fn seeds_names_and_reports_usage() {
        let mut monthly = serde_json::Map::new();
        monthly.insert(
            current_key(),
            json!([
                { "mac": "AA:AA:AA:AA:AA:01", "ip": "192.168.50.10", "upload": 10, "download": 200 },
                { "mac": "AA:AA:AA:AA:AA:02", "ip": "192.168.50.11", "upload": 1, "download": 2 }
            ]),
        );
        let api = FakeApi::new()
            .with_lite_clients(json!({
                "list": [
                    { "mac": "AA:AA:AA:AA:AA:01", "ip": "192.168.50.10", "name": "laptop" },
                    { "mac": "AA:AA:AA:AA:AA:02", "ip": "192.168.50.11" }
                ]
            }))
            .with_time_config(json!({ "timeZone": "UTC" }))
            .with_usage(json!({ "monthly": monthly }));
        let mut context = SharedContext::new();

        let measurements = LanClientUsageCollector::new()
            .update(&api, &mut context)
            .await
            .unwrap();

        assert_eq!(measurements.len(), 2);
        assert!(measurements.iter().all(|m| m.name() == "client.usage"));
        assert_eq!(measurements[0].tag("name"), Some(&TagValue::from("laptop")));
        assert_eq!(measurements[0].field("download"), Some(&FieldValue::Float(200.0)));
        assert_eq!(measurements[1].tag("name"), None);
        assert_eq!(context.time_zone(), Some(Tz::UTC));
    }

    #[tokio::test]
    async fn empty_month_is_not_an_error() {
        let api = FakeApi::new()
            .with_time_config(json!({ "timeZone": "Europe/London" }))
            .with_usage(json!({ "monthly": {} }));
        let mut context = SharedContext::new();
        context.record_hostname("AA:AA:AA:AA:AA:01", "laptop");

        let measurements = LanClientUsageCollector::new()
            .update(&api, &mut context)
            .await
            .unwrap();

        assert!(measurements.is_empty());
        assert_eq!(api.calls("client_status"), 0);
    }

    #[tokio::test]
    async fn time_zone_is_fetched_once() {
        let api = FakeApi::new()
            .with_time_config(json!({ "timeZone": "Asia/Tokyo" }))
            .with_usage(json!({ "monthly": {} }));
        let mut context = SharedContext::new();
        context.record_hostname("AA:AA:AA:AA:AA:01", "laptop");
        let collector = LanClientUsageCollector::new();

        collector.update(&api, &mut context).await.unwrap();
        collector.update(&api, &mut context).await.unwrap();

        assert_eq!(api.calls("time_config"), 1);
        assert_eq!(context.time_zone(), Some(Tz::Asia__Tokyo));
    }

    #[tokio::test]
    async fn blank_time_zone_is_retried() {
        let api = FakeApi::new()
            .with_time_config(json!({ "timeZone": "" }))
            .with_usage(json!({ "monthly": {} }));
        let mut context = SharedContext::new();
        context.record_hostname("AA:AA:AA:AA:AA:01", "laptop");
        let collector = LanClientUsageCollector::new();

        collector.update(&api, &mut context).await.unwrap();
        collector.update(&api, &mut context).await.unwrap();

        assert_eq!(api.calls("time_config"), 2);
        assert_eq!(context.time_zone(), None);
    }
}
