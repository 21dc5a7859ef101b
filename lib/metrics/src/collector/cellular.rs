//! Cellular radio state: serving network, band and signal quality per link.

use super::{CollectorError, MetricCollector};
use crate::{
    context::{ActiveCell, SharedContext},
    measurement::{push_observed, FieldValue, Measurement},
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use peplink::{
    model::{Cellular, NetworkCode, Rat, WanId},
    PeplinkApi,
};
use regex::Regex;
use serde_json::{Map, Value};
use std::{collections::BTreeMap, time::Duration};
use tracing::{debug, error, instrument};

const REFRESH_RATE: Duration = Duration::from_secs(1);

/// `LTE Band 3 (1800 MHz)`, `WCDMA Band 5 (850 MHz)`, `LTE Band 66 (AWS-3 1700/2100 MHz)`.
static BAND_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:LTE|WCDMA) Band (\d+) \((?:[^)]*\s)?(\d+)(?:/\d+)? MHz\)$")
        .expect("band name pattern is valid")
});

/// Numeric generation score of a data technology.
pub fn generation(technology: &str) -> Option<f64> {
    match technology {
        "5G" => Some(5.0),
        "LTE-A" => Some(4.5),
        "LTE" => Some(4.0),
        "HSPA" => Some(3.5),
        "UMTS" => Some(3.0),
        "EGPRS" => Some(2.5),
        "GPRS" => Some(2.0),
        _ => None,
    }
}

/// Band number and (first) carrier frequency in MHz parsed from a band name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandInfo {
    pub band: u32,
    pub frequency: u32,
}

pub fn parse_band_name(name: &str) -> Option<BandInfo> {
    let captures = BAND_NAME.captures(name)?;
    Some(BandInfo {
        band: captures[1].parse().ok()?,
        frequency: captures[2].parse().ok()?,
    })
}

/// Per-band signal layouts reported by the appliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignalSchema {
    /// LTE style, identified by `sinr`.
    Lte,
    /// UMTS/WCDMA style, identified by `ecio`.
    Legacy,
}

impl SignalSchema {
    fn detect(signal: &Map<String, Value>) -> Option<Self> {
        if signal.contains_key("sinr") {
            Some(SignalSchema::Lte)
        } else if signal.contains_key("ecio") {
            Some(SignalSchema::Legacy)
        } else {
            None
        }
    }

    fn metrics(self) -> &'static [&'static str] {
        match self {
            SignalSchema::Lte => &["rsrp", "rsrq", "rssi", "sinr"],
            SignalSchema::Legacy => &["rssi", "ecio", "rscp"],
        }
    }
}

/// What one pass over every reported band yields.
#[derive(Debug, Default, PartialEq)]
struct BandScan {
    /// Lowest band number seen; lower bands are the more significant cells.
    band: Option<u32>,
    /// Lowest frequency seen, independently of `band`.
    frequency: Option<u32>,
    /// Bands that exposed a recognised signal schema.
    connections: u32,
    /// Strongest reading per metric across bands.
    signal: BTreeMap<&'static str, f64>,
}

impl BandScan {
    fn scan(rats: &[Rat]) -> Self {
        let mut scan = BandScan::default();
        for band in rats.iter().flat_map(|rat| rat.band.iter()) {
            match parse_band_name(&band.name) {
                Some(info) => {
                    scan.band = Some(scan.band.map_or(info.band, |b| b.min(info.band)));
                    scan.frequency = Some(
                        scan.frequency
                            .map_or(info.frequency, |f| f.min(info.frequency)),
                    );
                }
                None => error!(band = ?band, "Unknown band name"),
            }

            match &band.signal {
                None => {}
                Some(Value::Object(signal)) => scan.record_signal(signal),
                Some(other) => error!(signal = ?other, "Band signal is not an object"),
            }
        }
        scan
    }

    fn record_signal(&mut self, signal: &Map<String, Value>) {
        let Some(schema) = SignalSchema::detect(signal) else {
            error!(signal = ?signal, "No sinr/ecio in band signal");
            return;
        };

        self.connections += 1;
        for &metric in schema.metrics() {
            let Some(value) = signal.get(metric) else {
                continue;
            };
            let Some(reading) = value.as_f64() else {
                error!(metric, value = ?value, "Non-numeric band signal reading");
                continue;
            };
            self.signal
                .entry(metric)
                .and_modify(|best| *best = best.max(reading))
                .or_insert(reading);
        }
    }
}

/// Emits `cellular.network` and `cellular.signal` for every connected
/// cellular link, and records the link's active SIM in the shared context.
#[derive(Debug, Clone, Copy, Default)]
pub struct CellularCollector;

impl CellularCollector {
    pub fn new() -> Self {
        Self
    }

    fn link_measurements(
        &self,
        wan: WanId,
        cellular: &Cellular,
        context: &mut SharedContext,
    ) -> Vec<Measurement> {
        let cell = ActiveCell::new(wan, cellular.active_iccid());

        let Some(mcc) = &cellular.mcc else {
            debug!(wan, "Cellular link not connected");
            context.record_active_cell(cell);
            return Vec::new();
        };

        let cell = cell.with_network(
            network_code(wan, "mcc", Some(mcc)),
            network_code(wan, "mnc", cellular.mnc.as_ref()),
            cellular.carrier.as_ref().and_then(|carrier| carrier.name.clone()),
        );
        let tags = cell.tags();
        context.record_active_cell(cell);

        let mut network = Measurement::new("cellular.network", tags.clone());
        if let Some(technology) = cellular.technology() {
            network.insert_field("technology", technology);
            match generation(technology) {
                Some(score) => network.insert_field("generation", score),
                None => error!(wan, technology, "Unknown dataTechnology"),
            }
        }

        let scan = BandScan::scan(&cellular.rat);
        if let Some(band) = scan.band {
            network.insert_field("band", band);
        }
        if let Some(frequency) = scan.frequency {
            network.insert_field("frequency", frequency);
        }

        let mut signal = Measurement::new("cellular.signal", tags);
        if let Some(level) = cellular.signal_level.as_ref().and_then(FieldValue::from_json) {
            signal.insert_field("level", level);
        }
        if scan.connections > 0 {
            signal.insert_field("connections", scan.connections);
        }
        for (metric, reading) in scan.signal {
            signal.insert_field(metric, reading);
        }

        let mut measurements = Vec::with_capacity(2);
        push_observed(&mut measurements, network);
        push_observed(&mut measurements, signal);
        measurements
    }
}

fn network_code(wan: WanId, key: &'static str, code: Option<&NetworkCode>) -> Option<u32> {
    let code = code?;
    let value = code.value();
    if value.is_none() {
        error!(wan, key, code = ?code, "Unparseable network code");
    }
    value
}

#[async_trait]
impl MetricCollector for CellularCollector {
    fn name(&self) -> &'static str {
        "cellular"
    }

    fn refresh_rate(&self) -> Duration {
        REFRESH_RATE
    }

    #[instrument(skip_all, name = "cellular")]
    async fn update(
        &self,
        api: &dyn PeplinkApi,
        context: &mut SharedContext,
    ) -> Result<Vec<Measurement>, CollectorError> {
        let status = api.wan_status().await?;
        let mut measurements = Vec::new();

        for (wan, link) in status.iter() {
            let link = match link {
                Some(Ok(link)) => link,
                Some(Err(err)) => {
                    error!(wan, error = %err, "Malformed WAN link status");
                    continue;
                }
                None => {
                    error!(wan, "WAN link listed without status");
                    continue;
                }
            };
            if !link.is_cellular() {
                continue;
            }

            let cellular = link.cellular.unwrap_or_default();
            measurements.extend(self.link_measurements(wan, &cellular, context));
        }

        Ok(measurements)
    }
}
