//! Runtime settings for the monitor.
//!
//! Settings are read from an INI file (sections `[peplink]`, `[influxdb]` and
//! `[monitor]`) and can be overridden from the environment, e.g.
//! `PEPLINK_MONITOR__INFLUXDB__HOST=db.local`.

use config::{Config, ConfigError, Environment, File, FileFormat};
use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};
use thiserror::Error;
use typed_builder::TypedBuilder;
use url::Url;

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "PEPLINK_MONITOR";

/// Default InfluxDB HTTP port.
pub const DEFAULT_INFLUX_PORT: u16 = 8086;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("Invalid peplink url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Credentials and endpoint of the Peplink appliance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, CopyGetters, TypedBuilder)]
pub struct PeplinkSettings {
    #[getset(get = "pub")]
    url: String,
    #[getset(get = "pub")]
    client_id: String,
    #[getset(get = "pub")]
    client_secret: String,
    /// Appliances ship self-signed certificates, so verification is opt-in.
    #[serde(default)]
    #[builder(default)]
    #[getset(get_copy = "pub")]
    verify_certificates: bool,
}

impl PeplinkSettings {
    pub fn parsed_url(&self) -> Result<Url, SettingsError> {
        Url::parse(&self.url).map_err(|source| SettingsError::InvalidUrl {
            url: self.url.clone(),
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, CopyGetters, TypedBuilder)]
pub struct InfluxSettings {
    #[getset(get = "pub")]
    host: String,
    #[serde(default = "default_influx_port")]
    #[builder(default = DEFAULT_INFLUX_PORT)]
    #[getset(get_copy = "pub")]
    port: u16,
    #[serde(default)]
    #[builder(default)]
    #[getset(get = "pub")]
    username: String,
    #[serde(default)]
    #[builder(default)]
    #[getset(get = "pub")]
    password: String,
    #[getset(get = "pub")]
    database: String,
    #[serde(default = "default_retention_policy")]
    #[builder(default = default_retention_policy())]
    #[getset(get = "pub")]
    retention_policy: String,
    #[serde(default = "default_retention_duration")]
    #[builder(default = default_retention_duration())]
    #[getset(get = "pub")]
    retention_duration: String,
}

impl InfluxSettings {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct MonitorSettings {
    /// Seconds to sleep between polling cycles.
    #[serde(default = "default_interval")]
    #[builder(default = default_interval())]
    interval: u64,
}

impl MonitorSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval: default_interval(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, TypedBuilder)]
#[getset(get = "pub")]
pub struct Settings {
    peplink: PeplinkSettings,
    influxdb: InfluxSettings,
    #[serde(default)]
    #[builder(default)]
    monitor: MonitorSettings,
}

impl Settings {
    /// Load settings from an INI file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_string_lossy().into_owned();
        let settings = Config::builder()
            .add_source(File::new(&path, FileFormat::Ini).required(true))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize::<Settings>()?;

        settings.peplink.parsed_url()?;
        Ok(settings)
    }
}

fn default_influx_port() -> u16 {
    DEFAULT_INFLUX_PORT
}

fn default_retention_policy() -> String {
    "1yr".to_string()
}

fn default_retention_duration() -> String {
    "365d".to_string()
}

fn default_interval() -> u64 {
    1
}
