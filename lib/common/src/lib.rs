pub mod config;
pub mod util;

pub use config::{InfluxSettings, MonitorSettings, PeplinkSettings, Settings, SettingsError};
