use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
use common::{util::trace::initialize_tracing, Settings};
use influx::InfluxClient;
use metrics::Monitor;
use peplink::PeplinkClient;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Cli::parse();
    initialize_tracing(args.log_level())?;

    let settings = Settings::load(args.config())
        .with_context(|| format!("Failed to load {}", args.config().display()))?;
    info!(config = %args.config().display(), "peplink-monitor started");

    let influx = InfluxClient::new(settings.influxdb());
    influx
        .prepare_database(
            settings.influxdb().retention_policy(),
            settings.influxdb().retention_duration(),
        )
        .await
        .context("Failed to prepare InfluxDB")?;

    let peplink = PeplinkClient::from_settings(settings.peplink())?;
    let mut monitor = Monitor::with_default_collectors(
        Arc::new(peplink),
        Arc::new(influx),
        settings.monitor().interval(),
    );

    // A failure here means the configuration is wrong; don't start polling.
    monitor
        .run_once(false)
        .await
        .context("Diagnostic polling cycle failed")?;
    if *args.command() == Commands::Once {
        return Ok(());
    }

    monitor.sleep().await;
    tokio::select! {
        _ = monitor.run_forever() => {}
        _ = signal::ctrl_c() => info!("Interrupted, shutting down"),
    }

    Ok(())
}
