use clap::{Parser, Subcommand};
use getset::Getters;
use std::path::PathBuf;

/// peplink-monitor: Republish Peplink appliance telemetry to InfluxDB
#[derive(Debug, Parser, Getters)]
#[command(name = "peplink-monitor")]
#[command(about = "Poll a Peplink appliance and write its state to InfluxDB", long_about = None)]
#[getset(get = "pub")]
pub struct Cli {
    /// Path to the INI configuration file
    #[arg(short, long, default_value = "config.ini")]
    config: PathBuf,
    /// Default log filter, overridden by RUST_LOG
    #[arg(short, long, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Run one diagnostic cycle, then poll forever
    Run,
    /// Run a single diagnostic cycle and exit
    Once,
}
