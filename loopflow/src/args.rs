use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

pub const DEFAULT_DURATION_SECS: u64 = 120;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 1;
pub const DEFAULT_EXPORT_PATH: &str = "benign_flows.csv";

#[derive(Debug, Parser)]
#[clap(author, version, about)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Load capture and output options from a configuration file instead
    #[clap(long)]
    pub config_file: Option<String>,

    /// Capture and flow expiration options
    #[clap(flatten)]
    pub config: ExportConfig,

    /// Output method
    #[clap(flatten)]
    pub output: OutputConfig,
}

#[derive(Debug, Subcommand, Clone, Serialize, Deserialize)]
pub enum Commands {
    /// Capture live traffic and extract flow features
    Realtime {
        /// The network interface to capture packets from
        #[clap(default_value = "lo")]
        interface: String,
    },

    /// Replay a whole pcap file, expiring flows on packet time
    Pcap {
        /// The relative path to the pcap file
        path: String,
    },
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// How long to capture live traffic in seconds, 0 stops right away. A pcap replay always runs to the end
    #[clap(short, long, default_value_t = DEFAULT_DURATION_SECS)]
    pub duration: u64,

    /// The maximum time with no packets for a flow in seconds
    #[clap(long, default_value_t = DEFAULT_IDLE_TIMEOUT_SECS)]
    pub idle_timeout: u64,

    /// How often idle flows are swept, in seconds
    #[clap(long, default_value_t = DEFAULT_SWEEP_INTERVAL_SECS)]
    pub sweep_interval: u64,

    /// Merge reply packets into the flow of the opposite direction
    #[clap(long, action = clap::ArgAction::SetTrue)]
    pub bidirectional: bool,
}

impl ExportConfig {
    /// Rejects settings under which no session can run.
    pub fn validate(&self) -> Result<()> {
        if self.idle_timeout == 0 {
            return Err(SessionError::Config(
                "idle timeout must be greater than 0".to_string(),
            ));
        }
        if self.sweep_interval == 0 {
            return Err(SessionError::Config(
                "sweep interval must be greater than 0".to_string(),
            ));
        }
        for (name, seconds) in [
            ("duration", self.duration),
            ("idle timeout", self.idle_timeout),
            ("sweep interval", self.sweep_interval),
        ] {
            if i64::try_from(Duration::from_secs(seconds).as_micros()).is_err() {
                return Err(SessionError::Config(format!(
                    "{} of {} seconds is out of range",
                    name, seconds
                )));
            }
        }
        Ok(())
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            duration: DEFAULT_DURATION_SECS,
            idle_timeout: DEFAULT_IDLE_TIMEOUT_SECS,
            sweep_interval: DEFAULT_SWEEP_INTERVAL_SECS,
            bidirectional: false,
        }
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output method
    #[clap(short, long, value_enum, default_value_t = ExportMethodType::Csv)]
    pub output: ExportMethodType,

    /// File path for output (used if method is Csv), appended to when it exists
    #[clap(long, default_value = DEFAULT_EXPORT_PATH)]
    pub export_path: String,
}

impl OutputConfig {
    pub fn validate(&self) -> Result<()> {
        if self.output == ExportMethodType::Csv && self.export_path.trim().is_empty() {
            return Err(SessionError::Config(
                "an export path is required for CSV output".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            output: ExportMethodType::Csv,
            export_path: DEFAULT_EXPORT_PATH.to_string(),
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportMethodType {
    /// The output will be printed to the console
    Print,

    /// The output will be written to a CSV file
    Csv,
}

/// Options loaded from a configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub config: ExportConfig,
    pub output: OutputConfig,
}
