mod args;
mod capture;
mod classifier;
mod error;
mod flow_table;
mod flows;
mod output;
mod packet_features;
mod session;
mod sweeper;

use anyhow::Context;
use args::{Cli, Commands, ConfigFile, ExportMethodType};
use capture::PcapSource;
use clap::Parser;
use log::{error, info};
use output::OutputWriter;
use session::{CaptureSession, SweepClock};
use tokio::signal;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // If a config file is provided, it replaces the capture and output flags
    let config = if let Some(config_path) = cli.config_file {
        match confy::load_path::<ConfigFile>(&config_path) {
            Ok(cfg_file) => cfg_file,
            Err(e) => {
                error!("Error loading configuration file: {:?}", e);
                std::process::exit(1);
            }
        }
    } else {
        ConfigFile {
            config: cli.config,
            output: cli.output,
        }
    };

    if let Err(e) = run_with_config(cli.command, config).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run_with_config(command: Commands, config: ConfigFile) -> anyhow::Result<()> {
    config.output.validate()?;
    let session = CaptureSession::new(&config.config)?;

    let (source, clock) = match command {
        Commands::Realtime { interface } => (
            PcapSource::live(&interface)
                .with_context(|| format!("cannot capture on interface {}", interface))?,
            SweepClock::WallClock,
        ),
        Commands::Pcap { path } => (
            PcapSource::offline(&path).with_context(|| format!("cannot open {}", path))?,
            SweepClock::PacketTime,
        ),
    };

    let stop = session.stop_signal();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, stopping capture...");
                stop.trigger();
            }
            Err(e) => error!("Unable to listen for Ctrl-C: {}", e),
        }
    });

    let output_writer = OutputWriter::new(config.output.output, &config.output.export_path);
    let summary = session.run(source, output_writer, clock).await?;

    if summary.is_empty() {
        error!("No flows captured! Make sure traffic is generated and the interface is correct.");
    } else if config.output.output == ExportMethodType::Print {
        info!("Printed {} flows", summary.flows_written);
    } else if summary.appended_to_existing {
        info!(
            "Added {} flows to the existing dataset '{}'",
            summary.flows_written, config.output.export_path
        );
    } else {
        info!(
            "Created new dataset '{}' with {} flows",
            config.output.export_path, summary.flows_written
        );
    }

    Ok(())
}
