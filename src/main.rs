use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use workplace_connector::{Config, Coordinator};

/// Workplace - monitoring connector for Biamp Workplace devices
#[derive(Parser)]
#[command(name = "workplace", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print account and organization statistics
    Stats,
    /// Print per-device statistics after one collection window
    Devices {
        /// Seconds to let the poller collect before printing
        #[arg(short, long, default_value = "5")]
        wait: u64,
    },
    /// Reboot a device
    Reboot {
        /// Device ID
        device_id: String,
    },
    /// Poll like a monitoring host until Ctrl-C
    Watch {
        /// Seconds between host calls
        #[arg(short, long, default_value = "60", value_parser = clap::value_parser!(u64).range(1..))]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,workplace_connector=info",
        1 => "info,workplace_connector=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;
    config.require_credentials()?;

    let coordinator = Coordinator::from_config(config)?;

    let result = match cli.command {
        Command::Stats => cmd_stats(&coordinator).await,
        Command::Devices { wait } => cmd_devices(&coordinator, Duration::from_secs(wait)).await,
        Command::Reboot { device_id } => cmd_reboot(&coordinator, &device_id).await,
        Command::Watch { interval } => cmd_watch(&coordinator, Duration::from_secs(interval)).await,
    };

    coordinator.shutdown().await;
    result
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn cmd_stats(coordinator: &Coordinator) -> anyhow::Result<()> {
    let stats = coordinator.get_statistics().await?;
    print_json(&stats)
}

async fn cmd_devices(coordinator: &Coordinator, wait: Duration) -> anyhow::Result<()> {
    // Statistics populate the device cache; the first aggregated call starts the poller
    coordinator.get_statistics().await?;
    coordinator.get_aggregated_devices().await?;

    tokio::time::sleep(wait).await;

    let devices = coordinator.get_aggregated_devices().await?;
    print_json(&devices)
}

async fn cmd_reboot(coordinator: &Coordinator, device_id: &str) -> anyhow::Result<()> {
    coordinator.get_statistics().await?;
    coordinator.control_device(device_id, "Reboot").await?;
    println!("reboot requested for {device_id}");
    Ok(())
}

async fn cmd_watch(coordinator: &Coordinator, interval: Duration) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, shutting down");
                return Ok(());
            }
            _ = ticker.tick() => {
                match coordinator.get_statistics().await {
                    Ok(stats) => print_json(&stats)?,
                    Err(e) => tracing::error!(error = %e, "statistics call failed"),
                }

                match coordinator.get_aggregated_devices().await {
                    Ok(devices) => print_json(&devices)?,
                    Err(e) => tracing::error!(error = %e, "device call failed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_rejects_zero_interval() {
        assert!(Cli::try_parse_from(["workplace", "watch", "--interval", "0"]).is_err());

        let cli = Cli::try_parse_from(["workplace", "watch", "-i", "5"]).unwrap();
        assert!(matches!(cli.command, Command::Watch { interval: 5 }));
    }
}
