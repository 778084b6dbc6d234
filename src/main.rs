//! Command-line interface for retained-loadtest
//!
//! # Usage Examples
//!
//! ## Populate
//! ```bash
//! # Three brokers on one host, QoS 1, 500 msg/s per broker
//! retained-loadtest populate \
//!   --broker nuc1:10000,nuc1:10001,nuc1:10002 \
//!   --qos 1 --messages-per-second 500
//!
//! # Validate a configuration file without connecting
//! retained-loadtest populate --config config/retained-messages.yaml --dry-run
//! ```
//!
//! ## Topics
//! ```bash
//! retained-loadtest topics --max-depth 2 --values-per-level 3
//! retained-loadtest topics --max-depth 10 --values-per-level 10 --count-only
//! ```
//!
//! Ctrl-C stops every publisher after its current publish and disconnects
//! cleanly. The process exits with status 1 if any broker failed.

use clap::{Parser, Subcommand};
use loadtest_populate_mqtt::MqttPopulateArgs;
use retained_loadtest::loadtest::populate::run_populate;
use retained_loadtest::loadtest::topics::{run_topics, TopicsArgs};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "retained-loadtest")]
#[command(about = "Fill MQTT brokers with a deterministic tree of retained messages")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish one retained message per topic to every configured broker
    Populate {
        #[command(flatten)]
        args: MqttPopulateArgs,
    },

    /// Print the topics a populate run would publish
    Topics {
        #[command(flatten)]
        args: TopicsArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing, defaulting to info when RUST_LOG is unset
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Populate { args } => {
            let cancel = CancellationToken::new();
            spawn_interrupt_handler(cancel.clone());

            let report = run_populate(args, cancel).await?;
            if !report.success() {
                anyhow::bail!(
                    "{} of {} broker(s) failed",
                    report.failed(),
                    report.brokers.len()
                );
            }
        }
        Commands::Topics { args } => run_topics(&args)?,
    }

    Ok(())
}

/// Cancel `cancel` on the first Ctrl-C.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("Interrupt received, stopping publishers");
                cancel.cancel();
            }
            Err(e) => tracing::warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });
}
