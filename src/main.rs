//! net-response Binary Entry Point
//!
//! Probes every endpoint in the configuration file once and prints one JSON
//! line per result to stdout. Logs go to stderr.

use std::path::PathBuf;

use clap::Parser;
use net_response::{
    AppConfig, JsonLinesSink,
    config::{DESCRIPTION, SAMPLE_CONFIG},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// net-response - TCP/UDP reachability probe
#[derive(Parser, Debug)]
#[command(name = "net-response", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "net_response.yaml",
        env = "NET_RESPONSE_CONFIG"
    )]
    config: PathBuf,

    /// Show the sample configuration and exit
    #[arg(short, long)]
    sample: bool,

    /// Probe endpoints one after another (overrides config file)
    #[arg(long)]
    sequential: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing; stdout is reserved for results
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,net_response=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if cli.sample {
        println!("{DESCRIPTION}");
        println!();
        print!("{SAMPLE_CONFIG}");
        return Ok(());
    }

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let mut config = AppConfig::load(&cli.config)?;

    if cli.sequential {
        config.runner.concurrent = false;
    }

    tracing::info!(
        "Probing {} endpoint(s), concurrent: {}",
        config.net_response.len(),
        config.runner.concurrent
    );

    let sink = JsonLinesSink::new(std::io::stdout());
    let summary = config.runner().run(&sink).await;

    if summary.sink_failures > 0 {
        return Err(format!("failed to emit {} result(s)", summary.sink_failures).into());
    }
    if summary.failed_tasks > 0 {
        return Err(format!("{} probe task(s) did not complete", summary.failed_tasks).into());
    }
    Ok(())
}
