//! Flood Predictor CLI
//!
//! A command-line tool for triggering evaluations and checking the
//! health of the flood predictor service.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{evaluate, health};

/// Flood Predictor CLI
#[derive(Parser)]
#[command(name = "floodctl")]
#[command(author, version, about = "CLI for the Flood Predictor service", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via FLOOD_API_URL env var)
    #[arg(long, global = true, env = "FLOOD_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a flood evaluation now
    Evaluate {
        /// Gauge to evaluate instead of the configured one
        #[arg(long)]
        gauge_id: Option<String>,

        /// Weather station to use instead of the configured one
        #[arg(long)]
        station_id: Option<String>,
    },

    /// Show service health and readiness
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize client
    let client = client::ApiClient::new(&cli.api_url)?;

    // Execute command
    match cli.command {
        Commands::Evaluate {
            gauge_id,
            station_id,
        } => {
            evaluate::run_evaluation(&client, gauge_id, station_id, cli.format).await?;
        }
        Commands::Health => {
            health::show_health(&client, cli.format).await?;
        }
    }

    Ok(())
}
