//! FleetWatch CLI
//!
//! A command-line tool for inspecting and managing alerts, thresholds and
//! the monitor on a FleetWatch agent.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{alerts, monitor, thresholds};
use std::path::PathBuf;

/// FleetWatch CLI
#[derive(Parser)]
#[command(name = "fwctl")]
#[command(author, version, about = "CLI for the FleetWatch container monitoring agent", long_about = None)]
pub struct Cli {
    /// Agent URL (also FWCTL_AGENT_URL; falls back to ~/.config/fwctl/config.json)
    #[arg(long, env = "FWCTL_AGENT_URL", global = true)]
    pub agent_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List and manage alerts
    #[command(subcommand)]
    Alerts(AlertCommands),

    /// Show alert statistics
    Stats,

    /// Show or change anomaly thresholds
    #[command(subcommand)]
    Thresholds(ThresholdCommands),

    /// Control the background monitor
    #[command(subcommand)]
    Monitor(MonitorCommands),

    /// Export alerts, history and thresholds to a JSON file on the agent host
    Export {
        /// File name inside the agent's export directory (agent default if omitted)
        #[arg(long, short)]
        path: Option<PathBuf>,
    },

    /// Replace alerts and history from a JSON file on the agent host
    Load {
        /// File name inside the agent's export directory (agent default if omitted)
        #[arg(long, short)]
        path: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum AlertCommands {
    /// List active alerts (unacknowledged only by default)
    List {
        /// Include acknowledged and resolved alerts
        #[arg(long)]
        all: bool,
    },

    /// Show the bounded alert history
    History,

    /// Acknowledge an alert
    Ack {
        /// Alert ID
        id: u64,
    },

    /// Mark an alert resolved
    Resolve {
        /// Alert ID
        id: u64,
    },

    /// Remove every active alert (history is kept)
    Clear,
}

#[derive(Subcommand)]
pub enum ThresholdCommands {
    /// Show current thresholds
    Get,

    /// Set one threshold
    Set {
        /// Threshold name (cpu_warning, cpu_critical, memory_warning,
        /// memory_critical, restart_warning, restart_critical)
        key: String,

        /// New value
        #[arg(allow_negative_numbers = true)]
        value: f64,
    },
}

#[derive(Subcommand)]
pub enum MonitorCommands {
    /// Start the monitor loop
    Start,

    /// Stop the monitor loop
    Stop,

    /// Show whether the monitor is running
    Status,

    /// Run one check immediately
    Tick,
}

async fn run(cli: Cli) -> Result<()> {
    let agent_url = config::Config::load()?.agent_url(cli.agent_url);
    let client = client::ApiClient::new(&agent_url)?;
    let format = cli.format;

    match cli.command {
        Commands::Alerts(cmd) => match cmd {
            AlertCommands::List { all } => alerts::list_alerts(&client, all, format).await?,
            AlertCommands::History => alerts::show_history(&client, format).await?,
            AlertCommands::Ack { id } => alerts::acknowledge(&client, id, format).await?,
            AlertCommands::Resolve { id } => alerts::resolve(&client, id, format).await?,
            AlertCommands::Clear => alerts::clear(&client, format).await?,
        },
        Commands::Stats => alerts::show_stats(&client, format).await?,
        Commands::Thresholds(cmd) => match cmd {
            ThresholdCommands::Get => thresholds::get_thresholds(&client, format).await?,
            ThresholdCommands::Set { key, value } => {
                thresholds::set_threshold(&client, &key, value, format).await?
            }
        },
        Commands::Monitor(cmd) => match cmd {
            MonitorCommands::Start => monitor::start(&client, format).await?,
            MonitorCommands::Stop => monitor::stop(&client, format).await?,
            MonitorCommands::Status => monitor::status(&client, format).await?,
            MonitorCommands::Tick => monitor::tick(&client, format).await?,
        },
        Commands::Export { path } => alerts::export(&client, path, format).await?,
        Commands::Load { path } => alerts::load(&client, path, format).await?,
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
