//! Monitor control commands

use anyhow::Result;

use crate::client::{ApiClient, MonitorAction, MonitorStatus, TickSummary};
use crate::commands::alerts::print_alerts;
use crate::output::{color_state, print_info, print_json, print_warning, OutputFormat};

pub async fn status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status: MonitorStatus = client.get("api/v1/monitor").await?;

    match format {
        OutputFormat::Json => print_json(&status)?,
        OutputFormat::Table => println!(
            "Monitor: {} (interval {}s)",
            color_state(&status.state),
            status.interval_secs
        ),
    }
    Ok(())
}

pub async fn start(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let action: MonitorAction = client.post("api/v1/monitor/start").await?;
    print_action(&action, format)
}

pub async fn stop(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let action: MonitorAction = client.post("api/v1/monitor/stop").await?;
    if action.outcome == "detached" {
        print_warning("Monitor did not stop within its grace period and was detached");
    }
    print_action(&action, format)
}

fn print_action(action: &MonitorAction, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(action)?,
        OutputFormat::Table => println!("Monitor: {}", color_state(&action.outcome)),
    }
    Ok(())
}

/// Run one check on the agent and show what it raised
pub async fn tick(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let summary: TickSummary = client.post("api/v1/monitor/tick").await?;

    match format {
        OutputFormat::Json => print_json(&summary),
        OutputFormat::Table => {
            print_info(&format!(
                "Checked {} units ({} failed)",
                summary.units_checked, summary.units_failed
            ));
            print_alerts(summary.alerts, "No anomalies", format)
        }
    }
}
