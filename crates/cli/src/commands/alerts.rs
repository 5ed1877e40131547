//! Alert-related CLI commands

use anyhow::Result;
use chrono::Utc;
use std::path::PathBuf;
use tabled::Tabled;

use crate::client::{
    Alert, AlertStats, AlertUpdated, ApiClient, ApiError, Cleared, Exported, Loaded, PathRequest,
};
use crate::output::{
    alert_state, color_level, color_state, format_age, format_value, print_info, print_json,
    print_rows, print_success, print_warning, OutputFormat,
};

/// Row for alert tables
#[derive(Tabled)]
struct AlertRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "Type")]
    anomaly_type: String,
    #[tabled(rename = "Level")]
    level: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Threshold")]
    threshold: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Age")]
    age: String,
    #[tabled(rename = "Message")]
    message: String,
}

#[derive(Tabled)]
struct StatRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Count")]
    count: usize,
}

fn alert_rows(alerts: &[Alert]) -> Vec<AlertRow> {
    let now = Utc::now();
    alerts
        .iter()
        .map(|a| AlertRow {
            id: a.id,
            unit: a.unit_name.clone(),
            anomaly_type: a.anomaly.anomaly_type.clone(),
            level: color_level(&a.anomaly.level),
            value: format_value(&a.anomaly.value),
            threshold: format_value(&a.anomaly.threshold),
            state: color_state(alert_state(a.acknowledged, a.resolved)),
            age: format_age(&a.timestamp, now),
            message: a.anomaly.message.clone(),
        })
        .collect()
}

/// Print alerts most urgent first
pub fn print_alerts(mut alerts: Vec<Alert>, empty: &str, format: OutputFormat) -> Result<()> {
    alerts.sort_by_key(|a| (a.priority, a.id));

    match format {
        OutputFormat::Json => print_json(&alerts)?,
        OutputFormat::Table => {
            if alerts.is_empty() {
                print_warning(empty);
                return Ok(());
            }
            let critical = alerts
                .iter()
                .filter(|a| a.anomaly.level.eq_ignore_ascii_case("critical"))
                .count();
            print_rows(alert_rows(&alerts));
            println!("\nTotal: {} alerts ({} critical)", alerts.len(), critical);
        }
    }
    Ok(())
}

pub async fn list_alerts(client: &ApiClient, all: bool, format: OutputFormat) -> Result<()> {
    let path = if all {
        "api/v1/alerts?all=true"
    } else {
        "api/v1/alerts"
    };
    let alerts: Vec<Alert> = client.get(path).await?;
    print_alerts(alerts, "No unacknowledged alerts", format)
}

pub async fn show_history(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let history: Vec<Alert> = client.get("api/v1/alerts/history").await?;

    match format {
        OutputFormat::Json => print_json(&history)?,
        OutputFormat::Table => {
            if history.is_empty() {
                print_warning("Alert history is empty");
                return Ok(());
            }
            // History is shown in creation order
            print_rows(alert_rows(&history));
            println!("\nTotal: {} alerts in history", history.len());
        }
    }
    Ok(())
}

async fn update_alert(
    client: &ApiClient,
    id: u64,
    action: &str,
    done: &str,
    format: OutputFormat,
) -> Result<()> {
    let path = format!("api/v1/alerts/{}/{}", id, action);
    match client.post::<AlertUpdated>(&path).await {
        Ok(updated) => match format {
            OutputFormat::Json => print_json(&updated),
            OutputFormat::Table => {
                print_success(&format!("Alert {} {}", id, done));
                Ok(())
            }
        },
        Err(e) => match e.downcast_ref::<ApiError>() {
            Some(api) if api.is_not_found() => {
                print_warning(&format!("No alert with id {}", id));
                Ok(())
            }
            _ => Err(e),
        },
    }
}

pub async fn acknowledge(client: &ApiClient, id: u64, format: OutputFormat) -> Result<()> {
    update_alert(client, id, "acknowledge", "acknowledged", format).await
}

pub async fn resolve(client: &ApiClient, id: u64, format: OutputFormat) -> Result<()> {
    update_alert(client, id, "resolve", "resolved", format).await
}

pub async fn clear(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let cleared: Cleared = client.delete("api/v1/alerts").await?;

    match format {
        OutputFormat::Json => print_json(&cleared)?,
        OutputFormat::Table => {
            print_success(&format!("Cleared {} active alerts", cleared.cleared));
            print_info("History is kept; see `fwctl alerts history`");
        }
    }
    Ok(())
}

pub async fn show_stats(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let stats: AlertStats = client.get("api/v1/stats").await?;

    match format {
        OutputFormat::Json => print_json(&stats)?,
        OutputFormat::Table => {
            print_rows(vec![
                StatRow { metric: "Total", count: stats.total },
                StatRow { metric: "Critical", count: stats.critical },
                StatRow { metric: "Warning", count: stats.warning },
                StatRow { metric: "Acknowledged", count: stats.acknowledged },
                StatRow { metric: "Unacknowledged", count: stats.unacknowledged },
                StatRow { metric: "Resolved", count: stats.resolved },
                StatRow { metric: "Active", count: stats.active },
            ]);
        }
    }
    Ok(())
}

pub async fn export(client: &ApiClient, path: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let exported: Exported = client
        .post_json("api/v1/alerts/export", &PathRequest { path })
        .await?;

    match format {
        OutputFormat::Json => print_json(&exported)?,
        OutputFormat::Table => print_success(&format!(
            "Exported {} alerts to {} (on the agent host)",
            exported.alerts,
            exported.path.display()
        )),
    }
    Ok(())
}

pub async fn load(client: &ApiClient, path: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let loaded: Loaded = client
        .post_json("api/v1/alerts/load", &PathRequest { path })
        .await?;

    match format {
        OutputFormat::Json => print_json(&loaded)?,
        OutputFormat::Table => {
            print_success(&format!(
                "Loaded {} alerts and {} history entries from {}",
                loaded.alerts,
                loaded.history,
                loaded.path.display()
            ));
            if !loaded.thresholds_applied {
                print_warning("Thresholds in the file were invalid; current thresholds kept");
            }
        }
    }
    Ok(())
}
