//! Output formatting utilities

use chrono::{DateTime, NaiveDateTime, Utc};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Format used by the agent for alert timestamps (UTC)
const ALERT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print rows as a rounded table
pub fn print_rows<T: Tabled>(rows: Vec<T>) {
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// CRITICAL in red, WARNING in yellow
pub fn color_level(level: &str) -> String {
    match level.to_uppercase().as_str() {
        "CRITICAL" => level.red().bold().to_string(),
        "WARNING" => level.yellow().to_string(),
        _ => level.to_string(),
    }
}

/// Color a monitor or alert state
pub fn color_state(state: &str) -> String {
    match state.to_lowercase().as_str() {
        "running" | "started" | "stopped" | "resolved" => state.green().to_string(),
        "idle" | "already_running" | "not_running" | "acknowledged" => state.yellow().to_string(),
        "detached" | "open" => state.red().to_string(),
        _ => state.to_string(),
    }
}

/// Lifecycle label for an alert
pub fn alert_state(acknowledged: bool, resolved: bool) -> &'static str {
    match (acknowledged, resolved) {
        (_, true) => "resolved",
        (true, false) => "acknowledged",
        (false, false) => "open",
    }
}

/// Render an agent timestamp as a coarse age ("42s ago", "3h ago")
pub fn format_age(timestamp: &str, now: DateTime<Utc>) -> String {
    let Ok(created) = NaiveDateTime::parse_from_str(timestamp, ALERT_TIMESTAMP_FORMAT) else {
        return timestamp.to_string();
    };

    let secs = (now.naive_utc() - created).num_seconds().max(0);
    match secs {
        0..=59 => format!("{}s ago", secs),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86400),
    }
}

/// Render a JSON number or string without quotes
pub fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 => format!("{:.0}", f),
            Some(f) => format!("{:.1}", f),
            None => n.to_string(),
        },
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_age() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        assert_eq!(format_age("2024-05-01 11:59:30", now), "30s ago");
        assert_eq!(format_age("2024-05-01 11:15:00", now), "45m ago");
        assert_eq!(format_age("2024-05-01 09:00:00", now), "3h ago");
        assert_eq!(format_age("2024-04-28 12:00:00", now), "3d ago");
        assert_eq!(format_age("garbage", now), "garbage");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&serde_json::json!(95.0)), "95");
        assert_eq!(format_value(&serde_json::json!(82.46)), "82.5");
        assert_eq!(format_value(&serde_json::json!("exited")), "exited");
    }

    #[test]
    fn test_alert_state() {
        assert_eq!(alert_state(false, false), "open");
        assert_eq!(alert_state(true, false), "acknowledged");
        assert_eq!(alert_state(true, true), "resolved");
    }
}
