//! Threshold CLI commands

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, ThresholdUpdate, Thresholds};
use crate::output::{print_json, print_rows, print_success, OutputFormat};

#[derive(Tabled)]
struct ThresholdRow {
    #[tabled(rename = "Threshold")]
    name: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

fn print_thresholds(thresholds: &Thresholds, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(thresholds)?,
        OutputFormat::Table => print_rows(
            thresholds
                .entries()
                .into_iter()
                .map(|(name, value)| ThresholdRow {
                    name,
                    value: format!("{}", value),
                })
                .collect(),
        ),
    }
    Ok(())
}

pub async fn get_thresholds(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let thresholds: Thresholds = client.get("api/v1/thresholds").await?;
    print_thresholds(&thresholds, format)
}

pub async fn set_threshold(
    client: &ApiClient,
    key: &str,
    value: f64,
    format: OutputFormat,
) -> Result<()> {
    let path = format!("api/v1/thresholds/{}", key);
    let thresholds: Thresholds = client.put_json(&path, &ThresholdUpdate { value }).await?;

    if let OutputFormat::Table = format {
        print_success(&format!("{} set to {}", key, value));
    }
    print_thresholds(&thresholds, format)
}
