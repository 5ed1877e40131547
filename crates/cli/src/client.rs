//! HTTP client for the FleetWatch agent API

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Non-success response from the agent
#[derive(Debug, thiserror::Error)]
#[error("agent returned {status}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }
}

/// API client for the agent
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid agent URL")?;

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("Invalid path")
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.context("Failed to reach agent")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(ApiError { status, message }.into());
        }

        response.json().await.context("Failed to parse response")
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.client.get(self.url(path)?)).await
    }

    /// POST without a body
    pub async fn post<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.client.post(self.url(path)?)).await
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send(self.client.post(self.url(path)?).json(body)).await
    }

    pub async fn put_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send(self.client.put(self.url(path)?).json(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.client.delete(self.url(path)?)).await
    }
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    #[serde(rename = "type")]
    pub anomaly_type: String,
    pub level: String,
    pub message: String,
    /// Number, or text for status anomalies
    pub value: serde_json::Value,
    pub threshold: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: u64,
    pub unit_name: String,
    pub anomaly: Anomaly,
    pub timestamp: String,
    pub urgency: String,
    pub priority: u8,
    pub acknowledged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<String>,
    pub resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
    pub notification: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertStats {
    pub total: usize,
    pub critical: usize,
    pub warning: usize,
    pub acknowledged: usize,
    pub resolved: usize,
    pub unacknowledged: usize,
    pub active: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertUpdated {
    pub id: u64,
    pub updated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cleared {
    pub cleared: usize,
}

/// Threshold set, keyed by threshold name in declaration order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    pub cpu_warning: f64,
    pub cpu_critical: f64,
    pub memory_warning: f64,
    pub memory_critical: f64,
    pub restart_warning: f64,
    pub restart_critical: f64,
}

impl Thresholds {
    pub fn entries(&self) -> [(&'static str, f64); 6] {
        [
            ("cpu_warning", self.cpu_warning),
            ("cpu_critical", self.cpu_critical),
            ("memory_warning", self.memory_warning),
            ("memory_critical", self.memory_critical),
            ("restart_warning", self.restart_warning),
            ("restart_critical", self.restart_critical),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdUpdate {
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub state: String,
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorAction {
    pub outcome: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickSummary {
    pub units_checked: usize,
    pub units_failed: usize,
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exported {
    pub path: PathBuf,
    pub alerts: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loaded {
    pub path: PathBuf,
    pub alerts: usize,
    pub history: usize,
    pub thresholds_applied: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
