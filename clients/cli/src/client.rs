//! clients/cli/src/client.rs
//!
//! HTTP client for the HealthLens API.

use anyhow::{bail, Context, Result};
use healthlens_core::domain::{AnalysisResult, AnalysisType, HealthProfile};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Analyses can take a while on the model side; the client gives up after this.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzePayload {
    pub image_base64: String,
    pub analysis_type: AnalysisType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_profile: Option<HealthProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Posts one analysis. Error statuses that still carry the envelope are
    /// returned as a failed `AnalysisResult` rather than an `Err`.
    pub async fn analyze(&self, payload: &AnalyzePayload) -> Result<AnalysisResult> {
        let url = self.url("/analysis/analyze");
        debug!(%url, analysis_type = %payload.analysis_type, "Sending analysis request.");

        let response = self
            .http
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| describe_transport_error(e, &self.base_url))?;

        let status = response.status();
        let body = response.text().await.context("failed to read response body")?;
        match serde_json::from_str::<AnalysisResult>(&body) {
            Ok(result) => Ok(result),
            Err(_) if status.is_success() => bail!("server returned an unreadable response"),
            Err(_) => bail!("server error {}: {}", status, body.trim()),
        }
    }

    pub async fn status(&self) -> Result<Value> {
        let response = self
            .http
            .get(self.url("/health/status"))
            .send()
            .await
            .map_err(|e| describe_transport_error(e, &self.base_url))?;
        let status = response.status();
        if !status.is_success() {
            bail!("server error {}", status);
        }
        response.json().await.context("failed to decode status response")
    }
}

fn describe_transport_error(e: reqwest::Error, base_url: &str) -> anyhow::Error {
    if e.is_timeout() {
        anyhow::anyhow!("Request timeout - the server took too long to respond")
    } else if e.is_connect() {
        anyhow::anyhow!("Cannot connect to server at {}. Make sure the backend is running.", base_url)
    } else {
        anyhow::Error::new(e).context("request failed")
    }
}
