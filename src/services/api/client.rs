use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::kernel::phase::Phase;
use crate::kernel::scheduler::SimAction;
use crate::kernel::selection::Selection;
use crate::kernel::summary::{PatchSummaryRow, PhaseOverviewRow};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned {status}")]
    Status { url: String, status: u16 },
    #[error("undecodable response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The backing store as seen by the view. Every call is one request; no
/// retries happen here.
pub trait Backend: Clone + Send + Sync + 'static {
    /// Raw body of the history query. Shape checks happen in the kernel.
    fn history(&self, selection: Selection) -> impl Future<Output = Result<Value, ApiError>> + Send;

    fn patch_summary(&self, phase: Phase) -> impl Future<Output = Result<Vec<PatchSummaryRow>, ApiError>> + Send;

    fn phase_overview(&self) -> impl Future<Output = Result<Vec<PhaseOverviewRow>, ApiError>> + Send;

    fn simulation(&self, phase: Phase, action: SimAction) -> impl Future<Output = Result<Value, ApiError>> + Send;
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
            warn!("http client build failed, using defaults: {}", e);
            Client::new()
        });
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn history_request(&self, selection: Selection) -> RequestBuilder {
        self.client.get(self.url("/api/history")).query(&[
            ("patch_id", selection.patch_id.to_string()),
            ("phase", selection.phase.as_str().to_string()),
        ])
    }

    pub fn summary_request(&self, phase: Phase) -> RequestBuilder {
        self.client
            .get(self.url("/api/summary/patches"))
            .query(&[("phase", phase.as_str())])
    }

    pub fn overview_request(&self) -> RequestBuilder {
        self.client.get(self.url("/api/summary"))
    }

    pub fn simulation_request(&self, phase: Phase, action: SimAction) -> RequestBuilder {
        self.client
            .post(self.url(&format!("/{}/{}", action.path(), phase.as_str())))
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                url: response.url().to_string(),
                status: status.as_u16(),
            });
        }
        // Read text first so a bad body surfaces as Decode, not Http
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl Backend for BackendClient {
    async fn history(&self, selection: Selection) -> Result<Value, ApiError> {
        Self::send(self.history_request(selection)).await
    }

    async fn patch_summary(&self, phase: Phase) -> Result<Vec<PatchSummaryRow>, ApiError> {
        Self::send(self.summary_request(phase)).await
    }

    async fn phase_overview(&self) -> Result<Vec<PhaseOverviewRow>, ApiError> {
        Self::send(self.overview_request()).await
    }

    async fn simulation(&self, phase: Phase, action: SimAction) -> Result<Value, ApiError> {
        Self::send(self.simulation_request(phase, action)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> BackendClient {
        BackendClient::new("http://localhost:5000/", Duration::from_secs(1))
    }

    #[test]
    fn builds_history_query() {
        let req = client()
            .history_request(Selection::new(12, Phase::Transport))
            .build()
            .unwrap();
        assert_eq!(req.method(), reqwest::Method::GET);
        assert_eq!(
            req.url().as_str(),
            "http://localhost:5000/api/history?patch_id=12&phase=transport"
        );
    }

    #[test]
    fn builds_summary_and_command_urls() {
        let c = client();
        let summary = c.summary_request(Phase::Depot).build().unwrap();
        assert_eq!(summary.url().as_str(), "http://localhost:5000/api/summary/patches?phase=depot");

        let start = c.simulation_request(Phase::Market, SimAction::Start).build().unwrap();
        assert_eq!(start.method(), reqwest::Method::POST);
        assert_eq!(start.url().as_str(), "http://localhost:5000/start/market");

        let stop = c.simulation_request(Phase::Farm, SimAction::Stop).build().unwrap();
        assert_eq!(stop.url().as_str(), "http://localhost:5000/stop/farm");
    }
}
