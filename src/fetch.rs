//! Pluggable HTTP GET collaborator for remote feed sync.
//!
//! Remote calendar availability is best-effort by design, so callers
//! treat every failure the same way; the trait keeps the transport
//! swappable (tests use deterministic stubs, deployments may route
//! through a proxy).

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CalendarError, CalendarResult};

/// Bound on each outbound feed fetch; a timeout behaves like any other
/// fetch failure.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Response surface the engine needs: status plus body text.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP GET capability.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn get(&self, url: &str) -> CalendarResult<FetchResponse>;
}

/// Default [`HttpFetch`] backed by reqwest.
pub struct HttpClient {
    http: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> CalendarResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| CalendarError::Fetch(e.to_string()))?;
        Ok(HttpClient { http })
    }
}

#[async_trait]
impl HttpFetch for HttpClient {
    async fn get(&self, url: &str) -> CalendarResult<FetchResponse> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| CalendarError::Fetch(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| CalendarError::Fetch(e.to_string()))?;
        Ok(FetchResponse { status, body })
    }
}
