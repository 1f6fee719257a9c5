//! The seam between the orchestrator and provider transports.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::Value;

use crate::error::FetchError;
use crate::session::Session;

/// What to ask the provider for on one page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FetchRequest {
    /// Query parameters, in insertion order.
    pub params: Vec<(String, String)>,
    /// A complete URI to request instead of the endpoint, as handed out by
    /// providers that paginate with next links.
    pub next_uri: Option<String>,
}

impl FetchRequest {
    pub fn param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.push((key.into(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// One provider response, already decoded as JSON.
#[derive(Clone, Debug, Default)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Value,
}

impl RawResponse {
    pub fn json(body: Value) -> Self {
        Self {
            status: 200,
            headers: HeaderMap::new(),
            body,
        }
    }
}

/// Performs the authenticated call for one page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(
        &self,
        session: &Session,
        request: &FetchRequest,
    ) -> Result<RawResponse, FetchError>;
}
