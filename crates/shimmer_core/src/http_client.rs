//! HTTP page fetcher built on reqwest.
//!
//! This module provides a reqwest-based implementation of the
//! [`PageFetcher`](crate::fetch::PageFetcher) trait for JSON provider APIs.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::Value;

use crate::config::Config;
use crate::error::FetchError;
use crate::fetch::{FetchRequest, PageFetcher, RawResponse};
use crate::retry::RetryPolicy;
use crate::session::Session;

/// How the session's access token is presented to the provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>`.
    Bearer,
    /// HTTP basic auth with a fixed user name and the token as password.
    Basic { username: String },
    /// The token as a query parameter.
    QueryParameter { name: String },
}

/// Fetches pages of one provider endpoint.
#[derive(Clone, Debug)]
pub struct ReqwestPageFetcher {
    endpoint: String,
    auth: AuthScheme,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl ReqwestPageFetcher {
    /// Create a fetcher with its own client, using the timeouts and retry
    /// settings from `config`.
    pub fn new(
        endpoint: impl Into<String>,
        auth: AuthScheme,
        config: &Config,
    ) -> Result<Self, FetchError> {
        Ok(Self::with_client(endpoint, auth, build_client(config)?).with_retry_policy(config.into()))
    }

    /// Create a fetcher sharing an existing client.
    pub fn with_client(endpoint: impl Into<String>, auth: AuthScheme, client: reqwest::Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            auth,
            client,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build an authenticated GET request for one page.
    fn get_request(
        &self,
        session: &Session,
        request: &FetchRequest,
    ) -> Result<reqwest::RequestBuilder, FetchError> {
        let builder = match &request.next_uri {
            Some(uri) => self.client.get(self.resolve(uri)?),
            None => self.client.get(self.endpoint.as_str()),
        }
        .query(&request.params);
        if !session.has_token() {
            return Ok(builder);
        }
        let token = session.access_token().expose_secret();
        Ok(match &self.auth {
            AuthScheme::Bearer => builder.bearer_auth(token),
            AuthScheme::Basic { username } => builder.basic_auth(username, Some(token)),
            AuthScheme::QueryParameter { name } => builder.query(&[(name.as_str(), token)]),
        })
    }

    /// Resolve a next link against the endpoint; absolute links pass through.
    fn resolve(&self, uri: &str) -> Result<reqwest::Url, FetchError> {
        let invalid = |reason: String| FetchError::InvalidUri {
            uri: uri.to_string(),
            reason,
        };
        reqwest::Url::parse(&self.endpoint)
            .and_then(|base| base.join(uri))
            .map_err(|e| invalid(e.to_string()))
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<RawResponse, FetchError> {
        let resp = request.send().await.map_err(transport_error)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(error_from_response(resp).await);
        }
        let headers = resp.headers().clone();
        let bytes = resp.bytes().await.map_err(transport_error)?;
        let body = if bytes.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))?
        };
        Ok(RawResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

#[async_trait]
impl PageFetcher for ReqwestPageFetcher {
    async fn fetch_page(
        &self,
        session: &Session,
        request: &FetchRequest,
    ) -> Result<RawResponse, FetchError> {
        self.retry
            .retry_if(
                || async { self.execute(self.get_request(session, request)?).await },
                FetchError::is_retryable,
            )
            .await
    }
}

/// A client with the connect and request timeouts from `config`.
pub fn build_client(config: &Config) -> Result<reqwest::Client, FetchError> {
    Ok(reqwest::Client::builder()
        .timeout(config.http_timeout)
        .connect_timeout(config.connect_timeout)
        .build()?)
}

fn transport_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Http(e)
    }
}

/// Extract error information from a failed response.
async fn error_from_response(resp: reqwest::Response) -> FetchError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    let body_snippet: String = body.chars().take(256).collect();
    tracing::debug!(status, body = %body_snippet, "provider returned an error status");
    FetchError::Status {
        status,
        body: body_snippet,
    }
}
