//! Lookup table from `(provider, data type)` to a configured endpoint.

use std::collections::HashMap;

use crate::config::Config;
use crate::datapoint::DataPoint;
use crate::error::{ShimmerError, ShimmerResult};
use crate::orchestrator::{Endpoint, Orchestrator};
use crate::session::Session;
use crate::time_range::QueryRange;

#[derive(Debug, Default)]
pub struct ProviderRegistry {
    endpoints: HashMap<(String, String), Endpoint>,
    orchestrator: Orchestrator,
}

impl ProviderRegistry {
    pub fn new(config: &Config) -> Self {
        Self::with_orchestrator(Orchestrator::new(config))
    }

    pub fn with_orchestrator(orchestrator: Orchestrator) -> Self {
        Self {
            endpoints: HashMap::new(),
            orchestrator,
        }
    }

    /// Register `endpoint` under its provider and `data_type`, replacing any
    /// previous entry.
    pub fn register(&mut self, data_type: impl Into<String>, endpoint: Endpoint) -> &mut Self {
        let key = (endpoint.provider.clone(), data_type.into());
        if self.endpoints.insert(key, endpoint).is_some() {
            tracing::debug!("replaced a registered endpoint");
        }
        self
    }

    pub fn endpoint(&self, provider: &str, data_type: &str) -> Option<&Endpoint> {
        self.endpoints
            .get(&(provider.to_string(), data_type.to_string()))
    }

    /// Registered `(provider, data type)` pairs, sorted.
    pub fn keys(&self) -> Vec<(&str, &str)> {
        let mut keys: Vec<_> = self
            .endpoints
            .keys()
            .map(|(p, d)| (p.as_str(), d.as_str()))
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Fetch `data_type` from `provider` for `range` and normalize it.
    pub async fn normalize(
        &self,
        session: &Session,
        provider: &str,
        data_type: &str,
        range: &QueryRange,
        result_cap: Option<usize>,
    ) -> ShimmerResult<Vec<DataPoint>> {
        let endpoint =
            self.endpoint(provider, data_type)
                .ok_or_else(|| ShimmerError::UnknownEndpoint {
                    provider: provider.to_string(),
                    data_type: data_type.to_string(),
                })?;
        tracing::debug!(provider, data_type, user = session.user_id(), "normalizing");
        self.orchestrator
            .run(endpoint, session, range, result_cap)
            .await
    }
}
