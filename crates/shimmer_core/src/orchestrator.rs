//! Drives one normalization request across as many provider pages as needed.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::FixedOffset;
use tokio::sync::watch;

use crate::config::Config;
use crate::datapoint::DataPoint;
use crate::error::{ShimmerError, ShimmerResult};
use crate::fetch::{FetchRequest, PageFetcher};
use crate::mapper::{DataPointMapper, MappingContext};
use crate::observability;
use crate::pagination::{PageCursor, PaginationSettings};
use crate::session::Session;
use crate::time_range::{
    DateTimeRangeTransformer, FixedTimeZoneTransformer, IdentityTransformer, QueryRange,
};
use crate::translator::DateTimeFormat;

/// How an endpoint takes the query range.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DateTimeQuerySettings {
    pub start_parameter: Option<String>,
    pub end_parameter: Option<String>,
    pub format: DateTimeFormat,
    /// Zone the provider expects bounds in; `None` sends them as given.
    pub time_zone: Option<FixedOffset>,
}

impl DateTimeQuerySettings {
    pub fn new(
        start_parameter: impl Into<String>,
        end_parameter: impl Into<String>,
        format: DateTimeFormat,
    ) -> Self {
        Self {
            start_parameter: Some(start_parameter.into()),
            end_parameter: Some(end_parameter.into()),
            format,
            time_zone: None,
        }
    }

    #[must_use]
    pub fn in_time_zone(mut self, zone: FixedOffset) -> Self {
        self.time_zone = Some(zone);
        self
    }

    fn reconcile(&self, range: &QueryRange) -> QueryRange {
        match self.time_zone {
            Some(zone) => FixedTimeZoneTransformer(zone).transform_range(range),
            None => IdentityTransformer.transform_range(range),
        }
    }

    fn render(&self, range: &QueryRange, request: &mut FetchRequest) {
        let bounds = [
            (&self.start_parameter, range.lower),
            (&self.end_parameter, range.upper),
        ];
        for (parameter, bound) in bounds {
            if let (Some(name), Some(instant)) = (parameter, bound) {
                request.param(name.as_str(), self.format.translate(&instant));
            }
        }
    }
}

/// Everything needed to query one provider data type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EndpointSettings {
    pub date_time: DateTimeQuerySettings,
    pub pagination: PaginationSettings,
    /// Reject unbounded ranges before any request is made.
    pub require_bounded_range: bool,
    /// Parameters sent with every page.
    pub fixed_parameters: Vec<(String, String)>,
}

/// A configured endpoint: settings plus the transport and mapping behind it.
#[derive(Clone)]
pub struct Endpoint {
    pub provider: String,
    pub settings: EndpointSettings,
    pub mapper: Arc<dyn DataPointMapper>,
    pub fetcher: Arc<dyn PageFetcher>,
}

impl Endpoint {
    pub fn new(
        provider: impl Into<String>,
        settings: EndpointSettings,
        mapper: Arc<dyn DataPointMapper>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        Self {
            provider: provider.into(),
            settings,
            mapper,
            fetcher,
        }
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("provider", &self.provider)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
pub struct Orchestrator {
    max_pages: u32,
    cancel: Option<watch::Receiver<bool>>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl Orchestrator {
    pub fn new(config: &Config) -> Self {
        Self {
            max_pages: config.max_pages.max(1),
            cancel: None,
        }
    }

    /// Stop between pages once `cancel` turns `true`.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Fetch and map every page of `endpoint` for `range`, returning at most
    /// `result_cap` points in arrival order.
    #[tracing::instrument(skip_all, fields(provider = %endpoint.provider))]
    pub async fn run(
        &self,
        endpoint: &Endpoint,
        session: &Session,
        range: &QueryRange,
        result_cap: Option<usize>,
    ) -> ShimmerResult<Vec<DataPoint>> {
        let settings = &endpoint.settings;
        if settings.require_bounded_range {
            range.require_bounded()?;
        }
        if result_cap == Some(0) {
            return Ok(Vec::new());
        }

        let range = settings.date_time.reconcile(range);
        let mut base = FetchRequest::default();
        for (k, v) in &settings.fixed_parameters {
            base.param(k.as_str(), v.as_str());
        }
        settings.date_time.render(&range, &mut base);

        let ctx = MappingContext::now(endpoint.provider.as_str());
        let mut page = PageCursor {
            skip: 0,
            limit: settings.pagination.page_size(),
            cursor: None,
        };
        let mut seen_cursors = HashSet::new();
        let mut points = Vec::new();
        let mut page_index = 0u32;
        let mut pages_fetched = 0u32;

        loop {
            if self.is_cancelled() {
                tracing::info!(page_index, collected = points.len(), "normalization cancelled");
                return Err(ShimmerError::Cancelled {
                    page_index,
                    partial: points,
                });
            }

            let mut request = base.clone();
            settings.pagination.parameters.apply(&page, &mut request);
            tracing::debug!(page_index, params = ?request.params, next_uri = ?request.next_uri, "fetching page");

            let response = match endpoint.fetcher.fetch_page(session, &request).await {
                Ok(response) => response,
                Err(source) => {
                    observability::fetch_failed(&endpoint.provider);
                    tracing::warn!(page_index, error = %source, "page fetch failed");
                    return Err(ShimmerError::Upstream {
                        page_index,
                        status: source.status(),
                        partial: points,
                        source,
                    });
                }
            };
            observability::page_fetched(&endpoint.provider);
            pages_fetched += 1;

            let mapped = endpoint
                .mapper
                .map(std::slice::from_ref(&response.body), &ctx);
            observability::data_points_mapped(&endpoint.provider, mapped.len());
            tracing::debug!(page_index, mapped = mapped.len(), "mapped page");
            points.extend(mapped);

            if let Some(cap) = result_cap {
                if points.len() >= cap {
                    points.truncate(cap);
                    tracing::debug!(cap, "result cap reached");
                    break;
                }
            }

            let state = settings
                .pagination
                .extract(&response.headers, &response.body);
            if !state.has_more {
                break;
            }
            if let Some(cursor) = &state.cursor {
                if !seen_cursors.insert(cursor.clone()) {
                    tracing::warn!(page_index, cursor = %cursor, "provider repeated a pagination cursor, stopping");
                    break;
                }
            }
            page_index += 1;
            if page_index >= self.max_pages {
                tracing::warn!(max_pages = self.max_pages, "page ceiling reached, stopping");
                break;
            }
            page.skip += u64::from(page.limit);
            page.cursor = state.cursor;
        }

        tracing::info!(
            pages = pages_fetched,
            data_points = points.len(),
            "normalization finished"
        );
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_parameters_skip_absent_bounds() {
        let settings = DateTimeQuerySettings::new("start", "end", DateTimeFormat::UnixSeconds)
            .in_time_zone(FixedOffset::east_opt(9 * 3600 + 1800).unwrap());
        let lower = chrono::DateTime::parse_from_rfc3339("2015-07-01T00:00:00+09:30").unwrap();
        let range = settings.reconcile(&QueryRange::at_least(lower));
        let mut request = FetchRequest::default();
        settings.render(&range, &mut request);
        assert_eq!(request.params, vec![("start".to_string(), "1435674600".to_string())]);
    }

    #[test]
    fn date_parameters_use_the_provider_zone() {
        let settings = DateTimeQuerySettings::new("from", "to", DateTimeFormat::LocalDate)
            .in_time_zone(FixedOffset::west_opt(5 * 3600).unwrap());
        let utc = |s: &str| chrono::DateTime::parse_from_rfc3339(s).unwrap();
        let range = settings.reconcile(&QueryRange::closed_open(
            utc("2015-07-02T03:00:00Z"),
            utc("2015-07-03T03:00:00Z"),
        ));
        let mut request = FetchRequest::default();
        settings.render(&range, &mut request);
        assert_eq!(request.get("from"), Some("2015-07-01"));
        assert_eq!(request.get("to"), Some("2015-07-02"));
    }
}
