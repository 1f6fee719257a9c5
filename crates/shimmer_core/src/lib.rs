//! Provider-agnostic normalization of health data into canonical data points.
//!
//! A [`ProviderRegistry`] maps `(provider, data type)` to an [`Endpoint`]. Each
//! request is driven by the [`Orchestrator`]: the query range is reconciled
//! with the provider's zone, pages are fetched through a [`PageFetcher`],
//! mapped by a [`DataPointMapper`] and followed while the endpoint's
//! [`PaginationSettings`] report more data.

pub mod config;
pub mod datapoint;
pub mod error;
pub mod fetch;
pub mod http_client;
pub mod mapper;
pub mod node;
pub mod observability;
pub mod orchestrator;
pub mod pagination;
pub mod registry;
pub mod retry;
pub mod session;
pub mod time_range;
pub mod translator;

pub use config::Config;
pub use datapoint::{
    AcquisitionProvenance, DataPoint, DataPointHeader, DurationUnit, DurationUnitValue, Modality,
    TimeFrame, TimeInterval,
};
pub use error::{FetchError, NodeError, ShimmerError, ShimmerResult};
pub use fetch::{FetchRequest, PageFetcher, RawResponse};
pub use http_client::{AuthScheme, ReqwestPageFetcher};
pub use mapper::{DataPointMapper, MappingContext, per_document, per_item};
pub use orchestrator::{DateTimeQuerySettings, Endpoint, EndpointSettings, Orchestrator};
pub use pagination::{
    EndCriterion, PaginationExtractor, PaginationSettings, PaginationState,
    QueryParameterTransformer, ResponseEncoding,
};
pub use registry::ProviderRegistry;
pub use retry::RetryPolicy;
pub use session::Session;
pub use time_range::{
    DateTimeRangeTransformer, FixedTimeZoneTransformer, IdentityTransformer, QueryRange,
};
pub use translator::DateTimeFormat;
