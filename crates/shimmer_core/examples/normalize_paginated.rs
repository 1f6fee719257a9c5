//! Normalizes a paginated step-count endpoint served by a local mock.
//!
//! Run with `SHIMMER_LOG_LEVEL=debug` to see per-page progress.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use secrecy::SecretString;
use serde_json::{Value, json};
use shimmer_core::mapper::MapOne;
use shimmer_core::{
    AuthScheme, Config, DataPoint, DateTimeFormat, DateTimeQuerySettings, Endpoint,
    EndpointSettings, MappingContext, PaginationExtractor, PaginationSettings, ProviderRegistry,
    QueryParameterTransformer, QueryRange, ReqwestPageFetcher, Session, TimeInterval, node,
    per_item,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn step_count(item: &Value, ctx: &MappingContext) -> MapOne {
    let steps = node::require_long(item, "steps")?;
    let Some(day) = node::optional_local_date(item, "date") else {
        return Ok(None);
    };
    Ok(Some(DataPoint::new(
        ctx.header("omh:step-count:2.0"),
        json!({
            "step_count": steps,
            "effective_time_frame": {"time_interval": TimeInterval::date(day)},
        }),
    )))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let log_env = std::env::var("SHIMMER_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(&log_env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
    shimmer_core::observability::describe_metrics();

    let server = MockServer::start().await;
    let next = format!("{}/v1/steps?page=2", server.uri());
    Mock::given(method("GET"))
        .and(path("/v1/steps"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "days": [{"date": "2015-07-03", "steps": 4120}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/steps"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("link", format!("<{next}>; rel=\"next\"").as_str())
                .set_body_json(json!({
                    "days": [
                        {"date": "2015-07-01", "steps": 10250},
                        {"date": "2015-07-02", "steps": "unknown"}
                    ]
                })),
        )
        .mount(&server)
        .await;

    let config = Config::from_env()?;
    let fetcher = ReqwestPageFetcher::new(
        format!("{}/v1/steps", server.uri()),
        AuthScheme::Bearer,
        &config,
    )?;
    let settings = EndpointSettings {
        date_time: DateTimeQuerySettings::new("start_date", "end_date", DateTimeFormat::LocalDate)
            .in_time_zone(FixedOffset::west_opt(5 * 3600).ok_or("offset out of range")?),
        pagination: PaginationSettings::new(
            PaginationExtractor::LinkHeader,
            QueryParameterTransformer::NextUri {
                limit_parameter: Some("limit".into()),
            },
        )
        .with_page_size(2),
        require_bounded_range: true,
        ..Default::default()
    };
    let mut registry = ProviderRegistry::new(&config);
    registry.register(
        "step_count",
        Endpoint::new(
            "demo",
            settings,
            Arc::new(per_item("days", step_count)),
            Arc::new(fetcher),
        ),
    );

    let session = Session::new("demo-user", SecretString::new("demo-token".into()));
    let range = QueryRange::closed_open(
        DateTime::parse_from_rfc3339("2015-07-01T00:00:00-05:00")?,
        DateTime::parse_from_rfc3339("2015-07-08T00:00:00-05:00")?,
    );
    let points = registry
        .normalize(&session, "demo", "step_count", &range, Some(100))
        .await?;

    println!("{}", serde_json::to_string_pretty(&points)?);
    Ok(())
}
