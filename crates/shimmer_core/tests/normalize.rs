use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use secrecy::SecretString;
use serde_json::{Value, json};
use shimmer_core::mapper::{MapOne, effective_time_frame};
use shimmer_core::{
    AuthScheme, Config, DataPoint, DataPointHeader, DateTimeFormat, DateTimeQuerySettings, Endpoint,
    EndpointSettings, Modality, PaginationExtractor, PaginationSettings, ProviderRegistry,
    QueryParameterTransformer, QueryRange, ReqwestPageFetcher, Session, ShimmerError, TimeFrame,
    TimeInterval, node, per_item,
};
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn activity(item: &Value, ctx: &shimmer_core::MappingContext) -> MapOne {
    let name = node::require_string(item, "activityName")?;
    let Some(frame) = effective_time_frame(item, "startTime", "endTime") else {
        return Ok(None);
    };
    let mut body = json!({
        "activity_name": name,
        "effective_time_frame": frame,
    });
    if let Some(distance) = node::optional_double(item, "distance") {
        body["distance"] = json!({"value": distance, "unit": "m"});
    }
    let mut header = DataPointHeader::new(
        "omh:physical-activity:1.2",
        ctx.provenance().with_modality(Modality::Sensed),
        ctx.created_at,
    );
    if let Some(id) = node::optional_string(item, "logId") {
        header = header.with_additional_property("external_id", json!(id));
    }
    Ok(Some(DataPoint::new(header, body)))
}

fn at(s: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(s).unwrap()
}

fn registry_for(server: &MockServer) -> ProviderRegistry {
    let config = Config::default();
    let fetcher = ReqwestPageFetcher::new(
        format!("{}/1/user/-/activities/list.json", server.uri()),
        AuthScheme::Bearer,
        &config,
    )
    .expect("fetcher");
    let settings = EndpointSettings {
        date_time: DateTimeQuerySettings::new("afterDate", "beforeDate", DateTimeFormat::Iso8601)
            .in_time_zone(FixedOffset::east_opt(0).unwrap()),
        pagination: PaginationSettings::new(
            PaginationExtractor::Body {
                path: "pagination.next".into(),
            },
            QueryParameterTransformer::Token {
                token_parameter: "pageToken".into(),
                limit_parameter: Some("limit".into()),
            },
        )
        .with_page_size(20),
        require_bounded_range: true,
        fixed_parameters: vec![("sort".into(), "asc".into())],
    };
    let endpoint = Endpoint::new(
        "fitbit",
        settings,
        Arc::new(per_item("activities", activity)),
        Arc::new(fetcher),
    );
    let mut registry = ProviderRegistry::new(&config);
    registry.register("physical_activity", endpoint);
    registry
}

fn session() -> Session {
    Session::new("user-1", SecretString::new("tok".into()))
}

#[tokio::test]
async fn normalizes_paginated_activities_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1/user/-/activities/list.json"))
        .and(query_param("sort", "asc"))
        .and(query_param("afterDate", "2015-01-01T00:00:00+00:00"))
        .and(query_param("limit", "20"))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "activities": [
                {
                    "activityName": "Walk",
                    "logId": "123",
                    "startTime": "2015-01-01T22:21:57Z",
                    "endTime": "2015-01-01T23:29:49Z",
                    "distance": 1200.5
                },
                {"activityName": "Broken"}
            ],
            "pagination": {"next": "page-2"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/1/user/-/activities/list.json"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "activities": [
                {
                    "activityName": "Run",
                    "startTime": "2015-01-02T06:00:00.250+01:00",
                    "endTime": "2015-01-02T06:45:10.500+01:00"
                }
            ],
            "pagination": {"next": null}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let registry = registry_for(&server);
    let range = QueryRange::closed_open(at("2015-01-01T01:00:00+01:00"), at("2015-01-03T00:00:00Z"));
    let points = registry
        .normalize(&session(), "fitbit", "physical_activity", &range, None)
        .await
        .expect("points");

    assert_eq!(points.len(), 2);
    let walk = &points[0];
    assert_eq!(walk.header().body_schema_id(), "omh:physical-activity:1.2");
    assert_eq!(walk.header().acquisition_provenance().source_name(), "fitbit");
    assert_eq!(
        walk.header().acquisition_provenance().modality(),
        Some(Modality::Sensed)
    );
    assert_eq!(
        walk.header().additional_properties().get("external_id"),
        Some(&json!("123"))
    );
    let frame: TimeFrame =
        serde_json::from_value(walk.body()["effective_time_frame"].clone()).unwrap();
    assert_eq!(
        frame,
        TimeFrame::TimeInterval(TimeInterval::start_end(
            at("2015-01-01T22:21:57Z"),
            at("2015-01-01T23:29:49Z"),
        ))
    );
    assert_eq!(walk.body()["distance"]["value"], json!(1200.5));

    let run: TimeFrame =
        serde_json::from_value(points[1].body()["effective_time_frame"].clone()).unwrap();
    let TimeFrame::TimeInterval(interval) = run else {
        panic!("expected an interval");
    };
    assert_eq!(
        interval.start_date_time().map(|s| s.timestamp_subsec_millis()),
        Some(250)
    );
    assert_eq!(
        interval.end_date_time().map(|e| e.timestamp_subsec_millis()),
        Some(500)
    );
}

#[tokio::test]
async fn unbounded_requests_never_reach_the_provider() {
    let server = MockServer::start().await;
    let registry = registry_for(&server);

    let err = registry
        .normalize(&session(), "fitbit", "physical_activity", &QueryRange::all(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, ShimmerError::UnboundedRange));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn upstream_status_is_reported_with_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1/user/-/activities/list.json"))
        .respond_with(ResponseTemplate::new(403).set_body_string("insufficient scope"))
        .mount(&server)
        .await;
    let registry = registry_for(&server);

    let err = registry
        .normalize(
            &session(),
            "fitbit",
            "physical_activity",
            &QueryRange::at_least(at("2015-01-01T00:00:00Z")),
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ShimmerError::Upstream {
            page_index: 0,
            status: Some(403),
            ..
        }
    ));
    assert!(err.to_string().contains("insufficient scope"));
}

#[tokio::test]
async fn relative_next_links_are_followed_with_the_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/moves"))
        .and(query_param("start_time", "1420070400"))
        .and(query_param("limit", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "items": [{
                    "activityName": "Walk",
                    "startTime": "2015-01-01T08:00:00Z",
                    "endTime": "2015-01-01T08:30:00Z"
                }],
                "links": {"next": "/v1/moves?page_token=1440077820"}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/moves"))
        .and(query_param("page_token", "1440077820"))
        .and(query_param("limit", "20"))
        .and(query_param_is_missing("start_time"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "items": [{
                    "activityName": "Run",
                    "startTime": "2015-01-02T08:00:00Z",
                    "endTime": "2015-01-02T08:20:00Z"
                }],
                "links": {}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = Config::default();
    let fetcher = ReqwestPageFetcher::new(
        format!("{}/v1/moves", server.uri()),
        AuthScheme::Bearer,
        &config,
    )
    .expect("fetcher");
    let settings = EndpointSettings {
        date_time: DateTimeQuerySettings::new("start_time", "end_time", DateTimeFormat::UnixSeconds),
        pagination: PaginationSettings::new(
            PaginationExtractor::Body {
                path: "data.links.next".into(),
            },
            QueryParameterTransformer::NextUri {
                limit_parameter: Some("limit".into()),
            },
        )
        .with_page_size(20),
        ..EndpointSettings::default()
    };
    let mut registry = ProviderRegistry::new(&config);
    registry.register(
        "physical_activity",
        Endpoint::new(
            "jawbone",
            settings,
            Arc::new(per_item("data.items", activity)),
            Arc::new(fetcher),
        ),
    );

    let points = registry
        .normalize(
            &session(),
            "jawbone",
            "physical_activity",
            &QueryRange::at_least(at("2015-01-01T00:00:00Z")),
            None,
        )
        .await
        .expect("points");

    let names: Vec<_> = points
        .iter()
        .map(|p| p.body()["activity_name"].clone())
        .collect();
    assert_eq!(names, vec![json!("Walk"), json!("Run")]);
}
