use std::time::Duration;

use secrecy::SecretString;
use shimmer_core::{
    AuthScheme, Config, FetchError, FetchRequest, PageFetcher, PaginationExtractor,
    ReqwestPageFetcher, ResponseEncoding, RetryPolicy, Session,
};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session() -> Session {
    Session::new("user-1", SecretString::new("tok".into()))
}

fn fetcher(server: &MockServer, auth: AuthScheme) -> ReqwestPageFetcher {
    ReqwestPageFetcher::new(format!("{}/v1/steps", server.uri()), auth, &Config::default())
        .expect("fetcher")
        .with_retry_policy(RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
        })
}

#[tokio::test]
async fn sends_query_parameters_and_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/steps"))
        .and(query_param("start", "2015-07-01"))
        .and(query_param("limit", "25"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})))
        .expect(1)
        .mount(&server)
        .await;

    let mut request = FetchRequest::default();
    request.param("start", "2015-07-01");
    request.param("limit", "25");
    let response = fetcher(&server, AuthScheme::Bearer)
        .fetch_page(&session(), &request)
        .await
        .expect("response");

    assert_eq!(response.status, 200);
    assert_eq!(response.body, serde_json::json!({"items": []}));
}

#[tokio::test]
async fn basic_and_query_parameter_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/steps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let basic = fetcher(
        &server,
        AuthScheme::Basic {
            username: "API_KEY".into(),
        },
    );
    basic
        .fetch_page(&session(), &FetchRequest::default())
        .await
        .expect("basic");
    let keyed = fetcher(
        &server,
        AuthScheme::QueryParameter {
            name: "access_token".into(),
        },
    );
    keyed
        .fetch_page(&session(), &FetchRequest::default())
        .await
        .expect("query");

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 2);
    let auth = received[0]
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(auth.starts_with("Basic "));
    assert!(received[1].headers.get("authorization").is_none());
    assert_eq!(received[1].url.query(), Some("access_token=tok"));
}

#[tokio::test]
async fn next_uri_keeps_its_query_and_adds_params() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/steps/page/3"))
        .and(query_param("after", "xyz"))
        .and(query_param("limit", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([1, 2])))
        .expect(1)
        .mount(&server)
        .await;

    let request = FetchRequest {
        params: vec![("limit".into(), "50".into())],
        next_uri: Some(format!("{}/v1/steps/page/3?after=xyz", server.uri())),
    };
    let response = fetcher(&server, AuthScheme::Bearer)
        .fetch_page(&session(), &request)
        .await
        .expect("response");
    assert_eq!(response.body, serde_json::json!([1, 2]));
}

#[tokio::test]
async fn relative_next_uri_resolves_against_the_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/steps"))
        .and(query_param("page_token", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([3])))
        .expect(1)
        .mount(&server)
        .await;

    let request = FetchRequest {
        params: Vec::new(),
        next_uri: Some("/v1/steps?page_token=2".into()),
    };
    let response = fetcher(&server, AuthScheme::Bearer)
        .fetch_page(&session(), &request)
        .await
        .expect("response");
    assert_eq!(response.body, serde_json::json!([3]));
}

#[tokio::test]
async fn link_header_is_exposed_to_extractors() {
    let server = MockServer::start().await;
    let next = format!("{}/v1/steps?page=2", server.uri());
    Mock::given(method("GET"))
        .and(path("/v1/steps"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("link", format!("<{next}>; rel=\"next\"").as_str())
                .set_body_json(serde_json::json!([])),
        )
        .mount(&server)
        .await;

    let response = fetcher(&server, AuthScheme::Bearer)
        .fetch_page(&session(), &FetchRequest::default())
        .await
        .expect("response");
    let state = PaginationExtractor::LinkHeader.extract(
        &response.headers,
        &response.body,
        ResponseEncoding::None,
    );
    assert_eq!(state.cursor.as_deref(), Some(next.as_str()));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/steps"))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired token"))
        .expect(1)
        .mount(&server)
        .await;

    let err = fetcher(&server, AuthScheme::Bearer)
        .fetch_page(&session(), &FetchRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FetchError::Status { status: 401, ref body } if body == "expired token"
    ));
}

#[tokio::test]
async fn server_errors_are_retried_then_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/steps"))
        .respond_with(ResponseTemplate::new(503).set_body_string("x".repeat(1000)))
        .expect(3)
        .mount(&server)
        .await;

    let err = fetcher(&server, AuthScheme::Bearer)
        .fetch_page(&session(), &FetchRequest::default())
        .await
        .unwrap_err();
    match err {
        FetchError::Status { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body.len(), 256);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn invalid_json_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/steps"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = fetcher(&server, AuthScheme::Bearer)
        .fetch_page(&session(), &FetchRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Decode(_)));
}

#[tokio::test]
async fn slow_responses_time_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/steps"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let config = Config {
        http_timeout: Duration::from_millis(50),
        max_retries: 0,
        ..Config::default()
    };
    let fetcher = ReqwestPageFetcher::new(
        format!("{}/v1/steps", server.uri()),
        AuthScheme::Bearer,
        &config,
    )
    .expect("fetcher");
    let err = fetcher
        .fetch_page(&session(), &FetchRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Timeout));
}
