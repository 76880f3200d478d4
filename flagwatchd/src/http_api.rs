//! HTTP API for the status page.
//!
//! Provides:
//! - `/` - Static page with the polling script
//! - `/feature-status` - Current flag status (JSON or HTML fragment)
//! - `/health` - Basic daemon health check
//!
//! `/feature-status` always answers 200; evaluation failures are reported in
//! the document, never as an HTTP error.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use flagwatch_common::present::html_fragment;
use flagwatch_common::{EvaluationTransport, FlagEvaluator, RenderMode, StatusView};
use serde_json::json;
use tracing::debug;

const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Shared state for HTTP handlers.
pub struct HttpState<T> {
    /// Evaluator used for every status request.
    pub evaluator: FlagEvaluator<T>,
    /// How `/feature-status` is rendered.
    pub render_mode: RenderMode,
    /// Daemon version.
    pub version: &'static str,
    /// Daemon start time.
    pub started_at: Instant,
}

/// Create the HTTP router.
pub fn create_router<T>(state: HttpState<T>) -> Router
where
    T: EvaluationTransport + 'static,
{
    Router::new()
        .route("/", get(index_handler))
        .route("/feature-status", get(feature_status_handler::<T>))
        .route("/health", get(health_handler::<T>))
        .with_state(Arc::new(state))
}

/// Handler for `/` - static page.
async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Handler for `/feature-status`.
///
/// Evaluates the flags afresh on every request. A client that sends
/// `Accept: application/json` gets JSON whatever the render mode.
async fn feature_status_handler<T>(
    State(state): State<Arc<HttpState<T>>>,
    headers: HeaderMap,
) -> Response
where
    T: EvaluationTransport + 'static,
{
    let snapshot = state.evaluator.snapshot().await;
    let view = StatusView::from_snapshot(&snapshot);
    debug!(status = %view.status, box_color = %view.box_color, "Serving feature status");

    let mode = if accepts_json(&headers) {
        RenderMode::Json
    } else {
        state.render_mode
    };
    let no_store = [(header::CACHE_CONTROL, "no-store")];
    match mode {
        RenderMode::Json => (no_store, Json(view)).into_response(),
        RenderMode::Html => (no_store, Html(html_fragment(&view))).into_response(),
    }
}

fn accepts_json(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|media| {
            media
                .split(';')
                .next()
                .is_some_and(|m| m.trim().eq_ignore_ascii_case("application/json"))
        })
}

/// Handler for `/health` - basic daemon health check.
async fn health_handler<T>(State(state): State<Arc<HttpState<T>>>) -> impl IntoResponse
where
    T: EvaluationTransport + 'static,
{
    Json(json!({
        "status": "healthy",
        "version": state.version,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "flipt_url": state.evaluator.settings().base_url,
    }))
}

/// Bind `addr` and serve until the process exits.
pub async fn serve(addr: std::net::SocketAddr, router: Router) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use flagwatch_common::mock_flipt::{MockResponse, MockTransport};
    use flagwatch_common::{EvaluationSettings, TransportError};
    use tower::ServiceExt;

    fn make_router(mock: MockTransport, render_mode: RenderMode) -> Router {
        create_router(HttpState {
            evaluator: FlagEvaluator::new(mock, EvaluationSettings::default()),
            render_mode,
            version: "0.1.0-test",
            started_at: Instant::now(),
        })
    }

    async fn fetch(router: Router, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, content_type, body.to_vec())
    }

    async fn fetch_accepting(router: Router, uri: &str, accept: &str) -> Response {
        router
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .header(header::ACCEPT, accept)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let (status, _, body) = fetch(router, uri).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_index_serves_polling_page() {
        let router = make_router(MockTransport::default(), RenderMode::Json);
        let (status, content_type, body) = fetch(router, "/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(content_type.unwrap().starts_with("text/html"));
        let html = String::from_utf8(body).unwrap();
        assert!(html.contains("/feature-status"));
        assert!(html.contains("status-log-body"));
        assert!(html.contains("dataset.boxColor"));
    }

    #[tokio::test]
    async fn test_feature_status_enabled() {
        let mock = MockTransport::builder()
            .boolean(MockResponse::json(r#"{"enabled": true, "reason": "MATCH"}"#))
            .variant(MockResponse::json(r##"{"variantKey": "#00aa00"}"##))
            .build();
        let (status, json) = get_json(make_router(mock, RenderMode::Json), "/feature-status").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ENABLED");
        assert_eq!(json["color"], "green");
        assert_eq!(json["warning"], "");
        assert_eq!(json["boxColor"], "#00aa00");
    }

    #[tokio::test]
    async fn test_feature_status_service_unavailable_is_still_ok() {
        let mock = MockTransport::builder()
            .boolean(MockResponse::Fail(TransportError::Status {
                url: "http://flipt:8080/evaluate/v1/boolean".to_string(),
                status: 503,
            }))
            .build();
        let (status, json) = get_json(make_router(mock, RenderMode::Json), "/feature-status").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ERROR");
        assert_eq!(json["color"], "red");
        assert!(!json["warning"].as_str().unwrap().is_empty());
        assert_eq!(json["boxColor"], "#888888");
    }

    #[tokio::test]
    async fn test_feature_status_failure_modes_all_yield_documents() {
        let failures = [
            MockResponse::refused(),
            MockResponse::Fail(TransportError::Status {
                url: "http://flipt:8080/evaluate/v1/boolean".to_string(),
                status: 500,
            }),
            MockResponse::json("{\"enabled\": tru"),
            MockResponse::json(""),
            MockResponse::json("{}"),
        ];

        for failure in failures {
            let mock = MockTransport::builder().boolean(failure.clone()).build();
            let (status, json) =
                get_json(make_router(mock, RenderMode::Json), "/feature-status").await;
            assert_eq!(status, StatusCode::OK, "{failure:?}");
            assert_eq!(json["status"], "ERROR", "{failure:?}");
            assert!(!json["warning"].as_str().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_feature_status_empty_variant_uses_fallback() {
        let mock = MockTransport::builder()
            .boolean(MockResponse::json(r#"{"enabled": false}"#))
            .variant(MockResponse::json(r#"{"variantKey": ""}"#))
            .build();
        let (_, json) = get_json(make_router(mock, RenderMode::Json), "/feature-status").await;

        assert_eq!(json["status"], "DISABLED");
        assert_eq!(json["warning"], "");
        assert_eq!(json["boxColor"], "#888888");
    }

    #[tokio::test]
    async fn test_feature_status_reevaluates_each_request() {
        let mock = MockTransport::builder()
            .boolean(MockResponse::json(r#"{"enabled": false}"#))
            .boolean(MockResponse::json(r#"{"enabled": true}"#))
            .variant(MockResponse::json(r#"{"variantKey": "blue"}"#))
            .build();
        let router = make_router(mock.clone(), RenderMode::Json);

        let (_, first) = get_json(router.clone(), "/feature-status").await;
        let (_, second) = get_json(router, "/feature-status").await;

        assert_eq!(first["status"], "DISABLED");
        assert_eq!(second["status"], "ENABLED");
        assert_eq!(mock.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_feature_status_html_mode() {
        let mock = MockTransport::builder()
            .boolean(MockResponse::json(r#"{"value": "maybe"}"#))
            .build();
        let (status, content_type, body) =
            fetch(make_router(mock, RenderMode::Html), "/feature-status").await;

        assert_eq!(status, StatusCode::OK);
        assert!(content_type.unwrap().starts_with("text/html"));
        let html = String::from_utf8(body).unwrap();
        assert!(html.contains("Feature is <b>DISABLED</b>"));
        assert!(html.contains(r#"data-status="DISABLED""#));
        assert!(html.contains(r#"data-color="gray""#));
        assert!(html.contains(r##"data-box-color="#888888""##));
        assert!(html.contains("data-warning=\"unexpected"));
        assert!(!html.contains("id=\""));
    }

    #[tokio::test]
    async fn test_feature_status_html_mode_honors_accept_json() {
        let mock = MockTransport::builder()
            .boolean(MockResponse::json(r#"{"enabled": true}"#))
            .variant(MockResponse::json(r#"{"variantKey": "teal"}"#))
            .build();
        let response = fetch_accepting(
            make_router(mock, RenderMode::Html),
            "/feature-status",
            "text/plain;q=0.5, application/json",
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("application/json"));
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ENABLED");
        assert_eq!(json["boxColor"], "teal");
    }

    #[tokio::test]
    async fn test_feature_status_html_mode_for_browsers() {
        let mock = MockTransport::builder()
            .boolean(MockResponse::json(r#"{"enabled": true}"#))
            .build();
        let response = fetch_accepting(
            make_router(mock, RenderMode::Html),
            "/feature-status",
            "*/*",
        )
        .await;

        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("text/html"));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let router = make_router(MockTransport::default(), RenderMode::Json);
        let (status, json) = get_json(router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["version"], "0.1.0-test");
        assert_eq!(json["flipt_url"], "http://flipt:8080");
        assert!(json["uptime_seconds"].is_number());
    }
}
