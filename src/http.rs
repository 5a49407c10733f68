use crate::metrics::Metrics;
use crate::scheduler::LatestSnapshot;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header::CONTENT_TYPE, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use std::sync::Arc;

#[derive(Clone)]
pub struct HttpAppState {
    pub metrics: Arc<Metrics>,
    pub latest: LatestSnapshot,
}

pub fn build_router(metrics: Arc<Metrics>, latest: LatestSnapshot) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .route("/api/snapshot", get(snapshot_handler))
        .with_state(HttpAppState { metrics, latest })
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn metrics_handler(State(state): State<HttpAppState>) -> Response {
    state.metrics.inc_scrape_count();
    match state.metrics.encode_metrics() {
        Ok(encoded) => {
            let mut response = Response::new(Body::from(encoded));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            response
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to encode metrics: {err}"),
        )
            .into_response(),
    }
}

async fn snapshot_handler(State(state): State<HttpAppState>) -> Response {
    let guard = state.latest.read().await;
    match guard.as_ref() {
        Some(snapshot) => Json(snapshot).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "no snapshot has been published yet",
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Snapshot;
    use axum::body::to_bytes;
    use axum::http::Request;
    use tokio::sync::RwLock;
    use tower::ServiceExt;

    fn app(latest: Option<Snapshot>) -> (Router, Arc<Metrics>) {
        let metrics = Metrics::new().expect("metrics");
        let latest: LatestSnapshot = Arc::new(RwLock::new(latest));
        (build_router(metrics.clone(), latest), metrics)
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let (app, _) = app(None);
        let (status, body) = get_body(app, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn metrics_are_exposed_and_scrapes_counted() {
        let (app, metrics) = app(None);
        let (status, body) = get_body(app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("hostdash_uptime_seconds"));
        assert_eq!(metrics.hostdash_scrape_count_total.get(), 1.0);
    }

    #[tokio::test]
    async fn snapshot_is_unavailable_before_first_cycle() {
        let (app, _) = app(None);
        let (status, _) = get_body(app, "/api/snapshot").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn snapshot_returns_latest_document() {
        let mut snap = Snapshot::all_failed("x");
        snap.users = vec!["admin".to_string()];
        let (app, _) = app(Some(snap));

        let (status, body) = get_body(app, "/api/snapshot").await;
        assert_eq!(status, StatusCode::OK);
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["users"][0], "admin");
        assert_eq!(value.as_object().unwrap().len(), Snapshot::KEYS.len());
    }
}
