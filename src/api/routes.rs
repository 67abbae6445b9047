//! HTTP API route definitions.

use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;

use super::handlers::{health, ready, status, AppState};

/// Create the API router. `/metrics` is mounted when a Prometheus handle is
/// available.
pub fn create_router(state: AppState, prometheus: Option<PrometheusHandle>) -> Router {
    let router = Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Status endpoint
        .route("/api/v1/status", get(status));

    let router = if let Some(handle) = prometheus {
        router.route("/metrics", get(move || std::future::ready(handle.render())))
    } else {
        router
    };

    router.with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let state = AppState::new();
        let app = create_router(state, None);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ready_endpoint_returns_503_when_not_ready() {
        let state = AppState::new();
        let app = create_router(state, None);

        let response = app
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn ready_endpoint_returns_200_when_ready() {
        let state = AppState::new();
        state.set_ready(true);
        let app = create_router(state, None);

        let response = app
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn status_endpoint_reports_stats() {
        let state = AppState::new();
        state.stats.write().await.cycles_completed = 3;
        let app = create_router(state, None);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
