// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`.  The service is read-mostly: the
// dashboard polls `/score` and may force a refresh with `/score/refresh`.
//
// CORS is configured permissively so a dashboard on another origin can poll.
// =============================================================================

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::app_state::AppState;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/score", get(score))
        .route("/api/v1/score/refresh", post(refresh))
        .route("/api/v1/config", get(engine_config))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    refresh_count: u64,
    uptime_secs: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        refresh_count: state.refresh_count.load(Ordering::Relaxed),
        uptime_secs: state.uptime_secs(),
        server_time: chrono::Utc::now().timestamp_millis(),
    };
    Json(resp)
}

// =============================================================================
// Score
// =============================================================================

async fn score(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.latest_report() {
        Some(report) => Json(report).into_response(),
        None => {
            let body = serde_json::json!({ "score": null, "message": "No score computed yet" });
            (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
        }
    }
}

async fn refresh(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    info!("manual refresh requested");
    Json(state.refresh().await)
}

// =============================================================================
// Model
// =============================================================================

async fn engine_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.config().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RiskEngine;
    use crate::fetch::cache::ManualClock;
    use crate::fetch::{SignalCache, SignalFetcher};
    use crate::runtime_config::ServiceConfig;
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        let config = ServiceConfig::default();
        let cache = Arc::new(SignalCache::new(Duration::from_secs(300), ManualClock::new()));
        let fetcher = SignalFetcher::new(
            cache,
            config.fallbacks.clone().into_iter().collect(),
            Duration::from_secs(1),
        );
        Arc::new(AppState::new(config, RiskEngine::default(), fetcher))
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = router(test_state());
        let resp = app
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["status"], "ok");
    }

    #[tokio::test]
    async fn score_before_first_refresh_is_unavailable() {
        let app = router(test_state());
        let resp = app
            .oneshot(Request::get("/api/v1/score").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn refresh_then_score_serves_report() {
        let state = test_state();
        let app = router(state.clone());

        let resp = app
            .clone()
            .oneshot(
                Request::post("/api/v1/score/refresh")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .oneshot(Request::get("/api/v1/score").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        // No sources registered: every signal served from its neutral default.
        let json = body_json(resp).await;
        assert_eq!(json["final_score"], 50);
        assert_eq!(json["band"], "Hold");
        assert_eq!(json["degraded"], false);
        assert_eq!(json["unsourced_signals"].as_array().unwrap().len(), 10);
        assert!(json["stale_signals"].as_array().unwrap().is_empty());
        assert_eq!(json["signals"]["fgi"]["is_live"], false);
    }
}
