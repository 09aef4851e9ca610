//! Unversioned operational handlers.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::warn;

use super::AppState;

// ═══════════════════════════════════════════════════════════════════════════════
// Health Check
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (status, store_status) = match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "up"),
        Err(e) => {
            warn!(error = %e, "Store health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "down")
        }
    };

    let body = serde_json::json!({
        "status": if status == StatusCode::OK { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "store": {
            "backend": state.store.backend_name(),
            "status": store_status,
        },
        "timestamp": chrono::Utc::now().to_rfc3339()
    });

    (status, Json(body))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Metrics
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.render(),
    )
}
