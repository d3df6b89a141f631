// GET handlers: version, metrics

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::AppState;
use crate::version::{NAME, VERSION, banner};

/// GET /: banner and where to look.
pub(super) async fn index_handler() -> impl IntoResponse {
    format!("{}: metrics at /metrics", banner())
}

/// GET /version: service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /metrics: every registered metric, sampled now, keyed by dotted name.
pub(super) async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(state.registry.snapshot())
}

/// GET /metrics/{name}: one metric, or 404.
pub(super) async fn metric_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match state.registry.get(&name) {
        Some(metric) => axum::Json(metric.snapshot()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            axum::Json(serde_json::json!({ "error": format!("unknown metric: {name}") })),
        )
            .into_response(),
    }
}
