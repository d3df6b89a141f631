// HTTP routes: JSON view of the metric registry

mod http;

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::metrics::Registry;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) registry: Arc<Registry>,
}

pub fn app(registry: Arc<Registry>) -> Router {
    let state = AppState { registry };
    Router::new()
        .route("/", get(http::index_handler)) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/metrics", get(http::metrics_handler)) // GET /metrics
        .route("/metrics/{name}", get(http::metric_handler)) // GET /metrics/{name}
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
