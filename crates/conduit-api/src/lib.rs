pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use routes::{ask, health};
use state::AppState;

/// Headroom over the agent's own deadline so its timeout error is rendered
const TIMEOUT_MARGIN: Duration = Duration::from_secs(15);

pub fn build_router(state: Arc<AppState>) -> Router {
    let request_timeout = state.config.agent.request_timeout() + TIMEOUT_MARGIN;

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ask", post(ask::ask))
        .layer(from_fn(middleware::logging::log_request))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
