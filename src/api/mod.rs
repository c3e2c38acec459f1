//! HTTP surface: build event intake, status and config reload

pub mod config;
pub mod events;
pub mod stats;

use axum::{Router, routing};

use crate::SharedState;

pub use config::{get_config, get_targets, reload_config_endpoint};
pub use events::build_finished;
pub use stats::status;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/build-finished", routing::post(build_finished))
        .route("/status", routing::get(status))
        .route("/api/targets", routing::get(get_targets))
        .route("/api/config/current", routing::get(get_config))
        .route("/api/reload", routing::post(reload_config_endpoint))
        .with_state(state)
}
