//! Status endpoint

use axum::{Json, extract::State as AxumState};
use serde::Serialize;

use crate::SharedState;
use crate::logging::LogEntry;

/// Server information
#[derive(Debug, Serialize)]
pub struct ServerStats {
    pub name: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub started_at: String,
    pub root_url: String,
    pub total_targets: usize,
    pub event_listeners: usize,
}

/// Combined status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub server: ServerStats,
    pub recent_problems: Vec<LogEntry>,
}

/// GET /status - Server status with recent warnings and delivery failures
pub async fn status(AxumState(state): AxumState<SharedState>) -> Json<StatusResponse> {
    let server = ServerStats {
        name: "tiny_webhook".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        started_at: state.started_at.to_rfc3339(),
        root_url: state.root_url.clone(),
        total_targets: state.targets.snapshot().len(),
        event_listeners: state.events.listener_count(),
    };

    Json(StatusResponse {
        server,
        recent_problems: state.recent_logs.entries(),
    })
}
