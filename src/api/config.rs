//! Config API endpoints

use axum::{Json, extract::State as AxumState, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::json;
use tokio::fs;
use tracing::{error, info};

use crate::{SharedState, reload_config};

/// Configuration file as on disk next to what the process is running with
#[derive(Debug, Serialize)]
pub struct ConfigView {
    pub path: String,
    pub contents: String,
    pub active_root_url: String,
    pub active_targets: usize,
}

/// GET /api/config/current - Configuration file and the settings in effect
pub async fn get_config(AxumState(state): AxumState<SharedState>) -> impl IntoResponse {
    let path = state.config_path.to_string_lossy().into_owned();

    let contents = match fs::read_to_string(&state.config_path).await {
        Ok(contents) => contents,
        Err(e) => {
            error!("Failed to read config file {}: {}", path, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("Failed to read {}: {}", path, e) })),
            )
                .into_response();
        }
    };

    Json(ConfigView {
        path,
        contents,
        active_root_url: state.root_url.clone(),
        active_targets: state.targets.snapshot().len(),
    })
    .into_response()
}

/// GET /api/targets - Current webhook targets in delivery order
pub async fn get_targets(AxumState(state): AxumState<SharedState>) -> impl IntoResponse {
    let targets = state.targets.snapshot();
    Json(json!({
        "targets": targets.urls(),
        "count": targets.len(),
    }))
}

/// Result of a reload request
#[derive(Debug, Serialize)]
pub struct ReloadOutcome {
    pub status: &'static str,
    pub previous_targets: usize,
    pub targets: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// POST /api/reload - Re-read the configuration file and swap the targets.
/// A file that fails to load leaves the running targets untouched.
pub async fn reload_config_endpoint(AxumState(state): AxumState<SharedState>) -> impl IntoResponse {
    let _guard = state.reload_lock.lock().await;
    let previous_targets = state.targets.snapshot().len();

    match reload_config(&state.config_path).await {
        Ok(new_config) => {
            let targets = new_config.targets.len();
            state.apply_config(new_config);
            info!("Reloaded {:?}: {} -> {} targets", state.config_path, previous_targets, targets);
            (
                StatusCode::OK,
                Json(ReloadOutcome {
                    status: "success",
                    previous_targets,
                    targets,
                    error: None,
                }),
            )
        }
        Err(e) => {
            error!("Failed to reload config, keeping {} targets: {}", previous_targets, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ReloadOutcome {
                    status: "error",
                    previous_targets,
                    targets: previous_targets,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}
