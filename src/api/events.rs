//! Intake for build completion notifications from the CI server

use axum::{
    Json,
    body::Bytes,
    extract::State as AxumState,
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use crate::SharedState;
use crate::snapshot::BuildSnapshot;

/// POST /build-finished - Publish a finished build to the event bus
pub async fn build_finished(
    AxumState(state): AxumState<SharedState>,
    body: Bytes,
) -> impl IntoResponse {
    let snapshot: BuildSnapshot = match serde_json::from_slice(&body) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            info!("Could not parse build snapshot: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("Invalid build snapshot: {}", e) })),
            )
                .into_response();
        }
    };
    debug!("{:#?}", &snapshot);

    let build_id = snapshot.id;
    let event_id = state.events.publish(Arc::new(snapshot));
    info!("Accepted build {} as event {}", build_id, event_id);

    (
        StatusCode::ACCEPTED,
        Json(json!({ "eventId": event_id })),
    )
        .into_response()
}
