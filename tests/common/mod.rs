#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::Response,
    routing,
};
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tiny_webhook::build::{BuildStatus, FileChange, VcsModification};
use tiny_webhook::snapshot::{BuildSnapshot, VcsRootSnapshot};

/// A request captured by a mock webhook target
#[derive(Debug, Clone)]
pub struct Recorded {
    pub body: Bytes,
    pub content_type: Option<String>,
    pub content_length: Option<String>,
}

#[derive(Clone)]
struct TargetState {
    status: StatusCode,
    location: Option<String>,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

/// Local HTTP server answering every POST with a fixed status
pub struct MockTarget {
    pub url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockTarget {
    pub async fn spawn(status: StatusCode) -> Self {
        Self::spawn_with_location(status, None).await
    }

    pub async fn spawn_redirect(location: &str) -> Self {
        Self::spawn_with_location(StatusCode::FOUND, Some(location.to_string())).await
    }

    async fn spawn_with_location(status: StatusCode, location: Option<String>) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = TargetState {
            status,
            location,
            requests: Arc::clone(&requests),
        };
        let app = Router::new()
            .route("/hook", routing::post(record))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}/hook", addr),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn hits(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Wait until at least `count` requests arrived
    pub async fn wait_for(&self, count: usize) {
        for _ in 0..200 {
            if self.hits() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{} never received {} request(s)", self.url, count);
    }
}

async fn record(State(state): State<TargetState>, headers: HeaderMap, body: Bytes) -> Response {
    let header_str = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    };
    state.requests.lock().unwrap().push(Recorded {
        body,
        content_type: header_str(header::CONTENT_TYPE),
        content_length: header_str(header::CONTENT_LENGTH),
    });

    let mut response = Response::builder().status(state.status);
    if let Some(location) = &state.location {
        response = response.header(header::LOCATION, location);
    }
    response.body(Body::empty()).unwrap()
}

/// URL of a port nothing is listening on
pub async fn refused_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/hook", addr)
}

fn modification(id: i64, file: &str) -> VcsModification {
    VcsModification {
        user_name: Some("dana".to_string()),
        change_count: 1,
        description: Some(format!("change {}", id)),
        id,
        version: Some(format!("rev{}", id)),
        vcs_name: Some("jetbrains.git".to_string()),
        display_version: Some(format!("rev{}", id)),
        changes: vec![FileChange {
            filename: file.to_string(),
            change_type_name: "edited".to_string(),
        }],
    }
}

/// Build with two single-file changes and one VCS root
pub fn sample_build(id: i64, status: BuildStatus) -> BuildSnapshot {
    BuildSnapshot {
        agent_name: Some("agent-01".to_string()),
        id,
        number: Some(id.to_string()),
        status,
        raw_number: Some(id.to_string()),
        start_date: Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()),
        finish_date: Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 2, 0).unwrap()),
        duration: 120,
        branch: Some("main".to_string()),
        project_id: Some("project12".to_string()),
        project_external_id: Some("Backend".to_string()),
        full_name: Some("Backend :: Build".to_string()),
        status_text: Some("Success".to_string()),
        containing_changes: vec![modification(1, "README.md"), modification(2, "src/main.rs")],
        vcs_roots: vec![VcsRootSnapshot {
            id: 3,
            name: "backend".to_string(),
            vcs_name: "jetbrains.git".to_string(),
            properties: HashMap::from([("branch".to_string(), "refs/heads/main".to_string())]),
            current_revision: Some("rev2".to_string()),
            revision_error: None,
        }],
        ..Default::default()
    }
}
