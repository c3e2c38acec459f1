//! JSON payload construction for finished builds

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, warn};

use crate::build::{BuildInfo, BuildStatus, FileChange, VcsModification, VcsRootBinding};
use crate::error::Result;

/// Document POSTed to every webhook target.
///
/// The predecessor is embedded as bare [`BuildFields`], which has no slot for
/// a further predecessor, so nesting never goes deeper than one level.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuildPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_finished: Option<Box<BuildFields>>,
    #[serde(flatten)]
    pub build: BuildFields,
}

/// Top-level fields describing a single build.
///
/// Options serialize as `null` rather than being skipped: every key is always
/// present.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuildFields {
    pub agent_name: Option<String>,
    pub build_comment: Option<String>,
    pub build_description: Option<String>,
    pub build_id: i64,
    pub build_number: Option<String>,
    pub build_status: BuildStatus,
    pub build_is_successful: bool,
    pub build_is_failed: bool,
    pub raw_build_number: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub finish_date: Option<DateTime<Utc>>,
    pub duration: i64,
    pub branch: Option<String>,
    pub project_id: Option<String>,
    pub project_external_id: Option<String>,
    pub full_name: Option<String>,
    pub status: Option<String>,
    pub root_url: String,
    pub containing_changes: Vec<ChangePayload>,
    pub vcs_roots: Vec<VcsRootPayload>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChangePayload {
    pub user_name: Option<String>,
    pub change_count: i32,
    pub description: Option<String>,
    pub id: i64,
    pub version: Option<String>,
    pub version_control_name: Option<String>,
    pub display_version: Option<String>,
    pub changes: Vec<FileChange>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VcsRootPayload {
    pub id: i64,
    pub name: String,
    pub vcs_name: String,
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_revision: Option<String>,
}

impl BuildPayload {
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// UTF-8 JSON body as sent on the wire
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Turns host build views into payloads.
///
/// Holds the server's external URL, which is the same for every build.
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    root_url: String,
}

impl PayloadBuilder {
    pub fn new(root_url: impl Into<String>) -> Self {
        Self {
            root_url: root_url.into(),
        }
    }

    /// Build the payload for `build`, embedding its immediate predecessor
    /// when `include_previous` is set and the host has one.
    pub fn build_payload(&self, build: &dyn BuildInfo, include_previous: bool) -> BuildPayload {
        let previous_finished = if include_previous {
            build
                .previous_finished()
                .map(|prev| Box::new(self.build_fields(prev)))
        } else {
            None
        };

        BuildPayload {
            previous_finished,
            build: self.build_fields(build),
        }
    }

    fn build_fields(&self, build: &dyn BuildInfo) -> BuildFields {
        let full_name = build.full_name().map(str::to_owned);

        let status = build.status_text().map(str::to_lowercase);
        if status.is_none() {
            warn!(
                "No status text for build {} ({}), sending null status",
                build.id(),
                full_name.as_deref().unwrap_or("unnamed")
            );
        }

        let vcs_roots = build
            .vcs_root_entries()
            .into_iter()
            .map(|root| vcs_root_payload(root, full_name.as_deref()))
            .collect();

        BuildFields {
            agent_name: build.agent_name().map(str::to_owned),
            build_comment: build.comment().map(str::to_owned),
            build_description: build.description().map(str::to_owned),
            build_id: build.id(),
            build_number: build.number().map(str::to_owned),
            build_status: build.status(),
            build_is_successful: build.is_successful(),
            build_is_failed: build.is_failed(),
            raw_build_number: build.raw_number().map(str::to_owned),
            start_date: build.start_date(),
            finish_date: build.finish_date(),
            duration: build.duration(),
            branch: build.branch().map(str::to_owned),
            project_id: build.project_id().map(str::to_owned),
            project_external_id: build.project_external_id().map(str::to_owned),
            full_name,
            status,
            root_url: self.root_url.clone(),
            containing_changes: build
                .containing_changes()
                .iter()
                .map(change_payload)
                .collect(),
            vcs_roots,
        }
    }
}

fn change_payload(modification: &VcsModification) -> ChangePayload {
    ChangePayload {
        user_name: modification.user_name.clone(),
        change_count: modification.change_count,
        description: modification.description.clone(),
        id: modification.id,
        version: modification.version.clone(),
        version_control_name: modification.vcs_name.clone(),
        display_version: modification.display_version.clone(),
        changes: modification.changes.clone(),
    }
}

fn vcs_root_payload(root: &dyn VcsRootBinding, build_name: Option<&str>) -> VcsRootPayload {
    // A failed lookup only drops this one field
    let current_revision = match root.current_revision() {
        Ok(revision) => Some(revision),
        Err(e) => {
            error!(
                "Unable to get VCS revision for {}: {}",
                build_name.unwrap_or("unnamed build"),
                e
            );
            None
        }
    };

    VcsRootPayload {
        id: root.id(),
        name: root.name().to_string(),
        vcs_name: root.vcs_name().to_string(),
        branch: root.branch().map(str::to_owned),
        current_revision,
    }
}
