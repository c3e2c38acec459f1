//! Owned build snapshot posted by the CI server plugin

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

use crate::build::{BuildInfo, BuildStatus, VcsModification, VcsRootBinding};
use crate::error::{Result, WebhookError};

/// A finished build as reported over HTTP.
///
/// Every field is optional on the wire so that a partially populated host
/// object still produces a payload.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildSnapshot {
    pub agent_name: Option<String>,
    pub comment: Option<String>,
    pub description: Option<String>,
    pub id: i64,
    pub number: Option<String>,
    pub status: BuildStatus,
    pub raw_number: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub finish_date: Option<DateTime<Utc>>,
    pub duration: i64,
    pub branch: Option<String>,
    pub project_id: Option<String>,
    pub project_external_id: Option<String>,
    pub full_name: Option<String>,
    pub status_text: Option<String>,
    pub previous_finished: Option<Box<BuildSnapshot>>,
    pub containing_changes: Vec<VcsModification>,
    pub vcs_roots: Vec<VcsRootSnapshot>,
}

/// A VCS root as reported by the plugin.
///
/// The plugin resolves the current revision before posting. When that
/// lookup failed it sends `revisionError` instead of `currentRevision`.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct VcsRootSnapshot {
    pub id: i64,
    pub name: String,
    pub vcs_name: String,
    pub properties: HashMap<String, String>,
    pub current_revision: Option<String>,
    pub revision_error: Option<String>,
}

impl VcsRootBinding for VcsRootSnapshot {
    fn id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn vcs_name(&self) -> &str {
        &self.vcs_name
    }

    fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    fn current_revision(&self) -> Result<String> {
        match &self.current_revision {
            Some(revision) => Ok(revision.clone()),
            None => Err(WebhookError::VcsLookupFailed {
                root: self.name.clone(),
                message: self
                    .revision_error
                    .clone()
                    .unwrap_or_else(|| "no revision reported".to_string()),
            }),
        }
    }
}

impl BuildInfo for BuildSnapshot {
    fn agent_name(&self) -> Option<&str> {
        self.agent_name.as_deref()
    }

    fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn number(&self) -> Option<&str> {
        self.number.as_deref()
    }

    fn status(&self) -> BuildStatus {
        self.status
    }

    fn raw_number(&self) -> Option<&str> {
        self.raw_number.as_deref()
    }

    fn start_date(&self) -> Option<DateTime<Utc>> {
        self.start_date
    }

    fn finish_date(&self) -> Option<DateTime<Utc>> {
        self.finish_date
    }

    fn duration(&self) -> i64 {
        self.duration
    }

    fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    fn project_external_id(&self) -> Option<&str> {
        self.project_external_id.as_deref()
    }

    fn full_name(&self) -> Option<&str> {
        self.full_name.as_deref()
    }

    fn status_text(&self) -> Option<&str> {
        self.status_text.as_deref()
    }

    fn previous_finished(&self) -> Option<&dyn BuildInfo> {
        self.previous_finished
            .as_deref()
            .map(|prev| prev as &dyn BuildInfo)
    }

    fn containing_changes(&self) -> &[VcsModification] {
        &self.containing_changes
    }

    fn vcs_root_entries(&self) -> Vec<&dyn VcsRootBinding> {
        self.vcs_roots
            .iter()
            .map(|root| root as &dyn VcsRootBinding)
            .collect()
    }
}
