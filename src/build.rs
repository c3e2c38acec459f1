//! Read-only view of a finished build and its version-control context.
//!
//! The CI host owns the real object graph. Everything here is the narrow set
//! of accessors the payload builder needs, so the rest of the crate never
//! depends on host-specific types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Name of the VCS root property that carries the branch spec.
pub const BRANCH_PROPERTY: &str = "branch";

/// Final status of a build as reported by the host
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildStatus {
    Success,
    Failure,
    Error,
    #[default]
    Unknown,
}

impl BuildStatus {
    pub fn is_successful(self) -> bool {
        matches!(self, BuildStatus::Success)
    }

    pub fn is_failed(self) -> bool {
        matches!(self, BuildStatus::Failure | BuildStatus::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BuildStatus::Success => "SUCCESS",
            BuildStatus::Failure => "FAILURE",
            BuildStatus::Error => "ERROR",
            BuildStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single file touched by a modification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    pub filename: String,
    pub change_type_name: String,
}

/// A change set included in the build
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct VcsModification {
    pub user_name: Option<String>,
    pub change_count: i32,
    pub description: Option<String>,
    pub id: i64,
    pub version: Option<String>,
    pub vcs_name: Option<String>,
    pub display_version: Option<String>,
    pub changes: Vec<FileChange>,
}

/// A VCS root attached to the build's configuration.
///
/// `current_revision` goes back to the VCS and may fail independently of the
/// other accessors.
pub trait VcsRootBinding: Send + Sync {
    fn id(&self) -> i64;
    fn name(&self) -> &str;
    fn vcs_name(&self) -> &str;
    fn property(&self, name: &str) -> Option<&str>;
    fn current_revision(&self) -> Result<String>;

    fn branch(&self) -> Option<&str> {
        self.property(BRANCH_PROPERTY)
    }
}

/// A finished build.
pub trait BuildInfo: Send + Sync {
    fn agent_name(&self) -> Option<&str>;
    fn comment(&self) -> Option<&str>;
    fn description(&self) -> Option<&str>;
    fn id(&self) -> i64;
    fn number(&self) -> Option<&str>;
    fn status(&self) -> BuildStatus;
    fn raw_number(&self) -> Option<&str>;
    fn start_date(&self) -> Option<DateTime<Utc>>;
    fn finish_date(&self) -> Option<DateTime<Utc>>;
    /// Duration in seconds
    fn duration(&self) -> i64;
    fn branch(&self) -> Option<&str>;
    fn project_id(&self) -> Option<&str>;
    fn project_external_id(&self) -> Option<&str>;
    fn full_name(&self) -> Option<&str>;
    /// Text of the build type's status descriptor, if the host has one.
    fn status_text(&self) -> Option<&str>;
    fn previous_finished(&self) -> Option<&dyn BuildInfo>;
    fn containing_changes(&self) -> &[VcsModification];
    fn vcs_root_entries(&self) -> Vec<&dyn VcsRootBinding>;

    fn is_successful(&self) -> bool {
        self.status().is_successful()
    }

    fn is_failed(&self) -> bool {
        self.status().is_failed()
    }
}
