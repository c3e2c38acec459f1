pub mod api;
pub mod build;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod handler;
pub mod logging;
pub mod payload;
pub mod snapshot;
pub mod target;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{Result, WebhookError};
use crate::events::BuildEventBus;
use crate::logging::RecentLogs;
use crate::target::{TargetConfig, TargetRegistry};

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Timeouts applied to every webhook request
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct DeliverySettings {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl DeliverySettings {
    /// A zero timeout would fail every delivery immediately
    fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("connect_timeout_secs", self.connect_timeout_secs),
            ("request_timeout_secs", self.request_timeout_secs),
        ] {
            if value == 0 {
                return Err(WebhookError::ConfigError(format!(
                    "{} must be at least 1",
                    key
                )));
            }
        }
        Ok(())
    }
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ServerSettings {
    root_url: String,
    #[serde(flatten)]
    delivery: DeliverySettings,
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// External URL of the CI server, sent as `rootUrl`
    pub root_url: String,
    pub delivery: DeliverySettings,
    pub targets: TargetConfig,
}

/// Parse a TOML configuration document.
///
/// Invalid TOML, a missing `root_url` or a zero timeout is an error;
/// target entries are read leniently.
pub fn parse_config(text: &str) -> Result<WebhookConfig> {
    let document: toml::Table = toml::from_str(text)?;
    let settings: ServerSettings = toml::Value::Table(document.clone()).try_into()?;
    settings.delivery.validate()?;

    Ok(WebhookConfig {
        root_url: settings.root_url,
        delivery: settings.delivery,
        targets: TargetConfig::read_from(&document),
    })
}

/// Re-read the configuration file from disk
pub async fn reload_config(path: &Path) -> Result<WebhookConfig> {
    let text = tokio::fs::read_to_string(path).await?;
    parse_config(&text)
}

pub struct AppState {
    pub config_path: PathBuf,
    pub root_url: String,
    pub targets: Arc<TargetRegistry>,
    pub events: BuildEventBus,
    pub recent_logs: RecentLogs,
    pub reload_lock: Mutex<()>,
    pub start_time: Instant,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        config_path: PathBuf,
        config: &WebhookConfig,
        events: BuildEventBus,
        recent_logs: RecentLogs,
    ) -> Self {
        Self {
            config_path,
            root_url: config.root_url.clone(),
            targets: Arc::new(TargetRegistry::new(config.targets.clone())),
            events,
            recent_logs,
            reload_lock: Mutex::new(()),
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Swap in the targets of a freshly loaded configuration.
    ///
    /// The root URL and timeouts are fixed for the life of the process.
    pub fn apply_config(&self, config: WebhookConfig) {
        if config.root_url != self.root_url {
            warn!(
                "root_url changed to '{}'; restart to apply, still using '{}'",
                config.root_url, self.root_url
            );
        }

        let count = config.targets.len();
        self.targets.replace(config.targets);
        info!("Webhook targets reloaded: {} configured", count);
    }
}

pub type SharedState = Arc<AppState>;
