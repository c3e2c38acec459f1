//! Webhook target list and its reload handle

use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// Configuration section holding the targets
pub const TARGETS_SECTION: &str = "tiny-webhook";
/// Entry name inside the section
pub const TARGET_ENTRY: &str = "target";
/// Key carrying the URL of an entry
pub const URL_KEY: &str = "url";

/// Ordered list of webhook URLs. Order is delivery order; duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetConfig {
    urls: Vec<String>,
}

impl TargetConfig {
    /// Keeps every non-empty URL in the given order
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls
                .into_iter()
                .map(Into::into)
                .filter(|url: &String| !url.is_empty())
                .collect(),
        }
    }

    /// Read the targets from a parsed configuration document.
    ///
    /// Expects `[[tiny-webhook.target]]` tables with a `url` key. Entries
    /// without a usable URL are skipped; a missing section means no targets.
    pub fn read_from(document: &toml::Table) -> Self {
        let Some(section) = document.get(TARGETS_SECTION) else {
            warn!(
                "No [{}] section in configuration, webhooks disabled",
                TARGETS_SECTION
            );
            return Self::default();
        };

        let entries: &[toml::Value] = match section.get(TARGET_ENTRY) {
            Some(toml::Value::Array(entries)) => entries.as_slice(),
            Some(toml::Value::Table(single)) => {
                return Self::new(url_of(single).map(str::to_owned));
            }
            Some(other) => {
                debug!("Ignoring non-table '{}' entry: {}", TARGET_ENTRY, other);
                &[]
            }
            None => &[],
        };

        let urls = entries.iter().filter_map(|entry| {
            let url = entry.as_table().and_then(url_of);
            if url.is_none() {
                debug!("Skipping {} entry without a url: {}", TARGET_ENTRY, entry);
            }
            url.map(str::to_owned)
        });

        Self::new(urls)
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

fn url_of(entry: &toml::Table) -> Option<&str> {
    entry
        .get(URL_KEY)
        .and_then(toml::Value::as_str)
        .filter(|url| !url.is_empty())
}

/// Shared handle to the current target list.
///
/// Readers take an `Arc` snapshot; reloads swap in a new list. The list
/// itself is never mutated after construction.
#[derive(Debug, Default)]
pub struct TargetRegistry {
    current: RwLock<Arc<TargetConfig>>,
}

impl TargetRegistry {
    pub fn new(targets: TargetConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(targets)),
        }
    }

    pub fn snapshot(&self) -> Arc<TargetConfig> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Swap in a new list, returning the one it replaces
    pub fn replace(&self, targets: TargetConfig) -> Arc<TargetConfig> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(targets))
    }
}
