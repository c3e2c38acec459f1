use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_core::{Event, Level, Subscriber};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::Result;

const DEFAULT_MAX_LOG_FILES: usize = 5;
const DEFAULT_RECENT_ENTRIES: usize = 100;
const DEFAULT_FILTER: &str = "info";

#[derive(Clone, Debug, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub target: String,
    pub message: String,
}

/// Daily rolling log files under a directory
pub struct FileLogger {
    log_directory: PathBuf,
    max_files: usize,
}

impl FileLogger {
    pub fn new(log_directory: PathBuf) -> Self {
        Self {
            log_directory,
            max_files: DEFAULT_MAX_LOG_FILES,
        }
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn setup_file_logging(&self) -> Result<(NonBlocking, WorkerGuard)> {
        std::fs::create_dir_all(&self.log_directory)?;

        let file_appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("tiny_webhook")
            .max_log_files(self.max_files)
            .build(&self.log_directory)
            .map_err(|e| {
                crate::error::WebhookError::ConfigError(format!(
                    "Failed to create log appender in {:?}: {}",
                    self.log_directory, e
                ))
            })?;

        Ok(tracing_appender::non_blocking(file_appender))
    }
}

/// Bounded buffer of the most recent warnings and errors
#[derive(Clone)]
pub struct RecentLogs {
    inner: Arc<Mutex<VecDeque<LogEntry>>>,
    capacity: usize,
}

impl RecentLogs {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, entry: LogEntry) {
        let mut logs = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        while logs.len() >= self.capacity {
            logs.pop_front();
        }
        logs.push_back(entry);
    }

    /// Oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        let logs = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        logs.iter().cloned().collect()
    }

    pub fn entries_at(&self, level: Level) -> Vec<LogEntry> {
        let level = level.to_string();
        self.entries()
            .into_iter()
            .filter(|entry| entry.level == level)
            .collect()
    }
}

impl Default for RecentLogs {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_ENTRIES)
    }
}

/// Helper to extract log message
#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_str(&mut self, field: &tracing_core::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }

    fn record_debug(&mut self, field: &tracing_core::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
}

/// Layer copying WARN and ERROR events into a [`RecentLogs`] buffer
#[derive(Clone, Default)]
pub struct RecentLogLayer {
    logs: RecentLogs,
}

impl RecentLogLayer {
    pub fn logs(&self) -> RecentLogs {
        self.logs.clone()
    }
}

impl<S: Subscriber> Layer<S> for RecentLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() > Level::WARN {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        self.logs.push(LogEntry {
            timestamp: Utc::now(),
            level: metadata.level().to_string(),
            target: metadata.target().to_string(),
            message: visitor.message,
        });
    }
}

/// Install the global subscriber: console output, optional rolling files,
/// and the recent-log buffer. Hold on to the returned guard for as long as
/// file logging should keep flushing.
pub fn setup_logging(
    file_logger: Option<&FileLogger>,
) -> Result<(RecentLogs, Option<WorkerGuard>)> {
    let recent = RecentLogLayer::default();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let (file_layer, guard) = match file_logger {
        Some(file_logger) => {
            let (writer, guard) = file_logger.setup_file_logging()?;
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(recent.clone())
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok((recent.logs(), guard))
}
