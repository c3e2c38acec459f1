use std::io;

/// Custom error type for tiny_webhook operations
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Unable to get VCS revision for root '{root}': {message}")]
    VcsLookupFailed { root: String, message: String },

    #[error("Bad status code when sending to {url}. Code: {status}")]
    BadStatus { url: String, status: u16 },

    #[error("Unable to send webhook to {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParseError(#[from] toml::de::Error),
}

/// Helper type for Results that use WebhookError
pub type Result<T> = std::result::Result<T, WebhookError>;
