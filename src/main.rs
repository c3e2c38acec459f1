use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tiny_webhook::dispatch::WebhookDispatcher;
use tiny_webhook::error::WebhookError;
use tiny_webhook::events::BuildEventBus;
use tiny_webhook::handler::BuildCompletionHandler;
use tiny_webhook::logging::{FileLogger, setup_logging};
use tiny_webhook::payload::PayloadBuilder;
use tiny_webhook::{AppState, WebhookConfig, api, parse_config};
use tracing::{error, info};

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8888";
const DEFAULT_CONFIG_PATH: &str = "tiny_webhook.toml";

/// Load and parse the configuration file
fn load_config(path: &str) -> Result<WebhookConfig, WebhookError> {
    let config_str = fs::read_to_string(path).map_err(|e| {
        WebhookError::ConfigError(format!("Failed to read config file '{}': {}", path, e))
    })?;

    parse_config(&config_str).map_err(|e| {
        WebhookError::ConfigError(format!("Failed to parse config file '{}': {}", path, e))
    })
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let bind_address =
        std::env::var("BIND_ADDRESS").unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string());
    let config_path =
        std::env::var("TINY_WEBHOOK_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let file_logger = std::env::var("LOG_DIR").ok().map(|dir| {
        let logger = FileLogger::new(PathBuf::from(dir));
        match std::env::var("LOG_MAX_FILES").ok().and_then(|n| n.parse().ok()) {
            Some(max_files) => logger.with_max_files(max_files),
            None => logger,
        }
    });

    let (recent_logs, _log_guard) = match setup_logging(file_logger.as_ref()) {
        Ok(logging) => logging,
        Err(e) => {
            eprintln!("Logging setup error: {}", e);
            std::process::exit(1);
        }
    };

    let config = match load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let dispatcher = match WebhookDispatcher::new(&config.delivery) {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let events = BuildEventBus::new();
    let state = Arc::new(AppState::new(
        PathBuf::from(&config_path),
        &config,
        events.clone(),
        recent_logs,
    ));

    let (_handler, _listener) = BuildCompletionHandler::attach(
        &events,
        PayloadBuilder::new(config.root_url.clone()),
        dispatcher,
        Arc::clone(&state.targets),
    );

    info!("Listening on {}", bind_address);
    info!("Using config at {:?}", config_path);
    info!(
        "{} webhook target(s) configured, root URL {}",
        config.targets.len(),
        config.root_url
    );

    let listener = match tokio::net::TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", bind_address, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, api::router(state)).await {
        error!("Server error: {}", e);
    }
}
