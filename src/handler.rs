//! Reacts to finished builds by building and dispatching the payload

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::build::BuildInfo;
use crate::dispatch::{DispatchSummary, WebhookDispatcher};
use crate::events::{BuildEventBus, BuildFinished};
use crate::payload::PayloadBuilder;
use crate::target::{TargetConfig, TargetRegistry};

/// Serialized payload paired with the target list it is headed for
pub struct PreparedDelivery {
    pub body: Vec<u8>,
    pub targets: Arc<TargetConfig>,
}

pub struct BuildCompletionHandler {
    payloads: PayloadBuilder,
    dispatcher: WebhookDispatcher,
    targets: Arc<TargetRegistry>,
}

impl BuildCompletionHandler {
    pub fn new(
        payloads: PayloadBuilder,
        dispatcher: WebhookDispatcher,
        targets: Arc<TargetRegistry>,
    ) -> Self {
        Self {
            payloads,
            dispatcher,
            targets,
        }
    }

    /// Subscribe a new handler to `bus` and start consuming events.
    ///
    /// Each event is handled on its own task. The listener loop ends once
    /// every sender of the bus is dropped.
    pub fn attach(
        bus: &BuildEventBus,
        payloads: PayloadBuilder,
        dispatcher: WebhookDispatcher,
        targets: Arc<TargetRegistry>,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let handler = Arc::new(Self::new(payloads, dispatcher, targets));
        let mut events = BroadcastStream::new(bus.subscribe());

        let listener = Arc::clone(&handler);
        let task = tokio::spawn(async move {
            while let Some(item) = events.next().await {
                match item {
                    Ok(event) => {
                        let handler = Arc::clone(&listener);
                        tokio::spawn(async move {
                            handler.handle_event(event).await;
                        });
                    }
                    Err(BroadcastStreamRecvError::Lagged(missed)) => {
                        warn!("Build event listener lagged, {} events dropped", missed);
                    }
                }
            }
            debug!("Build event bus closed, listener stopped");
        });

        (handler, task)
    }

    /// Build the payload for `build` against the current target list.
    ///
    /// Returns `None` when there is nothing to send.
    pub fn prepare(&self, build: &dyn BuildInfo) -> Option<PreparedDelivery> {
        let targets = self.targets.snapshot();
        if targets.is_empty() {
            debug!("No webhook targets configured, skipping build {}", build.id());
            return None;
        }

        match self.payloads.build_payload(build, true).to_bytes() {
            Ok(body) => Some(PreparedDelivery { body, targets }),
            Err(e) => {
                error!("Unable to encode payload for build {}: {}", build.id(), e);
                None
            }
        }
    }

    pub async fn deliver(&self, prepared: PreparedDelivery) -> DispatchSummary {
        self.dispatcher
            .dispatch(&prepared.body, prepared.targets.urls())
            .await
    }

    pub async fn on_build_finished(&self, build: &dyn BuildInfo) -> DispatchSummary {
        match self.prepare(build) {
            Some(prepared) => self.deliver(prepared).await,
            None => DispatchSummary::default(),
        }
    }

    async fn handle_event(&self, event: BuildFinished) -> DispatchSummary {
        let BuildFinished { event_id, build } = event;
        let prepared = self.prepare(build.as_ref());
        log_event(event_id, build.as_ref());
        // The host's build must not outlive payload construction
        drop(build);

        match prepared {
            Some(prepared) => self.deliver(prepared).await,
            None => DispatchSummary::default(),
        }
    }
}

fn log_event(event_id: Uuid, build: &dyn BuildInfo) {
    info!(
        "Event {}: build {} #{} of '{}' finished with {}",
        event_id,
        build.id(),
        build.number().unwrap_or("?"),
        build.full_name().unwrap_or("unnamed"),
        build.status()
    );
}
