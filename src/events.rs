//! Build completion events published by the CI host

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use crate::build::BuildInfo;

const DEFAULT_BUS_CAPACITY: usize = 256;

/// A build has finished on the host
#[derive(Clone)]
pub struct BuildFinished {
    pub event_id: Uuid,
    pub build: Arc<dyn BuildInfo>,
}

/// Fan-out channel between the host and its listeners
#[derive(Clone)]
pub struct BuildEventBus {
    sender: broadcast::Sender<BuildFinished>,
}

impl BuildEventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUS_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BuildFinished> {
        self.sender.subscribe()
    }

    /// Publish a finished build and return the id assigned to the event
    pub fn publish(&self, build: Arc<dyn BuildInfo>) -> Uuid {
        let event_id = Uuid::now_v7();
        if self.sender.send(BuildFinished { event_id, build }).is_err() {
            warn!("Build finished event {} dropped: no listeners", event_id);
        }
        event_id
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BuildEventBus {
    fn default() -> Self {
        Self::new()
    }
}
