// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Broadcast channel for domain events.

use tokio::sync::broadcast;
use tracing::trace;

use crate::domain::events::OrchestratorEvent;

const CHANNEL_CAPACITY: usize = 1024;

/// Cheaply cloneable handle onto a shared broadcast channel. Lagging
/// subscribers drop the oldest unread events rather than blocking
/// publishers (`tokio::sync::broadcast` semantics).
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<OrchestratorEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Returns silently if there are no subscribers —
    /// discovery and the orchestrator may start in either order.
    pub fn publish(&self, event: OrchestratorEvent) {
        if self.sender.send(event.clone()).is_err() {
            trace!(?event, "published with no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
