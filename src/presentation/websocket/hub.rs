//! WebSocket Hub
//!
//! Tracks the sockets connected to this node and fans events out to them.
//! Once a pub/sub adapter is attached, broadcasts also reach the sockets of
//! every other node sharing the channel.

use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::adapter::RealtimeAdapter;
use super::messages::RealtimeEvent;

/// Errors raised by [`Hub::broadcast`] and [`Hub::attach`].
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("realtime adapter already attached")]
    AlreadyAttached,

    #[error("failed to encode realtime event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("pub/sub error: {0}")]
    PubSub(#[from] redis::RedisError),

    #[error("pub/sub subscription closed")]
    SubscriptionClosed,
}

/// Realtime hub for one node
pub struct Hub {
    node_id: Uuid,
    /// Outgoing channel of each socket, by session id
    sessions: DashMap<String, mpsc::UnboundedSender<RealtimeEvent>>,
    adapter: OnceCell<RealtimeAdapter>,
    /// Cleared when the subscription relaying remote events ends
    attached: AtomicBool,
}

impl Hub {
    pub fn new() -> Self {
        Self {
            node_id: Uuid::new_v4(),
            sessions: DashMap::new(),
            adapter: OnceCell::new(),
            attached: AtomicBool::new(false),
        }
    }

    pub fn node_id(&self) -> Uuid {
        self.node_id
    }

    /// Register a connected socket
    pub fn register_session(&self, session_id: String, sender: mpsc::UnboundedSender<RealtimeEvent>) {
        tracing::info!(target: "realtime", session_id = %session_id, "Session registered");
        self.sessions.insert(session_id, sender);
    }

    /// Unregister a socket
    pub fn unregister_session(&self, session_id: &str) {
        if self.sessions.remove(session_id).is_some() {
            tracing::info!(target: "realtime", session_id = %session_id, "Session unregistered");
        }
    }

    /// Get session count
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Deliver an event to the sockets on this node only.
    ///
    /// Returns the number of sockets that accepted it. Sockets whose
    /// receiving side is gone are dropped.
    pub fn deliver_local(&self, event: &RealtimeEvent) -> usize {
        let mut closed = Vec::new();
        let mut delivered = 0;

        for entry in self.sessions.iter() {
            if entry.value().send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                closed.push(entry.key().clone());
            }
        }

        for session_id in closed {
            self.unregister_session(&session_id);
        }
        delivered
    }

    /// Deliver an event to local sockets and publish it to the other nodes.
    pub async fn broadcast(&self, event: RealtimeEvent) -> Result<usize, HubError> {
        let delivered = self.deliver_local(&event);
        if let Some(adapter) = self.adapter.get().filter(|_| self.is_attached()) {
            adapter.publish(self.node_id, event).await?;
        }
        Ok(delivered)
    }

    pub(super) fn attach(&self, adapter: RealtimeAdapter) -> Result<(), HubError> {
        self.adapter
            .set(adapter)
            .map_err(|_| HubError::AlreadyAttached)?;
        self.attached.store(true, Ordering::Release);
        Ok(())
    }

    /// Stop publishing. Remote events no longer arrive, so the hub is local only.
    pub(super) fn detach(&self) {
        self.attached.store(false, Ordering::Release);
    }

    /// Whether a pub/sub adapter is attached and its subscription is live.
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}
