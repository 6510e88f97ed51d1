//! Pub/Sub Adapter
//!
//! Connects the hub to a shared publish/subscribe channel so events
//! broadcast on one node reach the sockets of every node.

use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::hub::{Hub, HubError};
use super::messages::{Envelope, RealtimeEvent};
use crate::infrastructure::metrics;
use crate::infrastructure::pubsub::{EventPublisher, PubSubConnector};

/// Channel every node publishes to and subscribes on.
pub const EVENTS_CHANNEL: &str = "chatty#events";

/// Publishing side of an attached adapter.
pub struct RealtimeAdapter {
    publisher: Box<dyn EventPublisher>,
}

impl RealtimeAdapter {
    pub(super) async fn publish(&self, origin: Uuid, event: RealtimeEvent) -> Result<(), HubError> {
        let payload = serde_json::to_string(&Envelope { origin, event })?;
        self.publisher.publish(EVENTS_CHANNEL, payload).await?;
        metrics::record_realtime_event("published");
        Ok(())
    }
}

/// Connect both pub/sub handles and attach the adapter to `hub`.
///
/// The two connects run concurrently. Nothing is attached unless both
/// succeed. Returns the task relaying subscribed events into the hub; it
/// only finishes when the subscription ends, detaching the hub first.
pub async fn attach(
    connector: &dyn PubSubConnector,
    hub: Arc<Hub>,
) -> Result<JoinHandle<HubError>, HubError> {
    let (publisher, mut subscriber) =
        tokio::try_join!(connector.connect_publisher(), connector.connect_subscriber())?;

    subscriber.subscribe(EVENTS_CHANNEL).await?;
    hub.attach(RealtimeAdapter { publisher })?;
    tracing::info!(
        target: "realtime",
        node_id = %hub.node_id(),
        channel = EVENTS_CHANNEL,
        "Pub/sub adapter attached"
    );

    let mut events = subscriber.into_stream();
    Ok(tokio::spawn(async move {
        while let Some(payload) = events.next().await {
            relay(&hub, &payload);
        }
        hub.detach();
        tracing::error!(target: "realtime", node_id = %hub.node_id(), "Pub/sub subscription closed");
        HubError::SubscriptionClosed
    }))
}

/// Deliver one payload from the channel to local sockets.
fn relay(hub: &Hub, payload: &str) {
    let envelope: Envelope = match serde_json::from_str(payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(target: "realtime", error = %e, "Dropping malformed pub/sub payload");
            return;
        }
    };

    // Local sockets already got this one from `Hub::broadcast`.
    if envelope.origin == hub.node_id() {
        return;
    }

    metrics::record_realtime_event("received");
    let delivered = hub.deliver_local(&envelope.event);
    tracing::trace!(
        target: "realtime",
        event = %envelope.event.event,
        delivered,
        "Relayed event from pub/sub"
    );
}
