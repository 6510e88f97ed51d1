//! Pub/Sub Module
//!
//! Redis publish/subscribe handles backing the realtime adapter.
//!
//! The adapter needs two live connections: one to publish on, and one held
//! in subscribe mode. Both are opened from the same connection settings.
//! The traits here let the adapter run against any transport with that
//! shape.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use redis::aio::{MultiplexedConnection, PubSub};
use redis::{AsyncCommands, Client, RedisError};
use tracing::{debug, instrument};

use crate::config::RedisSettings;

/// Publishing half of the adapter.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, channel: &str, payload: String) -> Result<(), RedisError>;
}

/// Subscribing half of the adapter.
#[async_trait]
pub trait EventSubscriber: Send {
    async fn subscribe(&mut self, channel: &str) -> Result<(), RedisError>;

    /// Payloads received on every subscribed channel.
    fn into_stream(self: Box<Self>) -> BoxStream<'static, String>;
}

/// Opens the two pub/sub handles.
#[async_trait]
pub trait PubSubConnector: Send + Sync {
    async fn connect_publisher(&self) -> Result<Box<dyn EventPublisher>, RedisError>;

    async fn connect_subscriber(&self) -> Result<Box<dyn EventSubscriber>, RedisError>;
}

/// Redis-backed connector.
pub struct RedisPubSub {
    url: String,
}

impl RedisPubSub {
    pub fn new(settings: &RedisSettings) -> Self {
        Self {
            url: settings.url.clone(),
        }
    }

    fn publisher_client(&self) -> Result<Client, RedisError> {
        Client::open(self.url.as_str())
    }

    /// Duplicate of the publisher's connection settings.
    fn subscriber_client(&self) -> Result<Client, RedisError> {
        let publisher = self.publisher_client()?;
        Client::open(publisher.get_connection_info().clone())
    }
}

#[async_trait]
impl PubSubConnector for RedisPubSub {
    #[instrument(skip(self), target = "realtime")]
    async fn connect_publisher(&self) -> Result<Box<dyn EventPublisher>, RedisError> {
        let connection = self
            .publisher_client()?
            .get_multiplexed_async_connection()
            .await?;
        debug!(target: "realtime", "Publish client connected");
        Ok(Box::new(RedisPublisher { connection }))
    }

    #[instrument(skip(self), target = "realtime")]
    async fn connect_subscriber(&self) -> Result<Box<dyn EventSubscriber>, RedisError> {
        let pubsub = self.subscriber_client()?.get_async_pubsub().await?;
        debug!(target: "realtime", "Subscribe client connected");
        Ok(Box::new(RedisSubscriber { pubsub }))
    }
}

struct RedisPublisher {
    connection: MultiplexedConnection,
}

#[async_trait]
impl EventPublisher for RedisPublisher {
    async fn publish(&self, channel: &str, payload: String) -> Result<(), RedisError> {
        let mut connection = self.connection.clone();
        let _receivers: i64 = connection.publish(channel, payload).await?;
        Ok(())
    }
}

struct RedisSubscriber {
    pubsub: PubSub,
}

#[async_trait]
impl EventSubscriber for RedisSubscriber {
    async fn subscribe(&mut self, channel: &str) -> Result<(), RedisError> {
        self.pubsub.subscribe(channel).await
    }

    fn into_stream(self: Box<Self>) -> BoxStream<'static, String> {
        self.pubsub
            .into_on_message()
            .filter_map(|message| async move { message.get_payload::<String>().ok() })
            .boxed()
    }
}
