//! Durable publish/subscribe over JetStream.

use async_nats::HeaderMap;
use async_nats::header::NATS_MESSAGE_ID;
use async_nats::jetstream::{self, consumer, stream};
use bytes::Bytes;
use futures::StreamExt;
use tracing::{debug, info, instrument, warn};

use super::connection::Connection;
use super::error::TransportError;
use super::topics::{STREAMS, StreamTopic};
use super::{EventPublisher, OutboundMessage, PublishReceipt};

/// Publish/subscribe handle bound to one [`Connection`].
#[derive(Clone)]
pub struct StreamContext {
    connection: Connection,
    jetstream: jetstream::Context,
}

impl std::fmt::Debug for StreamContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamContext")
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

impl StreamContext {
    pub(super) fn new(connection: Connection) -> Self {
        let jetstream = jetstream::new(connection.client().clone());
        StreamContext {
            connection,
            jetstream,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Creates every stream in [`STREAMS`] that does not exist yet.
    ///
    /// Safe to call on every startup; existing streams are left untouched.
    pub async fn ensure_streams(&self) -> Result<(), TransportError> {
        self.connection.ensure_connected()?;

        for def in STREAMS {
            let config = stream::Config {
                name: def.name.to_string(),
                subjects: def.subjects.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            };
            self.jetstream
                .get_or_create_stream(config)
                .await
                .map_err(|e| TransportError::StreamSetup {
                    stream: def.name.to_string(),
                    cause: e.to_string(),
                })?;
            info!(stream = def.name, subjects = ?def.subjects, "Stream ready");
        }
        Ok(())
    }

    /// Publishes `message` to `topic` and waits for the broker to persist it.
    #[instrument(skip(self, message), fields(bytes = message.payload.len()))]
    pub async fn publish(
        &self,
        topic: &str,
        message: OutboundMessage,
    ) -> Result<PublishReceipt, TransportError> {
        self.connection.ensure_connected()?;

        let failed = |e: &dyn std::fmt::Display| TransportError::PublishFailed {
            topic: topic.to_string(),
            cause: e.to_string(),
        };

        let mut headers = HeaderMap::new();
        if let Some(id) = &message.dedupe_id {
            headers.insert(NATS_MESSAGE_ID, id.as_str());
        }

        let ack = self
            .jetstream
            .publish_with_headers(topic.to_string(), headers, message.payload)
            .await
            .map_err(|e| failed(&e))?
            .await
            .map_err(|e| failed(&e))?;

        if ack.duplicate {
            debug!(stream = %ack.stream, sequence = ack.sequence, "Broker dropped duplicate");
        }

        Ok(PublishReceipt {
            stream: ack.stream,
            sequence: ack.sequence,
            duplicate: ack.duplicate,
        })
    }

    /// Joins the durable consumer group behind `topic`.
    ///
    /// The consumer is created on first use and resumes from its last
    /// acknowledged delivery afterwards, across restarts.
    pub async fn subscribe_durable(
        &self,
        topic: &StreamTopic,
    ) -> Result<DurableSubscription, TransportError> {
        self.connection.ensure_connected()?;

        let failed = |cause: String| TransportError::SubscribeFailed {
            topic: topic.subject.to_string(),
            cause,
        };

        let (Some(name), Some(deliver_subject)) = (topic.consumer_name(), topic.deliver_subject())
        else {
            return Err(failed("topic has no durable consumer".to_string()));
        };

        let stream = self
            .jetstream
            .get_stream(topic.stream)
            .await
            .map_err(|e| failed(e.to_string()))?;

        let config = consumer::push::Config {
            durable_name: Some(name.clone()),
            deliver_subject,
            deliver_group: topic.group.map(String::from),
            filter_subject: topic.subject.to_string(),
            ack_policy: consumer::AckPolicy::Explicit,
            deliver_policy: consumer::DeliverPolicy::All,
            ..Default::default()
        };

        let consumer = stream
            .get_or_create_consumer(&name, config)
            .await
            .map_err(|e| failed(e.to_string()))?;
        let messages = consumer
            .messages()
            .await
            .map_err(|e| failed(e.to_string()))?;

        info!(topic = topic.subject, consumer = %name, group = ?topic.group, "Subscribed");
        Ok(DurableSubscription {
            topic: topic.subject,
            messages,
        })
    }
}

impl EventPublisher for StreamContext {
    async fn publish(
        &self,
        topic: &str,
        message: OutboundMessage,
    ) -> Result<PublishReceipt, TransportError> {
        StreamContext::publish(self, topic, message).await
    }
}

/// Deliveries from a durable consumer group.
pub struct DurableSubscription {
    topic: &'static str,
    messages: consumer::push::Messages,
}

impl DurableSubscription {
    pub fn topic(&self) -> &'static str {
        self.topic
    }

    /// Waits for the next delivery. `None` once the subscription has ended.
    pub async fn next_delivery(&mut self) -> Option<Result<Delivery, TransportError>> {
        let item = self.messages.next().await?;
        Some(match item {
            Ok(message) => Ok(Delivery {
                topic: self.topic,
                message,
            }),
            Err(e) => {
                warn!(topic = self.topic, error = %e, "Delivery failed");
                Err(TransportError::Unavailable(e.to_string()))
            }
        })
    }
}

/// One message from a durable subscription.
///
/// Redelivered by the broker until [`Delivery::ack`] succeeds.
pub struct Delivery {
    topic: &'static str,
    message: jetstream::Message,
}

impl Delivery {
    pub fn topic(&self) -> &'static str {
        self.topic
    }

    pub fn subject(&self) -> &str {
        &self.message.subject
    }

    pub fn payload(&self) -> &Bytes {
        &self.message.payload
    }

    /// Dedupe id the publisher attached, if any.
    pub fn dedupe_id(&self) -> Option<&str> {
        self.message
            .headers
            .as_ref()?
            .get(NATS_MESSAGE_ID)
            .map(|v| v.as_str())
    }

    pub async fn ack(self) -> Result<(), TransportError> {
        self.message
            .ack()
            .await
            .map_err(|e| TransportError::AckFailed {
                topic: self.topic.to_string(),
                cause: e.to_string(),
            })
    }
}
