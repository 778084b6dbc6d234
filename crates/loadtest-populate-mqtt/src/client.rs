//! Broker client abstraction used by the populator.
//!
//! The populator only needs to connect, publish, wait for an acknowledgment
//! and disconnect. Keeping that behind a trait lets the same publish loop run
//! against a real broker (`crate::mqtt`) or a simulated one
//! (`crate::testing`).

use crate::error::{ConnectError, MqttPopulatorError, PublishError};
use crate::target::BrokerTarget;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::oneshot;

/// Delivery guarantee requested for every publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum QosLevel {
    /// QoS 0: fire and forget.
    #[default]
    AtMostOnce,
    /// QoS 1: acknowledged with PUBACK.
    AtLeastOnce,
    /// QoS 2: four-way handshake ending with PUBCOMP.
    ExactlyOnce,
}

impl TryFrom<u8> for QosLevel {
    type Error = MqttPopulatorError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(QosLevel::AtMostOnce),
            1 => Ok(QosLevel::AtLeastOnce),
            2 => Ok(QosLevel::ExactlyOnce),
            other => Err(MqttPopulatorError::InvalidQos(other)),
        }
    }
}

impl From<QosLevel> for u8 {
    fn from(qos: QosLevel) -> Self {
        match qos {
            QosLevel::AtMostOnce => 0,
            QosLevel::AtLeastOnce => 1,
            QosLevel::ExactlyOnce => 2,
        }
    }
}

impl fmt::Display for QosLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// Keep-alive used when none is configured.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Options applied when opening a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// MQTT client identifier.
    pub client_id: String,
    /// Keep-alive interval negotiated with the broker.
    pub keep_alive: Duration,
    /// Upper bound on waiting for a single acknowledgment (`None` = wait forever).
    pub ack_timeout: Option<Duration>,
}

impl ConnectOptions {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            keep_alive: DEFAULT_KEEP_ALIVE,
            ack_timeout: None,
        }
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn with_ack_timeout(mut self, ack_timeout: Option<Duration>) -> Self {
        self.ack_timeout = ack_timeout;
        self
    }
}

/// A single message to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QosLevel,
    pub retain: bool,
}

impl PublishRequest {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>, qos: QosLevel) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos,
            retain: false,
        }
    }

    pub fn retained(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }
}

/// Outcome delivered by a connection once a publish is acknowledged.
pub type AckResult = Result<(), PublishError>;

/// Pending acknowledgment for one publish.
///
/// The connection resolves the paired [`AckSender`] when the broker confirms
/// delivery at the requested QoS, or fails it when the connection breaks.
#[derive(Debug)]
pub struct PublishHandle {
    topic: String,
    ack: oneshot::Receiver<AckResult>,
    timeout: Option<Duration>,
}

/// Completion side of a [`PublishHandle`].
pub type AckSender = oneshot::Sender<AckResult>;

impl PublishHandle {
    /// Create a handle and the sender that completes it.
    pub fn channel(topic: impl Into<String>, timeout: Option<Duration>) -> (Self, AckSender) {
        let (tx, rx) = oneshot::channel();
        let handle = Self {
            topic: topic.into(),
            ack: rx,
            timeout,
        };
        (handle, tx)
    }

    /// Wait until the broker acknowledges this publish.
    pub async fn wait_for_ack(self) -> Result<(), PublishError> {
        let Self {
            topic,
            ack,
            timeout,
        } = self;

        let received = match timeout {
            Some(limit) => tokio::time::timeout(limit, ack)
                .await
                .map_err(|_| PublishError::Timeout {
                    topic: topic.clone(),
                    timeout: limit,
                })?,
            None => ack.await,
        };

        received.map_err(|_| {
            PublishError::Disconnected(format!(
                "acknowledgment for '{topic}' dropped before completion"
            ))
        })?
    }
}

/// Opens connections to brokers.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    type Connection: BrokerConnection + 'static;

    /// Connect to `target`; returns once the broker has accepted the session.
    async fn connect(
        &self,
        target: &BrokerTarget,
        options: &ConnectOptions,
    ) -> Result<Self::Connection, ConnectError>;
}

/// An established broker session.
#[async_trait]
pub trait BrokerConnection: Send {
    /// Begin delivering acknowledgments asynchronously.
    fn start_background_processing(&mut self);

    /// Queue one publish and return a handle for its acknowledgment.
    async fn publish(&mut self, request: PublishRequest) -> Result<PublishHandle, PublishError>;

    /// Stop the background acknowledgment processing.
    async fn stop_background_processing(&mut self);

    /// Close the session.
    async fn disconnect(&mut self) -> Result<(), PublishError>;
}
