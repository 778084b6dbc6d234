//! Error types for the MQTT populator.

use std::time::Duration;
use thiserror::Error;

/// A connection to a broker could not be established.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("Timed out after {0:?} waiting for CONNACK")]
    Timeout(Duration),

    #[error("Broker refused connection: {0}")]
    Refused(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// A publish was not acknowledged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("Failed to queue publish for '{topic}': {reason}")]
    Client { topic: String, reason: String },

    #[error("No acknowledgment for '{topic}' within {timeout:?}")]
    Timeout { topic: String, timeout: Duration },

    #[error("Broker rejected publish: {0}")]
    Rejected(String),

    #[error("Connection lost: {0}")]
    Disconnected(String),
}

/// Errors that can occur during MQTT population.
#[derive(Error, Debug)]
pub enum MqttPopulatorError {
    #[error("Connect error: {0}")]
    Connect(#[from] ConnectError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Invalid broker address '{0}'")]
    InvalidBroker(String),

    #[error("Invalid QoS level {0} (expected 0, 1 or 2)")]
    InvalidQos(u8),
}
