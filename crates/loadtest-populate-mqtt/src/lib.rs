//! MQTT retained-message populator for broker load testing.
//!
//! This crate provides the `MqttPopulator` which walks a
//! [`loadtest_topics::TopicTree`] depth-first and publishes one retained
//! message per topic to a single broker. Each publish waits for its
//! acknowledgment before the next one is sent, and the loop sleeps away
//! whatever is left of the per-message interval so the broker sees a steady
//! target rate.
//!
//! # Architecture
//!
//! ```text
//!   TopicTree ──► TopicPaths (pre-order)
//!                      │
//!                      ▼
//!              ┌───────────────┐        ┌──────────────────┐
//!              │ MqttPopulator │──────► │ BrokerConnector  │
//!              │               │        │  - MqttConnector │
//!              │ - RateLimiter │        │  - Simulated...  │
//!              │ - RateState   │        └────────┬─────────┘
//!              └───────┬───────┘                 │
//!                      │ publish + wait_for_ack  ▼
//!                      └────────────────► BrokerConnection
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use loadtest_populate_mqtt::{MqttConnector, MqttPopulator, PublishJob, QosLevel};
//! use loadtest_topics::TopicTree;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let tree = TopicTree::new(3, 10)?;
//!     let job = PublishJob::new(1, "localhost:1883".parse()?, tree)
//!         .with_qos(QosLevel::AtLeastOnce)
//!         .with_rate(500.0);
//!
//!     let metrics = MqttPopulator::new(MqttConnector::new(), job).populate().await?;
//!     println!("Published {} messages in {:?}", metrics.messages_published, metrics.total_duration);
//!
//!     Ok(())
//! }
//! ```

pub mod args;
pub mod client;
pub mod error;
pub mod mqtt;
pub mod populator;
pub mod rate;
pub mod target;
pub mod testing;

// Re-exports for convenience
pub use args::{CommonPopulateArgs, MqttPopulateArgs};
pub use client::{
    BrokerConnection, BrokerConnector, ConnectOptions, PublishHandle, PublishRequest, QosLevel,
    DEFAULT_KEEP_ALIVE,
};
pub use error::{ConnectError, MqttPopulatorError, PublishError};
pub use mqtt::{MqttConnection, MqttConnector};
pub use populator::{
    payload_for, MqttPopulator, PopulateFailure, PopulateMetrics, PublishJob, DEFAULT_SETTLE_DELAY,
    DEFAULT_TOPIC_ROOT,
};
pub use rate::{RateLimiter, RateState, DEFAULT_PROGRESS_INTERVAL};
pub use target::{BrokerTarget, DEFAULT_MQTT_PORT};
pub use testing::SimulatedConnector;
