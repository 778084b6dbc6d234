//! retained-loadtest library
//!
//! A load generator for MQTT brokers that fills one or more brokers with a
//! deterministic tree of retained messages at a controlled rate.
//!
//! # Crates
//!
//! - `loadtest_topics` - deterministic topic tree enumeration
//! - `loadtest_populate` - argument group shared by populate commands
//! - `loadtest_populate_mqtt` - rate-limited MQTT publisher and broker client
//!
//! # CLI Usage
//!
//! ```bash
//! # Fill two brokers with 10 levels x 10 values at 1000 msg/s each
//! retained-loadtest populate --broker nuc1:10000 --broker nuc1:10001 \
//!   --max-depth 10 --values-per-level 10 --messages-per-second 1000
//!
//! # Use a configuration file and record the outcome
//! retained-loadtest populate --config config/retained-messages.yaml \
//!   --metrics-output run.json
//!
//! # Show which topics would be published
//! retained-loadtest topics --max-depth 3 --values-per-level 2
//! ```

pub mod config;
pub mod loadtest;

pub use loadtest_populate_mqtt as mqtt;
pub use loadtest_topics as topics;
