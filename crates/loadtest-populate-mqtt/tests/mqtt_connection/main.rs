//! `MqttConnector` against a scripted broker over real TCP sockets.
//!
//! These tests cover what the simulated connector cannot: packet ids from
//! `rumqttc` being matched to PUBACK/PUBCOMP, QoS 0 completing on write, the
//! DISCONNECT flush, and a broker dropping the socket mid-run.

mod acks_mqtt;
mod broker;

/// Install a test subscriber once; later calls are no-ops.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}
