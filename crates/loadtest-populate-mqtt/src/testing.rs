//! In-process broker simulation for tests and local experiments.
//!
//! `SimulatedConnector` implements the same traits as
//! [`crate::mqtt::MqttConnector`] without any networking: acknowledgments
//! arrive after a configurable latency, selected ports refuse connections,
//! and publishes can be made to fail after a given count. Everything that
//! happens is recorded for later assertions.

use crate::client::{
    BrokerConnection, BrokerConnector, ConnectOptions, PublishHandle, PublishRequest,
};
use crate::error::{ConnectError, PublishError};
use crate::target::BrokerTarget;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Something a simulated connection did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulatedEvent {
    Connected { port: u16, client_id: String },
    BackgroundStarted { port: u16 },
    Published { port: u16, request: PublishRequest },
    BackgroundStopped { port: u16 },
    Disconnected { port: u16 },
}

#[derive(Debug, Default)]
struct Journal {
    events: Vec<SimulatedEvent>,
    in_flight: usize,
    max_in_flight: usize,
}

/// A broker connector that never touches the network.
#[derive(Debug, Clone, Default)]
pub struct SimulatedConnector {
    ack_latency: Duration,
    refused_ports: HashSet<u16>,
    fail_after: Option<u64>,
    journal: Arc<Mutex<Journal>>,
}

impl SimulatedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay between a publish and its acknowledgment.
    pub fn with_ack_latency(mut self, latency: Duration) -> Self {
        self.ack_latency = latency;
        self
    }

    /// Refuse every connection attempt to `port`.
    pub fn refuse_port(mut self, port: u16) -> Self {
        self.refused_ports.insert(port);
        self
    }

    /// Reject every publish after the first `count` on each connection.
    pub fn fail_after(mut self, count: u64) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Everything recorded so far, in order.
    pub fn events(&self) -> Vec<SimulatedEvent> {
        self.journal().events.clone()
    }

    /// All publish requests sent to `port`, in order.
    pub fn published_to(&self, port: u16) -> Vec<PublishRequest> {
        self.journal()
            .events
            .iter()
            .filter_map(|event| match event {
                SimulatedEvent::Published { port: p, request } if *p == port => {
                    Some(request.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Highest number of unacknowledged publishes seen at once.
    pub fn max_in_flight(&self) -> usize {
        self.journal().max_in_flight
    }

    fn journal(&self) -> MutexGuard<'_, Journal> {
        lock(&self.journal)
    }
}

fn lock(journal: &Mutex<Journal>) -> MutexGuard<'_, Journal> {
    journal.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl BrokerConnector for SimulatedConnector {
    type Connection = SimulatedConnection;

    async fn connect(
        &self,
        target: &BrokerTarget,
        options: &ConnectOptions,
    ) -> Result<Self::Connection, ConnectError> {
        if self.refused_ports.contains(&target.port) {
            return Err(ConnectError::Transport(format!(
                "connection refused by {target}"
            )));
        }

        self.journal().events.push(SimulatedEvent::Connected {
            port: target.port,
            client_id: options.client_id.clone(),
        });

        Ok(SimulatedConnection {
            port: target.port,
            ack_latency: self.ack_latency,
            ack_timeout: options.ack_timeout,
            fail_after: self.fail_after,
            published: 0,
            journal: Arc::clone(&self.journal),
        })
    }
}

/// Connection produced by [`SimulatedConnector`].
#[derive(Debug)]
pub struct SimulatedConnection {
    port: u16,
    ack_latency: Duration,
    ack_timeout: Option<Duration>,
    fail_after: Option<u64>,
    published: u64,
    journal: Arc<Mutex<Journal>>,
}

impl SimulatedConnection {
    fn record(&self, event: SimulatedEvent) {
        lock(&self.journal).events.push(event);
    }
}

#[async_trait]
impl BrokerConnection for SimulatedConnection {
    fn start_background_processing(&mut self) {
        self.record(SimulatedEvent::BackgroundStarted { port: self.port });
    }

    async fn publish(&mut self, request: PublishRequest) -> Result<PublishHandle, PublishError> {
        let (handle, ack) = PublishHandle::channel(request.topic.clone(), self.ack_timeout);
        let rejected = self.fail_after.is_some_and(|limit| self.published >= limit);
        self.published += 1;

        {
            let mut journal = lock(&self.journal);
            journal.events.push(SimulatedEvent::Published {
                port: self.port,
                request,
            });
            journal.in_flight += 1;
            journal.max_in_flight = journal.max_in_flight.max(journal.in_flight);
        }

        let outcome = if rejected {
            Err(PublishError::Rejected("simulated broker rejection".to_string()))
        } else {
            Ok(())
        };

        let journal = Arc::clone(&self.journal);
        let latency = self.ack_latency;
        let deliver = move || {
            lock(&journal).in_flight -= 1;
            let _ = ack.send(outcome);
        };
        if latency.is_zero() {
            deliver();
        } else {
            tokio::spawn(async move {
                tokio::time::sleep(latency).await;
                deliver();
            });
        }

        Ok(handle)
    }

    async fn stop_background_processing(&mut self) {
        self.record(SimulatedEvent::BackgroundStopped { port: self.port });
    }

    async fn disconnect(&mut self) -> Result<(), PublishError> {
        self.record(SimulatedEvent::Disconnected { port: self.port });
        Ok(())
    }
}
