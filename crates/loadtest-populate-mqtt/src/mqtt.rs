//! `rumqttc`-backed broker connections.
//!
//! `rumqttc` splits a session into an `AsyncClient` (request side) and an
//! `EventLoop` that must be polled for anything to reach the network. The
//! connector polls the event loop itself until CONNACK; afterwards a
//! background task owns the event loop and turns outgoing/incoming packets
//! into completed [`PublishHandle`]s:
//!
//! ```text
//! publish() ──► Registration ──┐
//!     │                        ▼
//!     └──► AsyncClient ──► EventLoop ──► Outgoing::Publish(pkid)
//!                                   ──► Incoming::PubAck(pkid) / PubComp(pkid)
//! ```
//!
//! QoS 0 publishes complete once written, QoS 1 on PUBACK and QoS 2 on
//! PUBCOMP.

use crate::client::{
    AckSender, BrokerConnection, BrokerConnector, ConnectOptions, PublishHandle, PublishRequest,
    QosLevel,
};
use crate::error::{ConnectError, PublishError};
use crate::target::BrokerTarget;
use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Outgoing,
    Packet, QoS,
};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Default upper bound on establishing a session.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Capacity of the request channel between `AsyncClient` and `EventLoop`.
pub const DEFAULT_REQUEST_CAPACITY: usize = 64;

/// How long `disconnect` keeps driving a stopped event loop.
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

impl From<QosLevel> for QoS {
    fn from(qos: QosLevel) -> Self {
        match qos {
            QosLevel::AtMostOnce => QoS::AtMostOnce,
            QosLevel::AtLeastOnce => QoS::AtLeastOnce,
            QosLevel::ExactlyOnce => QoS::ExactlyOnce,
        }
    }
}

/// Connector for MQTT 3.1.1 brokers.
#[derive(Debug, Clone)]
pub struct MqttConnector {
    connect_timeout: Duration,
    request_capacity: usize,
}

impl Default for MqttConnector {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_capacity: DEFAULT_REQUEST_CAPACITY,
        }
    }
}

impl MqttConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the upper bound on waiting for CONNACK.
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    fn options(&self, target: &BrokerTarget, options: &ConnectOptions) -> MqttOptions {
        let mut mqtt_options =
            MqttOptions::new(options.client_id.clone(), target.host.clone(), target.port);
        mqtt_options.set_keep_alive(whole_second_keep_alive(options.keep_alive));
        mqtt_options.set_clean_session(true);
        if let Some(username) = &target.username {
            mqtt_options.set_credentials(
                username.clone(),
                target.password.clone().unwrap_or_default(),
            );
        }
        mqtt_options
    }
}

/// MQTT carries keep-alive in whole seconds, and `rumqttc` panics on a
/// non-zero interval below one second, so such values are rounded up.
fn whole_second_keep_alive(keep_alive: Duration) -> Duration {
    if keep_alive.is_zero() {
        keep_alive
    } else {
        keep_alive.max(Duration::from_secs(1))
    }
}

#[async_trait]
impl BrokerConnector for MqttConnector {
    type Connection = MqttConnection;

    async fn connect(
        &self,
        target: &BrokerTarget,
        options: &ConnectOptions,
    ) -> Result<Self::Connection, ConnectError> {
        let (client, mut event_loop) =
            AsyncClient::new(self.options(target, options), self.request_capacity);

        tokio::time::timeout(self.connect_timeout, wait_for_connack(&mut event_loop))
            .await
            .map_err(|_| ConnectError::Timeout(self.connect_timeout))??;

        debug!("Session established with {}", target);

        Ok(MqttConnection {
            client,
            ack_timeout: options.ack_timeout,
            state: LoopState::Idle(event_loop),
            registrations: None,
        })
    }
}

async fn wait_for_connack(event_loop: &mut EventLoop) -> Result<(), ConnectError> {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                return match connack.code {
                    ConnectReturnCode::Success => Ok(()),
                    code => Err(ConnectError::Refused(format!("{code:?}"))),
                };
            }
            Ok(event) => trace!(?event, "Event before CONNACK"),
            Err(ConnectionError::ConnectionRefused(code)) => {
                return Err(ConnectError::Refused(format!("{code:?}")));
            }
            Err(e) => return Err(ConnectError::Transport(e.to_string())),
        }
    }
}

/// A publish waiting to be matched with its outgoing packet id.
#[derive(Debug)]
struct Registration {
    qos: QosLevel,
    ack: AckSender,
}

/// Who currently owns the event loop.
enum LoopState {
    /// Not being polled; owned by the connection.
    Idle(EventLoop),
    /// Owned by the background task.
    Running {
        stop: oneshot::Sender<()>,
        task: JoinHandle<EventLoop>,
    },
    /// Lost to a panicked background task.
    Gone,
}

/// An MQTT session driven by `rumqttc`.
pub struct MqttConnection {
    client: AsyncClient,
    ack_timeout: Option<Duration>,
    state: LoopState,
    registrations: Option<mpsc::UnboundedSender<Registration>>,
}

impl std::fmt::Debug for MqttConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            LoopState::Idle(_) => "idle",
            LoopState::Running { .. } => "running",
            LoopState::Gone => "gone",
        };
        f.debug_struct("MqttConnection")
            .field("state", &state)
            .field("ack_timeout", &self.ack_timeout)
            .finish()
    }
}

#[async_trait]
impl BrokerConnection for MqttConnection {
    fn start_background_processing(&mut self) {
        let event_loop = match std::mem::replace(&mut self.state, LoopState::Gone) {
            LoopState::Idle(event_loop) => event_loop,
            running => {
                self.state = running;
                return;
            }
        };

        let (registrations_tx, registrations_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(drive_event_loop(event_loop, registrations_rx, stop_rx));

        self.registrations = Some(registrations_tx);
        self.state = LoopState::Running {
            stop: stop_tx,
            task,
        };
    }

    async fn publish(&mut self, request: PublishRequest) -> Result<PublishHandle, PublishError> {
        let registrations = self.registrations.as_ref().ok_or_else(|| {
            PublishError::Disconnected("background processing is not running".to_string())
        })?;

        let (handle, ack) = PublishHandle::channel(request.topic.clone(), self.ack_timeout);
        registrations
            .send(Registration {
                qos: request.qos,
                ack,
            })
            .map_err(|_| PublishError::Disconnected("event loop has stopped".to_string()))?;

        self.client
            .publish(
                request.topic.clone(),
                request.qos.into(),
                request.retain,
                request.payload,
            )
            .await
            .map_err(|e| PublishError::Client {
                topic: request.topic,
                reason: e.to_string(),
            })?;

        Ok(handle)
    }

    async fn stop_background_processing(&mut self) {
        self.registrations = None;
        match std::mem::replace(&mut self.state, LoopState::Gone) {
            LoopState::Running { stop, task } => {
                // The task may already have exited on a connection error.
                let _ = stop.send(());
                match task.await {
                    Ok(event_loop) => self.state = LoopState::Idle(event_loop),
                    Err(e) => warn!("Event loop task ended abnormally: {}", e),
                }
            }
            other => self.state = other,
        }
    }

    async fn disconnect(&mut self) -> Result<(), PublishError> {
        self.client
            .disconnect()
            .await
            .map_err(|e| PublishError::Disconnected(e.to_string()))?;

        // A running background task flushes the DISCONNECT itself.
        let LoopState::Idle(event_loop) = &mut self.state else {
            return Ok(());
        };

        let flushed = tokio::time::timeout(DISCONNECT_TIMEOUT, async {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => return Ok(()),
                    Ok(_) => continue,
                    Err(e) => return Err(PublishError::Disconnected(e.to_string())),
                }
            }
        })
        .await;

        match flushed {
            Ok(result) => result,
            Err(_) => Err(PublishError::Disconnected(format!(
                "DISCONNECT not written within {DISCONNECT_TIMEOUT:?}"
            ))),
        }
    }
}

/// Poll the event loop until told to stop or the connection fails, resolving
/// acknowledgments along the way.
async fn drive_event_loop(
    mut event_loop: EventLoop,
    mut registrations: mpsc::UnboundedReceiver<Registration>,
    mut stop: oneshot::Receiver<()>,
) -> EventLoop {
    let mut awaiting: HashMap<u16, AckSender> = HashMap::new();

    loop {
        let event = tokio::select! {
            biased;
            _ = &mut stop => break,
            event = event_loop.poll() => event,
        };

        match event {
            Ok(Event::Outgoing(Outgoing::Publish(pkid))) => {
                // Registrations are queued before the request reaches the
                // client, so one is always waiting here.
                let Ok(registration) = registrations.try_recv() else {
                    warn!("Outgoing publish {} without a registration", pkid);
                    continue;
                };
                match registration.qos {
                    QosLevel::AtMostOnce => {
                        let _ = registration.ack.send(Ok(()));
                    }
                    QosLevel::AtLeastOnce | QosLevel::ExactlyOnce => {
                        awaiting.insert(pkid, registration.ack);
                    }
                }
            }
            Ok(Event::Incoming(Packet::PubAck(puback))) => {
                complete(&mut awaiting, puback.pkid);
            }
            Ok(Event::Incoming(Packet::PubComp(pubcomp))) => {
                complete(&mut awaiting, pubcomp.pkid);
            }
            Ok(event) => trace!(?event, "Event"),
            Err(e) => {
                let reason = e.to_string();
                warn!("Event loop stopped: {}", reason);
                for (_, ack) in awaiting.drain() {
                    let _ = ack.send(Err(PublishError::Disconnected(reason.clone())));
                }
                registrations.close();
                while let Ok(registration) = registrations.try_recv() {
                    let _ = registration
                        .ack
                        .send(Err(PublishError::Disconnected(reason.clone())));
                }
                break;
            }
        }
    }

    event_loop
}

fn complete(awaiting: &mut HashMap<u16, AckSender>, pkid: u16) {
    match awaiting.remove(&pkid) {
        Some(ack) => {
            let _ = ack.send(Ok(()));
        }
        None => debug!("Acknowledgment for unknown packet id {}", pkid),
    }
}
