//! A scripted single-connection MQTT 3.1.1 broker.
//!
//! It accepts one client, acknowledges publishes at the QoS they request and
//! records what it saw. Packets are decoded by hand so the `rumqttc` side is
//! tested against bytes it did not produce itself.

use loadtest_populate_mqtt::BrokerTarget;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

const CONNECT: u8 = 1;
const PUBLISH: u8 = 3;
const PUBREL: u8 = 6;
const PINGREQ: u8 = 12;
const DISCONNECT: u8 = 14;

/// How the broker misbehaves.
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Wait this long before acknowledging a QoS 1 or 2 publish.
    pub ack_delay: Duration,
    /// Close the socket on receiving this publish (1-based) instead of
    /// acknowledging it.
    pub close_on_publish: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedPublish {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: u8,
    pub retain: bool,
}

/// Everything the broker observed on its one connection.
#[derive(Debug, Default)]
pub struct Session {
    pub client_id: String,
    pub publishes: Vec<ReceivedPublish>,
    /// Publishes that arrived while an earlier one was still unacknowledged.
    pub pipelined: usize,
    pub disconnected: bool,
}

pub struct ScriptedBroker {
    port: u16,
    task: JoinHandle<io::Result<Session>>,
}

impl ScriptedBroker {
    pub async fn start(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let task = tokio::spawn(async move {
            let (stream, _) = listener.accept().await?;
            serve(Connection::new(stream), script).await
        });
        Self { port, task }
    }

    pub fn target(&self) -> BrokerTarget {
        BrokerTarget::new("127.0.0.1", self.port)
    }

    /// Wait for the client to go away and return what the broker saw.
    pub async fn finish(self) -> Session {
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("broker did not finish")
            .expect("broker task panicked")
            .expect("broker I/O failed")
    }
}

async fn serve(mut connection: Connection, script: Script) -> io::Result<Session> {
    let mut session = Session::default();

    while let Some(packet) = connection.read_packet().await? {
        match packet.header >> 4 {
            CONNECT => {
                session.client_id = client_id(&packet.body);
                connection.write(&[0x20, 2, 0, 0]).await?;
            }
            PUBLISH => {
                let (received, pkid) = parse_publish(packet.header, &packet.body);
                let qos = received.qos;
                session.publishes.push(received);

                if script.close_on_publish == Some(session.publishes.len()) {
                    return Ok(session);
                }
                let Some([msb, lsb]) = pkid else {
                    continue;
                };

                tokio::time::sleep(script.ack_delay).await;
                if connection.publish_pending().await {
                    session.pipelined += 1;
                }
                // PUBACK for QoS 1, PUBREC for QoS 2.
                let ack = if qos == 1 { 0x40 } else { 0x50 };
                connection.write(&[ack, 2, msb, lsb]).await?;
            }
            PUBREL => {
                connection
                    .write(&[0x70, 2, packet.body[0], packet.body[1]])
                    .await?;
            }
            PINGREQ => connection.write(&[0xD0, 0]).await?,
            DISCONNECT => {
                session.disconnected = true;
                return Ok(session);
            }
            other => panic!("unexpected packet type {other}"),
        }
    }

    Ok(session)
}

/// The client identifier follows the 10-byte MQTT 3.1.1 variable header.
fn client_id(body: &[u8]) -> String {
    let len = usize::from(u16::from_be_bytes([body[10], body[11]]));
    String::from_utf8(body[12..12 + len].to_vec()).unwrap()
}

fn parse_publish(header: u8, body: &[u8]) -> (ReceivedPublish, Option<[u8; 2]>) {
    let qos = (header >> 1) & 0b11;
    let retain = header & 1 == 1;

    let topic_len = usize::from(u16::from_be_bytes([body[0], body[1]]));
    let topic = String::from_utf8(body[2..2 + topic_len].to_vec()).unwrap();
    let mut rest = &body[2 + topic_len..];

    let pkid = (qos > 0).then(|| {
        let id = [rest[0], rest[1]];
        rest = &rest[2..];
        id
    });

    let received = ReceivedPublish {
        topic,
        payload: rest.to_vec(),
        qos,
        retain,
    };
    (received, pkid)
}

struct Packet {
    header: u8,
    body: Vec<u8>,
}

struct Connection {
    stream: TcpStream,
    buffer: Vec<u8>,
}

impl Connection {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            buffer: Vec::new(),
        }
    }

    /// Next complete packet, or `None` once the client has gone away.
    async fn read_packet(&mut self) -> io::Result<Option<Packet>> {
        loop {
            if let Some(packet) = self.take_packet() {
                return Ok(Some(packet));
            }

            let mut chunk = [0u8; 4096];
            let n = match self.stream.read(&mut chunk).await {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::ConnectionReset => 0,
                Err(e) => return Err(e),
            };
            if n == 0 {
                return Ok(None);
            }
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }

    fn take_packet(&mut self) -> Option<Packet> {
        let (len, len_bytes) = remaining_length(self.buffer.get(1..)?)?;
        let total = 1 + len_bytes + len;
        if self.buffer.len() < total {
            return None;
        }

        let header = self.buffer[0];
        let body = self.buffer[1 + len_bytes..total].to_vec();
        self.buffer.drain(..total);
        Some(Packet { header, body })
    }

    /// Whether another PUBLISH is already waiting to be read.
    async fn publish_pending(&mut self) -> bool {
        let mut chunk = [0u8; 4096];
        let read = tokio::time::timeout(Duration::from_millis(20), self.stream.read(&mut chunk));
        if let Ok(Ok(n)) = read.await {
            self.buffer.extend_from_slice(&chunk[..n]);
        }
        self.buffer.first().is_some_and(|header| header >> 4 == PUBLISH)
    }

    async fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes).await
    }
}

/// Decode the variable-length "remaining length" field, returning the value
/// and how many bytes it occupied.
fn remaining_length(bytes: &[u8]) -> Option<(usize, usize)> {
    let mut value = 0usize;
    for (i, byte) in bytes.iter().take(4).enumerate() {
        value |= usize::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}
