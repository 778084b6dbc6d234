//! Acknowledgment handling of a single `MqttConnection`.

use crate::broker::{Script, ScriptedBroker};
use crate::init_logging;
use loadtest_populate_mqtt::{
    BrokerConnection, BrokerConnector, ConnectOptions, MqttConnection, MqttConnector,
    PublishRequest, QosLevel,
};
use std::time::{Duration, Instant};

const ALL_QOS: [QosLevel; 3] = [
    QosLevel::AtMostOnce,
    QosLevel::AtLeastOnce,
    QosLevel::ExactlyOnce,
];

async fn connect(broker: &ScriptedBroker, client_id: &str) -> MqttConnection {
    let options = ConnectOptions::new(client_id).with_ack_timeout(Some(Duration::from_secs(5)));
    MqttConnector::new()
        .with_connect_timeout(Duration::from_secs(5))
        .connect(&broker.target(), &options)
        .await
        .unwrap()
}

async fn publish_and_wait(connection: &mut MqttConnection, qos: QosLevel) -> Duration {
    let start = Instant::now();
    let request = PublishRequest::new(format!("acks/{qos}"), "x", qos).retained(true);
    let handle = connection.publish(request).await.unwrap();
    handle.wait_for_ack().await.unwrap();
    start.elapsed()
}

#[tokio::test]
async fn test_every_qos_is_acknowledged() {
    init_logging();
    let broker = ScriptedBroker::start(Script::default()).await;
    let mut connection = connect(&broker, "acks").await;
    connection.start_background_processing();

    for qos in ALL_QOS {
        publish_and_wait(&mut connection, qos).await;
    }

    connection.stop_background_processing().await;
    connection.disconnect().await.unwrap();

    let session = broker.finish().await;
    assert_eq!(session.client_id, "acks");
    assert_eq!(
        session.publishes.iter().map(|p| p.qos).collect::<Vec<_>>(),
        [0, 1, 2]
    );
    assert_eq!(session.publishes[2].topic, "acks/2");
    assert!(session.publishes.iter().all(|p| p.retain));
    assert!(session.disconnected);
}

#[tokio::test]
async fn test_only_acknowledged_qos_waits_for_the_broker() {
    init_logging();
    let delay = Duration::from_millis(300);
    let broker = ScriptedBroker::start(Script {
        ack_delay: delay,
        ..Default::default()
    })
    .await;
    let mut connection = connect(&broker, "delayed").await;
    connection.start_background_processing();

    let fire_and_forget = publish_and_wait(&mut connection, QosLevel::AtMostOnce).await;
    let at_least_once = publish_and_wait(&mut connection, QosLevel::AtLeastOnce).await;
    let exactly_once = publish_and_wait(&mut connection, QosLevel::ExactlyOnce).await;

    assert!(fire_and_forget < delay, "{fire_and_forget:?}");
    assert!(at_least_once >= delay, "{at_least_once:?}");
    assert!(exactly_once >= delay, "{exactly_once:?}");

    connection.stop_background_processing().await;
    connection.disconnect().await.unwrap();
    assert_eq!(broker.finish().await.publishes.len(), 3);
}
