//! Dispatcher runs across several simulated brokers.

use crate::init_logging;
use loadtest_populate_mqtt::testing::SimulatedEvent;
use loadtest_populate_mqtt::{BrokerTarget, PublishJob, SimulatedConnector};
use loadtest_topics::TopicTree;
use retained_loadtest::loadtest::populate::{run_jobs, BrokerOutcome};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn jobs(ports: &[u16], depth: usize, values: u32) -> Vec<PublishJob> {
    let tree = TopicTree::new(depth, values).unwrap();
    ports
        .iter()
        .enumerate()
        .map(|(i, port)| {
            PublishJob::new(i + 1, BrokerTarget::new("nuc1", *port), tree)
                .with_settle_delay(Duration::ZERO)
        })
        .collect()
}

#[tokio::test]
async fn test_all_brokers_receive_full_tree() {
    init_logging();
    let connector = SimulatedConnector::new();

    let report = run_jobs(
        connector.clone(),
        jobs(&[10000, 10001, 10002], 3, 3),
        CancellationToken::new(),
    )
    .await;

    assert!(report.success());
    assert_eq!(report.topics_per_broker, Some(39));
    assert_eq!(report.total_published, 3 * 39);
    for port in [10000, 10001, 10002] {
        let topics: Vec<String> = connector
            .published_to(port)
            .into_iter()
            .map(|r| r.topic)
            .collect();
        let expected: Vec<String> = TopicTree::new(3, 3)
            .unwrap()
            .paths()
            .map(|p| p.topic("root"))
            .collect();
        assert_eq!(topics, expected);
    }
}

#[tokio::test]
async fn test_failed_connect_is_isolated() {
    init_logging();
    let connector = SimulatedConnector::new().refuse_port(10001);

    let report = run_jobs(
        connector.clone(),
        jobs(&[10000, 10001, 10002], 2, 2),
        CancellationToken::new(),
    )
    .await;

    assert!(!report.success());
    assert_eq!(report.failed(), 1);
    assert_eq!(report.total_published, 12);

    let indexes: Vec<usize> = report.brokers.iter().map(|b| b.broker_index).collect();
    assert_eq!(indexes, [1, 2, 3]);
    assert!(matches!(
        report.brokers[0].outcome,
        BrokerOutcome::Completed {
            messages_published: 6,
            ..
        }
    ));
    match &report.brokers[1].outcome {
        BrokerOutcome::Failed {
            messages_published,
            error,
            ..
        } => {
            assert_eq!(*messages_published, 0);
            assert!(error.contains("refused"), "{error}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(report.brokers[1].broker, "nuc1:10001");
    assert_eq!(connector.published_to(10002).len(), 6);
}

#[tokio::test]
async fn test_mid_run_failure_keeps_partial_count() {
    init_logging();
    let connector = SimulatedConnector::new().fail_after(4);

    let report = run_jobs(connector, jobs(&[10000], 2, 3), CancellationToken::new()).await;

    assert_eq!(report.failed(), 1);
    assert_eq!(report.brokers[0].outcome.messages_published(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_brokers_run_concurrently() {
    init_logging();
    let connector = SimulatedConnector::new();
    let start = tokio::time::Instant::now();

    // Ten topics at 10 msg/s take about a second per broker.
    let jobs: Vec<PublishJob> = jobs(&[10000, 10001, 10002, 10003], 1, 10)
        .into_iter()
        .map(|job| job.with_rate(10.0))
        .collect();
    let report = run_jobs(connector, jobs, CancellationToken::new()).await;

    assert!(report.success());
    assert_eq!(report.total_published, 40);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(900), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_reaches_every_broker() {
    init_logging();
    let connector = SimulatedConnector::new();
    let cancel = CancellationToken::new();

    let jobs: Vec<PublishJob> = jobs(&[10000, 10001], 3, 10)
        .into_iter()
        .map(|job| job.with_rate(100.0))
        .collect();
    let run = tokio::spawn(run_jobs(connector.clone(), jobs, cancel.clone()));

    tokio::time::sleep(Duration::from_millis(200)).await;
    cancel.cancel();
    let report = tokio_test::assert_ok!(run.await);

    assert!(report.success());
    for broker in &report.brokers {
        assert!(matches!(broker.outcome, BrokerOutcome::Cancelled { .. }));
        assert!(broker.outcome.messages_published() < 1110);
    }
    let disconnects = connector
        .events()
        .iter()
        .filter(|e| matches!(e, SimulatedEvent::Disconnected { .. }))
        .count();
    assert_eq!(disconnects, 2);
}
