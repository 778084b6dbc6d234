//! MQTT populator for load testing.
//!
//! This module provides the `MqttPopulator` which walks a [`TopicTree`],
//! publishes one retained message per topic to a single broker, paces itself
//! to a target rate and reports throughput while it runs.

use crate::client::{BrokerConnection, BrokerConnector, ConnectOptions, PublishRequest, QosLevel};
use crate::error::MqttPopulatorError;
use crate::rate::{RateLimiter, RateState, DEFAULT_PROGRESS_INTERVAL};
use crate::target::BrokerTarget;
use loadtest_topics::TopicTree;
use std::fmt;
use std::time::{Duration, SystemTime};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default topic prefix.
pub const DEFAULT_TOPIC_ROOT: &str = "root";

/// Default pause between connecting and the first publish.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Payload published for `topic`.
pub fn payload_for(topic: &str) -> String {
    format!("Payload for {topic}")
}

/// Everything one populator run needs.
#[derive(Debug, Clone)]
pub struct PublishJob {
    /// 1-based ordinal of the broker, used to tag output.
    pub broker_index: usize,
    pub target: BrokerTarget,
    pub tree: TopicTree,
    pub topic_root: String,
    pub qos: QosLevel,
    pub retain: bool,
    /// Target rate; `0` publishes as fast as acknowledgments allow.
    pub messages_per_second: f64,
    pub progress_interval: Duration,
    pub settle_delay: Duration,
    pub connect: ConnectOptions,
}

impl PublishJob {
    /// Create a job with default pacing and reporting settings.
    pub fn new(broker_index: usize, target: BrokerTarget, tree: TopicTree) -> Self {
        let client_id = format!(
            "retained-loadtest-{}-{}",
            std::process::id(),
            broker_index
        );
        Self {
            broker_index,
            target,
            tree,
            topic_root: DEFAULT_TOPIC_ROOT.to_string(),
            qos: QosLevel::AtMostOnce,
            retain: true,
            messages_per_second: 0.0,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            settle_delay: DEFAULT_SETTLE_DELAY,
            connect: ConnectOptions::new(client_id),
        }
    }

    pub fn with_qos(mut self, qos: QosLevel) -> Self {
        self.qos = qos;
        self
    }

    pub fn with_rate(mut self, messages_per_second: f64) -> Self {
        self.messages_per_second = messages_per_second;
        self
    }

    pub fn with_topic_root(mut self, topic_root: impl Into<String>) -> Self {
        self.topic_root = topic_root.into();
        self
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn with_progress_interval(mut self, progress_interval: Duration) -> Self {
        self.progress_interval = progress_interval;
        self
    }

    pub fn with_connect_options(mut self, connect: ConnectOptions) -> Self {
        self.connect = connect;
        self
    }
}

/// Metrics from a populate operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopulateMetrics {
    /// Number of acknowledged publishes.
    pub messages_published: u64,
    /// Wall-clock time from the first publish to the last.
    pub total_duration: Duration,
    /// Whether the run was stopped before the tree was exhausted.
    pub cancelled: bool,
}

impl PopulateMetrics {
    /// Calculate messages per second.
    pub fn messages_per_second(&self) -> f64 {
        if self.total_duration.as_secs_f64() > 0.0 {
            self.messages_published as f64 / self.total_duration.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// A populator run that ended early because of an error.
#[derive(Debug)]
pub struct PopulateFailure {
    pub broker_index: usize,
    /// Publishes acknowledged before the failure.
    pub messages_published: u64,
    pub elapsed: Duration,
    pub error: MqttPopulatorError,
}

impl fmt::Display for PopulateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[Broker {}] FAILED after {} messages in {:.2} seconds: {}",
            self.broker_index,
            self.messages_published,
            self.elapsed.as_secs_f64(),
            self.error
        )
    }
}

impl std::error::Error for PopulateFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Publishes every topic of a tree to one broker.
///
/// # Example
///
/// ```ignore
/// let tree = TopicTree::new(10, 10)?;
/// let job = PublishJob::new(1, "nuc1:10000".parse()?, tree).with_rate(1000.0);
/// let metrics = MqttPopulator::new(MqttConnector::new(), job).populate().await?;
/// println!("Published {} messages", metrics.messages_published);
/// ```
pub struct MqttPopulator<C: BrokerConnector> {
    connector: C,
    job: PublishJob,
    cancel: CancellationToken,
}

impl<C: BrokerConnector> MqttPopulator<C> {
    pub fn new(connector: C, job: PublishJob) -> Self {
        Self {
            connector,
            job,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop between publishes once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Connect, publish the whole tree, and disconnect.
    pub async fn populate(self) -> Result<PopulateMetrics, PopulateFailure> {
        let job = &self.job;
        let index = job.broker_index;
        let connect_start = SystemTime::now();

        let mut connection = match self.connector.connect(&job.target, &job.connect).await {
            Ok(connection) => connection,
            Err(e) => {
                let failure = PopulateFailure {
                    broker_index: index,
                    messages_published: 0,
                    elapsed: SystemTime::now()
                        .duration_since(connect_start)
                        .unwrap_or_default(),
                    error: e.into(),
                };
                error!("{}", failure);
                return Err(failure);
            }
        };
        info!("[Broker {}] Connected to {}", index, job.target);

        connection.start_background_processing();
        tokio::select! {
            _ = tokio::time::sleep(job.settle_delay) => {}
            _ = self.cancel.cancelled() => {}
        }

        info!(
            "[Broker {}] Publishing {} topics under '{}' (qos={}, retain={}, rate={})",
            index,
            job.tree
                .topic_count()
                .map_or_else(|| "too many".to_string(), |n| n.to_string()),
            job.topic_root,
            job.qos,
            job.retain,
            if job.messages_per_second > 0.0 {
                format!("{} msg/s", job.messages_per_second)
            } else {
                "unlimited".to_string()
            }
        );

        let mut rate = RateState::new(index, job.progress_interval, SystemTime::now());
        let limiter = RateLimiter::new(job.messages_per_second);

        match self.publish_tree(&mut connection, &mut rate, &limiter).await {
            Ok(cancelled) => {
                let summary = rate.summary(SystemTime::now());
                info!("{}", summary);

                connection.stop_background_processing().await;
                if let Err(e) = connection.disconnect().await {
                    warn!(
                        "[Broker {}] Disconnect did not complete cleanly: {}",
                        index, e
                    );
                }

                Ok(PopulateMetrics {
                    messages_published: summary.published,
                    total_duration: summary.elapsed,
                    cancelled,
                })
            }
            Err(e) => {
                let failure = PopulateFailure {
                    broker_index: index,
                    messages_published: rate.published(),
                    elapsed: rate.elapsed(SystemTime::now()),
                    error: e,
                };
                error!("{}", failure);
                connection.stop_background_processing().await;
                Err(failure)
            }
        }
    }

    /// Publish every topic in order; returns whether the run was cancelled.
    async fn publish_tree(
        &self,
        connection: &mut C::Connection,
        rate: &mut RateState,
        limiter: &RateLimiter,
    ) -> Result<bool, MqttPopulatorError> {
        let job = &self.job;

        for path in job.tree.paths() {
            if self.cancel.is_cancelled() {
                info!(
                    "[Broker {}] Cancelled after {} messages",
                    job.broker_index,
                    rate.published()
                );
                return Ok(true);
            }

            let iteration_start = Instant::now();

            let topic = path.topic(&job.topic_root);
            let payload = payload_for(&topic);
            let request = PublishRequest::new(topic, payload, job.qos).retained(job.retain);

            let handle = connection.publish(request).await?;
            handle.wait_for_ack().await?;

            if let Some(report) = rate.record_publish(SystemTime::now()) {
                info!("{}", report);
            }

            limiter.pace(iteration_start).await;
        }

        debug!("[Broker {}] Topic tree exhausted", job.broker_index);
        Ok(false)
    }
}
