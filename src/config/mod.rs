//! Load test configuration.
//!
//! Settings come from three layers, highest priority first: command-line
//! flags (and their environment variables), an optional YAML file, and the
//! built-in defaults below.

pub mod duration;

use anyhow::Context;
use loadtest_populate_mqtt::{BrokerTarget, ConnectOptions, MqttPopulateArgs, PublishJob, QosLevel};
use loadtest_topics::TopicTree;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub use duration::{parse_duration, parse_timeout};
pub use loadtest_populate_mqtt::{
    DEFAULT_KEEP_ALIVE, DEFAULT_PROGRESS_INTERVAL, DEFAULT_SETTLE_DELAY, DEFAULT_TOPIC_ROOT,
};

pub const DEFAULT_MAX_DEPTH: usize = 10;
pub const DEFAULT_VALUES_PER_LEVEL: u32 = 10;
pub const DEFAULT_MESSAGES_PER_SECOND: f64 = 1000.0;
pub const DEFAULT_LOG_INTERVAL: u64 = 1000;
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CLIENT_ID_PREFIX: &str = "retained-loadtest";

/// A broker entry in the configuration file, either `"host:port"` or a map.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BrokerEntry {
    Address(String),
    Target(BrokerTarget),
}

impl BrokerEntry {
    fn into_target(self) -> anyhow::Result<BrokerTarget> {
        match self {
            BrokerEntry::Address(address) => Ok(address.parse()?),
            BrokerEntry::Target(target) => Ok(target),
        }
    }
}

/// Contents of the YAML configuration file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadtestConfig {
    pub brokers: Option<Vec<BrokerEntry>>,
    pub qos: Option<u8>,
    pub max_depth: Option<usize>,
    pub values_per_level: Option<u32>,
    pub log_interval: Option<u64>,
    pub messages_per_second: Option<f64>,
    pub topic_root: Option<String>,
    pub keep_alive: Option<String>,
    pub settle_delay: Option<String>,
    pub ack_timeout: Option<String>,
    pub progress_interval: Option<String>,
    pub client_id_prefix: Option<String>,
}

impl LoadtestConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path:?}"))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse config file {path:?}"))
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        // An empty document means "all defaults".
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}

/// Fully resolved and validated settings for a populate run.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulateSettings {
    pub brokers: Vec<BrokerTarget>,
    pub qos: QosLevel,
    pub tree: TopicTree,
    /// Accepted for compatibility; progress cadence is `progress_interval`.
    pub log_interval: u64,
    pub messages_per_second: f64,
    pub topic_root: String,
    pub keep_alive: Duration,
    pub settle_delay: Duration,
    pub ack_timeout: Option<Duration>,
    pub progress_interval: Duration,
    pub client_id_prefix: String,
}

impl PopulateSettings {
    /// Resolve settings from the command line, loading the config file it
    /// names (if any).
    pub fn from_args(args: &MqttPopulateArgs) -> anyhow::Result<Self> {
        let config = match &args.common.config {
            Some(path) => LoadtestConfig::from_file(path)?,
            None => LoadtestConfig::default(),
        };
        Self::resolve(config, args)
    }

    /// Merge `config` with the command-line overrides in `args`.
    pub fn resolve(config: LoadtestConfig, args: &MqttPopulateArgs) -> anyhow::Result<Self> {
        let brokers = if !args.brokers.is_empty() {
            args.brokers
                .iter()
                .map(|address| address.parse::<BrokerTarget>())
                .collect::<Result<Vec<_>, _>>()?
        } else {
            match config.brokers {
                Some(entries) => entries
                    .into_iter()
                    .map(BrokerEntry::into_target)
                    .collect::<anyhow::Result<Vec<_>>>()?,
                None => vec![BrokerTarget::new(
                    "localhost",
                    loadtest_populate_mqtt::DEFAULT_MQTT_PORT,
                )],
            }
        };
        if brokers.is_empty() {
            anyhow::bail!("No brokers configured");
        }

        let qos = QosLevel::try_from(args.qos.or(config.qos).unwrap_or(0))?;

        let max_depth = args
            .common
            .max_depth
            .or(config.max_depth)
            .unwrap_or(DEFAULT_MAX_DEPTH);
        let values_per_level = args
            .common
            .values_per_level
            .or(config.values_per_level)
            .unwrap_or(DEFAULT_VALUES_PER_LEVEL);
        let tree = TopicTree::new(max_depth, values_per_level)
            .context("Invalid topic tree parameters")?;

        let messages_per_second = args
            .common
            .messages_per_second
            .or(config.messages_per_second)
            .unwrap_or(DEFAULT_MESSAGES_PER_SECOND);
        if !messages_per_second.is_finite() || messages_per_second < 0.0 {
            anyhow::bail!(
                "messages_per_second must be a finite number >= 0, got {messages_per_second}"
            );
        }
        // The per-message interval must be representable as a Duration.
        if messages_per_second > 0.0
            && Duration::try_from_secs_f64(1.0 / messages_per_second).is_err()
        {
            anyhow::bail!("messages_per_second {messages_per_second} is too small to pace");
        }

        let topic_root = args
            .common
            .topic_root
            .clone()
            .or(config.topic_root)
            .unwrap_or_else(|| DEFAULT_TOPIC_ROOT.to_string());

        let keep_alive = duration_setting(
            "keep_alive",
            args.keep_alive.as_deref(),
            config.keep_alive.as_deref(),
            DEFAULT_KEEP_ALIVE,
        )?;
        // The MQTT keep-alive field has whole-second resolution.
        if !keep_alive.is_zero() && keep_alive < Duration::from_secs(1) {
            anyhow::bail!("keep_alive must be 0 or at least 1s, got {keep_alive:?}");
        }

        let settle_delay = duration_setting(
            "settle_delay",
            args.settle_delay.as_deref(),
            config.settle_delay.as_deref(),
            DEFAULT_SETTLE_DELAY,
        )?;
        let progress_interval = duration_setting(
            "progress_interval",
            args.progress_interval.as_deref(),
            config.progress_interval.as_deref(),
            DEFAULT_PROGRESS_INTERVAL,
        )?;

        let ack_timeout = args.ack_timeout.as_ref().or(config.ack_timeout.as_ref());
        let ack_timeout = match ack_timeout {
            Some(value) => parse_timeout(value).context("Invalid ack_timeout")?,
            None => Some(DEFAULT_ACK_TIMEOUT),
        };

        Ok(Self {
            brokers,
            qos,
            tree,
            log_interval: config.log_interval.unwrap_or(DEFAULT_LOG_INTERVAL),
            messages_per_second,
            topic_root,
            keep_alive,
            settle_delay,
            ack_timeout,
            progress_interval,
            client_id_prefix: args
                .client_id_prefix
                .clone()
                .or(config.client_id_prefix)
                .unwrap_or_else(|| DEFAULT_CLIENT_ID_PREFIX.to_string()),
        })
    }

    /// One job per broker, numbered from 1 in configuration order.
    pub fn jobs(&self) -> Vec<PublishJob> {
        let pid = std::process::id();
        self.brokers
            .iter()
            .enumerate()
            .map(|(i, target)| {
                let broker_index = i + 1;
                let connect =
                    ConnectOptions::new(format!("{}-{pid}-{broker_index}", self.client_id_prefix))
                        .with_keep_alive(self.keep_alive)
                        .with_ack_timeout(self.ack_timeout);

                PublishJob::new(broker_index, target.clone(), self.tree)
                    .with_qos(self.qos)
                    .with_rate(self.messages_per_second)
                    .with_topic_root(self.topic_root.clone())
                    .with_settle_delay(self.settle_delay)
                    .with_progress_interval(self.progress_interval)
                    .with_connect_options(connect)
            })
            .collect()
    }
}

fn duration_setting(
    name: &str,
    cli: Option<&str>,
    file: Option<&str>,
    default: Duration,
) -> anyhow::Result<Duration> {
    match cli.or(file) {
        Some(value) => parse_duration(value).with_context(|| format!("Invalid {name}")),
        None => Ok(default),
    }
}
