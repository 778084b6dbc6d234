//! Per-broker outcomes and the aggregate run report.

use anyhow::Context;
use loadtest_populate_mqtt::{PopulateFailure, PopulateMetrics};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// How one broker's publisher ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BrokerOutcome {
    Completed {
        messages_published: u64,
        duration_secs: f64,
        messages_per_second: f64,
    },
    Cancelled {
        messages_published: u64,
        duration_secs: f64,
    },
    Failed {
        messages_published: u64,
        duration_secs: f64,
        error: String,
    },
    /// Configuration was validated but nothing was published.
    DryRun,
}

impl BrokerOutcome {
    pub fn messages_published(&self) -> u64 {
        match self {
            BrokerOutcome::Completed {
                messages_published, ..
            }
            | BrokerOutcome::Cancelled {
                messages_published, ..
            }
            | BrokerOutcome::Failed {
                messages_published, ..
            } => *messages_published,
            BrokerOutcome::DryRun => 0,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, BrokerOutcome::Failed { .. })
    }
}

impl From<PopulateMetrics> for BrokerOutcome {
    fn from(metrics: PopulateMetrics) -> Self {
        if metrics.cancelled {
            BrokerOutcome::Cancelled {
                messages_published: metrics.messages_published,
                duration_secs: metrics.total_duration.as_secs_f64(),
            }
        } else {
            BrokerOutcome::Completed {
                messages_published: metrics.messages_published,
                duration_secs: metrics.total_duration.as_secs_f64(),
                messages_per_second: metrics.messages_per_second(),
            }
        }
    }
}

impl From<PopulateFailure> for BrokerOutcome {
    fn from(failure: PopulateFailure) -> Self {
        BrokerOutcome::Failed {
            messages_published: failure.messages_published,
            duration_secs: failure.elapsed.as_secs_f64(),
            error: failure.error.to_string(),
        }
    }
}

/// Outcome of one broker, tagged with its ordinal and masked address.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrokerReport {
    pub broker_index: usize,
    pub broker: String,
    #[serde(flatten)]
    pub outcome: BrokerOutcome,
}

/// Aggregate result of a populate run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub dry_run: bool,
    /// Topics each broker would receive; `None` if the count overflows.
    pub topics_per_broker: Option<u64>,
    pub total_published: u64,
    pub duration_secs: f64,
    pub brokers: Vec<BrokerReport>,
}

impl RunReport {
    pub fn new(
        topics_per_broker: Option<u64>,
        duration: Duration,
        brokers: Vec<BrokerReport>,
    ) -> Self {
        let total_published = brokers
            .iter()
            .map(|b| b.outcome.messages_published())
            .sum();
        Self {
            dry_run: brokers
                .iter()
                .all(|b| matches!(b.outcome, BrokerOutcome::DryRun))
                && !brokers.is_empty(),
            topics_per_broker,
            total_published,
            duration_secs: duration.as_secs_f64(),
            brokers,
        }
    }

    /// Number of brokers whose publisher failed.
    pub fn failed(&self) -> usize {
        self.brokers.iter().filter(|b| b.outcome.is_failed()).count()
    }

    /// True when no publisher failed.
    pub fn success(&self) -> bool {
        self.failed() == 0
    }

    /// Write this report as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize run report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write run report to {path:?}"))?;
        Ok(())
    }
}
