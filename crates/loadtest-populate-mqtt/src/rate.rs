//! Pacing and throughput reporting for a single publisher.

use std::fmt;
use std::time::{Duration, SystemTime};
use tokio::time::Instant;

/// Default spacing between progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Caps the publish rate by sleeping away the unused part of each
/// per-message interval.
///
/// Iterations that already took longer than the interval are not followed by
/// any sleep, and the lost time is never made up with a burst.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimiter {
    interval: Option<Duration>,
}

impl RateLimiter {
    /// Limit to `messages_per_second`; zero (or anything not positive and
    /// finite) disables pacing.
    ///
    /// Rates so small that one interval does not fit in a `Duration` are
    /// clamped to `Duration::MAX`.
    pub fn new(messages_per_second: f64) -> Self {
        let interval = (messages_per_second.is_finite() && messages_per_second > 0.0).then(|| {
            Duration::try_from_secs_f64(1.0 / messages_per_second).unwrap_or(Duration::MAX)
        });
        Self { interval }
    }

    /// Desired time per message, if pacing is enabled.
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// How long to sleep after an iteration that took `elapsed`.
    pub fn remaining(&self, elapsed: Duration) -> Option<Duration> {
        self.interval
            .and_then(|interval| interval.checked_sub(elapsed))
            .filter(|rest| !rest.is_zero())
    }

    /// Sleep for whatever is left of the interval that began at `iteration_start`.
    pub async fn pace(&self, iteration_start: Instant) {
        if let Some(rest) = self.remaining(iteration_start.elapsed()) {
            tokio::time::sleep(rest).await;
        }
    }
}

/// Per-publisher counters, owned by exactly one publisher.
///
/// Throughput is measured on the wall clock, like the progress cadence.
#[derive(Debug, Clone)]
pub struct RateState {
    broker_index: usize,
    published: u64,
    started_at: SystemTime,
    last_log: SystemTime,
    log_interval: Duration,
}

impl RateState {
    pub fn new(broker_index: usize, log_interval: Duration, now: SystemTime) -> Self {
        Self {
            broker_index,
            published: 0,
            started_at: now,
            last_log: now,
            log_interval,
        }
    }

    /// Number of acknowledged publishes so far.
    pub fn published(&self) -> u64 {
        self.published
    }

    /// Wall-clock time since the run started (zero if the clock went backwards).
    pub fn elapsed(&self, now: SystemTime) -> Duration {
        now.duration_since(self.started_at).unwrap_or_default()
    }

    /// Count one acknowledged publish; returns a report when one is due.
    pub fn record_publish(&mut self, now: SystemTime) -> Option<ProgressReport> {
        self.published += 1;

        let since_last = now.duration_since(self.last_log).unwrap_or_default();
        if since_last < self.log_interval {
            return None;
        }
        self.last_log = now;
        Some(ProgressReport::new(
            self.broker_index,
            self.published,
            self.elapsed(now),
        ))
    }

    /// Terminal summary of this run.
    pub fn summary(&self, now: SystemTime) -> CompletionSummary {
        CompletionSummary {
            broker_index: self.broker_index,
            published: self.published,
            elapsed: self.elapsed(now),
        }
    }
}

/// A periodic progress line.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub broker_index: usize,
    pub published: u64,
    /// Messages per second since the start; `None` when no time has elapsed.
    pub rate: Option<f64>,
}

impl ProgressReport {
    pub fn new(broker_index: usize, published: u64, elapsed: Duration) -> Self {
        let rate = (!elapsed.is_zero()).then(|| published as f64 / elapsed.as_secs_f64());
        Self {
            broker_index,
            published,
            rate,
        }
    }
}

impl fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rate {
            Some(rate) => write!(
                f,
                "[Broker {}] Published: {} messages (Rate: {:.2} msg/s)",
                self.broker_index, self.published, rate
            ),
            None => write!(
                f,
                "[Broker {}] Published: {} messages",
                self.broker_index, self.published
            ),
        }
    }
}

/// The final line of a run that went through every topic.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSummary {
    pub broker_index: usize,
    pub published: u64,
    pub elapsed: Duration,
}

impl fmt::Display for CompletionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[Broker {}] Done. Total published: {} in {:.2} seconds",
            self.broker_index,
            self.published,
            self.elapsed.as_secs_f64()
        )
    }
}
