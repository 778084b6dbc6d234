//! Logging utilities for the populate handler.

use crate::config::PopulateSettings;

/// Log the resolved run plan. Broker credentials are masked.
pub fn log_plan(settings: &PopulateSettings, dry_run: bool) {
    let prefix = if dry_run { "[DRY-RUN] " } else { "" };

    let topics = settings
        .tree
        .topic_count()
        .map_or_else(|| "more than u64::MAX".to_string(), |n| n.to_string());

    tracing::info!(
        "{}Populating {} broker(s) with {} retained topics each (max_depth={}, values_per_level={})",
        prefix,
        settings.brokers.len(),
        topics,
        settings.tree.max_depth(),
        settings.tree.values_per_level()
    );
    for (i, broker) in settings.brokers.iter().enumerate() {
        tracing::info!("{}Broker {}: {}", prefix, i + 1, broker);
    }
    tracing::info!(
        "{}qos={} topic_root='{}' rate={} msg/s settle_delay={:?} ack_timeout={:?} keep_alive={:?}",
        prefix,
        settings.qos,
        settings.topic_root,
        settings.messages_per_second,
        settings.settle_delay,
        settings.ack_timeout,
        settings.keep_alive
    );
    tracing::debug!(
        "log_interval={} is informational; progress is reported every {:?}",
        settings.log_interval,
        settings.progress_interval
    );
}
