//! Populate command runner.

use futures::future::join_all;
use loadtest_populate_mqtt::{
    BrokerConnector, MqttConnector, MqttPopulateArgs, MqttPopulator, PublishJob,
};
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;

use super::logging::log_plan;
use super::report::{BrokerOutcome, BrokerReport, RunReport};
use crate::config::PopulateSettings;

/// Run the populate command against real MQTT brokers.
///
/// Returns the run report even when some brokers failed; callers decide
/// how to treat `RunReport::success() == false`.
pub async fn run_populate(
    args: MqttPopulateArgs,
    cancel: CancellationToken,
) -> anyhow::Result<RunReport> {
    let settings = PopulateSettings::from_args(&args)?;
    log_plan(&settings, args.common.dry_run);

    let report = if args.common.dry_run {
        tracing::info!("[DRY-RUN] Configuration validated successfully; no broker was contacted");
        dry_run_report(&settings)
    } else {
        run_jobs(MqttConnector::new(), settings.jobs(), cancel).await
    };

    if let Some(path) = &args.common.metrics_output {
        report.write_json(path)?;
        tracing::info!("Run report written to {:?}", path);
    }

    Ok(report)
}

/// Run one publisher per job concurrently and wait for all of them.
///
/// A failed or panicked publisher never affects its siblings.
pub async fn run_jobs<C>(
    connector: C,
    jobs: Vec<PublishJob>,
    cancel: CancellationToken,
) -> RunReport
where
    C: BrokerConnector + Clone + 'static,
{
    let started = SystemTime::now();
    let topics_per_broker = jobs.first().and_then(|job| job.tree.topic_count());

    let targets: Vec<(usize, String)> = jobs
        .iter()
        .map(|job| (job.broker_index, job.target.to_string()))
        .collect();

    let handles = jobs.into_iter().map(|job| {
        let populator =
            MqttPopulator::new(connector.clone(), job).with_cancellation(cancel.clone());
        tokio::spawn(populator.populate())
    });
    let results = join_all(handles).await;

    let brokers: Vec<BrokerReport> = targets
        .into_iter()
        .zip(results)
        .map(|((broker_index, broker), result)| {
            let outcome = match result {
                Ok(Ok(metrics)) => BrokerOutcome::from(metrics),
                // The publisher has already logged its own FAILED line.
                Ok(Err(failure)) => BrokerOutcome::from(failure),
                Err(join_error) => {
                    let elapsed = started.elapsed().unwrap_or_default();
                    tracing::error!(
                        "[Broker {}] FAILED after 0 messages in {:.2} seconds: {}",
                        broker_index,
                        elapsed.as_secs_f64(),
                        join_error
                    );
                    BrokerOutcome::Failed {
                        messages_published: 0,
                        duration_secs: elapsed.as_secs_f64(),
                        error: join_error.to_string(),
                    }
                }
            };
            BrokerReport {
                broker_index,
                broker,
                outcome,
            }
        })
        .collect();

    let report = RunReport::new(
        topics_per_broker,
        started.elapsed().unwrap_or_default(),
        brokers,
    );

    tracing::info!(
        "All brokers finished: {} messages published across {} broker(s), {} failed, in {:.2} seconds",
        report.total_published,
        report.brokers.len(),
        report.failed(),
        report.duration_secs
    );

    report
}

fn dry_run_report(settings: &PopulateSettings) -> RunReport {
    let brokers = settings
        .brokers
        .iter()
        .enumerate()
        .map(|(i, target)| BrokerReport {
            broker_index: i + 1,
            broker: target.to_string(),
            outcome: BrokerOutcome::DryRun,
        })
        .collect();
    RunReport::new(
        settings.tree.topic_count(),
        std::time::Duration::ZERO,
        brokers,
    )
}
