//! Populate command: one publisher per broker, run concurrently.

mod logging;
mod report;
mod run;

pub use logging::log_plan;
pub use report::{BrokerOutcome, BrokerReport, RunReport};
pub use run::{run_jobs, run_populate};
