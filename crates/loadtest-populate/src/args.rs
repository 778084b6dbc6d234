//! Common CLI argument definitions shared by all populators.

use clap::Args;
use std::path::PathBuf;

/// Common arguments shared by all populators.
///
/// Every field is optional so that a configuration file can supply it; the
/// command line always wins when both are present.
#[derive(Args, Clone, Debug, Default)]
pub struct CommonPopulateArgs {
    /// Path to a YAML configuration file
    #[arg(long, short = 'c', env = "LOADTEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of topic levels below the root (0 publishes nothing)
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Number of distinct labels at every topic level
    #[arg(long)]
    pub values_per_level: Option<u32>,

    /// Target publish rate per broker in messages/second (0 = unlimited)
    #[arg(long, alias = "rate")]
    pub messages_per_second: Option<f64>,

    /// Topic prefix that every enumerated path is appended to
    #[arg(long)]
    pub topic_root: Option<String>,

    /// Dry-run mode: validate configuration without connecting to any broker
    #[arg(long)]
    pub dry_run: bool,

    /// Write the final run report as JSON to this path
    #[arg(long)]
    pub metrics_output: Option<PathBuf>,
}
