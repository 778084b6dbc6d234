//! Topics command: print the enumerated topic tree without publishing.

use anyhow::Context;
use clap::Args;
use loadtest_topics::TopicTree;
use std::io::Write;

use crate::config::{DEFAULT_MAX_DEPTH, DEFAULT_TOPIC_ROOT, DEFAULT_VALUES_PER_LEVEL};

/// Arguments for the topics command.
#[derive(Args, Clone, Debug)]
pub struct TopicsArgs {
    /// Number of topic levels below the root
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    pub max_depth: usize,

    /// Number of distinct labels at every topic level
    #[arg(long, default_value_t = DEFAULT_VALUES_PER_LEVEL)]
    pub values_per_level: u32,

    /// Topic prefix
    #[arg(long, default_value = DEFAULT_TOPIC_ROOT)]
    pub topic_root: String,

    /// Print at most this many topics
    #[arg(long)]
    pub limit: Option<usize>,

    /// Print only the number of topics
    #[arg(long)]
    pub count_only: bool,
}

/// Write the topics (or their count) to `out`, one per line.
pub fn write_topics(args: &TopicsArgs, out: &mut impl Write) -> anyhow::Result<()> {
    let tree = TopicTree::new(args.max_depth, args.values_per_level)
        .context("Invalid topic tree parameters")?;

    if args.count_only {
        match tree.topic_count() {
            Some(count) => writeln!(out, "{count}")?,
            None => anyhow::bail!(
                "Topic count for max_depth={} values_per_level={} overflows u64",
                args.max_depth,
                args.values_per_level
            ),
        }
        return Ok(());
    }

    let limit = args.limit.unwrap_or(usize::MAX);
    for path in tree.paths().take(limit) {
        writeln!(out, "{}", path.topic(&args.topic_root))?;
    }
    out.flush()?;
    Ok(())
}

/// Run the topics command, writing to stdout.
pub fn run_topics(args: &TopicsArgs) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    write_topics(args, &mut out)
}
