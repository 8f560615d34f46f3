//! Replay message batches through the thread engine and print the result.
//!
//! Each positional file holds one batch: a JSON array of message records as
//! delivered by the CMS. Batches are merged in the order given. Files passed
//! with `--failed` list provisional sends the transport gave up on; they are
//! retired after all batches are merged.
//!
//! Logs go to stderr (`RUST_LOG`, default `info`); JSON goes to stdout.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use souk_common::config::FingerprintConfig;
use souk_common::identity::CounterpartId;
use souk_common::{InboxState, Message, MergeReport, PreferredListing, ThreadAssembler, ThreadView};

#[derive(Parser)]
#[command(name = "souk-threads", about = "Assemble conversation threads from message batches")]
struct Cli {
    /// Batch files (JSON arrays of messages), merged in order.
    #[arg(required = true)]
    batches: Vec<PathBuf>,

    /// Fingerprint config as JSON; omitted fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Files of provisional messages whose send failed terminally.
    #[arg(long)]
    failed: Vec<PathBuf>,

    /// Fold every conversation of a counterpart into one displayed thread.
    #[arg(long)]
    merged: bool,

    /// Only print threads for this counterpart.
    #[arg(long)]
    counterpart: Option<u64>,

    /// Pretty-print the JSON output.
    #[arg(long)]
    pretty: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Output {
    threads: Vec<ThreadView>,
    preferred_listings: BTreeMap<CounterpartId, PreferredListing>,
    totals: MergeReport,
    retired: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            FingerprintConfig::from_json(&raw)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => FingerprintConfig::default(),
    };
    let assembler = ThreadAssembler::new(config)?;

    let mut state = InboxState::new();
    let mut totals = MergeReport::default();
    for path in &cli.batches {
        let batch = read_batch(path)?;
        let size = batch.len();
        let (next, report) = assembler.merge_batch(state, batch);
        state = next;
        if report.dropped > 0 {
            warn!(batch = %path.display(), dropped = report.dropped, "messages without an assignable counterpart");
        }
        info!(
            batch = %path.display(),
            size,
            inserted = report.inserted,
            superseded = report.superseded,
            "merged batch"
        );
        accumulate(&mut totals, report);
    }

    let mut retired = 0;
    for path in &cli.failed {
        for message in read_batch(path)? {
            if assembler.report_failure(&mut state, &message) {
                retired += 1;
            }
        }
    }

    let threads = select_threads(&state, cli.merged, cli.counterpart.map(CounterpartId));
    info!(threads = threads.len(), dropped = totals.dropped, retired, "assembly complete");

    let output = Output {
        threads,
        preferred_listings: state.preferred_listings(),
        totals,
        retired,
    };
    let json = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{json}");
    Ok(())
}

fn read_batch(path: &Path) -> Result<Vec<Message>> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading batch {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing batch {}", path.display()))
}

fn accumulate(totals: &mut MergeReport, report: MergeReport) {
    totals.inserted += report.inserted;
    totals.updated += report.updated;
    totals.superseded += report.superseded;
    totals.ignored += report.ignored;
    totals.dropped += report.dropped;
}

fn select_threads(state: &InboxState, merged: bool, only: Option<CounterpartId>) -> Vec<ThreadView> {
    if merged {
        let counterparts: BTreeSet<CounterpartId> = state.threads().iter().map(|t| t.counterpart).collect();
        return counterparts
            .into_iter()
            .filter(|c| only.is_none_or(|o| o == *c))
            .filter_map(|c| state.merged_thread(c))
            .collect();
    }
    state
        .threads()
        .into_iter()
        .filter(|t| only.is_none_or(|o| o == t.counterpart))
        .collect()
}
