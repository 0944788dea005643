//! Pipeline driver
//!
//! Pulls events from the source, feeds them to the book engine, and pushes
//! every emitted snapshot to the sink with a monotonically increasing row
//! index. The first Clear event in the stream is skipped outright: the feed
//! opens with a session reset that has no business appearing in the output.

use tracing::{info, warn};

use crate::error::Result;
use crate::orderbook::{Action, OrderBook};
use crate::parser::MboEvent;
use crate::price;
use crate::publisher::SnapshotSink;

/// Log a progress line every this many input rows.
const PROGRESS_INTERVAL: u64 = 50_000;

/// Per-row parse errors logged individually before switching to a summary.
const MAX_LOGGED_ROW_ERRORS: u64 = 10;

/// Outcome of a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    /// Input rows consumed (including malformed ones)
    pub rows_read: u64,
    /// Rows dropped because they failed to parse
    pub parse_errors: u64,
    /// Snapshots written to the sink
    pub snapshots_written: u64,
}

/// Drain `events` through `engine` into `sink`.
///
/// Parse failures and book inconsistencies are non-fatal; only source/sink
/// I/O failures abort the run.
pub fn run<I, S>(events: I, engine: &mut OrderBook, sink: &mut S) -> Result<PipelineSummary>
where
    I: Iterator<Item = Result<MboEvent>>,
    S: SnapshotSink,
{
    let mut summary = PipelineSummary::default();
    let mut first_clear_seen = false;

    for item in events {
        summary.rows_read += 1;

        let event = match item {
            Ok(event) => event,
            Err(e) => {
                summary.parse_errors += 1;
                if summary.parse_errors <= MAX_LOGGED_ROW_ERRORS {
                    warn!(error = %e, "dropping malformed row");
                } else if summary.parse_errors == MAX_LOGGED_ROW_ERRORS + 1 {
                    warn!("further malformed-row messages suppressed");
                }
                continue;
            }
        };

        if !first_clear_seen && event.action == Action::Clear {
            first_clear_seen = true;
            continue;
        }

        if let Some(snapshot) = engine.apply(&event) {
            sink.write(summary.snapshots_written, snapshot)?;
            summary.snapshots_written += 1;
        }

        if summary.rows_read % PROGRESS_INTERVAL == 0 {
            info!(
                rows = summary.rows_read,
                snapshots = summary.snapshots_written,
                "processing"
            );
        }
    }

    sink.flush()?;
    log_summary(&summary, engine);
    Ok(summary)
}

fn log_summary(summary: &PipelineSummary, engine: &OrderBook) {
    let stats = engine.stats();
    let (bid_levels, ask_levels) = engine.level_counts();

    info!(
        rows = summary.rows_read,
        parse_errors = summary.parse_errors,
        snapshots = summary.snapshots_written,
        "reconstruction finished"
    );
    info!(
        best_bid = %engine.best_bid().map(price::format).unwrap_or_default(),
        best_ask = %engine.best_ask().map(price::format).unwrap_or_default(),
        bid_levels,
        ask_levels,
        resting_orders = engine.total_orders(),
        "final book state"
    );

    if stats.has_warnings() {
        warn!(
            duplicate_adds = stats.duplicate_adds,
            unknown_cancels = stats.unknown_cancels,
            unknown_fills = stats.unknown_fills,
            stale_pending_trades = stats.stale_pending_trades,
            "book inconsistencies were dropped during the run"
        );
    }
}
