//! Processing statistics for the book engine

/// Counters accumulated while applying events.
///
/// Inconsistency counters record recoverable data-quality conditions; the
/// engine drops the offending event and keeps going.
#[derive(Debug, Clone, Default)]
pub struct BookStats {
    /// Total events fed to `apply`
    pub events_processed: u64,

    /// Snapshots emitted
    pub snapshots_emitted: u64,

    // Per-action counts
    pub adds: u64,
    pub cancels: u64,
    pub trades: u64,
    pub fills: u64,
    pub modifies: u64,
    pub clears: u64,

    /// Trades with side 'N', dropped outright
    pub neutral_trades: u64,

    /// Adds whose order id was already resting
    pub duplicate_adds: u64,

    /// Cancels referencing an unknown order id
    pub unknown_cancels: u64,

    /// Stand-alone fills referencing an unknown order id
    pub unknown_fills: u64,

    /// Buffered trades discarded before their F/C pair arrived
    pub stale_pending_trades: u64,
}

impl BookStats {
    /// Total recoverable inconsistencies observed.
    pub fn inconsistencies(&self) -> u64 {
        self.duplicate_adds + self.unknown_cancels + self.unknown_fills + self.stale_pending_trades
    }

    pub fn has_warnings(&self) -> bool {
        self.inconsistencies() > 0
    }
}
