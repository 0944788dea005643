//! MBP-10 snapshot and its projection from the side books

use super::{Action, BookSide, Side, DEPTH};
use crate::parser::MboEvent;

/// Record type identifier for MBP-10 rows.
pub const RTYPE: u8 = 10;

/// One reported price level: price, aggregate size, order count.
/// A zeroed level means the slot is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MbpLevel {
    pub price: u64,
    pub size: u64,
    pub count: u32,
}

/// One output row: metadata of the triggering event plus the top ten levels
/// on each side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MbpSnapshot {
    pub ts_recv: String,
    pub ts_event: String,
    pub rtype: u8,
    pub publisher_id: u16,
    pub instrument_id: u32,
    pub action: Action,
    pub side: Side,
    /// 0-based index of the triggering price on its side, 0 when outside
    /// the top ten or not applicable
    pub depth: usize,
    pub price: u64,
    pub size: u32,
    pub flags: u32,
    pub ts_in_delta: u64,
    pub sequence: u64,
    pub symbol: String,
    pub order_id: u64,
    pub bids: [MbpLevel; DEPTH],
    pub asks: [MbpLevel; DEPTH],
}

impl MbpSnapshot {
    /// An empty snapshot, used as the engine's reusable output buffer.
    pub fn new(publisher_id: u16, instrument_id: u32) -> Self {
        Self {
            ts_recv: String::new(),
            ts_event: String::new(),
            rtype: RTYPE,
            publisher_id,
            instrument_id,
            action: Action::Clear,
            side: Side::None,
            depth: 0,
            price: 0,
            size: 0,
            flags: 0,
            ts_in_delta: 0,
            sequence: 0,
            symbol: String::new(),
            order_id: 0,
            bids: [MbpLevel::default(); DEPTH],
            asks: [MbpLevel::default(); DEPTH],
        }
    }

    /// Best bid slot, if populated.
    pub fn best_bid(&self) -> Option<&MbpLevel> {
        (self.bids[0].count > 0).then(|| &self.bids[0])
    }

    /// Best ask slot, if populated.
    pub fn best_ask(&self) -> Option<&MbpLevel> {
        (self.asks[0].count > 0).then(|| &self.asks[0])
    }
}

/// Build a snapshot into `out` from the current books and the triggering
/// event's metadata.
///
/// `action` and `side` come from the dispatch rules rather than the raw
/// event so that coalesced trades report the consumed side. String fields
/// are copied with `clone_from` to reuse the buffer's allocations.
pub(crate) fn project(
    meta: &MboEvent,
    action: Action,
    side: Side,
    depth: usize,
    bids: &BookSide,
    asks: &BookSide,
    out: &mut MbpSnapshot,
) {
    out.ts_recv.clone_from(&meta.ts_recv);
    out.ts_event.clone_from(&meta.ts_event);
    out.action = action;
    out.side = side;
    out.depth = depth;
    out.price = meta.price;
    out.size = meta.size;
    out.flags = meta.flags;
    out.ts_in_delta = meta.ts_in_delta;
    out.sequence = meta.sequence;
    out.symbol.clone_from(&meta.symbol);
    out.order_id = meta.order_id;

    out.bids = [MbpLevel::default(); DEPTH];
    bids.for_each_top(DEPTH, |i, level| {
        out.bids[i] = MbpLevel {
            price: level.price(),
            size: level.total_size(),
            count: level.order_count(),
        };
    });

    out.asks = [MbpLevel::default(); DEPTH];
    asks.for_each_top(DEPTH, |i, level| {
        out.asks[i] = MbpLevel {
            price: level.price(),
            size: level.total_size(),
            count: level.order_count(),
        };
    });
}
