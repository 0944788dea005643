//! Core order book engine
//!
//! Owns the two side books and the order index, applies MBO events, and
//! emits MBP-10 snapshots for changes that touch the top ten levels.
//!
//! Trades arrive as a T->F->C sequence: the T carries the trade's metadata,
//! the F names the consumed side, and the C performs the removal. The engine
//! buffers the T in a one-slot pending buffer and emits a single snapshot
//! when the C lands, reporting the T's metadata with the C's side. The T
//! itself declares the aggressor side, which is why the F/C pair is
//! authoritative for the side the output must show.

use tracing::{debug, warn};

use super::snapshot::{self, MbpSnapshot};
use super::{Action, BookSide, BookStats, OrderIndex, OrderInfo, Side};
use crate::parser::MboEvent;

/// Book engine for a single instrument.
#[derive(Debug)]
pub struct OrderBook {
    bids: BookSide,
    asks: BookSide,
    index: OrderIndex,
    /// One-slot buffer holding a T event until its F/C pair resolves it
    pending_trade: Option<MboEvent>,
    stats: BookStats,
    /// Reusable output buffer; `apply` projects into this and hands out a
    /// borrow, so the hot path never allocates per event.
    snapshot: MbpSnapshot,
}

impl OrderBook {
    /// Create an empty book. `publisher_id` and `instrument_id` are stamped
    /// into every emitted snapshot.
    pub fn new(publisher_id: u16, instrument_id: u32) -> Self {
        Self {
            bids: BookSide::new(Side::Bid),
            asks: BookSide::new(Side::Ask),
            index: OrderIndex::new(),
            pending_trade: None,
            stats: BookStats::default(),
            snapshot: MbpSnapshot::new(publisher_id, instrument_id),
        }
    }

    /// Apply one event, returning a snapshot when the event produced a
    /// change visible in the top ten levels (or is a Clear).
    pub fn apply(&mut self, event: &MboEvent) -> Option<&MbpSnapshot> {
        self.stats.events_processed += 1;

        #[cfg(debug_assertions)]
        self.validate_books();

        // Anything other than the F/C pair (or a replacing T) invalidates a
        // buffered trade.
        if !matches!(
            event.action,
            Action::Trade | Action::Fill | Action::Cancel
        ) {
            self.discard_stale_pending(event.sequence);
        }

        match event.action {
            Action::Clear => {
                self.stats.clears += 1;
                self.clear();
                Some(self.emit(event, Action::Clear, event.side))
            }
            Action::Add => self.apply_add(event),
            Action::Cancel => self.apply_cancel(event),
            Action::Trade => self.apply_trade(event),
            Action::Fill => self.apply_fill(event),
            Action::Modify => self.apply_modify(event),
        }
    }

    /// Reset the books, the index and the pending-trade slot. Statistics are
    /// preserved across clears so end-of-run totals cover the whole stream.
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.index.clear();
        self.pending_trade = None;
    }

    pub fn best_bid(&self) -> Option<u64> {
        self.bids.best()
    }

    pub fn best_ask(&self) -> Option<u64> {
        self.asks.best()
    }

    /// Number of resting orders across both sides.
    pub fn total_orders(&self) -> usize {
        self.index.len()
    }

    /// Number of populated price levels per side: (bids, asks).
    pub fn level_counts(&self) -> (usize, usize) {
        (self.bids.len(), self.asks.len())
    }

    pub fn stats(&self) -> &BookStats {
        &self.stats
    }

    fn apply_add(&mut self, event: &MboEvent) -> Option<&MbpSnapshot> {
        self.stats.adds += 1;

        if !event.side.is_directional()
            || event.price == 0
            || event.size == 0
            || event.order_id == 0
        {
            debug!(sequence = event.sequence, "add with incomplete fields; dropped");
            return None;
        }

        if self.index.contains(event.order_id) {
            self.stats.duplicate_adds += 1;
            warn!(
                order_id = event.order_id,
                sequence = event.sequence,
                "add for an order id already resting; dropped"
            );
            return None;
        }

        let book = self.book_mut(event.side)?;
        let (depth, _) = book.insert_order(event.price, event.order_id, event.size);
        self.index.insert(
            event.order_id,
            OrderInfo {
                side: event.side,
                price: event.price,
                size: event.size,
            },
        );

        // Insertions landing below the tenth level do not alter the
        // observable projection.
        if depth.is_some() {
            Some(self.emit(event, Action::Add, event.side))
        } else {
            None
        }
    }

    fn apply_cancel(&mut self, event: &MboEvent) -> Option<&MbpSnapshot> {
        self.stats.cancels += 1;
        let pending = self.pending_trade.take();

        let Some(info) = self.index.remove(event.order_id) else {
            self.stats.unknown_cancels += 1;
            warn!(
                order_id = event.order_id,
                sequence = event.sequence,
                "cancel for unknown order id; dropped"
            );
            if pending.is_some() {
                self.stats.stale_pending_trades += 1;
                warn!(
                    sequence = event.sequence,
                    "pending trade could not resolve against the book; discarded"
                );
            }
            return None;
        };

        // The top-ten check must run before the removal: taking out a level
        // can pull a previously-hidden level into the visible window.
        let was_top = self.depth_on(info.side, info.price).is_some();
        let book = self.book_mut(info.side)?;
        book.remove_order(info.price, event.order_id, info.size);

        if !was_top {
            return None;
        }

        match pending {
            // Resolved trade: the T's metadata, the consumed (C) side.
            Some(trade) => Some(self.emit(&trade, Action::Trade, info.side)),
            None => Some(self.emit(event, Action::Cancel, event.side)),
        }
    }

    fn apply_trade(&mut self, event: &MboEvent) -> Option<&MbpSnapshot> {
        self.stats.trades += 1;

        if event.side == Side::None {
            self.stats.neutral_trades += 1;
            return None;
        }

        if self.pending_trade.replace(event.clone()).is_some() {
            self.stats.stale_pending_trades += 1;
            warn!(
                sequence = event.sequence,
                "trade arrived while another was pending; stale one discarded"
            );
        }
        None
    }

    fn apply_fill(&mut self, event: &MboEvent) -> Option<&MbpSnapshot> {
        self.stats.fills += 1;

        // Inside a T->F->C sequence the F only names the consumed side; the
        // C that follows performs the removal.
        if self.pending_trade.is_some() {
            return None;
        }

        let Some(info) = self.index.get(event.order_id) else {
            self.stats.unknown_fills += 1;
            warn!(
                order_id = event.order_id,
                sequence = event.sequence,
                "fill for unknown order id; dropped"
            );
            return None;
        };

        let was_top = self.depth_on(info.side, info.price).is_some();
        let fill = event.size.min(info.size);
        let book = self.book_mut(info.side)?;
        if fill >= info.size {
            book.remove_order(info.price, event.order_id, info.size);
            self.index.remove(event.order_id);
        } else {
            book.reduce_order(info.price, fill);
            self.index.reduce(event.order_id, fill);
        }

        if was_top {
            Some(self.emit(event, Action::Fill, event.side))
        } else {
            None
        }
    }

    /// A modify is a cancel of the old placement followed by an add of the
    /// new one.
    fn apply_modify(&mut self, event: &MboEvent) -> Option<&MbpSnapshot> {
        self.stats.modifies += 1;

        let was_top_before = match self.index.remove(event.order_id) {
            Some(info) => {
                let was_top = self.depth_on(info.side, info.price).is_some();
                if let Some(book) = self.book_mut(info.side) {
                    book.remove_order(info.price, event.order_id, info.size);
                }
                was_top
            }
            None => false,
        };

        let mut lands_on_top = false;
        if event.side.is_directional()
            && event.price > 0
            && event.size > 0
            && event.order_id != 0
        {
            if let Some(book) = self.book_mut(event.side) {
                let (depth, _) = book.insert_order(event.price, event.order_id, event.size);
                lands_on_top = depth.is_some();
            }
            self.index.insert(
                event.order_id,
                OrderInfo {
                    side: event.side,
                    price: event.price,
                    size: event.size,
                },
            );
        }

        if was_top_before || lands_on_top {
            Some(self.emit(event, Action::Modify, event.side))
        } else {
            None
        }
    }

    fn emit(&mut self, meta: &MboEvent, action: Action, side: Side) -> &MbpSnapshot {
        self.stats.snapshots_emitted += 1;
        let depth = self.depth_on(side, meta.price).unwrap_or(0);
        snapshot::project(
            meta,
            action,
            side,
            depth,
            &self.bids,
            &self.asks,
            &mut self.snapshot,
        );
        &self.snapshot
    }

    fn discard_stale_pending(&mut self, sequence: u64) {
        if self.pending_trade.take().is_some() {
            self.stats.stale_pending_trades += 1;
            warn!(sequence, "pending trade left unresolved; discarded");
        }
    }

    fn book_mut(&mut self, side: Side) -> Option<&mut BookSide> {
        match side {
            Side::Bid => Some(&mut self.bids),
            Side::Ask => Some(&mut self.asks),
            Side::None => None,
        }
    }

    fn depth_on(&self, side: Side, price: u64) -> Option<usize> {
        match side {
            Side::Bid => self.bids.depth_of(price),
            Side::Ask => self.asks.depth_of(price),
            Side::None => None,
        }
    }

    /// Recompute the book/index agreement invariants. Debug builds run this
    /// on every apply; release builds skip it entirely.
    #[cfg(debug_assertions)]
    fn validate_books(&self) {
        use std::collections::HashMap;

        let mut totals: HashMap<(Side, u64), u64> = HashMap::new();
        for (&order_id, info) in self.index.iter() {
            let book = match info.side {
                Side::Bid => &self.bids,
                Side::Ask => &self.asks,
                Side::None => {
                    debug_assert!(false, "non-directional order {order_id} in index");
                    continue;
                }
            };
            debug_assert!(
                book.level(info.price).is_some_and(|l| l.contains(order_id)),
                "order {order_id} indexed at {} but missing from its level",
                info.price
            );
            *totals.entry((info.side, info.price)).or_default() += u64::from(info.size);
        }

        for book in [&self.bids, &self.asks] {
            for (&price, level) in book.iter() {
                debug_assert!(level.order_count() > 0, "empty level {price} left in book");
                let expected = totals.get(&(book.side(), price)).copied().unwrap_or(0);
                debug_assert_eq!(
                    level.total_size(),
                    expected,
                    "level {price} total disagrees with the index"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn px(dollars: u64) -> u64 {
        dollars * 1_000_000_000
    }

    fn event(
        sequence: u64,
        action: Action,
        side: Side,
        price: u64,
        size: u32,
        order_id: u64,
    ) -> MboEvent {
        MboEvent {
            ts_recv: format!("ts_recv_{sequence}"),
            ts_event: format!("ts_event_{sequence}"),
            action,
            side,
            price,
            size,
            order_id,
            flags: 130,
            ts_in_delta: 165000,
            sequence,
            symbol: "AAA".to_string(),
        }
    }

    fn book_with_bid_ladder(levels: u64) -> OrderBook {
        // Descending prices starting at $110 so later entries rank deeper.
        let mut book = OrderBook::new(2, 1108);
        for i in 0..levels {
            let ev = event(i + 1, Action::Add, Side::Bid, px(110 - i), 1, i + 1);
            book.apply(&ev);
        }
        book
    }

    #[test]
    fn test_add_emits_snapshot_with_level() {
        let mut book = OrderBook::new(2, 1108);
        let snap = book
            .apply(&event(1, Action::Add, Side::Bid, px(10), 5, 100))
            .expect("add inside top ten must emit")
            .clone();

        assert_eq!(snap.action, Action::Add);
        assert_eq!(snap.side, Side::Bid);
        assert_eq!(snap.depth, 0);
        assert_eq!(snap.bids[0].price, px(10));
        assert_eq!(snap.bids[0].size, 5);
        assert_eq!(snap.bids[0].count, 1);
        assert!(snap.best_ask().is_none());
    }

    #[test]
    fn test_add_below_top_ten_suppressed() {
        let mut book = book_with_bid_ladder(10);
        // Eleventh-best price lands at depth 10.
        let result = book.apply(&event(11, Action::Add, Side::Bid, px(100), 1, 11));
        assert!(result.is_none());
        assert_eq!(book.total_orders(), 11);
        assert_eq!(book.level_counts().0, 11);
    }

    #[test]
    fn test_cancel_emits_when_level_was_visible() {
        let mut book = book_with_bid_ladder(11);
        let snap = book
            .apply(&event(12, Action::Cancel, Side::Bid, px(110), 1, 1))
            .expect("cancel of a visible level must emit")
            .clone();

        assert_eq!(snap.action, Action::Cancel);
        // Removal promoted the formerly-hidden $100 level into slot 9.
        assert_eq!(snap.bids[9].price, px(100));
    }

    #[test]
    fn test_cancel_below_top_ten_suppressed() {
        let mut book = book_with_bid_ladder(11);
        let result = book.apply(&event(12, Action::Cancel, Side::Bid, px(100), 1, 11));
        assert!(result.is_none());
        assert_eq!(book.total_orders(), 10);
    }

    #[test]
    fn test_duplicate_add_dropped() {
        let mut book = OrderBook::new(2, 1108);
        book.apply(&event(1, Action::Add, Side::Bid, px(10), 5, 100));
        let result = book.apply(&event(2, Action::Add, Side::Bid, px(11), 5, 100));

        assert!(result.is_none());
        assert_eq!(book.stats().duplicate_adds, 1);
        assert_eq!(book.total_orders(), 1);
        assert_eq!(book.best_bid(), Some(px(10)));
    }

    #[test]
    fn test_unknown_cancel_dropped() {
        let mut book = OrderBook::new(2, 1108);
        let result = book.apply(&event(1, Action::Cancel, Side::Bid, px(10), 5, 999));
        assert!(result.is_none());
        assert_eq!(book.stats().unknown_cancels, 1);
    }

    #[test]
    fn test_trade_sequence_coalesces_into_one_snapshot() {
        let mut book = OrderBook::new(2, 1108);
        book.apply(&event(2, Action::Add, Side::Ask, px(20), 4, 200));

        assert!(book
            .apply(&event(3, Action::Trade, Side::Ask, px(20), 4, 0))
            .is_none());
        assert!(book
            .apply(&event(4, Action::Fill, Side::Ask, px(20), 4, 200))
            .is_none());

        let snap = book
            .apply(&event(5, Action::Cancel, Side::Ask, px(20), 4, 200))
            .expect("resolved trade must emit")
            .clone();

        assert_eq!(snap.action, Action::Trade);
        assert_eq!(snap.side, Side::Ask);
        // Metadata comes from the T event, not the C.
        assert_eq!(snap.sequence, 3);
        assert_eq!(snap.ts_recv, "ts_recv_3");
        assert_eq!(snap.asks[0], crate::orderbook::MbpLevel::default());
        assert_eq!(book.total_orders(), 0);
    }

    #[test]
    fn test_trade_side_reattributed_to_consumed_side() {
        let mut book = OrderBook::new(2, 1108);
        book.apply(&event(2, Action::Add, Side::Ask, px(20), 4, 200));

        // The T declares the aggressor (bid) side; the resting ask is what
        // the book loses.
        book.apply(&event(3, Action::Trade, Side::Bid, px(20), 4, 0));
        book.apply(&event(4, Action::Fill, Side::Ask, px(20), 4, 200));
        let snap = book
            .apply(&event(5, Action::Cancel, Side::Ask, px(20), 4, 200))
            .unwrap()
            .clone();

        assert_eq!(snap.action, Action::Trade);
        assert_eq!(snap.side, Side::Ask);
        assert_eq!(snap.sequence, 3);
    }

    #[test]
    fn test_neutral_trade_ignored() {
        let mut book = OrderBook::new(2, 1108);
        book.apply(&event(2, Action::Add, Side::Bid, px(5), 10, 300));

        let result = book.apply(&event(3, Action::Trade, Side::None, px(5), 10, 0));
        assert!(result.is_none());
        assert_eq!(book.stats().neutral_trades, 1);
        assert_eq!(book.total_orders(), 1);

        // Nothing buffered: a later cancel is a plain cancel.
        let snap = book
            .apply(&event(4, Action::Cancel, Side::Bid, px(5), 10, 300))
            .unwrap()
            .clone();
        assert_eq!(snap.action, Action::Cancel);
    }

    #[test]
    fn test_new_trade_replaces_pending_trade() {
        let mut book = OrderBook::new(2, 1108);
        book.apply(&event(2, Action::Add, Side::Ask, px(20), 4, 200));

        book.apply(&event(3, Action::Trade, Side::Ask, px(20), 4, 0));
        book.apply(&event(4, Action::Trade, Side::Ask, px(20), 4, 0));
        assert_eq!(book.stats().stale_pending_trades, 1);

        // The replacement still resolves normally.
        book.apply(&event(5, Action::Fill, Side::Ask, px(20), 4, 200));
        let snap = book
            .apply(&event(6, Action::Cancel, Side::Ask, px(20), 4, 200))
            .unwrap()
            .clone();
        assert_eq!(snap.sequence, 4);
    }

    #[test]
    fn test_add_discards_stale_pending_trade() {
        let mut book = OrderBook::new(2, 1108);
        book.apply(&event(2, Action::Trade, Side::Ask, px(20), 4, 0));

        let snap = book
            .apply(&event(3, Action::Add, Side::Bid, px(10), 5, 100))
            .expect("the add itself is processed normally")
            .clone();

        assert_eq!(snap.action, Action::Add);
        assert_eq!(book.stats().stale_pending_trades, 1);
    }

    #[test]
    fn test_add_cancel_round_trip_restores_state() {
        let mut book = book_with_bid_ladder(3);
        let bids_before = book.bids.clone();
        let asks_before = book.asks.clone();
        let index_before = book.index.clone();

        book.apply(&event(10, Action::Add, Side::Bid, px(108), 7, 50));
        book.apply(&event(11, Action::Cancel, Side::Bid, px(108), 7, 50));

        assert_eq!(book.bids, bids_before);
        assert_eq!(book.asks, asks_before);
        assert_eq!(book.index, index_before);
        assert!(book.pending_trade.is_none());
    }

    #[test]
    fn test_clear_resets_book_and_emits_empty_snapshot() {
        let mut book = OrderBook::new(2, 1108);
        book.apply(&event(2, Action::Add, Side::Bid, px(10), 5, 400));

        let snap = book
            .apply(&event(3, Action::Clear, Side::None, 0, 0, 0))
            .expect("clear must emit")
            .clone();

        assert_eq!(snap.action, Action::Clear);
        assert_eq!(snap.depth, 0);
        assert!(snap.bids.iter().all(|l| l.count == 0));
        assert!(snap.asks.iter().all(|l| l.count == 0));
        assert_eq!(book.total_orders(), 0);
        assert_eq!(book.level_counts(), (0, 0));
    }

    #[test]
    fn test_standalone_fill_removes_order() {
        let mut book = OrderBook::new(2, 1108);
        book.apply(&event(2, Action::Add, Side::Bid, px(10), 5, 100));

        let snap = book
            .apply(&event(3, Action::Fill, Side::Bid, px(10), 5, 100))
            .expect("visible fill must emit")
            .clone();

        assert_eq!(snap.action, Action::Fill);
        assert_eq!(book.total_orders(), 0);
        assert_eq!(book.level_counts(), (0, 0));
    }

    #[test]
    fn test_standalone_fill_partial_keeps_order() {
        let mut book = OrderBook::new(2, 1108);
        book.apply(&event(2, Action::Add, Side::Bid, px(10), 5, 100));

        let snap = book
            .apply(&event(3, Action::Fill, Side::Bid, px(10), 2, 100))
            .unwrap()
            .clone();

        assert_eq!(snap.bids[0].size, 3);
        assert_eq!(snap.bids[0].count, 1);
        assert_eq!(book.total_orders(), 1);
    }

    #[test]
    fn test_unknown_fill_dropped() {
        let mut book = OrderBook::new(2, 1108);
        let result = book.apply(&event(1, Action::Fill, Side::Bid, px(10), 5, 999));
        assert!(result.is_none());
        assert_eq!(book.stats().unknown_fills, 1);
    }

    #[test]
    fn test_modify_moves_order_to_new_price() {
        let mut book = OrderBook::new(2, 1108);
        book.apply(&event(2, Action::Add, Side::Bid, px(10), 5, 100));

        let snap = book
            .apply(&event(3, Action::Modify, Side::Bid, px(11), 3, 100))
            .expect("modify touching the top must emit")
            .clone();

        assert_eq!(snap.action, Action::Modify);
        assert_eq!(snap.bids[0].price, px(11));
        assert_eq!(snap.bids[0].size, 3);
        assert!(book.bids.level(px(10)).is_none());
        assert_eq!(book.index.get(100).unwrap().price, px(11));
    }

    #[test]
    fn test_orphan_cancel_discards_pending_trade() {
        let mut book = OrderBook::new(2, 1108);
        book.apply(&event(2, Action::Trade, Side::Ask, px(20), 4, 0));

        let result = book.apply(&event(3, Action::Cancel, Side::Ask, px(20), 4, 999));
        assert!(result.is_none());
        assert_eq!(book.stats().unknown_cancels, 1);
        assert_eq!(book.stats().stale_pending_trades, 1);
        assert!(book.pending_trade.is_none());
    }
}
