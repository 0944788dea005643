//! Parser module for MBO event streams
//!
//! Deserializes MBO CSV rows into typed events. Column mapping is driven by
//! the header, so extra columns (rtype, channel_id, ...) pass through
//! untouched and column order does not matter. Malformed rows surface as
//! per-row errors carrying their line number; the pipeline drops them and
//! keeps reading.

use std::fs::File;
use std::io;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ReconstructError, Result};
use crate::orderbook::{Action, Side};
use crate::price;

/// Columns that must be present in the input header.
const REQUIRED_COLUMNS: &[&str] = &[
    "ts_recv", "ts_event", "action", "side", "order_id", "sequence", "symbol",
];

/// Maximum accepted order size (one billion shares).
const MAX_SIZE: u32 = 1_000_000_000;

/// One MBO event, validated and ready for the book engine.
///
/// Timestamps are opaque strings: the engine never interprets them, it only
/// copies them into snapshots, so round-tripping them verbatim is both the
/// fastest and the safest option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MboEvent {
    pub ts_recv: String,
    pub ts_event: String,
    pub action: Action,
    pub side: Side,
    /// Scaled price, 0 when the row carried none
    pub price: u64,
    pub size: u32,
    pub order_id: u64,
    pub flags: u32,
    pub ts_in_delta: u64,
    pub sequence: u64,
    pub symbol: String,
}

/// Raw CSV row as serde sees it; everything optional so validation can
/// produce precise error messages instead of opaque deserialize failures.
#[derive(Debug, Deserialize)]
struct RawMboRecord {
    #[serde(default)]
    ts_recv: String,
    #[serde(default)]
    ts_event: String,
    #[serde(default)]
    action: String,
    #[serde(default)]
    side: String,
    #[serde(default)]
    price: String,
    #[serde(default)]
    size: Option<u32>,
    #[serde(default)]
    order_id: Option<u64>,
    #[serde(default)]
    flags: Option<u32>,
    #[serde(default)]
    ts_in_delta: Option<u64>,
    #[serde(default)]
    sequence: Option<u64>,
    #[serde(default)]
    symbol: String,
}

impl RawMboRecord {
    /// Validate and convert into an [`MboEvent`].
    fn into_event(self) -> std::result::Result<MboEvent, String> {
        let action = self
            .action
            .chars()
            .next()
            .and_then(Action::from_char)
            .ok_or_else(|| format!("unknown action '{}'", self.action))?;

        let side = match self.side.chars().next() {
            None => Side::None,
            Some(c) => Side::from_char(c).ok_or_else(|| format!("unknown side '{c}'"))?,
        };

        let price = if self.price.is_empty() {
            0
        } else {
            price::encode(&self.price).map_err(|e| e.to_string())?
        };

        let size = self.size.unwrap_or(0);
        let order_id = self.order_id.unwrap_or(0);

        if action != Action::Clear {
            if self.ts_recv.is_empty() || self.ts_event.is_empty() {
                return Err("missing timestamps".to_string());
            }
            if order_id == 0 && action != Action::Trade {
                return Err(format!("order_id required for action '{}'", action.as_char()));
            }
        }

        if matches!(action, Action::Add | Action::Clear) && self.symbol.is_empty() {
            return Err("missing symbol".to_string());
        }

        if action == Action::Add {
            if price == 0 || size == 0 {
                return Err("add requires a price and a size".to_string());
            }
            if size > MAX_SIZE {
                return Err(format!("size {size} out of range"));
            }
            if !side.is_directional() {
                return Err("add requires side B or A".to_string());
            }
        }

        if matches!(action, Action::Trade | Action::Fill) && size == 0 {
            return Err(format!("size required for action '{}'", action.as_char()));
        }

        Ok(MboEvent {
            ts_recv: self.ts_recv,
            ts_event: self.ts_event,
            action,
            side,
            price,
            size,
            order_id,
            flags: self.flags.unwrap_or(0),
            ts_in_delta: self.ts_in_delta.unwrap_or(0),
            sequence: self.sequence.unwrap_or(0),
            symbol: self.symbol,
        })
    }
}

/// Streaming MBO event source over any reader.
///
/// Yields one `Result<MboEvent>` per data row; errors are per-row and the
/// iterator keeps going past them.
pub struct MboReader<R: io::Read> {
    records: csv::DeserializeRecordsIntoIter<R, RawMboRecord>,
    row: u64,
}

impl MboReader<File> {
    /// Open an MBO CSV file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ReconstructError::InputOpen {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_reader(file)
    }
}

impl<R: io::Read> MboReader<R> {
    /// Wrap an arbitrary reader; validates the header up front.
    pub fn from_reader(rdr: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(rdr);

        let headers = reader
            .headers()
            .map_err(|e| ReconstructError::HeaderMalformed(e.to_string()))?;
        for column in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == *column) {
                return Err(ReconstructError::HeaderMalformed(format!(
                    "missing required column '{column}'"
                )));
            }
        }

        Ok(Self {
            records: reader.into_deserialize(),
            row: 0,
        })
    }
}

impl<R: io::Read> Iterator for MboReader<R> {
    type Item = Result<MboEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = self.records.next()?;
        self.row += 1;
        let line = self.row + 1; // the header occupies line 1

        Some(match raw {
            Ok(raw) => raw
                .into_event()
                .map_err(|reason| ReconstructError::RowMalformed { line, reason }),
            Err(e) => Err(ReconstructError::RowMalformed {
                line,
                reason: e.to_string(),
            }),
        })
    }
}
