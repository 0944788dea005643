//! Publisher module for MBP-10 output
//!
//! Serializes snapshots to the reference MBP-10 CSV schema. The writer owns
//! the row index column: rows are numbered 0-based in emission order.

use std::fs::File;
use std::io;
use std::path::Path;

use crate::error::{ReconstructError, Result};
use crate::orderbook::{MbpSnapshot, DEPTH};
use crate::price;

/// Consumer of emitted snapshots.
pub trait SnapshotSink {
    fn write(&mut self, row_index: u64, snapshot: &MbpSnapshot) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

/// CSV snapshot writer, bit-exact against the reference MBP-10 schema.
pub struct MbpCsvWriter<W: io::Write> {
    writer: csv::Writer<W>,
    /// Reused per-row field buffer
    record: Vec<String>,
}

impl MbpCsvWriter<File> {
    /// Create the output file and write the header row.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| ReconstructError::OutputOpen {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_writer(file)
    }
}

impl<W: io::Write> MbpCsvWriter<W> {
    /// Wrap an arbitrary writer and emit the header row immediately.
    pub fn from_writer(inner: W) -> Result<Self> {
        let mut writer = csv::Writer::from_writer(inner);
        writer.write_record(header_fields())?;
        Ok(Self {
            writer,
            record: Vec::with_capacity(16 + 6 * DEPTH),
        })
    }

    /// Unwrap the inner writer, flushing first. Used by tests to inspect
    /// produced bytes.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| ReconstructError::SinkWrite(e.to_string()))
    }
}

impl<W: io::Write> SnapshotSink for MbpCsvWriter<W> {
    fn write(&mut self, row_index: u64, snapshot: &MbpSnapshot) -> Result<()> {
        let record = &mut self.record;
        record.clear();

        record.push(row_index.to_string());
        record.push(snapshot.ts_recv.clone());
        record.push(snapshot.ts_event.clone());
        record.push(snapshot.rtype.to_string());
        record.push(snapshot.publisher_id.to_string());
        record.push(snapshot.instrument_id.to_string());
        record.push(snapshot.action.as_char().to_string());
        record.push(snapshot.side.as_char().to_string());
        record.push(snapshot.depth.to_string());
        record.push(price::format(snapshot.price));
        record.push(snapshot.size.to_string());
        record.push(snapshot.flags.to_string());
        record.push(snapshot.ts_in_delta.to_string());
        record.push(snapshot.sequence.to_string());

        for level in snapshot.bids.iter().chain(snapshot.asks.iter()) {
            record.push(price::format(level.price));
            record.push(level.size.to_string());
            record.push(level.count.to_string());
        }

        record.push(snapshot.symbol.clone());
        record.push(snapshot.order_id.to_string());

        self.writer.write_record(record.iter())?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// The exact reference header: an unnamed index column, the triggering
/// event's metadata, ten bid and ten ask level triples, symbol, order id.
fn header_fields() -> Vec<String> {
    let mut fields: Vec<String> = [
        "",
        "ts_recv",
        "ts_event",
        "rtype",
        "publisher_id",
        "instrument_id",
        "action",
        "side",
        "depth",
        "price",
        "size",
        "flags",
        "ts_in_delta",
        "sequence",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    for side in ["bid", "ask"] {
        for i in 0..DEPTH {
            fields.push(format!("{side}_px_{i:02}"));
            fields.push(format!("{side}_sz_{i:02}"));
            fields.push(format!("{side}_ct_{i:02}"));
        }
    }

    fields.push("symbol".to_string());
    fields.push("order_id".to_string());
    fields
}
