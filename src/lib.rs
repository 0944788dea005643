//! MBP-10 reconstruction library
//!
//! Rebuilds a Market-By-Price depth-10 snapshot stream from a Market-By-Order
//! event stream for a single instrument: CSV events in, one MBP-10 row out
//! per book-visible change.

pub mod config;
pub mod error;
pub mod orderbook;
pub mod parser;
pub mod pipeline;
pub mod price;
pub mod publisher;

pub use config::Config;
pub use error::{ReconstructError, Result};
pub use orderbook::{Action, BookStats, MbpLevel, MbpSnapshot, OrderBook, Side, DEPTH};
pub use parser::{MboEvent, MboReader};
pub use pipeline::PipelineSummary;
pub use publisher::{MbpCsvWriter, SnapshotSink};
