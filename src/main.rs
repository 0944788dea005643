//! MBP-10 reconstruction tool
//!
//! Reads an MBO CSV file, replays it through the book engine, and writes the
//! resulting MBP-10 snapshot stream.

use std::path::PathBuf;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mbp_reconstruct::{pipeline, Config, MboReader, MbpCsvWriter, OrderBook};

#[derive(Parser, Debug)]
#[command(
    name = "mbp-reconstruct",
    about = "Reconstruct MBP-10 snapshots from an MBO event stream"
)]
struct Cli {
    /// Input MBO CSV file
    input: PathBuf,

    /// Output MBP-10 CSV file
    #[arg(default_value = "output_mbp.csv")]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so the terminal stays usable while the CSV output
    // streams to its file.
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    let config = Config::load();

    info!(
        input = %cli.input.display(),
        output = %cli.output.display(),
        publisher_id = config.publisher_id,
        instrument_id = config.instrument_id,
        "starting MBP-10 reconstruction"
    );

    let events = MboReader::from_path(&cli.input)?;
    let mut engine = OrderBook::new(config.publisher_id, config.instrument_id);
    let mut sink = MbpCsvWriter::from_path(&cli.output)?;

    let summary = pipeline::run(events, &mut engine, &mut sink)?;

    info!(
        snapshots = summary.snapshots_written,
        output = %cli.output.display(),
        "reconstruction complete"
    );

    Ok(())
}
