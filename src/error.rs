//! Error types for the MBP-10 reconstructor

use thiserror::Error;

/// Reconstruction errors
#[derive(Error, Debug)]
pub enum ReconstructError {
    #[error("failed to open input file '{path}': {source}")]
    InputOpen {
        path: String,
        source: std::io::Error,
    },

    #[error("malformed CSV header: {0}")]
    HeaderMalformed(String),

    #[error("line {line}: {reason}")]
    RowMalformed { line: u64, reason: String },

    #[error("invalid price '{0}'")]
    InvalidPrice(String),

    #[error("failed to create output file '{path}': {source}")]
    OutputOpen {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to write output: {0}")]
    SinkWrite(String),
}

impl From<csv::Error> for ReconstructError {
    fn from(err: csv::Error) -> Self {
        ReconstructError::SinkWrite(err.to_string())
    }
}

impl From<std::io::Error> for ReconstructError {
    fn from(err: std::io::Error) -> Self {
        ReconstructError::SinkWrite(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReconstructError>;
