//! Configuration module for the reconstructor

use serde::Deserialize;
use std::env;

/// Engine configuration
///
/// The identifiers are stamped into every output row. Defaults match the
/// reference feed; override via environment variables when reconstructing a
/// different publisher's data.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Publisher identifier copied into each snapshot
    pub publisher_id: u16,

    /// Instrument identifier copied into each snapshot
    pub instrument_id: u32,
}

impl Config {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset or unparseable.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        Self {
            publisher_id: env::var("PUBLISHER_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.publisher_id),
            instrument_id: env::var("INSTRUMENT_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.instrument_id),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            publisher_id: 2,
            instrument_id: 1108,
        }
    }
}
