use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        source: serde_json::Error,
        path: PathBuf,
    },
    #[error("request to {url} failed: {source}")]
    Transport {
        source: Box<ureq::Error>,
        url: String,
    },
    #[error("GET {url} returned status {status}, expected 200")]
    Status { url: String, status: u16 },
    #[error("response from {url} is not a {{\"result\": ...}} document: {reason}")]
    MissingResult { url: String, reason: String },
    #[error("no suitable candidates: {0}")]
    NoCandidates(String),
    #[error("template substitution produced invalid JSON: {0}")]
    Template(#[source] serde_json::Error),
    #[error("fixed-data fixtures are disabled (inc_fixed_data = false)")]
    FixedDataDisabled,
    #[error("configuration error: {0}")]
    Config(String),
}

impl FixtureError {
    /// True when the error means the caller should skip rather than fail.
    pub fn is_skip(&self) -> bool {
        matches!(self, FixtureError::FixedDataDisabled)
    }
}

pub type FixtureResult<T> = Result<T, FixtureError>;
