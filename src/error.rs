/// ERRORS
///
/// Per-track failures (`CourseError`) never abort a batch; only
/// `BatchError` does.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of one track's pipeline run.
#[derive(Debug, Error)]
pub enum CourseError {
    /// The file is not a readable GPX document
    #[error("invalid GPX in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// The document parsed but holds no usable fixes
    #[error("no fixes with elevation found in {path}")]
    EmptyTrack { path: PathBuf },

    /// Fewer returns to the start point than the lap path needs
    #[error("found {found} lap boundaries, need at least {required}")]
    InsufficientLaps { found: usize, required: usize },

    /// Representative lap is shorter than the smoothing window
    #[error("lap has {len} points, smoothing needs at least {min}")]
    SmoothingWindow { len: usize, min: usize },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reverse geocoding failures. Always recovered locally.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoding request timed out")]
    Timeout,

    #[error("geocoding lookup failed: {0}")]
    Lookup(String),
}

impl From<reqwest::Error> for GeocodeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GeocodeError::Timeout
        } else {
            GeocodeError::Lookup(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors that stop the whole batch.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("input directory {path} is not readable: {message}")]
    InputDir { path: PathBuf, message: String },

    #[error("failed writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error for {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("GPX write error for {path}: {message}")]
    GpxWrite { path: PathBuf, message: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
