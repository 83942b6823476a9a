//! Error types for the fetch → parse → normalize pipeline.

use thiserror::Error;

/// Failure reaching an upstream source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Upstream {url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("Upstream response too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: usize, max: usize },
    #[error("Invalid source URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Malformed upstream payload.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Protobuf decode error: {0}")]
    Protobuf(#[from] prost::DecodeError),
    #[error("XML parse error: {0}")]
    Xml(String),
    #[error("Invalid value '{value}' for attribute '{field}'")]
    InvalidField { field: &'static str, value: String },
    #[error("Upstream reported an error: {0}")]
    Upstream(String),
}

impl From<serde_xml_rs::Error> for ParseError {
    fn from(err: serde_xml_rs::Error) -> Self {
        ParseError::Xml(err.to_string())
    }
}

/// Invalid startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(String),
    #[error("Failed to parse config: {0}")]
    Parse(String),
    #[error("No stops configured")]
    NoStops,
    #[error("Invalid stop ID '{0}'")]
    InvalidStop(String),
    #[error("Stop ID '{0}' configured more than once")]
    DuplicateStop(String),
    #[error("Unknown timezone '{0}'")]
    UnknownTimezone(String),
    #[error("Feed source misconfigured: {0}")]
    InvalidSource(String),
}

/// Failure of a whole pass. Only the combined-feed mode surfaces this; per-stop
/// failures are folded into the pass report instead.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}
