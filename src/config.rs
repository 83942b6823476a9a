//! Startup configuration: which stops to watch, where their predictions come
//! from, and how to render wall-clock times.
//!
//! Stored as a JSON object on disk:
//! ```json
//! {
//!   "stops": ["15462", "6604"],
//!   "feed": { "kind": "gtfs_rt", "url": "https://bustime.ttc.ca/gtfsrt/trips" },
//!   "timezone": "America/Toronto",
//!   "fetch_timeout_secs": 10
//! }
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Placeholder substituted with the stop ID in per-stop URL templates.
pub const STOP_ID_PLACEHOLDER: &str = "{stop_id}";

/// Opaque transit stop identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StopId(String);

impl StopId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StopId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Wire format of the upstream feed. Selects the parser strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    /// One combined GTFS Realtime protobuf feed for all stops.
    GtfsRt,
    /// One NextBus XML predictions document per stop.
    NextBus,
}

/// Where predictions are fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind")]
pub enum FeedSource {
    #[serde(rename = "gtfs_rt")]
    GtfsRt { url: String },
    /// `url_template` must contain `{stop_id}`.
    #[serde(rename = "nextbus")]
    NextBus { url_template: String },
}

impl FeedSource {
    pub fn kind(&self) -> FeedKind {
        match self {
            FeedSource::GtfsRt { .. } => FeedKind::GtfsRt,
            FeedSource::NextBus { .. } => FeedKind::NextBus,
        }
    }
}

/// Expands a per-stop URL template for `stop`.
pub fn stop_url(url_template: &str, stop: &StopId) -> String {
    url_template.replace(STOP_ID_PLACEHOLDER, stop.as_str())
}

#[derive(Debug, Clone, Deserialize)]
pub struct BoardConfig {
    pub stops: Vec<StopId>,
    pub feed: FeedSource,
    /// IANA timezone used for `departure_time` (default: America/Toronto)
    #[serde(default = "BoardConfig::default_timezone")]
    pub timezone: String,
    /// Per-request upstream timeout in seconds (default: 10)
    #[serde(default = "BoardConfig::default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl BoardConfig {
    fn default_timezone() -> String {
        "America/Toronto".to_string()
    }

    fn default_fetch_timeout_secs() -> u64 {
        10
    }

    /// Loads and validates the config from a JSON file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Read(e.to_string()))?;
        Self::from_json(&content)
    }

    /// Parses and validates a config from a JSON string.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: BoardConfig =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stops.is_empty() {
            return Err(ConfigError::NoStops);
        }

        let mut seen = HashSet::new();
        for stop in &self.stops {
            let id = stop.as_str();
            if id.trim().is_empty() || id.trim() != id {
                return Err(ConfigError::InvalidStop(id.to_string()));
            }
            if !seen.insert(id) {
                return Err(ConfigError::DuplicateStop(id.to_string()));
            }
        }

        self.tz()?;

        match &self.feed {
            FeedSource::GtfsRt { url } if url.trim().is_empty() => Err(
                ConfigError::InvalidSource("gtfs_rt feed requires a url".to_string()),
            ),
            FeedSource::NextBus { url_template } if !url_template.contains(STOP_ID_PLACEHOLDER) => {
                Err(ConfigError::InvalidSource(format!(
                    "nextbus url_template must contain {STOP_ID_PLACEHOLDER}"
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimezone(self.timezone.clone()))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// The per-stop source for the NextBus variant, `None` for GTFS-RT.
    pub fn stop_source(&self, stop: &StopId) -> Option<String> {
        match &self.feed {
            FeedSource::NextBus { url_template } => Some(stop_url(url_template, stop)),
            FeedSource::GtfsRt { .. } => None,
        }
    }
}
