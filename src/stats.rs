use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::StopId;
use crate::error::BoardError;

/// Counters for one source during one pass.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PassStats {
    pub raw_entries: usize,
    pub kept: usize,

    // exclusions
    pub excluded_past: usize,
    pub excluded_unknown_stop: usize,
    pub excluded_bad_time: usize,
}

impl PassStats {
    pub fn excluded(&self) -> usize {
        self.excluded_past + self.excluded_unknown_stop + self.excluded_bad_time
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    Ok { departures: usize },
    /// Fetched and decoded, but nothing upcoming for the stop
    Empty,
    Failed {
        error_type: String,
        error_message: String,
    },
}

/// What happened to one upstream source in a pass.
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub stop_id: Option<StopId>,
    pub outcome: SourceOutcome,
    pub stats: PassStats,
}

impl SourceReport {
    pub fn from_stats(source: &str, stats: PassStats) -> Self {
        let outcome = if stats.kept == 0 {
            SourceOutcome::Empty
        } else {
            SourceOutcome::Ok {
                departures: stats.kept,
            }
        };
        Self {
            source: source.to_string(),
            stop_id: None,
            outcome,
            stats,
        }
    }

    /// Create an error record for a source whose fetch or decode failed
    pub fn from_error(source: &str, err: &BoardError) -> Self {
        let error_type = match err {
            BoardError::Fetch(_) => "fetch_error",
            BoardError::Parse(_) => "parse_error",
        };
        Self {
            source: source.to_string(),
            stop_id: None,
            outcome: SourceOutcome::Failed {
                error_type: error_type.to_string(),
                error_message: err.to_string(),
            },
            stats: PassStats::default(),
        }
    }

    pub fn with_stop(mut self, stop: &StopId) -> Self {
        self.stop_id = Some(stop.clone());
        self
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, SourceOutcome::Failed { .. })
    }
}

/// Partial-success report for one pass across all sources.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub timestamp: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
}

impl PassReport {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            sources: Vec::new(),
        }
    }

    pub fn push(&mut self, source: SourceReport) {
        self.sources.push(source);
    }

    pub fn failed(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources.iter().filter(|s| s.is_failed())
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources.iter().filter(|s| !s.is_failed())
    }

    /// Some, but not all, sources failed.
    pub fn is_partial(&self) -> bool {
        let failed = self.failed().count();
        failed > 0 && failed < self.sources.len()
    }

    pub fn total_departures(&self) -> usize {
        self.sources.iter().map(|s| s.stats.kept).sum()
    }
}
