//! Stop filtering and countdown computation.
//!
//! Turns transient [`RawPrediction`]s into uniform [`Departure`] records
//! relative to an explicit `now`.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::config::{BoardConfig, StopId};
use crate::error::ConfigError;
use crate::parser::{CountdownPrediction, RawPrediction, ScheduledDeparture};
use crate::stats::PassStats;

/// Stop name used when a NextBus document carries no `stopTitle`.
pub const UNKNOWN_STOP_NAME: &str = "Unknown";

/// One upcoming departure, as served to the display client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Departure {
    pub route: String,
    pub stop_id: StopId,
    /// Only known for NextBus feeds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_name: Option<String>,
    /// Local wall-clock time, `HH:MM`
    pub departure_time: String,
    pub minutes: u32,
}

pub struct Normalizer {
    allowlist: HashSet<StopId>,
    tz: Tz,
}

impl Normalizer {
    pub fn new(stops: impl IntoIterator<Item = StopId>, tz: Tz) -> Self {
        Self {
            allowlist: stops.into_iter().collect(),
            tz,
        }
    }

    pub fn from_config(config: &BoardConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.stops.iter().cloned(), config.tz()?))
    }

    pub fn is_allowed(&self, stop: &StopId) -> bool {
        self.allowlist.contains(stop)
    }

    /// Normalizes every entry of `raw`, preserving input order.
    ///
    /// `scope` is the stop a per-stop payload was fetched for; NextBus entries
    /// carry no stop ID of their own.
    pub fn normalize_all(
        &self,
        raw: impl Iterator<Item = RawPrediction>,
        scope: Option<&StopId>,
        now: DateTime<Utc>,
        stats: &mut PassStats,
    ) -> Vec<Departure> {
        raw.filter_map(|entry| self.normalize(entry, scope, now, stats))
            .collect()
    }

    pub fn normalize(
        &self,
        raw: RawPrediction,
        scope: Option<&StopId>,
        now: DateTime<Utc>,
        stats: &mut PassStats,
    ) -> Option<Departure> {
        stats.raw_entries += 1;
        let departure = match raw {
            RawPrediction::Scheduled(entry) => self.scheduled(entry, now, stats),
            RawPrediction::Countdown(entry) => match scope {
                Some(stop) => self.countdown(entry, stop, now, stats),
                None => {
                    stats.excluded_unknown_stop += 1;
                    None
                }
            },
        }?;
        stats.kept += 1;
        Some(departure)
    }

    fn scheduled(
        &self,
        entry: ScheduledDeparture,
        now: DateTime<Utc>,
        stats: &mut PassStats,
    ) -> Option<Departure> {
        if !self.is_allowed(&entry.stop_id) {
            stats.excluded_unknown_stop += 1;
            return None;
        }
        let Some(at) = DateTime::from_timestamp(entry.departure_epoch_secs, 0) else {
            stats.excluded_bad_time += 1;
            return None;
        };
        let minutes = non_negative(minutes_until(now, at), stats)?;

        Some(Departure {
            route: entry.route_id,
            stop_id: entry.stop_id,
            stop_name: None,
            departure_time: self.wall_clock(at),
            minutes,
        })
    }

    /// The agency's own countdown is trusted when present; otherwise it is
    /// derived from `epochTime` the same way as for GTFS-RT.
    fn countdown(
        &self,
        entry: CountdownPrediction,
        stop: &StopId,
        now: DateTime<Utc>,
        stats: &mut PassStats,
    ) -> Option<Departure> {
        if !self.is_allowed(stop) {
            stats.excluded_unknown_stop += 1;
            return None;
        }
        let Some(at) = DateTime::from_timestamp_millis(entry.epoch_time_millis) else {
            stats.excluded_bad_time += 1;
            return None;
        };
        let minutes = non_negative(entry.minutes.unwrap_or_else(|| minutes_until(now, at)), stats)?;

        Some(Departure {
            route: entry.route_title,
            stop_id: stop.clone(),
            stop_name: Some(
                entry
                    .stop_title
                    .unwrap_or_else(|| UNKNOWN_STOP_NAME.to_string()),
            ),
            departure_time: self.wall_clock(at),
            minutes,
        })
    }

    fn wall_clock(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.tz).format("%H:%M").to_string()
    }
}

/// Whole minutes from `now` until `at`, rounded towards negative infinity.
pub fn minutes_until(now: DateTime<Utc>, at: DateTime<Utc>) -> i64 {
    (at - now).num_milliseconds().div_euclid(60_000)
}

fn non_negative(minutes: i64, stats: &mut PassStats) -> Option<u32> {
    match u32::try_from(minutes) {
        Ok(minutes) => Some(minutes),
        Err(_) if minutes < 0 => {
            stats.excluded_past += 1;
            None
        }
        Err(_) => {
            stats.excluded_bad_time += 1;
            None
        }
    }
}
