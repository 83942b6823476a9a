//! Decoding of upstream payloads into transient [`RawPrediction`] entries.
//!
//! The feed variant is chosen once from configuration ([`FeedKind`]); both
//! variants yield the same owning iterator type.

pub mod gtfs_rt;
pub mod nextbus;

use crate::config::{FeedKind, StopId};
use crate::error::ParseError;

/// A departure with an absolute timestamp, as carried by GTFS-RT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledDeparture {
    pub route_id: String,
    pub stop_id: StopId,
    pub departure_epoch_secs: i64,
}

/// A NextBus prediction. The stop is implied by the per-stop request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownPrediction {
    pub stop_title: Option<String>,
    pub route_title: String,
    /// Countdown precomputed by the agency
    pub minutes: Option<i64>,
    pub epoch_time_millis: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawPrediction {
    Scheduled(ScheduledDeparture),
    Countdown(CountdownPrediction),
}

pub type RawPredictions = Box<dyn Iterator<Item = RawPrediction> + Send>;

/// Decodes `bytes` with the parser for `kind`.
///
/// # Errors
///
/// Returns [`ParseError`] if the payload is not a valid document of that kind.
pub fn decode(kind: FeedKind, bytes: &[u8]) -> Result<RawPredictions, ParseError> {
    let predictions: RawPredictions = match kind {
        FeedKind::GtfsRt => {
            let feed = gtfs_rt::parse_feed(bytes)?;
            Box::new(gtfs_rt::scheduled_departures(feed).map(RawPrediction::Scheduled))
        }
        FeedKind::NextBus => Box::new(
            nextbus::parse_predictions(bytes)?
                .into_iter()
                .map(RawPrediction::Countdown),
        ),
    };
    Ok(predictions)
}
