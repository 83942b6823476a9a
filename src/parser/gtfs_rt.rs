//! Protobuf parser for GTFS Realtime trip-update feeds.

use prost::Message;

use crate::config::StopId;
use crate::error::ParseError;
use crate::gtfs_rt::trip_update::StopTimeUpdate;
use crate::gtfs_rt::trip_update::stop_time_update::ScheduleRelationship;
use crate::gtfs_rt::{FeedMessage, TripUpdate};

use super::ScheduledDeparture;

/// Decodes a protobuf-encoded GTFS-RT [`FeedMessage`] from raw bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid protobuf for a `FeedMessage`.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedMessage, ParseError> {
    Ok(FeedMessage::decode(bytes)?)
}

/// Flattens every trip update in `feed` into one entry per stop-time update
/// that carries a departure time.
///
/// Entities without a trip update, trips without a route, stop-time updates
/// without a stop or departure time, and skipped stops yield nothing.
pub fn scheduled_departures(feed: FeedMessage) -> impl Iterator<Item = ScheduledDeparture> + Send {
    feed.entity
        .into_iter()
        .filter(|entity| !entity.is_deleted())
        .filter_map(|entity| entity.trip_update)
        .flat_map(|TripUpdate { trip, stop_time_update, .. }| {
            let route_id = trip.route_id;
            stop_time_update
                .into_iter()
                .filter_map(move |update| stop_departure(route_id.as_deref()?, update))
        })
}

fn stop_departure(route_id: &str, update: StopTimeUpdate) -> Option<ScheduledDeparture> {
    if update.schedule_relationship() == ScheduleRelationship::Skipped {
        return None;
    }
    let stop_id = update.stop_id?;
    let departure_epoch_secs = update.departure?.time?;

    Some(ScheduledDeparture {
        route_id: route_id.to_string(),
        stop_id: StopId::new(stop_id),
        departure_epoch_secs,
    })
}
