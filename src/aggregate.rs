//! Board assembly: grouping by stop and ordering by countdown.
//!
//! All sorts are stable, so departures with equal countdowns keep the order in
//! which the feed listed them. Nothing is deduplicated or truncated; picking
//! the top N rows is left to the display client.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::StopId;
use crate::normalize::Departure;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Board {
    /// Combined-feed mode: one list across all stops
    Flat(Vec<Departure>),
    /// Per-stop mode: every configured stop, possibly with an empty list
    ByStop(BTreeMap<StopId, Vec<Departure>>),
}

impl Board {
    pub fn len(&self) -> usize {
        match self {
            Board::Flat(departures) => departures.len(),
            Board::ByStop(stops) => stops.values().map(Vec::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Sorts `departures` globally by countdown.
pub fn sort_flat(mut departures: Vec<Departure>) -> Vec<Departure> {
    departures.sort_by_key(|d| d.minutes);
    departures
}

/// Groups `departures` by stop, seeding every stop in `stops` with an empty
/// list, then sorts each group by countdown.
pub fn group_by_stop<'a>(
    stops: impl IntoIterator<Item = &'a StopId>,
    departures: impl IntoIterator<Item = Departure>,
) -> BTreeMap<StopId, Vec<Departure>> {
    let mut grouped: BTreeMap<StopId, Vec<Departure>> = stops
        .into_iter()
        .map(|stop| (stop.clone(), Vec::new()))
        .collect();

    for departure in departures {
        grouped
            .entry(departure.stop_id.clone())
            .or_default()
            .push(departure);
    }

    for group in grouped.values_mut() {
        group.sort_by_key(|d| d.minutes);
    }
    grouped
}
