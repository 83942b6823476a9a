//! One fetch → parse → normalize → aggregate pass per call.
//!
//! The service holds only immutable configuration and the HTTP client; nothing
//! computed during a pass outlives it.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, warn};

use crate::aggregate::{self, Board};
use crate::config::{self, BoardConfig, FeedKind, FeedSource, StopId};
use crate::error::{BoardError, ConfigError};
use crate::fetch::{HttpClient, fetch_source};
use crate::normalize::{Departure, Normalizer};
use crate::parser;
use crate::stats::{PassReport, PassStats, SourceReport};

/// Result of one pass.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub board: Board,
    pub report: PassReport,
}

pub struct SnapshotService<C> {
    config: BoardConfig,
    normalizer: Normalizer,
    client: C,
}

impl<C: HttpClient> SnapshotService<C> {
    pub fn new(config: BoardConfig, client: C) -> Result<Self, ConfigError> {
        config.validate()?;
        let normalizer = Normalizer::from_config(&config)?;
        Ok(Self {
            config,
            normalizer,
            client,
        })
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Runs a full pass relative to `now`.
    ///
    /// # Errors
    ///
    /// In GTFS-RT mode a fetch or decode failure has no meaningful partial
    /// result and is returned as [`BoardError`]. In NextBus mode failures are
    /// isolated per stop and reported in [`Snapshot::report`] instead.
    #[tracing::instrument(skip(self), fields(kind = ?self.config.feed.kind()))]
    pub async fn snapshot(&self, now: DateTime<Utc>) -> Result<Snapshot, BoardError> {
        let snapshot = match &self.config.feed {
            FeedSource::GtfsRt { url } => self.combined_pass(url, now).await?,
            FeedSource::NextBus { url_template } => self.per_stop_pass(url_template, now).await,
        };

        for failed in snapshot.report.failed() {
            warn!(
                source = %failed.source,
                stop_id = ?failed.stop_id.as_ref().map(StopId::as_str),
                outcome = ?failed.outcome,
                "Source failed, serving empty list"
            );
        }
        debug!(
            departures = snapshot.board.len(),
            sources = snapshot.report.sources.len(),
            partial = snapshot.report.is_partial(),
            "Pass complete"
        );

        Ok(snapshot)
    }

    async fn combined_pass(&self, url: &str, now: DateTime<Utc>) -> Result<Snapshot, BoardError> {
        let (departures, stats) = self.source_pass(url, FeedKind::GtfsRt, None, now).await?;

        let mut report = PassReport::new(now);
        report.push(SourceReport::from_stats(url, stats));

        Ok(Snapshot {
            board: Board::Flat(aggregate::sort_flat(departures)),
            report,
        })
    }

    async fn per_stop_pass(&self, url_template: &str, now: DateTime<Utc>) -> Snapshot {
        let passes = self.config.stops.iter().map(|stop| async move {
            let source = config::stop_url(url_template, stop);
            let result = self
                .source_pass(&source, FeedKind::NextBus, Some(stop), now)
                .await;
            (stop, source, result)
        });

        let mut report = PassReport::new(now);
        let mut departures = Vec::new();

        // join_all keeps input order, but results are keyed by stop anyway
        for (stop, source, result) in join_all(passes).await {
            match result {
                Ok((stop_departures, stats)) => {
                    report.push(SourceReport::from_stats(&source, stats).with_stop(stop));
                    departures.extend(stop_departures);
                }
                Err(err) => {
                    report.push(SourceReport::from_error(&source, &err).with_stop(stop));
                }
            }
        }

        Snapshot {
            board: Board::ByStop(aggregate::group_by_stop(&self.config.stops, departures)),
            report,
        }
    }

    async fn source_pass(
        &self,
        source: &str,
        kind: FeedKind,
        scope: Option<&StopId>,
        now: DateTime<Utc>,
    ) -> Result<(Vec<Departure>, PassStats), BoardError> {
        let bytes = fetch_source(&self.client, source).await?;
        let raw = parser::decode(kind, &bytes)?;

        let mut stats = PassStats::default();
        let departures = self.normalizer.normalize_all(raw, scope, now, &mut stats);
        debug!(
            source,
            raw_entries = stats.raw_entries,
            kept = stats.kept,
            excluded_past = stats.excluded_past,
            excluded_unknown_stop = stats.excluded_unknown_stop,
            "Source normalized"
        );

        Ok((departures, stats))
    }
}
