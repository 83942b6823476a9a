//! Output formatting for one-off snapshots.

use anyhow::Result;
use tracing::{debug, info};

use crate::aggregate::Board;
use crate::stats::PassReport;

/// Logs the pass report using Rust's debug pretty-print format.
pub fn print_pretty(report: &PassReport) {
    debug!("{:#?}", report);
}

/// Serializes the board as served by `/api/departures`.
pub fn board_json(board: &Board, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(board)?
    } else {
        serde_json::to_string(board)?
    };
    Ok(json)
}

/// Logs a one-line summary per healthy source and a pass total.
///
/// Failed sources are already reported by the snapshot service.
pub fn log_report(report: &PassReport) {
    for source in report.succeeded() {
        info!(
            source = %source.source,
            stop_id = ?source.stop_id,
            raw_entries = source.stats.raw_entries,
            kept = source.stats.kept,
            excluded = source.stats.excluded(),
            "Source summary"
        );
    }
    info!(
        departures = report.total_departures(),
        sources = report.sources.len(),
        failed = report.failed().count(),
        "Pass summary"
    );
    print_pretty(report);
}
