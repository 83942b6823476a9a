//! HTTP surface: the board as JSON plus the bundled display page.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::aggregate::Board;
use crate::error::BoardError;
use crate::fetch::HttpClient;
use crate::snapshot::SnapshotService;

const INDEX_HTML: &str = include_str!("../static/index.html");

pub struct AppState<C> {
    pub service: Arc<SnapshotService<C>>,
    /// Source of "now" for each request
    pub clock: fn() -> DateTime<Utc>,
}

impl<C> AppState<C> {
    pub fn new(service: Arc<SnapshotService<C>>) -> Self {
        Self {
            service,
            clock: Utc::now,
        }
    }
}

impl<C> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            clock: self.clock,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A pass failure, reported as `502 Bad Gateway` since the fault is upstream.
pub struct ApiError(BoardError);

impl From<BoardError> for ApiError {
    fn from(err: BoardError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "Departure board unavailable");
        (
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

pub fn router<C: HttpClient + 'static>(state: AppState<C>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/departures", get(list_departures::<C>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Runs a fresh pass and returns the board: a flat array in GTFS-RT mode, an
/// object keyed by stop ID in NextBus mode.
pub async fn list_departures<C: HttpClient + 'static>(
    State(state): State<AppState<C>>,
) -> Result<Json<Board>, ApiError> {
    let snapshot = state.service.snapshot((state.clock)()).await?;
    Ok(Json(snapshot.board))
}
