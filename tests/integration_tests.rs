use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, TimeZone, Utc};
use prost::Message;
use tower::ServiceExt;

use transit_board::aggregate::Board;
use transit_board::config::{BoardConfig, FeedSource, StopId};
use transit_board::error::{BoardError, FetchError};
use transit_board::fetch::{BasicClient, fetch_bytes, fetch_bytes_limited};
use transit_board::gtfs_rt::trip_update::{StopTimeEvent, StopTimeUpdate};
use transit_board::gtfs_rt::{FeedEntity, FeedHeader, FeedMessage, TripDescriptor, TripUpdate};
use transit_board::output::board_json;
use transit_board::server::{self, AppState};
use transit_board::snapshot::SnapshotService;

fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn client() -> BasicClient {
    BasicClient::new(Duration::from_secs(2)).unwrap()
}

fn temp_path(name: &str) -> String {
    format!("{}/{}", std::env::temp_dir().display(), name)
}

fn fixture_template() -> String {
    format!(
        "{}/tests/fixtures/nextbus/{{stop_id}}.xml",
        env!("CARGO_MANIFEST_DIR")
    )
}

fn config(feed: FeedSource) -> BoardConfig {
    BoardConfig {
        stops: vec![StopId::from("15462"), StopId::from("6604")],
        feed,
        timezone: "UTC".to_string(),
        fetch_timeout_secs: 2,
    }
}

fn trip(id: &str, route: &str, stops: &[(&str, i64)]) -> FeedEntity {
    FeedEntity {
        id: id.to_string(),
        trip_update: Some(TripUpdate {
            trip: TripDescriptor {
                trip_id: Some(id.to_string()),
                route_id: Some(route.to_string()),
                ..Default::default()
            },
            stop_time_update: stops
                .iter()
                .map(|(stop, offset)| StopTimeUpdate {
                    stop_id: Some(stop.to_string()),
                    departure: Some(StopTimeEvent {
                        time: Some(noon().timestamp() + offset),
                        ..Default::default()
                    }),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Writes a GTFS-RT feed to a temp file and returns its path.
fn write_feed(name: &str, entities: Vec<FeedEntity>) -> String {
    let feed = FeedMessage {
        header: FeedHeader {
            gtfs_realtime_version: "2.0".to_string(),
            timestamp: Some(noon().timestamp() as u64),
            incrementality: None,
            feed_version: None,
        },
        entity: entities,
    };
    let path = temp_path(name);
    std::fs::write(&path, feed.encode_to_vec()).unwrap();
    path
}

#[tokio::test]
async fn test_gtfs_rt_end_to_end() {
    let path = write_feed(
        "transit_board_e2e.pb",
        vec![
            trip("t1", "504A", &[("15462", 600), ("99999", 300)]),
            trip("t2", "504A", &[("15462", 120), ("15462", -90)]),
        ],
    );
    let service =
        SnapshotService::new(config(FeedSource::GtfsRt { url: path.clone() }), client()).unwrap();

    let snapshot = service.snapshot(noon()).await.unwrap();

    assert_eq!(
        board_json(&snapshot.board, false).unwrap(),
        r#"[{"route":"504A","stop_id":"15462","departure_time":"12:02","minutes":2},{"route":"504A","stop_id":"15462","departure_time":"12:10","minutes":10}]"#
    );
    let stats = &snapshot.report.sources[0].stats;
    assert_eq!(stats.raw_entries, 4);
    assert_eq!(stats.excluded_unknown_stop, 1);
    assert_eq!(stats.excluded_past, 1);

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_passes_are_idempotent() {
    let path = write_feed(
        "transit_board_idempotent.pb",
        vec![
            trip("t1", "504A", &[("15462", 300), ("6604", 300)]),
            trip("t2", "510", &[("6604", 300), ("15462", 60)]),
        ],
    );
    let service =
        SnapshotService::new(config(FeedSource::GtfsRt { url: path.clone() }), client()).unwrap();

    let first = service.snapshot(noon()).await.unwrap();
    let second = service.snapshot(noon()).await.unwrap();

    assert_eq!(first.board, second.board);
    assert_eq!(first.board.len(), 4);

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_nextbus_partial_failure() {
    // Only 15462 has a fixture; 6604 fails to fetch
    let service = SnapshotService::new(
        config(FeedSource::NextBus {
            url_template: fixture_template(),
        }),
        client(),
    )
    .unwrap();

    let snapshot = service.snapshot(noon()).await.unwrap();

    let Board::ByStop(stops) = &snapshot.board else {
        panic!("expected per-stop board");
    };
    assert!(stops[&StopId::from("6604")].is_empty());

    let bathurst: Vec<_> = stops[&StopId::from("15462")]
        .iter()
        .map(|d| (d.route.as_str(), d.departure_time.as_str(), d.minutes))
        .collect();
    assert_eq!(
        bathurst,
        vec![
            ("504-King", "12:03", 3),
            ("511-Bathurst", "12:03", 3),
            ("504-King", "12:12", 12),
        ]
    );
    assert!(
        stops[&StopId::from("15462")]
            .iter()
            .all(|d| d.stop_name.as_deref() == Some("King St West At Bathurst St"))
    );

    assert!(snapshot.report.is_partial());
    let failed: Vec<_> = snapshot.report.failed().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].stop_id, Some(StopId::from("6604")));
}

#[tokio::test]
async fn test_nextbus_record_shape() {
    let dir = temp_path("transit_board_nextbus");
    std::fs::create_dir_all(&dir).unwrap();
    let at = noon() + chrono::Duration::minutes(7);
    std::fs::write(
        format!("{dir}/6604.xml"),
        format!(
            r#"<body><predictions routeTitle="504-King" stopTitle="King St"><direction title="East"><prediction epochTime="{}" minutes="7"/></direction></predictions></body>"#,
            at.timestamp_millis()
        ),
    )
    .unwrap();

    let mut board_config = config(FeedSource::NextBus {
        url_template: format!("{dir}/{{stop_id}}.xml"),
    });
    board_config.stops = vec![StopId::from("6604")];
    let service = SnapshotService::new(board_config, client()).unwrap();

    let snapshot = service.snapshot(noon()).await.unwrap();
    let json = serde_json::to_value(&snapshot.board).unwrap();

    assert_eq!(
        json["6604"][0],
        serde_json::json!({
            "stop_id": "6604",
            "stop_name": "King St",
            "route": "504-King",
            "departure_time": "12:07",
            "minutes": 7
        })
    );

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_http_departures_route() {
    let service = SnapshotService::new(
        config(FeedSource::NextBus {
            url_template: fixture_template(),
        }),
        client(),
    )
    .unwrap();
    let state = AppState {
        service: Arc::new(service),
        clock: noon,
    };

    let response = server::router(state)
        .oneshot(
            Request::builder()
                .uri("/api/departures")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["6604"], serde_json::json!([]));
    assert_eq!(json["15462"].as_array().unwrap().len(), 3);
    assert_eq!(json["15462"][0]["minutes"], 3);
}

#[tokio::test]
async fn test_http_combined_failure_is_bad_gateway() {
    let service = SnapshotService::new(
        config(FeedSource::GtfsRt {
            url: "/nonexistent/transit_board/trips.pb".to_string(),
        }),
        client(),
    )
    .unwrap();

    let response = server::router(AppState::new(Arc::new(service)))
        .oneshot(
            Request::builder()
                .uri("/api/departures")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("trips.pb"));
}

#[tokio::test]
async fn test_http_index_page() {
    let service = SnapshotService::new(
        config(FeedSource::NextBus {
            url_template: fixture_template(),
        }),
        client(),
    )
    .unwrap();

    let response = server::router(AppState::new(Arc::new(service)))
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&body).contains("/api/departures"));
}

#[tokio::test]
async fn test_fetch_bytes_over_http() {
    let upstream = axum::Router::new()
        .route("/trips", axum::routing::get(|| async { "feed-bytes" }))
        .route(
            "/down",
            axum::routing::get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, upstream).await.unwrap();
    });

    let bytes = fetch_bytes(&client(), &format!("http://{addr}/trips"))
        .await
        .unwrap();
    assert_eq!(bytes.as_ref(), b"feed-bytes");

    let err = fetch_bytes(&client(), &format!("http://{addr}/down"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FetchError::Status { status, .. } if status == StatusCode::SERVICE_UNAVAILABLE
    ));

    // Combined mode surfaces the upstream failure as a hard error
    let service = SnapshotService::new(
        config(FeedSource::GtfsRt {
            url: format!("http://{addr}/down"),
        }),
        client(),
    )
    .unwrap();
    assert!(matches!(
        service.snapshot(noon()).await,
        Err(BoardError::Fetch(FetchError::Status { .. }))
    ));
}

#[tokio::test]
async fn test_fetch_bytes_enforces_size_limit() {
    let upstream = axum::Router::new()
        .route("/sized", axum::routing::get(|| async { "feed-bytes" }))
        .route(
            "/chunked",
            axum::routing::get(|| async {
                Body::from_stream(futures::stream::iter(vec![
                    Ok::<_, std::io::Error>("feed-"),
                    Ok("bytes"),
                ]))
            }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, upstream).await.unwrap();
    });

    // Rejected from the Content-Length header
    let err = fetch_bytes_limited(&client(), &format!("http://{addr}/sized"), 4)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::TooLarge { size: 10, max: 4 }));

    // No length up front, rejected after reading
    let err = fetch_bytes_limited(&client(), &format!("http://{addr}/chunked"), 4)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::TooLarge { size: 10, max: 4 }));

    let bytes = fetch_bytes_limited(&client(), &format!("http://{addr}/sized"), 10)
        .await
        .unwrap();
    assert_eq!(bytes.as_ref(), b"feed-bytes");
}
