//! End-to-end exercise of the connection manager against an in-process
//! fixture server: SSE push channel, heartbeat endpoint, and detail re-fetch.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::routing::{get, post};
use futures_util::Stream;
use tokio::sync::{Mutex, broadcast, watch};

use engage_client::{
    ApiClient, ClientConfig, ConnectionManager, ConnectionState, Notice, SessionHandle,
    SessionSnapshot, SessionStatus,
};

struct Fixture {
    events: broadcast::Sender<(String, String)>,
    heartbeats: AtomicUsize,
    detail: Mutex<serde_json::Value>,
}

impl Fixture {
    fn send(&self, channel: &str, data: &str) {
        self.events
            .send((channel.to_owned(), data.to_owned()))
            .expect("push channel has a subscriber");
    }
}

fn initial_detail() -> serde_json::Value {
    serde_json::json!({
        "session_id": "sess-1",
        "invite_code": "ABC123",
        "status": "INIT",
        "slides": {
            "added_slides": [
                { "id": "s1", "order": 0, "kind": "canvas", "canvas_ref": "c-1" },
                { "id": "s2", "order": 1, "kind": "quiz" }
            ]
        },
        "current_slide_index": 0
    })
}

async fn sse_handler(
    State(fixture): State<Arc<Fixture>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = fixture.events.subscribe();
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Ok((name, data)) => Some((Ok(Event::default().event(name).data(data)), rx)),
            Err(_) => None,
        }
    });
    Sse::new(stream)
}

async fn heartbeat_handler(
    State(fixture): State<Arc<Fixture>>,
    Query(params): Query<HashMap<String, String>>,
) -> StatusCode {
    if params.contains_key("username") {
        fixture.heartbeats.fetch_add(1, Ordering::SeqCst);
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    }
}

async fn detail_handler(State(fixture): State<Arc<Fixture>>) -> axum::Json<serde_json::Value> {
    axum::Json(fixture.detail.lock().await.clone())
}

async fn spawn_fixture() -> (Arc<Fixture>, String) {
    let fixture = Arc::new(Fixture {
        events: broadcast::channel(64).0,
        heartbeats: AtomicUsize::new(0),
        detail: Mutex::new(initial_detail()),
    });

    let app = Router::new()
        .route("/api/engage/sessions/{id}/events", get(sse_handler))
        .route("/api/engage/sessions/{id}/heartbeat", post(heartbeat_handler))
        .route("/api/engage/sessions/get-updated-details/{id}", get(detail_handler))
        .with_state(fixture.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    (fixture, format!("http://{addr}"))
}

fn test_config(base_url: &str) -> ClientConfig {
    let mut config = ClientConfig::new(base_url);
    config.heartbeat_interval = Duration::from_millis(200);
    config.reconnect_base_delay = Duration::from_millis(20);
    config.max_reconnect_attempts = 5;
    config
}

async fn wait_for(
    snapshots: &mut watch::Receiver<SessionSnapshot>,
    what: &str,
    pred: impl Fn(&SessionSnapshot) -> bool,
) {
    let outcome = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if pred(&snapshots.borrow_and_update()) {
                return;
            }
            snapshots.changed().await.expect("snapshot stream ended");
        }
    })
    .await;
    assert!(outcome.is_ok(), "timed out waiting for {what}");
}

async fn next_notice(handle: &mut SessionHandle) -> Notice {
    tokio::time::timeout(Duration::from_secs(5), handle.notice())
        .await
        .expect("timed out waiting for notice")
        .expect("notice stream ended")
}

#[tokio::test]
async fn session_lifecycle_end_to_end() {
    let (fixture, base_url) = spawn_fixture().await;
    let config = test_config(&base_url);

    // Bootstrap exactly like the learner view: one REST fetch, then connect.
    let api = ApiClient::new(&config).expect("api");
    let detail = api.session_detail("sess-1").await.expect("detail");

    let mut handle = ConnectionManager::start(config, &detail, "", "ada").expect("start");
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Init);
    assert_eq!(snapshot.current_slide.as_ref().map(|s| s.id.as_str()), Some("s1"));

    let mut snapshots = handle.subscribe();
    wait_for(&mut snapshots, "connect", |s| {
        s.connection == ConnectionState::Connected
    })
    .await;
    assert_eq!(next_notice(&mut handle).await, Notice::Connected);

    // The first slide-change of an INIT session implies the start.
    fixture.send(
        "session",
        r#"{ "type": "CURRENT_SLIDE", "current_slide_index": 0, "slide_data": { "id": "s1", "order": 0, "kind": "canvas", "canvas_ref": "c-1" } }"#,
    );
    wait_for(&mut snapshots, "implicit start", |s| {
        s.status == SessionStatus::Started
    })
    .await;
    assert_eq!(next_notice(&mut handle).await, Notice::SessionStarted);

    // Slide navigation by order.
    fixture.send("session", r#"{ "current_slide_index": 1 }"#);
    wait_for(&mut snapshots, "slide 1", |s| {
        s.current_slide.as_ref().is_some_and(|slide| slide.id == "s2")
    })
    .await;

    // Update signal: wholesale replacement from the detail endpoint.
    *fixture.detail.lock().await = serde_json::json!({
        "session_id": "sess-1",
        "status": "STARTED",
        "slides": {
            "added_slides": [
                { "id": "s1", "order": 0 },
                { "id": "s2", "order": 1 },
                { "id": "s3", "order": 2, "kind": "quiz" }
            ]
        },
        "current_slide_index": 2
    });
    fixture.send("update", "");
    wait_for(&mut snapshots, "detail refresh", |s| {
        s.slides.len() == 3 && s.current_slide.as_ref().is_some_and(|slide| slide.id == "s3")
    })
    .await;

    // Server heartbeat channel is consumed without side effects.
    fixture.send("heartbeat", "ping");

    // Terminal status ends the session and closes the channel.
    fixture.send("session", r#"{ "status": "ENDED", "message": "class dismissed" }"#);
    assert_eq!(next_notice(&mut handle).await, Notice::SessionEnded);
    tokio::time::timeout(Duration::from_secs(5), handle.closed())
        .await
        .expect("connection task should end");

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Ended);
    assert_eq!(snapshot.connection, ConnectionState::Disconnected);
    assert!(snapshot.last_error.is_none());
}

#[tokio::test]
async fn heartbeat_fires_immediately_then_on_cadence() {
    let (fixture, base_url) = spawn_fixture().await;
    let config = test_config(&base_url);
    let api = ApiClient::new(&config).expect("api");
    let detail = api.session_detail("sess-1").await.expect("detail");

    let handle = ConnectionManager::start(config, &detail, "", "ada").expect("start");
    let mut snapshots = handle.subscribe();
    wait_for(&mut snapshots, "connect", |s| {
        s.connection == ConnectionState::Connected
    })
    .await;

    // First ping is immediate, not one interval away.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while fixture.heartbeats.load(Ordering::SeqCst) < 1 {
        assert!(tokio::time::Instant::now() < deadline, "no immediate heartbeat");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // And the interval keeps them coming.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while fixture.heartbeats.load(Ordering::SeqCst) < 3 {
        assert!(tokio::time::Instant::now() < deadline, "heartbeat cadence stalled");
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    handle.stop().await;
}

#[tokio::test]
async fn malformed_events_are_dropped_without_breaking_the_stream() {
    let (fixture, base_url) = spawn_fixture().await;
    let config = test_config(&base_url);
    let api = ApiClient::new(&config).expect("api");
    let detail = api.session_detail("sess-1").await.expect("detail");

    let handle = ConnectionManager::start(config, &detail, "", "ada").expect("start");
    let mut snapshots = handle.subscribe();
    wait_for(&mut snapshots, "connect", |s| {
        s.connection == ConnectionState::Connected
    })
    .await;

    fixture.send("session", "{ not json");
    fixture.send("session", r#"{ "status": "UNKNOWN_STATUS" }"#);
    fixture.send("session", r#"{ "current_slide_index": 1 }"#);

    // The good event after the bad ones still lands.
    wait_for(&mut snapshots, "slide 1", |s| {
        s.current_slide.as_ref().is_some_and(|slide| slide.id == "s2")
    })
    .await;
    assert_eq!(handle.snapshot().status, SessionStatus::Init);

    handle.stop().await;
}

#[tokio::test]
async fn server_error_event_surfaces_as_last_error() {
    let (fixture, base_url) = spawn_fixture().await;
    let config = test_config(&base_url);
    let api = ApiClient::new(&config).expect("api");
    let detail = api.session_detail("sess-1").await.expect("detail");

    let handle = ConnectionManager::start(config, &detail, "", "ada").expect("start");
    let mut snapshots = handle.subscribe();
    wait_for(&mut snapshots, "connect", |s| {
        s.connection == ConnectionState::Connected
    })
    .await;

    fixture.send("session", r#"{ "type": "ERROR", "message": "projector offline" }"#);
    wait_for(&mut snapshots, "error banner", |s| {
        s.last_error.as_deref() == Some("projector offline")
    })
    .await;

    // Non-fatal: the channel stays up and later events still apply.
    fixture.send("session", r#"{ "current_slide_index": 1 }"#);
    wait_for(&mut snapshots, "slide 1 after error", |s| {
        s.current_slide.as_ref().is_some_and(|slide| slide.id == "s2") && s.last_error.is_none()
    })
    .await;

    handle.stop().await;
}

#[tokio::test]
async fn caller_stop_tears_down_to_disconnected() {
    let (_fixture, base_url) = spawn_fixture().await;
    let config = test_config(&base_url);
    let api = ApiClient::new(&config).expect("api");
    let detail = api.session_detail("sess-1").await.expect("detail");

    let handle = ConnectionManager::start(config, &detail, "", "ada").expect("start");
    let mut snapshots = handle.subscribe();
    wait_for(&mut snapshots, "connect", |s| {
        s.connection == ConnectionState::Connected
    })
    .await;

    handle.stop().await;
    assert_eq!(snapshots.borrow().connection, ConnectionState::Disconnected);
}
