#![allow(clippy::unwrap_used)]
// Integration tests for `StateAggregator` against wiremock REST endpoints.

use std::time::Duration;

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cardwatch_api::{AttendanceClient, TransportConfig};
use cardwatch_core::{
    AttendanceEvent, AttendanceFilters, Direction, Freshness, Notifier, Snapshot, SnapshotKind,
    SnapshotStream, StateAggregator, StreamEvent, UnknownEvent, UserRef,
};

// ── Helpers ──────────────────────────────────────────────────────────

fn aggregator_for(server: &MockServer, notifier: Notifier) -> StateAggregator {
    let url = Url::parse(&format!("{}/api", server.uri())).unwrap();
    let client = AttendanceClient::new(url, &TransportConfig::default()).unwrap();
    StateAggregator::new(
        client,
        notifier,
        Duration::ZERO,
        AttendanceFilters::default(),
    )
}

async fn wait_for<T, F>(stream: &mut SnapshotStream<T>, pred: F) -> Snapshot<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(&Snapshot<T>) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        let latest = stream.latest();
        if pred(&latest) {
            return latest;
        }
        loop {
            let snap = stream.changed().await.unwrap();
            if pred(&snap) {
                return snap;
            }
        }
    })
    .await
    .unwrap()
}

fn is_fresh<T>(snap: &Snapshot<T>) -> bool {
    snap.freshness == Freshness::Fresh
}

async fn requests_to(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == route)
        .count()
}

async fn mount_json(server: &MockServer, route: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn attendance_event() -> StreamEvent {
    StreamEvent::Attendance(AttendanceEvent {
        uid: "A1".into(),
        user: UserRef {
            id: 1,
            name: "Ada".into(),
        },
        direction: Direction::In,
        ts: chrono::Utc::now(),
    })
}

// ── Tests ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_start_fetches_every_snapshot() {
    let server = MockServer::start().await;
    mount_json(
        &server,
        "/api/users",
        json!([{"id": 1, "name": "Ada", "card_uid": "A1", "active": 1}]),
    )
    .await;
    mount_json(
        &server,
        "/api/attendance",
        json!([{"id": 10, "user_id": 1, "direction": "IN", "ts": "2024-03-10 08:00:00"}]),
    )
    .await;
    mount_json(
        &server,
        "/api/present",
        json!([{"id": 1, "name": "Ada", "card_uid": "A1", "active": 1, "last_in": "2024-03-10 08:00:00"}]),
    )
    .await;

    let aggregator = aggregator_for(&server, Notifier::new(8));
    let mut users = aggregator.users();
    let mut attendance = aggregator.attendance();
    let mut present = aggregator.present();
    assert_eq!(users.current().freshness, Freshness::Empty);

    aggregator.start().await;

    let users = wait_for(&mut users, is_fresh).await;
    assert_eq!(users.items[0].name, "Ada");
    assert!(users.fetched_at.is_some());

    let attendance = wait_for(&mut attendance, is_fresh).await;
    assert_eq!(attendance.items[0].direction, Direction::In);

    let present = wait_for(&mut present, is_fresh).await;
    assert_eq!(present.items[0].user.card_uid, "A1");

    aggregator.stop().await;
}

#[tokio::test]
async fn test_attendance_event_refreshes_attendance_and_present() {
    let server = MockServer::start().await;
    mount_json(&server, "/api/users", json!([])).await;

    Mock::given(method("GET"))
        .and(path("/api/present"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_json(
        &server,
        "/api/present",
        json!([{"id": 1, "name": "Ada", "card_uid": "A1", "active": true, "last_in": "2024-03-10T08:00:00Z"}]),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/api/attendance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_json(
        &server,
        "/api/attendance",
        json!([{"id": 11, "user_id": 1, "direction": "OUT", "ts": "2024-03-10T17:00:00Z"}]),
    )
    .await;

    let aggregator = aggregator_for(&server, Notifier::new(8));
    let mut attendance = aggregator.attendance();
    let mut users = aggregator.users();
    aggregator.start().await;

    let first = wait_for(&mut attendance, is_fresh).await;
    assert!(first.is_empty());
    wait_for(&mut users, is_fresh).await;

    aggregator.apply_event(&attendance_event());

    let second = wait_for(&mut attendance, |s| is_fresh(s) && s.len() == 1).await;
    assert_eq!(second.items[0].direction, Direction::Out);

    let mut present = aggregator.present();
    let present = wait_for(&mut present, |s| is_fresh(s) && s.len() == 1).await;
    assert_eq!(present.items[0].user.name, "Ada");
    aggregator.stop().await;

    assert_eq!(requests_to(&server, "/api/users").await, 1);
}

#[tokio::test]
async fn test_non_attendance_events_do_not_refetch() {
    let server = MockServer::start().await;
    mount_json(&server, "/api/users", json!([])).await;
    mount_json(&server, "/api/attendance", json!([])).await;
    mount_json(&server, "/api/present", json!([])).await;

    let aggregator = aggregator_for(&server, Notifier::new(8));
    let mut attendance = aggregator.attendance();
    aggregator.start().await;
    wait_for(&mut attendance, is_fresh).await;

    aggregator.apply_event(&StreamEvent::Unknown(UnknownEvent {
        uid: "ZZ".into(),
        ts: chrono::Utc::now(),
    }));
    aggregator.apply_event(&StreamEvent::Ping);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(aggregator.attendance_snapshot().freshness, Freshness::Fresh);
    aggregator.stop().await;
    assert_eq!(requests_to(&server, "/api/attendance").await, 1);
}

#[tokio::test]
async fn test_failed_fetch_notifies_and_keeps_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "db down"})))
        .mount(&server)
        .await;
    mount_json(&server, "/api/attendance", json!([])).await;
    mount_json(&server, "/api/present", json!([])).await;

    let notifier = Notifier::new(8);
    let mut notifications = notifier.subscribe();
    let aggregator = aggregator_for(&server, notifier);
    let mut users = aggregator.users();
    aggregator.start().await;

    let snap = wait_for(&mut users, |s| s.last_error.is_some()).await;
    assert_eq!(snap.freshness, Freshness::Empty);
    assert!(snap.last_error.unwrap().contains("db down"));

    let n = tokio::time::timeout(Duration::from_secs(5), notifications.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(n.title, "Failed to fetch users");

    aggregator.stop().await;
}

#[tokio::test]
async fn test_filters_are_sent_as_query() {
    let server = MockServer::start().await;
    mount_json(&server, "/api/users", json!([])).await;
    mount_json(&server, "/api/present", json!([])).await;
    Mock::given(method("GET"))
        .and(path("/api/attendance"))
        .and(query_param("date", "2024-03-10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 12, "user_id": 2, "direction": "IN", "ts": "2024-03-10 07:45:00"}
        ])))
        .with_priority(1)
        .mount(&server)
        .await;
    mount_json(&server, "/api/attendance", json!([])).await;

    let aggregator = aggregator_for(&server, Notifier::new(8));
    let mut attendance = aggregator.attendance();
    aggregator.start().await;
    wait_for(&mut attendance, is_fresh).await;

    let filters = AttendanceFilters::for_date(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
    aggregator.set_filters(filters.clone());
    assert_eq!(aggregator.filters(), filters);

    let snap = wait_for(&mut attendance, |s| is_fresh(s) && s.len() == 1).await;
    assert_eq!(snap.items[0].user_id, 2);

    aggregator.stop().await;
}

#[tokio::test]
async fn test_stopped_aggregator_does_not_fetch() {
    let server = MockServer::start().await;
    mount_json(&server, "/api/users", json!([])).await;
    mount_json(&server, "/api/attendance", json!([])).await;
    mount_json(&server, "/api/present", json!([])).await;

    let aggregator = aggregator_for(&server, Notifier::new(8));
    let mut users = aggregator.users();
    aggregator.start().await;
    wait_for(&mut users, is_fresh).await;
    aggregator.stop().await;
    aggregator.stop().await;

    aggregator.invalidate(SnapshotKind::Users);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(aggregator.users_snapshot().freshness, Freshness::Stale);
    assert_eq!(requests_to(&server, "/api/users").await, 1);

    aggregator.reset(AttendanceFilters::default());
    assert_eq!(aggregator.users_snapshot().freshness, Freshness::Empty);
}

#[tokio::test]
async fn test_present_roster_refreshes_on_interval() {
    let server = MockServer::start().await;
    mount_json(&server, "/api/users", json!([])).await;
    mount_json(&server, "/api/attendance", json!([])).await;
    mount_json(&server, "/api/present", json!([])).await;

    let url = Url::parse(&format!("{}/api", server.uri())).unwrap();
    let client = AttendanceClient::new(url, &TransportConfig::default()).unwrap();
    let aggregator = StateAggregator::new(
        client,
        Notifier::new(8),
        Duration::from_millis(50),
        AttendanceFilters::default(),
    );
    aggregator.start().await;

    tokio::time::timeout(Duration::from_secs(5), async {
        while requests_to(&server, "/api/present").await < 3 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();
    aggregator.stop().await;

    // The interval only drives the present roster.
    assert_eq!(requests_to(&server, "/api/users").await, 1);
    assert_eq!(requests_to(&server, "/api/attendance").await, 1);
}
