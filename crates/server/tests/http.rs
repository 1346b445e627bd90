#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use cuju_api::{CujuApi, InProcApi, MockApi};
use cuju_core::{Event, NoopMetrics, RankEntry, Score, Settings, Skill};
use cuju_scoring::LinearScorer;
use cuju_server::create_router;
use serde_json::{json, Value};
use tower::ServiceExt; // for oneshot

fn entry(talent: &str, score: i64, rank: usize) -> RankEntry {
    let ev = Event { event_id: format!("ev-{talent}"), talent_id: talent.into(), skill: Skill::Shoot, metric_value: score, timestamp: Utc::now() };
    RankEntry { talent_id: talent.into(), best_score: Score::from_event(&ev, score), rank }
}

fn mock_app(mock: MockApi) -> Router {
    create_router(Arc::new(mock))
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if body.is_empty() { Value::Null } else { serde_json::from_slice(&body).unwrap() };
    (status, value)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn event_body(id: &str, talent: &str, skill: &str, metric: i64) -> Value {
    json!({ "event_id": id, "talent_id": talent, "raw_metric": metric, "skill": skill, "ts": "2024-05-01T12:00:00Z" })
}

#[tokio::test]
async fn health_check() {
    let app = mock_app(MockApi::new());
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn submit_maps_accepted_and_duplicate() {
    let app = mock_app(MockApi { accept: true, ..MockApi::new() });
    let (status, _) = send(&app, post_json("/events", event_body("e1", "t1", "shoot", 5))).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let app = mock_app(MockApi { accept: false, ..MockApi::new() });
    let (status, _) = send(&app, post_json("/events", event_body("e1", "t1", "shoot", 5))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn submit_rejects_bad_input() {
    let app = mock_app(MockApi::new());

    let (status, body) = send(&app, post_json("/events", event_body("e1", "t1", "header", 5))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid skill");

    let (status, body) = send(&app, post_json("/events", json!({ "event_id": "e1" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid JSON");

    let (status, _) = send(&app, post_json("/events", event_body("", "t1", "pass", 5))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn leaderboard_limits() {
    let board = vec![entry("a", 90, 1), entry("b", 80, 2), entry("c", 70, 3)];
    let app = mock_app(MockApi { board, ..MockApi::new() });

    let (status, body) = send(&app, get("/leaderboard?limit=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "talents": [
            { "rank": 1, "talent_id": "a", "score": 90 },
            { "rank": 2, "talent_id": "b", "score": 80 },
        ]})
    );

    let (_, body) = send(&app, get("/leaderboard")).await;
    assert_eq!(body["talents"].as_array().map(|a| a.len()), Some(3));

    // An empty value means the default limit.
    let (status, body) = send(&app, get("/leaderboard?limit=")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["talents"].as_array().map(|a| a.len()), Some(3));

    for bad in ["/leaderboard?limit=0", "/leaderboard?limit=-3", "/leaderboard?limit=ten"] {
        let (status, body) = send(&app, get(bad)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{bad}");
        assert_eq!(body["error"], "Invalid limit parameter");
    }
}

#[tokio::test]
async fn rank_lookup_and_not_found() {
    let app = mock_app(MockApi { board: vec![entry("a", 90, 1)], ..MockApi::new() });
    let (status, body) = send(&app, get("/rank/a")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "rank": 1, "talent_id": "a", "score": 90 }));

    let (status, body) = send(&app, get("/rank/unknown-talent")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["message"].as_str().unwrap().contains("unknown-talent"));
}

#[tokio::test]
async fn internal_errors_are_500() {
    let app = mock_app(MockApi { fail: Some("event store lock poisoned".into()), ..MockApi::new() });
    let (status, body) = send(&app, post_json("/events", event_body("e1", "t1", "pass", 1))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "event store lock poisoned");
    let (status, _) = send(&app, get("/stats")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn end_to_end_against_the_real_core() {
    let settings = Settings {
        processing_interval: Duration::from_millis(10),
        rebuild_interval: Duration::from_millis(10),
        ..Settings::default()
    };
    let api = Arc::new(InProcApi::start(settings, Arc::new(LinearScorer), Arc::new(NoopMetrics)));
    let app = create_router(api.clone());

    let submissions = [("e1", "talent-1", "dribble", 50), ("e2", "talent-1", "shoot", 80), ("e3", "talent-2", "pass", 60)];
    for (id, talent, skill, metric) in submissions {
        let (status, _) = send(&app, post_json("/events", event_body(id, talent, skill, metric))).await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }
    let (status, _) = send(&app, post_json("/events", event_body("e1", "talent-1", "dribble", 50))).await;
    assert_eq!(status, StatusCode::OK);

    let deadline = Instant::now() + Duration::from_secs(3);
    let body = loop {
        let (_, body) = send(&app, get("/leaderboard?limit=10")).await;
        if body["talents"].as_array().map(|a| a.len()) == Some(2) || Instant::now() >= deadline { break body; }
        tokio::time::sleep(Duration::from_millis(20)).await;
    };
    assert_eq!(
        body,
        json!({ "talents": [
            { "rank": 1, "talent_id": "talent-1", "score": 80 },
            { "rank": 2, "talent_id": "talent-2", "score": 60 },
        ]})
    );

    let (status, body) = send(&app, get("/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["events"], 3);
    assert_eq!(body["scores"], 3);

    let (status, body) = send(&app, get("/events/dead")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    api.shutdown().await;
    assert_eq!(api.top_n(1).await.unwrap()[0].talent_id.as_str(), "talent-1");
}
