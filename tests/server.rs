//! HTTP API tests, driven through the router without binding a socket.

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::util::ServiceExt;

use cricket_qa::config::Config;
use cricket_qa::pipeline::QaService;
use cricket_qa::server::router;
use cricket_qa_core::models::{PlayerRecord, UserSummary};
use cricket_qa_core::store::memory::InMemoryStore;
use cricket_qa_core::store::Store;

fn app() -> (Router, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::with_players(vec![
        PlayerRecord {
            country: Some("ENG".to_string()),
            format: Some("test".to_string()),
            runs: Some(12402),
            ..PlayerRecord::named("Joe Root")
        },
        PlayerRecord {
            country: Some("NZ".to_string()),
            format: Some("test".to_string()),
            runs: Some(8743),
            ..PlayerRecord::named("Kane Williamson")
        },
    ]));
    let service = QaService::new(&Config::with_db_path("unused.sqlite"), store.clone(), None);
    (router(Arc::new(service)), store)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn post_ask(payload: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/ask")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app();
    let (status, body) = send(app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_ask_returns_table_and_trace() {
    let (app, _) = app();
    let (status, body) = send(
        app,
        post_ask(json!({ "question": "  top scorers in tests  ", "userId": "alice" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["format"], "table");
    assert_eq!(body["data"][0]["Name"], "Joe Root");
    assert_eq!(body["data"][0]["Format"], "TEST");
    assert_eq!(body["data"][1]["Average"], "0.00");
    assert!(body.get("message").is_none());
    assert_eq!(body["trace"][0]["stepId"], 1);
    assert_eq!(body["trace"][0]["stepName"], "Relevancy check (heuristic)");
}

#[tokio::test]
async fn test_ask_rejection_is_ok_with_success_false() {
    let (app, _) = app();
    let (status, body) = send(
        app,
        post_ask(json!({ "question": "recommend a pasta recipe", "userId": "alice" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(
        body["message"],
        "I can only answer questions about cricket statistics."
    );
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn test_ask_validation() {
    let cases = [
        json!({ "question": "   ", "userId": "alice" }),
        json!({ "question": "a".repeat(501), "userId": "alice" }),
        json!({ "question": "top scorers", "userId": "" }),
        json!({ "userId": "alice" }),
    ];
    for payload in cases {
        let (app, store) = app();
        let (status, body) = send(app, post_ask(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");
        assert_eq!(store.count_turns("alice").await.unwrap(), 0);
    }
}

#[tokio::test]
async fn test_ask_malformed_body_uses_error_contract() {
    let bodies = [
        ("application/json", "{not json".to_string()),
        (
            "application/json",
            json!({ "question": 5, "userId": "alice" }).to_string(),
        ),
        (
            "text/plain",
            json!({ "question": "top scorers", "userId": "alice" }).to_string(),
        ),
    ];
    for (content_type, body) in bodies {
        let (app, store) = app();
        let request = Request::builder()
            .method("POST")
            .uri("/ask")
            .header("content-type", content_type)
            .body(Body::from(body))
            .unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("invalid request body"));
        assert_eq!(store.count_turns("alice").await.unwrap(), 0);
    }
}

#[tokio::test]
async fn test_history_summary_and_clear() {
    let (app, store) = app();

    for q in ["top scorers", "joe root test", "williamson"] {
        let (status, _) = send(
            app.clone(),
            post_ask(json!({ "question": q, "userId": "bob" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(app.clone(), get("/history/bob?limit=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userId"], "bob");
    let turns = body["turns"].as_array().unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0]["question"], "joe root test");
    assert_eq!(turns[1]["question"], "williamson");

    let (status, body) = send(app.clone(), get("/summary/bob")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    store
        .upsert_summary(&UserSummary {
            user_id: "bob".to_string(),
            summary: "Bob likes Test cricket.".to_string(),
            conversation_count: 21,
            last_updated: chrono::Utc::now(),
        })
        .await
        .unwrap();
    let (status, body) = send(app.clone(), get("/summary/bob")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"], "Bob likes Test cricket.");
    assert_eq!(body["conversationCount"], 21);

    let delete = Request::builder()
        .method("DELETE")
        .uri("/history/bob")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app.clone(), delete).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cleared"], true);
    assert_eq!(store.count_turns("bob").await.unwrap(), 0);
    assert!(store.get_summary("bob").await.unwrap().is_none());
}
