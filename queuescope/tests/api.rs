//! Admin API tests against the in-memory queue service
//!
//! These tests drive the router directly, the same way the binary serves it.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use queuescope::{create_router, AppState};
use queuescope_sqs::{Inspector, MemoryTransport, PeekPolicy, RefetchPolicy};

/// Router over a fresh in-memory service. Visibility timeouts are zero so
/// every message stays receivable between requests.
fn create_test_router() -> Router {
    let transport = Arc::new(MemoryTransport::default());
    let inspector = Inspector::new(transport)
        .with_peek_policy(PeekPolicy {
            visibility_timeout: Duration::ZERO,
            ..PeekPolicy::immediate()
        })
        .with_refetch_policy(RefetchPolicy {
            attempts: 3,
            visibility_timeout: Duration::ZERO,
            ..RefetchPolicy::immediate()
        });

    create_router(AppState::new(inspector, Duration::from_secs(10)))
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_queue(router: &Router, name: &str) -> String {
    let (status, body) = send(router, "POST", "/queues", Some(json!({ "name": name }))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["queueUrl"].as_str().unwrap().to_string()
}

async fn send_message(router: &Router, queue_url: &str, body: &str) -> String {
    let (status, response) = send(
        router,
        "POST",
        "/queues/messages",
        Some(json!({ "queue_url": queue_url, "body": body })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    response["messageId"].as_str().unwrap().to_string()
}

async fn peek(router: &Router, queue_url: &str) -> Value {
    let (status, body) = send(router, "GET", &format!("/queues/messages?queue_url={queue_url}"), None).await;
    assert_eq!(status, StatusCode::OK);
    body
}

#[tokio::test]
async fn test_health() {
    let router = create_test_router();
    let (status, body) = send(&router, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "running");
}

#[tokio::test]
async fn test_create_and_list_queues() {
    let router = create_test_router();
    let orders = create_queue(&router, "orders").await;
    create_queue(&router, "billing").await;

    let (status, body) = send(&router, "GET", "/queues?prefix=ord", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["queueUrls"], json!([orders]));

    let (_, body) = send(&router, "GET", "/queues", None).await;
    assert_eq!(body["queueUrls"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_create_queue_rejects_bad_name() {
    let router = create_test_router();
    let (status, body) = send(&router, "POST", "/queues", Some(json!({ "name": "no spaces" }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["__type"], "InvalidParameterValue");
}

#[tokio::test]
async fn test_peek_lists_every_message_once() {
    let router = create_test_router();
    let queue_url = create_queue(&router, "orders").await;

    let mut sent = BTreeSet::new();
    for body in ["one", "two", "three"] {
        sent.insert(send_message(&router, &queue_url, body).await);
    }

    let body = peek(&router, &queue_url).await;
    assert_eq!(body["count"], 3);

    let messages = body["messages"].as_array().unwrap();
    let seen: BTreeSet<String> = messages
        .iter()
        .map(|m| m["messageId"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(seen, sent);
    assert!(messages.iter().all(|m| m.get("receiptHandle").is_none()));
    assert!(messages.iter().all(|m| m["attributes"]["SentTimestamp"].is_string()));

    // Peeking again sees the same messages
    assert_eq!(peek(&router, &queue_url).await["count"], 3);
}

#[tokio::test]
async fn test_send_message_takes_queue_url() {
    let router = create_test_router();
    let queue_url = create_queue(&router, "orders").await;

    let (status, body) = send(
        &router,
        "POST",
        "/queues/messages",
        Some(json!({ "queue_url": queue_url, "body": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let message_id = body["messageId"].as_str().unwrap();

    let listed = peek(&router, &queue_url).await;
    assert_eq!(listed["messages"][0]["messageId"], message_id);
    assert_eq!(listed["messages"][0]["body"], "hi");

    let (status, body) = send(
        &router,
        "POST",
        "/queues/messages",
        Some(json!({ "body": "no queue" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["__type"], "InvalidParameterValue");
}

#[tokio::test]
async fn test_peek_respects_max() {
    let router = create_test_router();
    let queue_url = create_queue(&router, "orders").await;
    for i in 0..5 {
        send_message(&router, &queue_url, &format!("message {i}")).await;
    }

    let (status, body) = send(
        &router,
        "GET",
        &format!("/queues/messages?queue_url={queue_url}&max=2"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
}

#[tokio::test]
async fn test_peek_empty_queue() {
    let router = create_test_router();
    let queue_url = create_queue(&router, "orders").await;

    let body = peek(&router, &queue_url).await;
    assert_eq!(body["count"], 0);
    assert_eq!(body["messages"], json!([]));
}

#[tokio::test]
async fn test_peek_validates_queue_url() {
    let router = create_test_router();

    let (status, body) = send(&router, "GET", "/queues/messages", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["__type"], "MissingParameter");

    let (status, body) = send(&router, "GET", "/queues/messages?queue_url=orders", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["__type"], "InvalidQueueUrl");
}

#[tokio::test]
async fn test_delete_message_by_id() {
    let router = create_test_router();
    let queue_url = create_queue(&router, "orders").await;
    let keep = send_message(&router, &queue_url, "keep").await;
    let doomed = send_message(&router, &queue_url, "doomed").await;

    let (status, body) = send(
        &router,
        "DELETE",
        &format!("/queues/messages/{doomed}?queue_url={queue_url}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let remaining = peek(&router, &queue_url).await;
    assert_eq!(remaining["count"], 1);
    assert_eq!(remaining["messages"][0]["messageId"], keep.as_str());
}

#[tokio::test]
async fn test_delete_unknown_message() {
    let router = create_test_router();
    let queue_url = create_queue(&router, "orders").await;
    send_message(&router, &queue_url, "hello").await;

    let (status, body) = send(
        &router,
        "DELETE",
        &format!("/queues/messages/not-a-real-id?queue_url={queue_url}"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["__type"], "MessageNotAvailable");
}

#[tokio::test]
async fn test_queue_attributes_and_delete_queue() {
    let router = create_test_router();
    let queue_url = create_queue(&router, "orders").await;
    send_message(&router, &queue_url, "hello").await;

    let (status, body) = send(
        &router,
        "GET",
        &format!("/queues/attributes?queue_url={queue_url}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["attributes"]["ApproximateNumberOfMessages"], "1");

    let (status, _) = send(&router, "DELETE", &format!("/queues?queue_url={queue_url}"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &router,
        "GET",
        &format!("/queues/attributes?queue_url={queue_url}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["__type"], "QueueDoesNotExist");
}
