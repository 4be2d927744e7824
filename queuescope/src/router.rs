//! HTTP router for the admin API
//!
//! A thin JSON surface over the inspector. Queue URLs travel in the
//! `queue_url` query parameter (or JSON body) and are validated before any
//! call reaches the queue service.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get},
    Router,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::{CancellationToken, DropGuard};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use queuescope_core::{validate_queue_name, ApiError, ErrorCode, QueueRef};
use queuescope_sqs::{DeleteOutcome, Inspector, Message, TransportError, DEFAULT_PEEK_MAX};

/// Shared state for API handlers
pub struct AppState {
    inspector: Inspector,
    request_timeout: Duration,
}

impl AppState {
    pub fn new(inspector: Inspector, request_timeout: Duration) -> Self {
        Self {
            inspector,
            request_timeout,
        }
    }

    /// Token cancelled when the request times out or its handler future is
    /// dropped (client went away). Keep the guard alive for the request.
    fn request_token(&self) -> (CancellationToken, DropGuard) {
        let token = CancellationToken::new();
        let timer = token.clone();
        let timeout = self.request_timeout;
        tokio::spawn(async move {
            tokio::select! {
                () = timer.cancelled() => {}
                () = tokio::time::sleep(timeout) => timer.cancel(),
            }
        });
        (token.clone(), token.drop_guard())
    }
}

/// Create the admin API router
pub fn create_router(state: AppState) -> Router {
    let shared_state = Arc::new(state);

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/queues",
            get(list_queues).post(create_queue).delete(delete_queue),
        )
        .route("/queues/attributes", get(queue_attributes))
        .route("/queues/messages", get(peek_messages).post(send_message))
        .route("/queues/messages/:message_id", delete(delete_message))
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, r#"{"status": "running"}"#)
}

// === Request/Response types ===

#[derive(Debug, Deserialize)]
pub struct ListQueuesQuery {
    prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    queue_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PeekQuery {
    queue_url: Option<String>,
    max: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct CreateQueueRequest {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SendMessageRequest {
    queue_url: String,
    body: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListQueuesResponse {
    queue_urls: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueueUrlResponse {
    queue_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AttributesResponse {
    queue_url: String,
    attributes: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageResponse {
    message_id: String,
}

/// Peeked message as shown to clients. The receipt handle is left out on
/// purpose: deletes go through a refetch, never through a peek handle.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageView {
    message_id: String,
    body: String,
    timestamp: DateTime<Utc>,
    attributes: BTreeMap<String, String>,
}

impl From<Message> for MessageView {
    fn from(message: Message) -> Self {
        Self {
            message_id: message.id,
            body: message.body,
            timestamp: message.timestamp,
            attributes: message.attributes,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PeekResponse {
    queue_url: String,
    count: usize,
    messages: Vec<MessageView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteMessageResponse {
    message_id: String,
    deleted: bool,
}

// === Handlers ===

pub async fn list_queues(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQueuesQuery>,
) -> Response {
    match state
        .inspector
        .transport()
        .list_queues(query.prefix.as_deref())
        .await
    {
        Ok(queue_urls) => json_response(StatusCode::OK, &ListQueuesResponse { queue_urls }),
        Err(e) => error_response(transport_error(e)),
    }
}

pub async fn create_queue(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request: CreateQueueRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return error_response(invalid_body(&e)),
    };
    if let Err(e) = validate_queue_name(&request.name) {
        return error_response(ApiError::new(ErrorCode::InvalidParameterValue, e.to_string()));
    }

    match state.inspector.transport().create_queue(&request.name).await {
        Ok(queue_url) => {
            info!(name = %request.name, url = %queue_url, "Queue created");
            json_response(StatusCode::CREATED, &QueueUrlResponse { queue_url })
        }
        Err(e) => error_response(transport_error(e)),
    }
}

pub async fn delete_queue(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QueueQuery>,
) -> Response {
    let queue = match require_queue(query.queue_url.as_deref()) {
        Ok(q) => q,
        Err(e) => return error_response(e),
    };

    match state.inspector.transport().delete_queue(&queue).await {
        Ok(()) => json_response(
            StatusCode::OK,
            &QueueUrlResponse {
                queue_url: queue.to_string(),
            },
        ),
        Err(e) => error_response(transport_error(e)),
    }
}

pub async fn queue_attributes(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QueueQuery>,
) -> Response {
    let queue = match require_queue(query.queue_url.as_deref()) {
        Ok(q) => q,
        Err(e) => return error_response(e),
    };

    match state.inspector.transport().queue_attributes(&queue).await {
        Ok(attributes) => json_response(
            StatusCode::OK,
            &AttributesResponse {
                queue_url: queue.to_string(),
                attributes,
            },
        ),
        Err(e) => error_response(transport_error(e)),
    }
}

pub async fn send_message(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request: SendMessageRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return error_response(invalid_body(&e)),
    };
    let queue = match require_queue(Some(&request.queue_url)) {
        Ok(q) => q,
        Err(e) => return error_response(e),
    };

    match state
        .inspector
        .transport()
        .send_message(&queue, &request.body)
        .await
    {
        Ok(message_id) => json_response(StatusCode::OK, &SendMessageResponse { message_id }),
        Err(e) => error_response(transport_error(e)),
    }
}

/// Best-effort listing. An empty result covers both an empty queue and a
/// queue service that failed every round.
pub async fn peek_messages(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PeekQuery>,
) -> Response {
    let queue = match require_queue(query.queue_url.as_deref()) {
        Ok(q) => q,
        Err(e) => return error_response(e),
    };
    let max = query.max.unwrap_or(DEFAULT_PEEK_MAX);

    let (cancel, _guard) = state.request_token();
    let mut messages = state.inspector.peek(&queue, max, &cancel).await;
    messages.sort_by_key(|m| m.timestamp);

    json_response(
        StatusCode::OK,
        &PeekResponse {
            queue_url: queue.to_string(),
            count: messages.len(),
            messages: messages.into_iter().map(MessageView::from).collect(),
        },
    )
}

pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<String>,
    Query(query): Query<QueueQuery>,
) -> Response {
    let queue = match require_queue(query.queue_url.as_deref()) {
        Ok(q) => q,
        Err(e) => return error_response(e),
    };
    if message_id.trim().is_empty() {
        return error_response(ApiError::new(
            ErrorCode::MissingParameter,
            "message id is required",
        ));
    }

    let (cancel, _guard) = state.request_token();
    match state
        .inspector
        .delete_by_id(&queue, &message_id, &cancel)
        .await
    {
        Ok(DeleteOutcome::Deleted) => json_response(
            StatusCode::OK,
            &DeleteMessageResponse {
                message_id,
                deleted: true,
            },
        ),
        Ok(DeleteOutcome::NotAvailable) => error_response(ApiError::new(
            ErrorCode::MessageNotAvailable,
            "Message is no longer available; refresh and try again",
        )),
        Err(e) => error_response(transport_error(e)),
    }
}

// === Helpers ===

fn require_queue(queue_url: Option<&str>) -> Result<QueueRef, ApiError> {
    let queue_url = queue_url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::new(ErrorCode::MissingParameter, "queue_url is required"))?;
    Ok(QueueRef::parse(queue_url)?)
}

fn invalid_body(err: &serde_json::Error) -> ApiError {
    ApiError::new(
        ErrorCode::InvalidParameterValue,
        format!("Invalid request body: {err}"),
    )
}

fn transport_error(err: TransportError) -> ApiError {
    warn!(error = %err, "Queue service call failed");
    let code = match &err {
        TransportError::QueueNotFound(_) => ErrorCode::QueueDoesNotExist,
        TransportError::ReceiptHandleInvalid => ErrorCode::ReceiptHandleIsInvalid,
        TransportError::Timeout(_) | TransportError::Service(_) => ErrorCode::ServiceUnavailable,
    };
    ApiError::new(code, err.to_string())
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Err(e) => error_response(ApiError::new(ErrorCode::InternalError, e.to_string())),
    }
}

fn error_response(err: ApiError) -> Response {
    let status =
        StatusCode::from_u16(err.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = Response::new(Body::from(err.to_json()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}
