use super::{document_path, in_collection, subject_path, DocumentEventData, DOCUMENT_CREATED};
use crate::dispatcher::NotificationDispatcher;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Shared state of the trigger endpoint.
#[derive(Clone)]
pub struct TriggerState {
    dispatcher: Arc<NotificationDispatcher>,
    permits: Arc<Semaphore>,
}

impl TriggerState {
    pub fn new(dispatcher: Arc<NotificationDispatcher>) -> Self {
        let max_instances = dispatcher.config().max_instances.max(1);
        Self {
            dispatcher,
            permits: Arc::new(Semaphore::new(max_instances)),
        }
    }
}

pub fn create_router(state: TriggerState) -> Router {
    Router::new()
        .route("/", post(receive_event))
        .route("/healthz", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn ignored(reason: &str) -> Response {
    (StatusCode::OK, Json(json!({ "ignored": reason }))).into_response()
}

async fn receive_event(
    State(state): State<TriggerState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let event_id = header(&headers, "ce-id").unwrap_or_default().to_string();

    if let Some(event_type) = header(&headers, "ce-type") {
        if event_type != DOCUMENT_CREATED {
            tracing::debug!(event_id = %event_id, event_type, "Ignoring non-create event");
            return ignored("event_type");
        }
    }

    let data: DocumentEventData = if body.iter().all(|b| b.is_ascii_whitespace()) {
        DocumentEventData::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(event_id = %event_id, error = %e, "Malformed document event");
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": format!("malformed document event: {}", e) })),
                )
                    .into_response();
            }
        }
    };

    // An empty `value` object carries no document.
    let document = data.value.filter(|doc| !doc.name.is_empty());

    let path = document
        .as_ref()
        .and_then(|doc| document_path(&doc.name))
        .or_else(|| header(&headers, "ce-subject").and_then(subject_path))
        .map(str::to_string);

    let Some(path) = path else {
        tracing::debug!(event_id = %event_id, "Event names no document");
        return ignored("no_document");
    };

    let collection = &state.dispatcher.config().collection;
    if !in_collection(&path, collection) {
        tracing::debug!(event_id = %event_id, document = %path, "Document outside {}", collection);
        return ignored("collection");
    }

    let Ok(_permit) = state.permits.acquire().await else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    tracing::debug!(event_id = %event_id, document = %path, "Dispatching notification");
    let dispatch = state.dispatcher.dispatch(&path, document.as_ref()).await;

    (StatusCode::OK, Json(dispatch)).into_response()
}
