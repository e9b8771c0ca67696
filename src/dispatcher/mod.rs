//! Delivery of queued notification documents.
//!
//! One [`NotificationDispatcher::dispatch`] call handles one document-created
//! event: it decides whether the document is deliverable, forwards it to the
//! push gateway, and records a terminal status on the document. Nothing is
//! kept in memory between calls.

mod adapters;
pub mod request;
pub mod update;


use self::request::{NotificationRequest, Resolution};
use self::update::{StatusUpdate, REASON_UNSUPPORTED_TARGET};
use crate::config::DispatchConfig;
use crate::firestore::models::{Document, Precondition};
use crate::firestore::reference::convert_fields_to_serde_value;
use crate::firestore::snapshot::DocumentSnapshot;
use crate::firestore::FirestoreError;
use crate::messaging::models::Message;
use crate::messaging::MessagingError;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// The document store holding notification requests.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads the current state of the document at `path` (e.g. `notifications/abc`).
    async fn fetch(&self, path: &str) -> Result<DocumentSnapshot, FirestoreError>;

    /// Applies `update` to the document, stamping its server timestamps.
    ///
    /// Must fail with [`FirestoreError::PreconditionFailed`] when
    /// `precondition` does not hold.
    async fn update(
        &self,
        path: &str,
        update: &StatusUpdate,
        precondition: Precondition,
    ) -> Result<(), FirestoreError>;
}

/// The push delivery service.
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Sends `message` and returns the gateway's message identifier.
    async fn send(&self, message: &Message, dry_run: bool) -> Result<String, MessagingError>;
}

/// What happened to the notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The event carried no document.
    NoPayload,
    /// The document was created with a status other than `queued`.
    NotQueued { status: String },
    /// The stored document is no longer queued; a previous delivery handled it.
    AlreadyProcessed { status: String },
    /// The document was deleted before it could be delivered.
    Deleted,
    Skipped { reason: String },
    Sent { message_id: String },
    Failed { error: String },
}

/// Whether the terminal status reached the document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WriteOutcome {
    NotNeeded,
    Applied,
    /// The document changed since it was read; another delivery owns it.
    Conflict,
    /// Every attempt failed. The outcome exists only in the logs.
    Lost { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dispatch {
    pub document: String,
    pub outcome: DispatchOutcome,
    pub write: WriteOutcome,
}

impl Dispatch {
    fn untouched(document: &str, outcome: DispatchOutcome) -> Self {
        Self {
            document: document.to_string(),
            outcome,
            write: WriteOutcome::NotNeeded,
        }
    }
}

/// Drives queued notification documents to a terminal status.
pub struct NotificationDispatcher {
    store: Arc<dyn DocumentStore>,
    gateway: Arc<dyn PushGateway>,
    config: DispatchConfig,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        gateway: Arc<dyn PushGateway>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            config,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Handles the creation of the document at `path`.
    ///
    /// `document` is the created document as carried by the event, or `None`
    /// when the event had no payload. Never fails: every outcome, including a
    /// status that could not be recorded, is reported in the returned
    /// [`Dispatch`].
    pub async fn dispatch(&self, path: &str, document: Option<&Document>) -> Dispatch {
        let Some(document) = document else {
            tracing::debug!(document = path, "Event without document payload, nothing to do");
            return Dispatch::untouched(path, DispatchOutcome::NoPayload);
        };

        let request = NotificationRequest::from_fields(&document.fields);

        let topic = match request.resolve() {
            Resolution::NotQueued(status) => {
                tracing::debug!(document = path, status = %status, "Notification not queued, ignoring");
                return Dispatch::untouched(path, DispatchOutcome::NotQueued { status });
            }
            Resolution::UnsupportedTarget => {
                tracing::warn!(
                    document = path,
                    payload = %payload_json(document),
                    "Notification skipped: unsupported target or missing topic"
                );
                let update = StatusUpdate::skipped(REASON_UNSUPPORTED_TARGET);
                let write = self
                    .record(path, &update, precondition_for(document.update_time.as_deref()))
                    .await;
                return Dispatch {
                    document: path.to_string(),
                    outcome: DispatchOutcome::Skipped {
                        reason: REASON_UNSUPPORTED_TARGET.to_string(),
                    },
                    write,
                };
            }
            Resolution::Topic(topic) => topic,
        };

        let mut observed_update_time = document.update_time.clone();

        if self.config.verify_before_send {
            match self.store.fetch(path).await {
                Ok(snapshot) => {
                    let Some(fields) = snapshot.fields() else {
                        tracing::info!(document = path, "Notification deleted before delivery");
                        return Dispatch::untouched(path, DispatchOutcome::Deleted);
                    };
                    if let Some(status) = NotificationRequest::from_fields(fields).status {
                        tracing::info!(
                            document = path,
                            status = %status,
                            "Notification already processed, not sending again"
                        );
                        return Dispatch::untouched(path, DispatchOutcome::AlreadyProcessed { status });
                    }
                    if let Some(update_time) = snapshot.update_time() {
                        observed_update_time = Some(update_time.to_string());
                    }
                }
                // The event payload is still a valid basis for delivery.
                Err(e) => {
                    tracing::warn!(
                        document = path,
                        error = %e,
                        "Could not re-read notification, dispatching from event payload"
                    );
                }
            }
        }

        let message = request.build_message(&topic);

        let (update, outcome) = match self.gateway.send(&message, self.config.dry_run).await {
            Ok(message_id) => {
                tracing::info!(message_id = %message_id, topic = %topic, document = path, "FCM sent");
                (
                    StatusUpdate::sent(message_id.clone()),
                    DispatchOutcome::Sent { message_id },
                )
            }
            Err(e) => {
                let error = e.message();
                tracing::error!(
                    document = path,
                    topic = %topic,
                    error = %error,
                    "Failed to send notification"
                );
                (
                    StatusUpdate::failed(error.clone()),
                    DispatchOutcome::Failed { error },
                )
            }
        };

        let write = self
            .record(path, &update, precondition_for(observed_update_time.as_deref()))
            .await;

        Dispatch {
            document: path.to_string(),
            outcome,
            write,
        }
    }

    /// Writes a terminal status, retrying failures other than a rejected precondition.
    async fn record(&self, path: &str, update: &StatusUpdate, precondition: Precondition) -> WriteOutcome {
        let attempts = self.config.status_write_attempts.max(1);
        let mut delay = Duration::from_millis(self.config.status_write_backoff_ms);
        let mut attempt = 1;

        loop {
            match self.store.update(path, update, precondition.clone()).await {
                Ok(()) => return WriteOutcome::Applied,
                Err(FirestoreError::PreconditionFailed(msg)) => {
                    tracing::warn!(
                        document = path,
                        status = update.status.as_str(),
                        error = %msg,
                        "Status write rejected, notification was modified by a concurrent delivery"
                    );
                    return WriteOutcome::Conflict;
                }
                Err(e) if attempt < attempts => {
                    tracing::warn!(
                        document = path,
                        attempt,
                        error = %e,
                        "Status write failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(
                        document = path,
                        status = update.status.as_str(),
                        fcm_message_id = update.fcm_message_id.as_deref(),
                        attempts,
                        error = %e,
                        "Terminal status could not be recorded"
                    );
                    return WriteOutcome::Lost {
                        error: e.to_string(),
                    };
                }
            }
        }
    }
}

fn precondition_for(update_time: Option<&str>) -> Precondition {
    match update_time {
        Some(update_time) => Precondition::last_updated_at(update_time),
        None => Precondition::must_exist(),
    }
}

fn payload_json(document: &Document) -> String {
    match convert_fields_to_serde_value(&document.fields) {
        Ok(json) => json.to_string(),
        Err(_) => format!("{:?}", document.fields),
    }
}
