use crate::core::middleware::AuthMiddleware;
use crate::core::parse_error_response;
use crate::messaging::models::{Message, SendResponseInternal};
use reqwest::{header, Client};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Serialize;
use thiserror::Error;

pub mod models;

const FCM_V1_SEND_API: &str = "https://fcm.googleapis.com/v1/projects/{project_id}/messages:send";

#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl MessagingError {
    /// The error text without the variant prefix for errors reported by FCM.
    pub fn message(&self) -> String {
        match self {
            MessagingError::ApiError(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

const TOPIC_PREFIX: &str = "/topics/";

#[derive(Clone)]
pub struct FirebaseMessaging {
    client: ClientWithMiddleware,
    send_url: String,
}

// Wrapper for the request body required by FCM v1 API
#[derive(Serialize)]
struct SendRequest<'a> {
    validate_only: bool,
    message: &'a Message,
}

impl FirebaseMessaging {
    pub fn new(middleware: AuthMiddleware) -> Self {
        let project_id = middleware.project_id().unwrap_or_default().to_string();
        Self::new_with_url(middleware, Self::default_url(&project_id))
    }

    /// Creates a client that posts to a custom `messages:send` endpoint.
    pub fn new_with_url(middleware: AuthMiddleware, send_url: String) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

        let client = ClientBuilder::new(Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .with(middleware)
            .build();

        Self { client, send_url }
    }

    /// Returns the default `messages:send` endpoint for `project_id`.
    pub fn default_url(project_id: &str) -> String {
        FCM_V1_SEND_API.replace("{project_id}", project_id)
    }

    #[cfg(test)]
    pub(crate) fn new_with_client(client: ClientWithMiddleware, send_url: String) -> Self {
        Self { client, send_url }
    }

    /// Sends a message and returns its FCM identifier
    /// (`projects/{project_id}/messages/{message_id}`).
    pub async fn send(&self, message: &Message) -> Result<String, MessagingError> {
        let message = self.prepare_message(message)?;
        self.send_request(&message, false).await
    }

    /// Validates a message with FCM without delivering it.
    pub async fn send_dry_run(&self, message: &Message) -> Result<String, MessagingError> {
        let message = self.prepare_message(message)?;
        self.send_request(&message, true).await
    }

    /// Strips a leading `/topics/` from the topic and validates the result.
    fn prepare_message(&self, message: &Message) -> Result<Message, MessagingError> {
        let mut message = message.clone();
        if let Some(topic) = message.topic.as_mut() {
            if topic.starts_with(TOPIC_PREFIX) {
                topic.drain(..TOPIC_PREFIX.len());
            }
        }
        self.validate_message(&message)?;
        Ok(message)
    }

    fn validate_message(&self, message: &Message) -> Result<(), MessagingError> {
        let num_targets = [
            message.token.is_some(),
            message.topic.is_some(),
            message.condition.is_some(),
        ]
        .iter()
        .filter(|&&t| t)
        .count();

        if num_targets != 1 {
            return Err(MessagingError::InvalidMessage(
                "Message must have exactly one of token, topic, or condition.".to_string(),
            ));
        }

        if let Some(topic) = &message.topic {
            let well_formed = topic
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "-_.~%".contains(c));
            if topic.is_empty() || !well_formed {
                return Err(MessagingError::InvalidMessage(format!(
                    "Malformed topic name: {:?}",
                    topic
                )));
            }
        }

        Ok(())
    }

    async fn send_request(&self, message: &Message, dry_run: bool) -> Result<String, MessagingError> {
        let request = SendRequest {
            validate_only: dry_run,
            message,
        };

        let response = self
            .client
            .post(&self.send_url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&request)?)
            .send()
            .await?;

        if !response.status().is_success() {
            let failure = parse_error_response(response, "FCM send failed").await;
            return Err(MessagingError::ApiError(failure.to_string()));
        }

        let result: SendResponseInternal = response.json().await?;
        Ok(result.name)
    }
}
