pub mod middleware;

use reqwest::StatusCode;
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Deserialize)]
pub struct FirebaseErrorResponse {
    pub error: FirebaseErrorDetails,
}

#[derive(Debug, Deserialize)]
pub struct FirebaseErrorDetails {
    pub code: u16,
    pub message: String,
    pub status: Option<String>,
    pub errors: Option<Vec<FirebaseSubError>>,
}

#[derive(Debug, Deserialize)]
pub struct FirebaseSubError {
    pub message: String,
    pub domain: Option<String>,
    pub reason: Option<String>,
}

impl FirebaseErrorResponse {
    pub fn display_message(&self) -> String {
        format!("{} (code: {})", self.error.message, self.error.code)
    }
}

/// A non-success response from a Google REST API, reduced to what callers branch on.
#[derive(Debug, Clone)]
pub struct ApiFailure {
    pub http_status: StatusCode,
    /// Canonical gRPC status name, e.g. `FAILED_PRECONDITION`.
    pub status: Option<String>,
    pub message: String,
}

impl ApiFailure {
    pub fn is_precondition_failure(&self) -> bool {
        self.status.as_deref() == Some("FAILED_PRECONDITION")
    }
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

pub async fn parse_error_response(response: reqwest::Response, default_msg: &str) -> ApiFailure {
    let http_status = response.status();
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<FirebaseErrorResponse>(&text) {
        Ok(error_resp) => ApiFailure {
            http_status,
            message: error_resp.display_message(),
            status: error_resp.error.status,
        },
        Err(_) if text.trim().is_empty() => ApiFailure {
            http_status,
            status: None,
            message: format!("{}: {}", default_msg, http_status),
        },
        Err(_) => ApiFailure {
            http_status,
            status: None,
            message: format!("{} {}: {}", default_msg, http_status, text.trim()),
        },
    }
}
