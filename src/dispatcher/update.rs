use super::request::NotificationStatus;
use serde::Serialize;

pub const REASON_UNSUPPORTED_TARGET: &str = "unsupported_target";

/// A terminal status write-back.
///
/// Serializes to exactly the document fields that change; the timestamps
/// listed by [`StatusUpdate::server_timestamps`] are filled in by the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: NotificationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fcm_message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusUpdate {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: NotificationStatus::Skipped,
            reason: Some(reason.into()),
            fcm_message_id: None,
            error: None,
        }
    }

    pub fn sent(message_id: impl Into<String>) -> Self {
        Self {
            status: NotificationStatus::Sent,
            reason: None,
            fcm_message_id: Some(message_id.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: NotificationStatus::Failed,
            reason: None,
            fcm_message_id: None,
            error: Some(error.into()),
        }
    }

    pub fn server_timestamps(&self) -> &'static [&'static str] {
        match self.status {
            NotificationStatus::Sent => &["sentAt", "updatedAt"],
            _ => &["updatedAt"],
        }
    }
}
