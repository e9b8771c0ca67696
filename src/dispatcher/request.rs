//! Interpretation of a loosely typed notification document.

use crate::firestore::models::{Value, ValueType};
use crate::firestore::reference::convert_value_to_serde_value;
use crate::messaging::models::{Message, Notification};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const STATUS_QUEUED: &str = "queued";
pub const TARGET_TOPIC: &str = "topic";

/// Lifecycle status of a notification document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Queued,
    Sent,
    Skipped,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Queued => "queued",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Skipped => "skipped",
            NotificationStatus::Failed => "failed",
        }
    }
}

/// What the dispatcher should do with a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The document carries a status other than `queued`; leave it alone.
    NotQueued(String),
    /// No deliverable target; record `skipped`.
    UnsupportedTarget,
    /// Deliver to this topic.
    Topic(String),
}

/// The fields of a notification document the dispatcher cares about.
///
/// Fields with an unexpected type are treated as absent rather than rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationRequest {
    /// `None` means the document is queued: either no status was written, or
    /// it is `"queued"`, or it is a falsy value.
    pub status: Option<String>,
    pub target: Option<String>,
    pub topic: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub data: HashMap<String, Value>,
}

impl NotificationRequest {
    pub fn from_fields(fields: &HashMap<String, Value>) -> Self {
        let string_field = |name: &str| match fields.get(name).map(|v| &v.value_type) {
            Some(ValueType::StringValue(s)) => Some(s.clone()),
            _ => None,
        };

        let status = fields
            .get("status")
            .filter(|v| is_truthy(v))
            .map(coerce_to_string)
            .filter(|s| s != STATUS_QUEUED);

        let data = match fields.get("data").map(|v| &v.value_type) {
            Some(ValueType::MapValue(map)) => map.fields.clone(),
            _ => HashMap::new(),
        };

        Self {
            status,
            target: string_field("target"),
            topic: string_field("topic"),
            title: string_field("title"),
            body: string_field("body"),
            data,
        }
    }

    pub fn resolve(&self) -> Resolution {
        if let Some(status) = &self.status {
            return Resolution::NotQueued(status.clone());
        }

        match (self.target.as_deref(), self.topic.as_deref()) {
            (Some(TARGET_TOPIC), Some(topic)) if !topic.is_empty() => {
                Resolution::Topic(topic.to_string())
            }
            _ => Resolution::UnsupportedTarget,
        }
    }

    /// Builds the push request for `topic`.
    ///
    /// The notification block is only present when a title or body exists;
    /// otherwise FCM delivers a data-only message.
    pub fn build_message(&self, topic: &str) -> Message {
        let notification = if self.title.is_some() || self.body.is_some() {
            Some(Notification {
                title: self.title.clone(),
                body: self.body.clone(),
                ..Default::default()
            })
        } else {
            None
        };

        let data = self
            .data
            .iter()
            .map(|(key, value)| (key.clone(), coerce_to_string(value)))
            .collect();

        Message {
            topic: Some(topic.to_string()),
            notification,
            data: Some(data),
            ..Default::default()
        }
    }
}

/// Renders any document value as the string FCM will carry in `data`.
pub fn coerce_to_string(value: &Value) -> String {
    match &value.value_type {
        ValueType::StringValue(s) => s.clone(),
        ValueType::IntegerValue(s) => s
            .parse::<i64>()
            .map(|i| i.to_string())
            .unwrap_or_else(|_| s.clone()),
        ValueType::DoubleValue(d) => format_double(*d),
        ValueType::BooleanValue(b) => b.to_string(),
        ValueType::NullValue(_) => "null".to_string(),
        ValueType::TimestampValue(s) | ValueType::ReferenceValue(s) | ValueType::BytesValue(s) => {
            s.clone()
        }
        ValueType::GeoPointValue(gp) => {
            format!("{},{}", format_double(gp.latitude), format_double(gp.longitude))
        }
        ValueType::MapValue(_) | ValueType::ArrayValue(_) => match convert_value_to_serde_value(value) {
            Ok(json) => json.to_string(),
            Err(_) => serde_json::to_string(value).unwrap_or_default(),
        },
    }
}

fn format_double(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d.is_infinite() {
        let spelled = if d > 0.0 { "Infinity" } else { "-Infinity" };
        spelled.to_string()
    } else if d == 0.0 {
        "0".to_string()
    } else if d.abs() >= 1e21 || d.abs() < 1e-6 {
        // Exponent form with an explicit sign, as in `1e+21` and `1.5e-7`.
        let exp = format!("{:e}", d);
        match exp.split_once('e') {
            Some((mantissa, power)) if !power.starts_with('-') => {
                format!("{}e+{}", mantissa, power)
            }
            _ => exp,
        }
    } else {
        d.to_string()
    }
}

/// Whether a status value counts as "set". Empty strings, `false`, zero and
/// null do not.
fn is_truthy(value: &Value) -> bool {
    match &value.value_type {
        ValueType::NullValue(_) => false,
        ValueType::BooleanValue(b) => *b,
        ValueType::StringValue(s) => !s.is_empty(),
        ValueType::IntegerValue(s) => s.parse::<i64>().map(|i| i != 0).unwrap_or(true),
        ValueType::DoubleValue(d) => *d != 0.0 && !d.is_nan(),
        _ => true,
    }
}
