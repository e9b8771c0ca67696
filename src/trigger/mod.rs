//! Document-created events delivered over HTTP.
//!
//! Events arrive as CloudEvents in binary content mode: the `ce-*` headers
//! carry the envelope and the body is the JSON encoding of Firestore's
//! `DocumentEventData`.

pub mod server;

use crate::firestore::models::Document;
use serde::Deserialize;

pub const DOCUMENT_CREATED: &str = "google.cloud.firestore.document.v1.created";

/// Payload of a Firestore document change event.
///
/// Only the created document is read; `oldValue` and `updateMask` are
/// always empty for creations and are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEventData {
    /// The document after the change; absent for deletions.
    #[serde(default)]
    pub value: Option<Document>,
}

/// Strips `projects/{p}/databases/{d}/documents/` from a resource name.
pub fn document_path(name: &str) -> Option<&str> {
    let (_, path) = name.split_once("/documents/")?;
    (!path.is_empty()).then_some(path)
}

/// Extracts the document path from a CloudEvent subject, `documents/{path}`.
pub fn subject_path(subject: &str) -> Option<&str> {
    let path = subject.strip_prefix("documents/")?;
    (!path.is_empty()).then_some(path)
}

/// Whether `path` names a document directly inside `collection`.
pub fn in_collection(path: &str, collection: &str) -> bool {
    match path.rsplit_once('/') {
        Some((parent, id)) => parent == collection.trim_matches('/') && !id.is_empty(),
        None => false,
    }
}
