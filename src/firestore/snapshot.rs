use super::models::{Document, Value};
use std::collections::HashMap;

/// A snapshot of a document in Firestore.
///
/// It contains data read from a document in your Firestore database.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    pub(crate) id: String,
    pub(crate) document: Option<Document>,
}

impl DocumentSnapshot {
    pub(crate) fn found(id: &str, document: Document) -> Self {
        Self {
            id: id.to_string(),
            document: Some(document),
        }
    }

    pub(crate) fn missing(id: &str) -> Self {
        Self {
            id: id.to_string(),
            document: None,
        }
    }

    /// The ID of the document.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns `true` if the document exists.
    pub fn exists(&self) -> bool {
        self.document.is_some()
    }

    /// The time the document was last updated. Returns `None` if the document does not exist.
    pub fn update_time(&self) -> Option<&str> {
        self.document.as_ref().and_then(|d| d.update_time.as_deref())
    }

    /// The raw fields of the document. Returns `None` if the document does not exist.
    pub fn fields(&self) -> Option<&HashMap<String, Value>> {
        self.document.as_ref().map(|d| &d.fields)
    }
}
