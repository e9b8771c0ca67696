//! Cloud Firestore module.
//!
//! A narrow REST client for the document operations the relay needs: reading a
//! single document and committing a preconditioned partial update with
//! server-side timestamps.
//!
//! It mirrors the Firebase Admin SDK's structure using `CollectionReference` and `DocumentReference`.

pub mod models;
pub mod reference;
pub mod snapshot;

#[cfg(test)]
mod tests;

use self::reference::{CollectionReference, DocumentReference};
use crate::core::middleware::AuthMiddleware;
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use thiserror::Error;

const FIRESTORE_V1_API: &str =
    "https://firestore.googleapis.com/v1/projects/{project_id}/databases/(default)/documents";

/// Errors that can occur during Firestore operations.
#[derive(Error, Debug)]
pub enum FirestoreError {
    /// Wrapper for `reqwest::Error`.
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    /// Wrapper for `reqwest_middleware::Error`.
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    /// Errors returned by the Firestore API.
    #[error("API error: {0}")]
    ApiError(String),
    /// A conditional write was rejected because the document changed since it was read.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),
    /// Wrapper for `serde_json::Error`.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    /// A document path or resource name that does not address a document.
    #[error("Invalid document path: {0}")]
    InvalidPath(String),
    /// A base URL that does not end in `projects/{p}/databases/{d}/documents`.
    #[error("Invalid Firestore base URL: {0}")]
    InvalidBaseUrl(String),
}

/// Client for interacting with Cloud Firestore.
#[derive(Clone)]
pub struct FirebaseFirestore {
    client: ClientWithMiddleware,
    base_url: String,
    /// Resource name of the database, `projects/{p}/databases/{d}`.
    database: String,
}

impl FirebaseFirestore {
    /// Creates a new `FirebaseFirestore` instance for the project of the service account.
    ///
    /// This is typically called via `FirebaseApp::firestore()`.
    pub fn new(middleware: AuthMiddleware) -> Result<Self, FirestoreError> {
        let project_id = middleware.project_id().unwrap_or_default().to_string();
        Self::new_with_url(middleware, Self::default_url(&project_id))
    }

    /// Creates a new `FirebaseFirestore` instance with a custom base URL (emulators, tests).
    ///
    /// The URL must end with `projects/{project_id}/databases/{database}/documents`.
    pub fn new_with_url(middleware: AuthMiddleware, base_url: String) -> Result<Self, FirestoreError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let database = database_name(&base_url)?;
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

        let client = ClientBuilder::new(Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .with(middleware)
            .build();

        Ok(Self {
            client,
            base_url,
            database,
        })
    }

    /// Returns the default REST endpoint for `project_id`.
    pub fn default_url(project_id: &str) -> String {
        FIRESTORE_V1_API.replace("{project_id}", project_id)
    }

    #[cfg(test)]
    pub(crate) fn new_with_client(
        client: ClientWithMiddleware,
        base_url: String,
    ) -> Result<Self, FirestoreError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let database = database_name(&base_url)?;
        Ok(Self {
            client,
            base_url,
            database,
        })
    }

    /// Gets a `CollectionReference` instance that refers to the collection at the specified path.
    ///
    /// # Arguments
    ///
    /// * `collection_path` - The slash-separated path of the collection (e.g., "notifications").
    pub fn collection(&self, collection_path: &str) -> CollectionReference<'_> {
        CollectionReference {
            client: &self.client,
            base_url: self.base_url.clone(),
            database: self.database.clone(),
            collection_path: collection_path.trim_matches('/').to_string(),
        }
    }

    /// Gets a `DocumentReference` instance that refers to the document at the specified path.
    ///
    /// # Arguments
    ///
    /// * `document_path` - The slash-separated path to the document (e.g., "notifications/abc").
    pub fn doc(&self, document_path: &str) -> Result<DocumentReference<'_>, FirestoreError> {
        let document_path = document_path.trim_matches('/');
        let segments = document_path.split('/').count();
        if document_path.is_empty() || segments % 2 != 0 || document_path.contains("//") {
            return Err(FirestoreError::InvalidPath(document_path.to_string()));
        }

        let (collection, id) = document_path
            .rsplit_once('/')
            .ok_or_else(|| FirestoreError::InvalidPath(document_path.to_string()))?;
        Ok(self.collection(collection).doc(id))
    }
}

/// Extracts `projects/{p}/databases/{d}` from a `.../documents` base URL.
fn database_name(base_url: &str) -> Result<String, FirestoreError> {
    let invalid = || FirestoreError::InvalidBaseUrl(base_url.to_string());

    let start = base_url.find("projects/").ok_or_else(invalid)?;
    let database = base_url[start..]
        .trim_end_matches('/')
        .strip_suffix("/documents")
        .ok_or_else(invalid)?;

    match database.split('/').collect::<Vec<_>>().as_slice() {
        ["projects", project, "databases", name] if !project.is_empty() && !name.is_empty() => {
            Ok(database.to_string())
        }
        _ => Err(invalid()),
    }
}
