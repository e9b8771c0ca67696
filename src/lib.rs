//! Relay that delivers queued TODA GO notification documents from Cloud
//! Firestore to Firebase Cloud Messaging.

pub mod config;
pub mod core;
pub mod dispatcher;
pub mod firestore;
pub mod messaging;
pub mod trigger;

use crate::config::FirebaseConfig;
use crate::core::middleware::AuthMiddleware;
use firestore::{FirebaseFirestore, FirestoreError};
use messaging::FirebaseMessaging;
use thiserror::Error;
use yup_oauth2::ServiceAccountKey;

pub use yup_oauth2;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("No service account configured: set firebase.credentials or GOOGLE_APPLICATION_CREDENTIALS")]
    MissingCredentials,
    #[error("Failed to read service account key {path}: {source}")]
    Credentials {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("No project ID in the service account key or configuration")]
    MissingProjectId,
}

pub struct FirebaseApp {
    middleware: AuthMiddleware,
    project_id: String,
    firestore_url: Option<String>,
    fcm_url: Option<String>,
}

impl FirebaseApp {
    pub fn new(service_account_key: ServiceAccountKey) -> Self {
        let project_id = service_account_key.project_id.clone().unwrap_or_default();
        Self {
            middleware: AuthMiddleware::new(service_account_key),
            project_id,
            firestore_url: None,
            fcm_url: None,
        }
    }

    /// Builds the app from configuration, reading the service account key from disk.
    pub async fn from_config(config: &FirebaseConfig) -> Result<Self, SetupError> {
        let path = config
            .credentials
            .clone()
            .or_else(|| std::env::var("GOOGLE_APPLICATION_CREDENTIALS").ok())
            .ok_or(SetupError::MissingCredentials)?;

        let mut key = yup_oauth2::read_service_account_key(&path)
            .await
            .map_err(|source| SetupError::Credentials {
                path: path.clone(),
                source,
            })?;

        if let Some(project_id) = &config.project_id {
            key.project_id = Some(project_id.clone());
        }
        if key.project_id.as_deref().unwrap_or_default().is_empty() {
            return Err(SetupError::MissingProjectId);
        }

        let mut app = Self::new(key);
        app.firestore_url = config.firestore_url.clone();
        app.fcm_url = config.fcm_url.clone();
        Ok(app)
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn messaging(&self) -> FirebaseMessaging {
        match &self.fcm_url {
            Some(url) => FirebaseMessaging::new_with_url(self.middleware.clone(), url.clone()),
            None => FirebaseMessaging::new(self.middleware.clone()),
        }
    }

    /// Fails when the configured Firestore URL does not name a database.
    pub fn firestore(&self) -> Result<FirebaseFirestore, FirestoreError> {
        match &self.firestore_url {
            Some(url) => FirebaseFirestore::new_with_url(self.middleware.clone(), url.clone()),
            None => FirebaseFirestore::new(self.middleware.clone()),
        }
    }
}
