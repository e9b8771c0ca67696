use super::update::StatusUpdate;
use super::{DocumentStore, PushGateway};
use crate::firestore::models::Precondition;
use crate::firestore::snapshot::DocumentSnapshot;
use crate::firestore::{FirebaseFirestore, FirestoreError};
use crate::messaging::models::Message;
use crate::messaging::{FirebaseMessaging, MessagingError};
use async_trait::async_trait;

#[async_trait]
impl DocumentStore for FirebaseFirestore {
    async fn fetch(&self, path: &str) -> Result<DocumentSnapshot, FirestoreError> {
        self.doc(path)?.get().await
    }

    async fn update(
        &self,
        path: &str,
        update: &StatusUpdate,
        precondition: Precondition,
    ) -> Result<(), FirestoreError> {
        self.doc(path)?
            .update(update, update.server_timestamps(), precondition)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PushGateway for FirebaseMessaging {
    async fn send(&self, message: &Message, dry_run: bool) -> Result<String, MessagingError> {
        if dry_run {
            self.send_dry_run(message).await
        } else {
            FirebaseMessaging::send(self, message).await
        }
    }
}
