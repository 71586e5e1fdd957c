/*
   This module specifies the API by which the signing domain talks to its collaborators.
*/

use crate::domain::models::{
    CallbackPayload, ConsentAnswer, Document, DocumentStatus, NewDocument,
};
use async_trait::async_trait;
use time::OffsetDateTime;

/// Error type for document store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Key-addressed document store. Every operation is individually atomic;
/// no cross-call transaction is provided.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn add_document(&self, document: NewDocument) -> Result<String, StoreError>;

    /// Pending documents for a device, newest first.
    async fn list_documents(&self, device_id: &str) -> Result<Vec<Document>, StoreError>;

    async fn get_document(&self, id: &str) -> Result<Document, StoreError>;

    /// Status plus the URL of the first text section, if any.
    async fn get_signature_status(
        &self,
        id: &str,
    ) -> Result<(DocumentStatus, Option<String>), StoreError>;

    async fn update_document_status(
        &self,
        id: &str,
        status: DocumentStatus,
    ) -> Result<(), StoreError>;

    /// Set `status` only while the document is still `expected`.
    ///
    /// Returns the status found before the call. The write was applied iff
    /// that status equals `expected`.
    async fn compare_and_set_status(
        &self,
        id: &str,
        expected: DocumentStatus,
        status: DocumentStatus,
    ) -> Result<DocumentStatus, StoreError>;

    async fn update_document_signature(
        &self,
        id: &str,
        signature_data: &str,
    ) -> Result<(), StoreError>;

    async fn store_consents(&self, id: &str, answers: &[ConsentAnswer]) -> Result<(), StoreError>;
}

/// Error returned when a delivery cannot be handed off
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Delivery scheduler is shut down")]
    Closed,
}

/// Hands a callback delivery off to background execution.
///
/// Implementations must return without waiting for the delivery itself.
pub trait CallbackScheduler: Send + Sync {
    fn schedule(&self, url: String, payload: CallbackPayload) -> Result<(), SchedulerError>;
}

/// Source of wall-clock time
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Clock backed by the system time, in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
