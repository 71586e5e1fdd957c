use crate::domain::models::{ConsentAnswer, Document, DocumentStatus, NewDocument};
use crate::domain::ports::{DocumentStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredDocument {
    document: Document,
    signature_data: Option<String>,
    consents: Vec<ConsentAnswer>,
    /// Insertion order, used to list newest documents first.
    sequence: u64,
}

#[derive(Debug, Default)]
struct Inner {
    documents: HashMap<String, StoredDocument>,
    next_sequence: u64,
}

// ============================================================================
// InMemoryDocumentStore
// ============================================================================
#[derive(Debug, Default, Clone)]
pub struct InMemoryDocumentStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryDocumentStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signature data recorded for a document, if any.
    pub fn signature_data(&self, id: &str) -> Option<String> {
        self.read()
            .ok()?
            .documents
            .get(id)
            .and_then(|stored| stored.signature_data.clone())
    }

    /// Consent answers recorded for a document.
    pub fn consents(&self, id: &str) -> Option<Vec<ConsentAnswer>> {
        self.read()
            .ok()?
            .documents
            .get(id)
            .map(|stored| stored.consents.clone())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|e| StoreError::Backend(format!("InMemoryDocumentStore lock poisoned: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|e| StoreError::Backend(format!("InMemoryDocumentStore lock poisoned: {e}")))
    }

    fn modify(
        &self,
        id: &str,
        apply: impl FnOnce(&mut StoredDocument),
    ) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        let stored = inner
            .documents
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        apply(stored);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn add_document(&self, document: NewDocument) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let mut inner = self.write()?;

        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.documents.insert(
            id.clone(),
            StoredDocument {
                document: document.into_document(id.clone()),
                signature_data: None,
                consents: Vec::new(),
                sequence,
            },
        );

        debug!(request_id = %id, "Document stored");
        Ok(id)
    }

    async fn list_documents(&self, device_id: &str) -> Result<Vec<Document>, StoreError> {
        let inner = self.read()?;

        let mut pending: Vec<&StoredDocument> = inner
            .documents
            .values()
            .filter(|s| {
                s.document.device_id == device_id && s.document.status == DocumentStatus::Pending
            })
            .collect();
        pending.sort_by(|a, b| b.sequence.cmp(&a.sequence));

        Ok(pending.into_iter().map(|s| s.document.clone()).collect())
    }

    async fn get_document(&self, id: &str) -> Result<Document, StoreError> {
        self.read()?
            .documents
            .get(id)
            .map(|stored| stored.document.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn get_signature_status(
        &self,
        id: &str,
    ) -> Result<(DocumentStatus, Option<String>), StoreError> {
        let inner = self.read()?;
        let document = &inner
            .documents
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?
            .document;

        Ok((
            document.status,
            document.signed_document_url().map(str::to_string),
        ))
    }

    async fn update_document_status(
        &self,
        id: &str,
        status: DocumentStatus,
    ) -> Result<(), StoreError> {
        self.modify(id, |stored| stored.document.status = status)
    }

    async fn compare_and_set_status(
        &self,
        id: &str,
        expected: DocumentStatus,
        status: DocumentStatus,
    ) -> Result<DocumentStatus, StoreError> {
        let mut found = expected;
        self.modify(id, |stored| {
            found = stored.document.status;
            if found == expected {
                stored.document.status = status;
            }
        })?;
        Ok(found)
    }

    async fn update_document_signature(
        &self,
        id: &str,
        signature_data: &str,
    ) -> Result<(), StoreError> {
        self.modify(id, |stored| {
            stored.signature_data = Some(signature_data.to_string())
        })
    }

    async fn store_consents(&self, id: &str, answers: &[ConsentAnswer]) -> Result<(), StoreError> {
        self.modify(id, |stored| stored.consents = answers.to_vec())
    }
}

// ============================================================================
// Tests
// ============================================================================
