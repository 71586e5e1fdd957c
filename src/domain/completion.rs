use crate::domain::consent::{self, ConsentRejection};
use crate::domain::models::{CallbackPayload, ConsentAnswer, DocumentStatus};
use crate::domain::ports::{CallbackScheduler, Clock, DocumentStore, StoreError};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

/// Decoded signature submission for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub request_id: String,
    pub signature_data: String,
    pub consents: Vec<ConsentAnswer>,
}

/// Result returned to the signer once the completion is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionReceipt {
    pub status: DocumentStatus,
    pub consents_processed: bool,
    pub device_id: String,
}

/// Store interaction performed while completing a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStep {
    LoadDocument,
    StoreSignature,
    UpdateStatus,
    StoreConsents,
}

impl std::fmt::Display for CompletionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let step = match self {
            CompletionStep::LoadDocument => "load document",
            CompletionStep::StoreSignature => "store signature",
            CompletionStep::UpdateStatus => "update document status",
            CompletionStep::StoreConsents => "store consents",
        };
        f.write_str(step)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Document is {0}, not pending")]
    NotPending(DocumentStatus),

    #[error("Completion already in progress for document {0}")]
    InProgress(String),

    #[error(transparent)]
    Rejected(#[from] ConsentRejection),

    #[error("Failed to {step}: {source}")]
    Store {
        step: CompletionStep,
        #[source]
        source: StoreError,
    },
}

/// Runs a signature completion and hands the callback off for delivery.
///
/// Nothing is written before consent validation passes. The three writes
/// that follow are independent commits; a failure stops the sequence but
/// does not undo earlier writes. Callback delivery happens in the
/// background and its outcome never reaches the caller.
///
/// At most one completion per document runs at a time in this service, and
/// the move to `completed` is a compare-and-set against `pending`, so each
/// document produces at most one callback payload.
pub struct CompletionService {
    store: Arc<dyn DocumentStore>,
    scheduler: Arc<dyn CallbackScheduler>,
    clock: Arc<dyn Clock>,
    in_flight: Mutex<HashSet<String>>,
}

/// Held while a document is being completed; released on drop.
struct Claim<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    id: String,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        lock(self.in_flight).remove(&self.id);
    }
}

fn lock(in_flight: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    // The set stays consistent even if a holder panicked.
    in_flight.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CompletionService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        scheduler: Arc<dyn CallbackScheduler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            scheduler,
            clock,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    fn claim(&self, id: &str) -> Option<Claim<'_>> {
        lock(&self.in_flight).insert(id.to_string()).then(|| Claim {
            in_flight: &self.in_flight,
            id: id.to_string(),
        })
    }

    pub async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionReceipt, CompletionError> {
        let id = request.request_id.as_str();

        let _claim = self.claim(id).ok_or_else(|| {
            debug!(request_id = %id, "Completion already running");
            CompletionError::InProgress(id.to_string())
        })?;

        let document = self.store.get_document(id).await.map_err(|e| match e {
            StoreError::NotFound(_) => CompletionError::NotFound(id.to_string()),
            other => CompletionError::Store {
                step: CompletionStep::LoadDocument,
                source: other,
            },
        })?;

        if document.status != DocumentStatus::Pending {
            return Err(CompletionError::NotPending(document.status));
        }

        let consents = consent::validate(&document.sections, request.consents)?;
        debug!(request_id = %id, consents = consents.len(), "Consents accepted");

        self.store
            .update_document_signature(id, &request.signature_data)
            .await
            .map_err(|e| persistence_failure(id, CompletionStep::StoreSignature, e))?;

        let found = self
            .store
            .compare_and_set_status(id, DocumentStatus::Pending, DocumentStatus::Completed)
            .await
            .map_err(|e| persistence_failure(id, CompletionStep::UpdateStatus, e))?;
        if found != DocumentStatus::Pending {
            warn!(request_id = %id, status = %found, "Document left pending during completion");
            return Err(CompletionError::NotPending(found));
        }

        self.store
            .store_consents(id, &consents)
            .await
            .map_err(|e| persistence_failure(id, CompletionStep::StoreConsents, e))?;

        if document.callback_url.is_empty() {
            info!(request_id = %id, "No callback URL configured");
        } else {
            let payload = CallbackPayload::build(
                &document,
                &request.signature_data,
                &consents,
                self.clock.now(),
            );

            match self.scheduler.schedule(document.callback_url.clone(), payload) {
                Ok(()) => debug!(request_id = %id, "Callback delivery scheduled"),
                Err(e) => warn!(request_id = %id, error = %e, "Callback delivery not scheduled"),
            }
        }

        Ok(CompletionReceipt {
            status: DocumentStatus::Completed,
            consents_processed: true,
            device_id: document.device_id,
        })
    }
}

fn persistence_failure(id: &str, step: CompletionStep, source: StoreError) -> CompletionError {
    error!(request_id = %id, step = %step, error = %source, "Completion aborted");
    CompletionError::Store { step, source }
}
