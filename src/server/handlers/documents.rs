//! Signer-facing endpoints: the device inbox and the signing flow.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::domain::completion::{CompletionReceipt, CompletionRequest};
use crate::domain::models::{ConsentAnswer, Document, DocumentStatus};
use crate::domain::ports::StoreError;
use crate::server::AppState;
use crate::server::responses::ApiError;

/// Signature submitted from a device
#[derive(Debug, Clone, Deserialize)]
pub struct SignatureSubmission {
    #[serde(default)]
    pub signature_data: String,

    #[serde(default)]
    pub consents: Vec<ConsentSubmission>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsentSubmission {
    pub consent_type: String,

    pub granted: bool,

    #[serde(default, with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
}

impl SignatureSubmission {
    /// Answers without a timestamp are stamped with `received_at`.
    pub fn into_request(self, request_id: String, received_at: OffsetDateTime) -> CompletionRequest {
        let consents = self
            .consents
            .into_iter()
            .map(|c| ConsentAnswer {
                consent_type: c.consent_type,
                granted: c.granted,
                timestamp: c.timestamp.unwrap_or(received_at),
            })
            .collect();

        CompletionRequest {
            request_id,
            signature_data: self.signature_data,
            consents,
        }
    }
}

/// `GET /documents/{device_id}`
pub async fn list_documents(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<Vec<Document>>, ApiError> {
    debug!(device_id = %device_id, "Fetching documents");

    let documents = state.store.list_documents(&device_id).await?;
    info!(
        device_id = %device_id,
        count = documents.len(),
        "Found pending documents"
    );

    Ok(Json(documents))
}

/// `GET /documents/sign/{request_id}`
pub async fn show_document(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    let document = state
        .store
        .get_document(&request_id)
        .await
        .map_err(|e| match e {
            StoreError::NotFound(_) => ApiError::NotFound("Document not found".to_string()),
            other => other.into(),
        })?;

    if document.status == DocumentStatus::Completed {
        return Err(ApiError::BadRequest("Document already signed".to_string()));
    }

    Ok(Json(document))
}

/// `POST /documents/sign/{request_id}`
///
/// Answers as soon as the completion is recorded; the callback is delivered
/// in the background.
pub async fn complete_signature(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    payload: Result<Json<SignatureSubmission>, JsonRejection>,
) -> Result<Json<CompletionReceipt>, ApiError> {
    let Json(submission) = payload.map_err(|e| {
        warn!(request_id = %request_id, error = %e, "Rejected signature body");
        ApiError::BadRequest("Invalid request body".to_string())
    })?;

    let request = submission.into_request(request_id, state.clock.now());
    let receipt = state.completion.complete(request).await?;

    Ok(Json(receipt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn test_missing_timestamps_are_stamped_on_receipt() -> Result<(), serde_json::Error> {
        let submission: SignatureSubmission = serde_json::from_value(json!({
            "signature_data": "sig",
            "consents": [
                {"consent_type": "terms", "granted": true},
                {"consent_type": "marketing", "granted": false, "timestamp": "2023-05-01T08:30:00Z"}
            ]
        }))?;
        let received_at = datetime!(2024-01-01 12:00 UTC);

        let request = submission.into_request("doc-1".to_string(), received_at);

        assert_eq!(request.request_id, "doc-1");
        assert_eq!(request.signature_data, "sig");
        assert_eq!(
            request.consents,
            vec![
                ConsentAnswer::new("terms", true, received_at),
                ConsentAnswer::new("marketing", false, datetime!(2023-05-01 08:30 UTC)),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_empty_submission_is_accepted() -> Result<(), serde_json::Error> {
        let submission: SignatureSubmission = serde_json::from_value(json!({}))?;
        let request = submission.into_request("doc-1".to_string(), OffsetDateTime::UNIX_EPOCH);

        assert!(request.signature_data.is_empty());
        assert!(request.consents.is_empty());
        Ok(())
    }
}
