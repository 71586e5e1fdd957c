//! Signature request API used by the integrating back office.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::models::{DocumentStatus, NewDocument};
use crate::server::AppState;
use crate::server::responses::ApiError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignResponse {
    pub request_id: String,
    pub status: DocumentStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureStatusResponse {
    pub request_id: String,
    pub status: DocumentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_document_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteSignatureResponse {
    pub request_id: String,
    pub status: DocumentStatus,
}

/// `POST /api/documents/signatures/request`
pub async fn create_signature_request(
    State(state): State<AppState>,
    payload: Result<Json<NewDocument>, JsonRejection>,
) -> Result<Json<SignResponse>, ApiError> {
    let Json(new_document) = payload.map_err(|e| {
        warn!(error = %e, "Rejected signature request body");
        ApiError::BadRequest("Bad request".to_string())
    })?;

    if !new_document.has_required_fields() {
        return Err(ApiError::BadRequest("Missing required fields".to_string()));
    }

    let request_id = state.store.add_document(new_document).await?;
    info!(request_id = %request_id, "Signature request created");

    Ok(Json(SignResponse {
        request_id,
        status: DocumentStatus::Pending,
    }))
}

/// `GET /api/documents/signatures/{request_id}/status`
pub async fn signature_status(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<Json<SignatureStatusResponse>, ApiError> {
    let (status, signed_document_url) = state.store.get_signature_status(&request_id).await?;

    Ok(Json(SignatureStatusResponse {
        request_id,
        status,
        signed_document_url,
    }))
}

/// `DELETE /api/documents/signatures/{request_id}`
///
/// Marks the document `removed`, whatever its current state.
pub async fn delete_signature_request(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<Json<DeleteSignatureResponse>, ApiError> {
    state.store.get_document(&request_id).await?;
    state
        .store
        .update_document_status(&request_id, DocumentStatus::Removed)
        .await?;

    info!(request_id = %request_id, "Signature request removed");

    Ok(Json(DeleteSignatureResponse {
        request_id,
        status: DocumentStatus::Removed,
    }))
}
