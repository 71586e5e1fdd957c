use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Kind of a document section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Text,
    Consent,
}

/// One section of a document's content.
///
/// Only `consent` sections carry consent metadata. `consent_type` is expected
/// to be unique within a document, but this is not enforced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentSection {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: SectionKind,

    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consent_type: Option<String>,

    #[serde(
        rename = "consent_granted",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub consent_granted_default: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consent_mandatory: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consent_default: Option<bool>,
}

impl DocumentSection {
    /// Create a plain text section
    pub fn text(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: SectionKind::Text,
            content: content.into(),
            consent_type: None,
            consent_granted_default: None,
            consent_mandatory: None,
            consent_default: None,
        }
    }

    /// Create a consent section
    pub fn consent(
        id: impl Into<String>,
        content: impl Into<String>,
        consent_type: impl Into<String>,
        mandatory: bool,
    ) -> Self {
        Self {
            id: id.into(),
            kind: SectionKind::Consent,
            content: content.into(),
            consent_type: Some(consent_type.into()),
            consent_granted_default: None,
            consent_mandatory: Some(mandatory),
            consent_default: None,
        }
    }

    /// True for consent sections explicitly flagged as mandatory.
    pub fn is_mandatory_consent(&self) -> bool {
        self.kind == SectionKind::Consent && self.consent_mandatory.unwrap_or(false)
    }
}

/// Lifecycle state of a document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Completed,
    Removed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Removed => "removed",
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document awaiting (or having received) a signature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub id: String,

    #[serde(rename = "document_title")]
    pub title: String,

    #[serde(rename = "document_content")]
    pub sections: Vec<DocumentSection>,

    pub signer_name: String,

    pub signer_email: String,

    pub device_id: String,

    pub callback_url: String,

    pub status: DocumentStatus,
}

impl Document {
    /// Content of the first text section, used as the signed document URL.
    pub fn signed_document_url(&self) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.kind == SectionKind::Text)
            .map(|s| s.content.as_str())
    }
}

/// Fields supplied when registering a new signature request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewDocument {
    #[serde(default)]
    pub document_title: String,

    #[serde(default)]
    pub document_content: Vec<DocumentSection>,

    #[serde(default)]
    pub signer_name: String,

    #[serde(default)]
    pub signer_email: String,

    #[serde(default)]
    pub device_id: String,

    #[serde(default)]
    pub callback_url: String,
}

impl NewDocument {
    /// Signer name, email, device id and callback URL must all be present.
    pub fn has_required_fields(&self) -> bool {
        [
            &self.signer_name,
            &self.signer_email,
            &self.device_id,
            &self.callback_url,
        ]
        .iter()
        .all(|field| !field.is_empty())
    }

    /// Materialise the document under the given id, in the `pending` state.
    pub fn into_document(self, id: String) -> Document {
        Document {
            id,
            title: self.document_title,
            sections: self.document_content,
            signer_name: self.signer_name,
            signer_email: self.signer_email,
            device_id: self.device_id,
            callback_url: self.callback_url,
            status: DocumentStatus::Pending,
        }
    }
}

/// A signer's answer to one consent section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsentAnswer {
    pub consent_type: String,

    pub granted: bool,

    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl ConsentAnswer {
    pub fn new(consent_type: impl Into<String>, granted: bool, timestamp: OffsetDateTime) -> Self {
        Self {
            consent_type: consent_type.into(),
            granted,
            timestamp,
        }
    }
}

/// Body POSTed to a document's callback URL once signing completes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallbackPayload {
    pub request_id: String,

    pub status: DocumentStatus,

    pub signer_name: String,

    pub signer_email: String,

    pub signature_data: String,

    pub consents: Vec<ConsentAnswer>,

    #[serde(with = "time::serde::rfc3339")]
    pub completed_at: OffsetDateTime,
}

impl CallbackPayload {
    /// Build the payload for a completed document.
    ///
    /// `status` is always `completed`, whatever the status carried by the
    /// snapshot of `document` that was read before the update.
    pub fn build(
        document: &Document,
        signature_data: &str,
        consents: &[ConsentAnswer],
        now: OffsetDateTime,
    ) -> Self {
        Self {
            request_id: document.id.clone(),
            status: DocumentStatus::Completed,
            signer_name: document.signer_name.clone(),
            signer_email: document.signer_email.clone(),
            signature_data: signature_data.to_string(),
            consents: consents.to_vec(),
            completed_at: now,
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
