//! # Request Types and Validation
//!
//! Wire shapes for create and update, decoded with `serde` and validated in
//! full before the service opens a transaction. Every failure here is an
//! `InvalidInput` with zero side effects.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use docflow_core::{
    DocumentId, Patch, Payload, SequenceCode, SignerId, TemplateId, ValidationError,
};
use docflow_state::{validate_signer_refs, DocumentPatch, DocumentStatus, SignerStatus};

fn decode<'a, T: Deserialize<'a>>(raw: &'a str) -> Result<T, ValidationError> {
    serde_json::from_str(raw).map_err(|e| ValidationError::MalformedRequest(e.to_string()))
}

fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(trimmed.to_string())
}

// ─── Create ──────────────────────────────────────────────────────────

/// Input to [`crate::DocumentService::create_document`].
///
/// ```json
/// { "templateId": "…", "sequenceCode": "DOC", "title": "…",
///   "payload": {}, "signerIds": ["…"], "status": "issued" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateDocumentRequest {
    /// Template reference (UUID).
    pub template_id: String,
    /// Code of the sequence to draw the number from.
    pub sequence_code: String,
    /// Document title.
    pub title: String,
    /// JSON object; absent or `null` means `{}`.
    pub payload: Option<Value>,
    /// Signer references (UUIDs), in roster order.
    pub signer_ids: Vec<String>,
    /// Initial status; absent means `issued`.
    pub status: Option<String>,
}

/// A create request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidCreate {
    /// Template the document is issued from.
    pub template_id: TemplateId,
    /// Sequence the number is drawn from.
    pub sequence_code: SequenceCode,
    /// Trimmed, non-empty title.
    pub title: String,
    /// Payload object, `{}` when none was given.
    pub payload: Payload,
    /// Distinct signers in roster order; never empty.
    pub signer_ids: Vec<SignerId>,
    /// Initial status.
    pub status: DocumentStatus,
}

impl CreateDocumentRequest {
    /// Decode a JSON request body.
    pub fn from_json(raw: &str) -> Result<Self, ValidationError> {
        decode(raw)
    }

    /// Check every field. Nothing is looked up in storage here.
    pub fn validate(&self) -> Result<ValidCreate, ValidationError> {
        let template_id = TemplateId::parse(&self.template_id)?;
        let sequence_code = SequenceCode::new(&self.sequence_code)?;
        let title = required("title", &self.title)?;
        let payload = match &self.payload {
            Some(value) => Payload::from_value(value.clone())?,
            None => Payload::empty(),
        };
        let signer_ids = self
            .signer_ids
            .iter()
            .map(|raw| SignerId::parse(raw))
            .collect::<Result<Vec<_>, _>>()?;
        validate_signer_refs(&signer_ids)?;
        let status = match &self.status {
            Some(raw) => raw.parse()?,
            None => DocumentStatus::default(),
        };

        Ok(ValidCreate {
            template_id,
            sequence_code,
            title,
            payload,
            signer_ids,
            status,
        })
    }
}

// ─── Update ──────────────────────────────────────────────────────────

/// One entry of `signerStatuses`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerStatusPatch {
    /// Signer reference (UUID).
    pub signer_id: String,
    /// Requested signer status.
    pub status: String,
}

/// Input to [`crate::DocumentService::update_document`].
///
/// Each document field is a [`Patch`]: absent keeps the stored value,
/// `null` clears it where that is allowed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDocumentRequest {
    /// New title; cannot be cleared.
    #[serde(default)]
    pub title: Patch<String>,
    /// New document status; cannot be cleared.
    #[serde(default)]
    pub status: Patch<String>,
    /// New payload object; `null` resets it to `{}`.
    #[serde(default)]
    pub payload: Patch<Value>,
    /// Per-signer status changes, all applied or none.
    #[serde(default)]
    pub signer_statuses: Vec<SignerStatusPatch>,
}

/// An update request that passed validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidUpdate {
    /// Document field changes.
    pub document: DocumentPatch,
    /// Signer status changes, applied in order.
    pub signers: Vec<(SignerId, SignerStatus)>,
}

impl ValidUpdate {
    /// Whether the update changes nothing.
    pub fn is_empty(&self) -> bool {
        self.document.is_empty() && self.signers.is_empty()
    }
}

impl UpdateDocumentRequest {
    /// Decode a JSON request body.
    pub fn from_json(raw: &str) -> Result<Self, ValidationError> {
        decode(raw)
    }

    /// Check every field. Nothing is looked up in storage here.
    pub fn validate(&self) -> Result<ValidUpdate, ValidationError> {
        let title = match &self.title {
            Patch::Keep => None,
            Patch::Clear => return Err(ValidationError::NotClearable("title")),
            Patch::Set(raw) => Some(required("title", raw)?),
        };
        let status = match &self.status {
            Patch::Keep => None,
            Patch::Clear => return Err(ValidationError::NotClearable("status")),
            Patch::Set(raw) => Some(raw.parse::<DocumentStatus>()?),
        };
        let payload = match &self.payload {
            Patch::Keep => None,
            Patch::Clear => Some(Payload::empty()),
            Patch::Set(value) => Some(Payload::from_value(value.clone())?),
        };

        let mut signers: Vec<(SignerId, SignerStatus)> =
            Vec::with_capacity(self.signer_statuses.len());
        for entry in &self.signer_statuses {
            let signer_id = SignerId::parse(&entry.signer_id)?;
            let status = entry.status.parse::<SignerStatus>()?;
            if signers.iter().any(|(seen, _)| *seen == signer_id) {
                return Err(ValidationError::DuplicateSigner(signer_id));
            }
            signers.push((signer_id, status));
        }

        Ok(ValidUpdate {
            document: DocumentPatch {
                title,
                payload,
                status,
            },
            signers,
        })
    }
}

/// Parse a document reference, e.g. from a path segment or CLI argument.
pub fn parse_document_id(raw: &str) -> Result<DocumentId, ValidationError> {
    DocumentId::parse(raw)
}
