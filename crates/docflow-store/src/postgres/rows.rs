//! Row types for the Postgres backend.
//!
//! Each row is read with `query_as` and converted into its domain record.
//! A stored value the domain types reject (unknown status, negative
//! counter, non-object payload) is reported as `StoreError::Corrupt`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use docflow_core::{
    DocumentId, DocumentSignerId, NumberFormat, Payload, SequenceCode, SequenceId, SignerId,
    TemplateId, Timestamp,
};
use docflow_state::{
    Document, DocumentSigner, DocumentStatus, SignerProfile, SignerStatus, StatusTimestamps,
};

use crate::error::StoreError;
use crate::SequenceRecord;

pub(super) const SEQUENCE_COLUMNS: &str = "id, code, prefix, padding, current_value";

pub(super) const DOCUMENT_COLUMNS: &str = "id, template_id, sequence_id, number, title, status, \
     payload, issued_at, signed_at, archived_at, created_at, updated_at";

pub(super) const SIGNER_COLUMNS: &str =
    "id, document_id, signer_id, full_name, email, status, order_no, signed_at";

fn corrupt(table: &str, id: Uuid, detail: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("{table} {id}: {detail}"))
}

fn ts(dt: DateTime<Utc>) -> Timestamp {
    Timestamp::from_utc(dt)
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct SequenceRow {
    id: Uuid,
    code: String,
    prefix: String,
    padding: i32,
    current_value: i64,
}

impl SequenceRow {
    pub(super) fn into_record(self) -> Result<SequenceRecord, StoreError> {
        let code = SequenceCode::new(&self.code)
            .map_err(|e| corrupt("number_sequences", self.id, e))?;
        let format = NumberFormat::new(self.prefix, i64::from(self.padding))
            .map_err(|e| corrupt("number_sequences", self.id, e))?;
        let current_value = u64::try_from(self.current_value).map_err(|_| {
            corrupt(
                "number_sequences",
                self.id,
                format_args!("negative current_value {}", self.current_value),
            )
        })?;
        Ok(SequenceRecord {
            id: SequenceId::from_uuid(self.id),
            code,
            format,
            current_value,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct DocumentRow {
    id: Uuid,
    template_id: Uuid,
    sequence_id: Uuid,
    number: String,
    title: String,
    status: String,
    payload: serde_json::Value,
    issued_at: Option<DateTime<Utc>>,
    signed_at: Option<DateTime<Utc>>,
    archived_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DocumentRow {
    pub(super) fn into_document(self) -> Result<Document, StoreError> {
        let status: DocumentStatus = self
            .status
            .parse()
            .map_err(|e| corrupt("documents", self.id, e))?;
        let payload =
            Payload::from_value(self.payload).map_err(|e| corrupt("documents", self.id, e))?;
        Ok(Document {
            id: DocumentId::from_uuid(self.id),
            template_id: TemplateId::from_uuid(self.template_id),
            sequence_id: SequenceId::from_uuid(self.sequence_id),
            number: self.number,
            title: self.title,
            status,
            payload,
            timestamps: StatusTimestamps {
                issued_at: self.issued_at.map(ts),
                signed_at: self.signed_at.map(ts),
                archived_at: self.archived_at.map(ts),
            },
            created_at: ts(self.created_at),
            updated_at: ts(self.updated_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct SignerRow {
    id: Uuid,
    document_id: Uuid,
    signer_id: Uuid,
    full_name: String,
    email: String,
    status: String,
    order_no: i32,
    signed_at: Option<DateTime<Utc>>,
}

impl SignerRow {
    pub(super) fn into_signer(self) -> Result<DocumentSigner, StoreError> {
        let status: SignerStatus = self
            .status
            .parse()
            .map_err(|e| corrupt("document_signers", self.id, e))?;
        let order_no = u32::try_from(self.order_no).map_err(|_| {
            corrupt(
                "document_signers",
                self.id,
                format_args!("order_no {}", self.order_no),
            )
        })?;
        Ok(DocumentSigner {
            id: DocumentSignerId::from_uuid(self.id),
            document_id: DocumentId::from_uuid(self.document_id),
            signer_id: SignerId::from_uuid(self.signer_id),
            full_name: self.full_name,
            email: self.email,
            status,
            order_no,
            signed_at: self.signed_at.map(ts),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct ProfileRow {
    id: Uuid,
    full_name: String,
    email: String,
}

impl From<ProfileRow> for SignerProfile {
    fn from(row: ProfileRow) -> Self {
        Self {
            signer_id: SignerId::from_uuid(row.id),
            full_name: row.full_name,
            email: row.email,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document_row(status: &str, payload: serde_json::Value) -> DocumentRow {
        let now = Utc::now();
        DocumentRow {
            id: Uuid::new_v4(),
            template_id: Uuid::new_v4(),
            sequence_id: Uuid::new_v4(),
            number: "DT-0001".into(),
            title: "Delivery note".into(),
            status: status.into(),
            payload,
            issued_at: Some(now),
            signed_at: None,
            archived_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn document_row_converts() {
        let doc = document_row("issued", serde_json::json!({"k": 1}))
            .into_document()
            .unwrap();
        assert_eq!(doc.status, DocumentStatus::Issued);
        assert!(doc.timestamps.issued_at.is_some());
        assert_eq!(doc.payload.as_map().len(), 1);
    }

    #[test]
    fn unknown_status_is_corrupt() {
        let err = document_row("shredded", serde_json::json!({}))
            .into_document()
            .unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[test]
    fn array_payload_is_corrupt() {
        let err = document_row("draft", serde_json::json!([1, 2]))
            .into_document()
            .unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[test]
    fn negative_counter_is_corrupt() {
        let row = SequenceRow {
            id: Uuid::new_v4(),
            code: "DOC".into(),
            prefix: "D-".into(),
            padding: 4,
            current_value: -1,
        };
        assert!(matches!(row.into_record(), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn signer_row_converts() {
        let row = SignerRow {
            id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            signer_id: Uuid::new_v4(),
            full_name: "Alice".into(),
            email: "alice@example.com".into(),
            status: "declined".into(),
            order_no: 2,
            signed_at: None,
        };
        let signer = row.into_signer().unwrap();
        assert_eq!(signer.status, SignerStatus::Declined);
        assert_eq!(signer.order_no, 2);
    }
}
