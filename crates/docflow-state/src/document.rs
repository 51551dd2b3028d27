//! # Document Lifecycle State Machine
//!
//! ## States
//!
//! ```text
//! draft ◀──▶ issued ◀──▶ signed ◀──▶ archived     (plus every other pair)
//! ```
//!
//! Every state is reachable from every other, including itself. There is no
//! terminal state; `archived` can be left by a further explicit transition.
//!
//! ## Timestamp side effects
//!
//! | requested | issued_at               | signed_at | archived_at |
//! |-----------|-------------------------|-----------|-------------|
//! | draft     | cleared                 | cleared   | cleared     |
//! | issued    | set to now if unset     | cleared   | cleared     |
//! | signed    | untouched               | now       | cleared     |
//! | archived  | untouched               | untouched | now         |
//!
//! Creation applies the requested initial status to empty timestamps, as
//! if transitioning from no prior state.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use docflow_core::{
    DocumentId, Payload, SequenceId, TemplateId, Timestamp, ValidationError,
};

// ─── Document Status ─────────────────────────────────────────────────

/// Lifecycle status of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Being prepared; carries no status timestamps.
    Draft,
    /// Issued to its signers. The default initial status.
    #[default]
    Issued,
    /// Signed.
    Signed,
    /// Archived.
    Archived,
}

impl DocumentStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [DocumentStatus; 4] = [Self::Draft, Self::Issued, Self::Signed, Self::Archived];

    const EXPECTED: &'static str = "draft, issued, signed, archived";

    /// The wire and storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Issued => "issued",
            Self::Signed => "signed",
            Self::Archived => "archived",
        }
    }
}

impl FromStr for DocumentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "issued" => Ok(Self::Issued),
            "signed" => Ok(Self::Signed),
            "archived" => Ok(Self::Archived),
            other => Err(ValidationError::InvalidStatus {
                field: "document",
                value: other.to_string(),
                expected: Self::EXPECTED,
            }),
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Status Timestamps ───────────────────────────────────────────────

/// The three timestamps derived from a document's status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTimestamps {
    /// When the document was (first) issued.
    pub issued_at: Option<Timestamp>,
    /// When the document was signed.
    pub signed_at: Option<Timestamp>,
    /// When the document was archived.
    pub archived_at: Option<Timestamp>,
}

impl StatusTimestamps {
    /// Timestamps for a freshly created document in `status`.
    pub fn initial(status: DocumentStatus, now: Timestamp) -> Self {
        let mut ts = Self::default();
        ts.apply(status, now);
        ts
    }

    /// Rewrite the timestamps for a transition into `to`.
    pub fn apply(&mut self, to: DocumentStatus, now: Timestamp) {
        match to {
            DocumentStatus::Draft => {
                self.issued_at = None;
                self.signed_at = None;
                self.archived_at = None;
            }
            DocumentStatus::Issued => {
                if self.issued_at.is_none() {
                    self.issued_at = Some(now);
                }
                self.signed_at = None;
                self.archived_at = None;
            }
            DocumentStatus::Signed => {
                self.signed_at = Some(now);
                self.archived_at = None;
            }
            DocumentStatus::Archived => {
                self.archived_at = Some(now);
            }
        }
    }
}

/// Record of one status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    /// Status before the transition.
    pub from: DocumentStatus,
    /// Status after the transition.
    pub to: DocumentStatus,
    /// When the transition was applied.
    pub at: Timestamp,
}

// ─── Document ────────────────────────────────────────────────────────

/// Everything needed to mint a document row except what the engine derives.
#[derive(Debug, Clone)]
pub struct NewDocument {
    /// Template the document is rendered from.
    pub template_id: TemplateId,
    /// Sequence that minted `number`.
    pub sequence_id: SequenceId,
    /// The formatted number allocated for this document.
    pub number: String,
    /// Title, already validated non-empty.
    pub title: String,
    /// Payload object.
    pub payload: Payload,
    /// Initial status.
    pub status: DocumentStatus,
}

/// A validated sparse update to a document row.
///
/// `None` leaves a field untouched. An explicitly cleared payload arrives
/// here as `Some(Payload::empty())`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentPatch {
    /// New title.
    pub title: Option<String>,
    /// New payload.
    pub payload: Option<Payload>,
    /// Requested status.
    pub status: Option<DocumentStatus>,
}

impl DocumentPatch {
    /// Whether the patch touches no document field.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.payload.is_none() && self.status.is_none()
    }
}

/// What [`Document::apply_patch`] changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchOutcome {
    /// Whether the row must be written back.
    pub changed: bool,
    /// The status transition, if one was requested.
    pub transition: Option<StatusTransition>,
}

/// A document row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Unique document identifier.
    pub id: DocumentId,
    /// Template reference.
    pub template_id: TemplateId,
    /// Sequence that minted `number`.
    pub sequence_id: SequenceId,
    /// Formatted number, unique within `sequence_id`.
    pub number: String,
    /// Title.
    pub title: String,
    /// Current lifecycle status.
    pub status: DocumentStatus,
    /// Arbitrary JSON object.
    pub payload: Payload,
    /// Status-derived timestamps.
    #[serde(flatten)]
    pub timestamps: StatusTimestamps,
    /// When the row was created.
    pub created_at: Timestamp,
    /// When the row was last written.
    pub updated_at: Timestamp,
}

impl Document {
    /// Build the initial row with the initial status's side effects applied.
    pub fn create(new: NewDocument, now: Timestamp) -> Self {
        Self {
            id: DocumentId::new(),
            template_id: new.template_id,
            sequence_id: new.sequence_id,
            number: new.number,
            title: new.title,
            status: new.status,
            payload: new.payload,
            timestamps: StatusTimestamps::initial(new.status, now),
            created_at: now,
            updated_at: now,
        }
    }

    /// Transition to `to`, rewriting the status timestamps.
    pub fn apply_status(&mut self, to: DocumentStatus, now: Timestamp) -> StatusTransition {
        let from = self.status;
        self.timestamps.apply(to, now);
        self.status = to;
        self.updated_at = now;
        StatusTransition { from, to, at: now }
    }

    /// Apply a sparse update. Only the fields present in `patch` change.
    pub fn apply_patch(&mut self, patch: &DocumentPatch, now: Timestamp) -> PatchOutcome {
        if patch.is_empty() {
            return PatchOutcome {
                changed: false,
                transition: None,
            };
        }
        if let Some(title) = &patch.title {
            self.title.clone_from(title);
        }
        if let Some(payload) = &patch.payload {
            self.payload = payload.clone();
        }
        let transition = patch.status.map(|to| self.apply_status(to, now));
        self.updated_at = now;
        PatchOutcome {
            changed: true,
            transition,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn at(minutes: i64) -> Timestamp {
        Timestamp::from_utc(
            Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes),
        )
    }

    fn make_document(status: DocumentStatus) -> Document {
        Document::create(
            NewDocument {
                template_id: TemplateId::new(),
                sequence_id: SequenceId::new(),
                number: "DT-0001".to_string(),
                title: "Delivery note".to_string(),
                payload: Payload::empty(),
                status,
            },
            at(0),
        )
    }

    // ── Status vocabulary ────────────────────────────────────────────

    #[test]
    fn status_round_trips_through_str() {
        for status in DocumentStatus::ALL {
            assert_eq!(status.as_str().parse::<DocumentStatus>().unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = "ISSUED".parse::<DocumentStatus>().unwrap_err();
        match err {
            ValidationError::InvalidStatus { field, value, .. } => {
                assert_eq!(field, "document");
                assert_eq!(value, "ISSUED");
            }
            other => panic!("expected InvalidStatus, got {other:?}"),
        }
    }

    #[test]
    fn default_initial_status_is_issued() {
        assert_eq!(DocumentStatus::default(), DocumentStatus::Issued);
    }

    // ── Creation ─────────────────────────────────────────────────────

    #[test]
    fn create_draft_has_no_timestamps() {
        let doc = make_document(DocumentStatus::Draft);
        assert_eq!(doc.timestamps, StatusTimestamps::default());
    }

    #[test]
    fn create_issued_sets_only_issued_at() {
        let doc = make_document(DocumentStatus::Issued);
        assert_eq!(doc.timestamps.issued_at, Some(at(0)));
        assert_eq!(doc.timestamps.signed_at, None);
        assert_eq!(doc.timestamps.archived_at, None);
    }

    #[test]
    fn create_signed_leaves_issued_at_unset() {
        let doc = make_document(DocumentStatus::Signed);
        assert_eq!(doc.timestamps.issued_at, None);
        assert_eq!(doc.timestamps.signed_at, Some(at(0)));
    }

    // ── Transitions ──────────────────────────────────────────────────

    #[test]
    fn reissue_keeps_original_issued_at() {
        let mut doc = make_document(DocumentStatus::Issued);
        doc.apply_status(DocumentStatus::Issued, at(5));
        doc.apply_status(DocumentStatus::Issued, at(10));
        assert_eq!(doc.timestamps.issued_at, Some(at(0)));
        assert_eq!(doc.updated_at, at(10));
    }

    #[test]
    fn issued_clears_signed_and_archived() {
        let mut doc = make_document(DocumentStatus::Issued);
        doc.apply_status(DocumentStatus::Signed, at(1));
        doc.apply_status(DocumentStatus::Archived, at(2));
        doc.apply_status(DocumentStatus::Issued, at(3));
        assert_eq!(doc.timestamps.issued_at, Some(at(0)));
        assert_eq!(doc.timestamps.signed_at, None);
        assert_eq!(doc.timestamps.archived_at, None);
    }

    #[test]
    fn archive_keeps_issued_and_signed() {
        let mut doc = make_document(DocumentStatus::Issued);
        doc.apply_status(DocumentStatus::Signed, at(1));
        let t = doc.apply_status(DocumentStatus::Archived, at(2));
        assert_eq!(t.from, DocumentStatus::Signed);
        assert_eq!(t.to, DocumentStatus::Archived);
        assert_eq!(doc.timestamps.issued_at, Some(at(0)));
        assert_eq!(doc.timestamps.signed_at, Some(at(1)));
        assert_eq!(doc.timestamps.archived_at, Some(at(2)));
    }

    #[test]
    fn archived_is_not_terminal() {
        let mut doc = make_document(DocumentStatus::Archived);
        doc.apply_status(DocumentStatus::Draft, at(1));
        assert_eq!(doc.status, DocumentStatus::Draft);
        assert_eq!(doc.timestamps, StatusTimestamps::default());
    }

    #[test]
    fn sign_clears_archived_at() {
        let mut doc = make_document(DocumentStatus::Archived);
        doc.apply_status(DocumentStatus::Signed, at(1));
        assert_eq!(doc.timestamps.archived_at, None);
        assert_eq!(doc.timestamps.signed_at, Some(at(1)));
    }

    // ── Patches ──────────────────────────────────────────────────────

    #[test]
    fn title_and_payload_patch_leaves_timestamps_alone() {
        let mut doc = make_document(DocumentStatus::Issued);
        let before = doc.timestamps;
        let mut payload = serde_json::Map::new();
        payload.insert("k".into(), serde_json::json!(1));
        let outcome = doc.apply_patch(
            &DocumentPatch {
                title: Some("Renamed".into()),
                payload: Some(Payload::from_value(serde_json::Value::Object(payload)).unwrap()),
                status: None,
            },
            at(7),
        );
        assert!(outcome.changed);
        assert!(outcome.transition.is_none());
        assert_eq!(doc.title, "Renamed");
        assert_eq!(doc.timestamps, before);
        assert_eq!(doc.updated_at, at(7));
    }

    #[test]
    fn empty_patch_changes_nothing() {
        let mut doc = make_document(DocumentStatus::Draft);
        let before = doc.clone();
        let outcome = doc.apply_patch(&DocumentPatch::default(), at(3));
        assert!(!outcome.changed);
        assert_eq!(doc, before);
    }

    #[test]
    fn status_patch_reports_transition() {
        let mut doc = make_document(DocumentStatus::Draft);
        let outcome = doc.apply_patch(
            &DocumentPatch {
                status: Some(DocumentStatus::Issued),
                ..DocumentPatch::default()
            },
            at(4),
        );
        let t = outcome.transition.unwrap();
        assert_eq!((t.from, t.to, t.at), (DocumentStatus::Draft, DocumentStatus::Issued, at(4)));
        assert_eq!(doc.timestamps.issued_at, Some(at(4)));
    }

    // ── Serialization ────────────────────────────────────────────────

    #[test]
    fn serializes_flat_camel_case() {
        let doc = make_document(DocumentStatus::Draft);
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["status"], "draft");
        assert!(json.get("issuedAt").is_some());
        assert!(json["issuedAt"].is_null());
        assert_eq!(json["payload"], serde_json::json!({}));
        assert!(json.get("timestamps").is_none());
    }

    // ── Properties ───────────────────────────────────────────────────

    fn any_status() -> impl Strategy<Value = DocumentStatus> {
        prop::sample::select(DocumentStatus::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn timestamps_consistent_with_status_after_any_history(
            initial in any_status(),
            steps in prop::collection::vec(any_status(), 0..16),
        ) {
            let mut doc = make_document(initial);
            for (i, status) in steps.into_iter().enumerate() {
                doc.apply_status(status, at(i as i64 + 1));
            }
            let ts = doc.timestamps;
            match doc.status {
                DocumentStatus::Draft => {
                    prop_assert_eq!(ts, StatusTimestamps::default());
                }
                DocumentStatus::Issued => {
                    prop_assert!(ts.issued_at.is_some());
                    prop_assert!(ts.signed_at.is_none());
                    prop_assert!(ts.archived_at.is_none());
                }
                DocumentStatus::Signed => {
                    prop_assert!(ts.signed_at.is_some());
                    prop_assert!(ts.archived_at.is_none());
                }
                DocumentStatus::Archived => {
                    prop_assert!(ts.archived_at.is_some());
                }
            }
        }
    }
}
