//! # Signer Status
//!
//! Each roster row moves between `pending`, `signed` and `declined`.
//!
//! | requested | signed_at  |
//! |-----------|------------|
//! | pending   | cleared    |
//! | signed    | now        |
//! | declined  | untouched  |
//!
//! `declined` leaves `signed_at` as it was, so a signer moved
//! from `signed` to `declined` keeps the earlier signing time.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use docflow_core::{DocumentId, DocumentSignerId, SignerId, Timestamp, ValidationError};

/// Status of one signer on one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignerStatus {
    /// Not yet acted. Every roster row starts here.
    #[default]
    Pending,
    /// Signed.
    Signed,
    /// Declined to sign.
    Declined,
}

impl SignerStatus {
    /// All statuses.
    pub const ALL: [SignerStatus; 3] = [Self::Pending, Self::Signed, Self::Declined];

    const EXPECTED: &'static str = "pending, signed, declined";

    /// The wire and storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Signed => "signed",
            Self::Declined => "declined",
        }
    }
}

impl FromStr for SignerStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "signed" => Ok(Self::Signed),
            "declined" => Ok(Self::Declined),
            other => Err(ValidationError::InvalidStatus {
                field: "signer",
                value: other.to_string(),
                expected: Self::EXPECTED,
            }),
        }
    }
}

impl std::fmt::Display for SignerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of one signer status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignerTransition {
    /// The signer whose row changed.
    pub signer_id: SignerId,
    /// Status before.
    pub from: SignerStatus,
    /// Status after.
    pub to: SignerStatus,
}

/// One roster row: a signer attached to a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSigner {
    /// Roster row identifier.
    pub id: DocumentSignerId,
    /// Owning document.
    pub document_id: DocumentId,
    /// Reference into the signer master data.
    pub signer_id: SignerId,
    /// Name snapshot taken at document creation.
    pub full_name: String,
    /// Email snapshot taken at document creation.
    pub email: String,
    /// Current status.
    pub status: SignerStatus,
    /// 1-based position, fixed at creation.
    pub order_no: u32,
    /// Set iff the signer has signed (see module docs for `declined`).
    pub signed_at: Option<Timestamp>,
}

impl DocumentSigner {
    /// Move this signer to `to`, rewriting `signed_at`.
    pub fn apply_status(&mut self, to: SignerStatus, now: Timestamp) -> SignerTransition {
        let from = self.status;
        match to {
            SignerStatus::Signed => self.signed_at = Some(now),
            SignerStatus::Pending => self.signed_at = None,
            SignerStatus::Declined => {}
        }
        self.status = to;
        SignerTransition {
            signer_id: self.signer_id,
            from,
            to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn now() -> Timestamp {
        Timestamp::from_utc(Utc.with_ymd_and_hms(2026, 2, 2, 10, 30, 0).unwrap())
    }

    fn pending_signer() -> DocumentSigner {
        DocumentSigner {
            id: DocumentSignerId::new(),
            document_id: DocumentId::new(),
            signer_id: SignerId::new(),
            full_name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
            status: SignerStatus::Pending,
            order_no: 1,
            signed_at: None,
        }
    }

    #[test]
    fn signing_sets_signed_at() {
        let mut s = pending_signer();
        let t = s.apply_status(SignerStatus::Signed, now());
        assert_eq!(t.from, SignerStatus::Pending);
        assert_eq!(t.to, SignerStatus::Signed);
        assert_eq!(s.signed_at, Some(now()));
    }

    #[test]
    fn back_to_pending_clears_signed_at() {
        let mut s = pending_signer();
        s.apply_status(SignerStatus::Signed, now());
        s.apply_status(SignerStatus::Pending, now());
        assert_eq!(s.signed_at, None);
    }

    #[test]
    fn pending_to_declined_has_no_signed_at() {
        let mut s = pending_signer();
        s.apply_status(SignerStatus::Declined, now());
        assert_eq!(s.status, SignerStatus::Declined);
        assert_eq!(s.signed_at, None);
    }

    #[test]
    fn signed_to_declined_keeps_signed_at() {
        let mut s = pending_signer();
        s.apply_status(SignerStatus::Signed, now());
        s.apply_status(SignerStatus::Declined, now());
        assert_eq!(s.signed_at, Some(now()));
    }

    #[test]
    fn status_vocabulary_is_closed() {
        for status in SignerStatus::ALL {
            assert_eq!(status.as_str().parse::<SignerStatus>().unwrap(), status);
        }
        assert!("approved".parse::<SignerStatus>().is_err());
        assert!("".parse::<SignerStatus>().is_err());
    }

    #[test]
    fn serializes_read_shape() {
        let json = serde_json::to_value(pending_signer()).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["orderNo"], 1);
        assert!(json["signedAt"].is_null());
        assert_eq!(json["fullName"], "Ada Lovelace");
    }
}
