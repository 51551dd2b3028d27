//! # Signer Roster Construction
//!
//! A roster is the ordered list of signers attached to a document at
//! creation. Positions are `1..=N` in the order the signer references were
//! given and never change afterwards.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use docflow_core::{DocumentId, DocumentSignerId, SignerId, ValidationError};

use crate::signer::{DocumentSigner, SignerStatus};

/// Master-data snapshot of a signer, copied onto the roster row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerProfile {
    /// Master-data identifier.
    pub signer_id: SignerId,
    /// Display name.
    pub full_name: String,
    /// Contact email.
    pub email: String,
}

/// Reject an empty or duplicate-bearing list of signer references.
pub fn validate_signer_refs(refs: &[SignerId]) -> Result<(), ValidationError> {
    if refs.is_empty() {
        return Err(ValidationError::EmptyRoster);
    }
    let mut seen = HashSet::with_capacity(refs.len());
    for id in refs {
        if !seen.insert(*id) {
            return Err(ValidationError::DuplicateSigner(*id));
        }
    }
    Ok(())
}

/// Check that order numbers are exactly `1..=N` in sequence.
pub fn check_contiguous(order_nos: &[u32]) -> Result<(), ValidationError> {
    let contiguous = !order_nos.is_empty()
        && order_nos
            .iter()
            .enumerate()
            .all(|(i, n)| usize::try_from(*n).ok() == Some(i + 1));
    if contiguous {
        Ok(())
    } else {
        Err(ValidationError::NonContiguousRoster(order_nos.to_vec()))
    }
}

/// Materialize one `pending` roster row per profile, numbered from 1.
pub fn build_roster(
    document_id: DocumentId,
    profiles: Vec<SignerProfile>,
) -> Result<Vec<DocumentSigner>, ValidationError> {
    let refs: Vec<SignerId> = profiles.iter().map(|p| p.signer_id).collect();
    validate_signer_refs(&refs)?;

    let roster: Vec<DocumentSigner> = profiles
        .into_iter()
        .zip(1u32..)
        .map(|(profile, order_no)| DocumentSigner {
            id: DocumentSignerId::new(),
            document_id,
            signer_id: profile.signer_id,
            full_name: profile.full_name,
            email: profile.email,
            status: SignerStatus::Pending,
            order_no,
            signed_at: None,
        })
        .collect();

    let order_nos: Vec<u32> = roster.iter().map(|s| s.order_no).collect();
    check_contiguous(&order_nos)?;
    Ok(roster)
}
