//! # docflow-state — Document and Signer State Machines
//!
//! Pure, I/O-free state machines. Storage and transactions live in
//! `docflow-store`; this crate only decides what a row looks like after a
//! transition.
//!
//! ## State Machines
//!
//! - **Document** (`document.rs`): `draft | issued | signed | archived`, any
//!   state reachable from any other. Each transition rewrites the three
//!   status timestamps according to a fixed side-effect table.
//!
//! - **Signer** (`signer.rs`): `pending | signed | declined` per roster row,
//!   with `signed_at` derived from the status.
//!
//! - **Roster** (`roster.rs`): builds the ordered, immutable-after-creation
//!   list of signers for a new document.
//!
//! ## Design
//!
//! Statuses are closed enums matched exhaustively. Adding a status is a
//! compile error at every transition site until it is handled. Timestamps
//! are never caller-supplied; every function that changes a status takes
//! `now` and derives the timestamps itself.

pub mod document;
pub mod roster;
pub mod signer;

// ─── Document re-exports ────────────────────────────────────────────

pub use document::{
    Document, DocumentPatch, DocumentStatus, NewDocument, PatchOutcome, StatusTimestamps,
    StatusTransition,
};

// ─── Signer re-exports ──────────────────────────────────────────────

pub use signer::{DocumentSigner, SignerStatus, SignerTransition};

// ─── Roster re-exports ──────────────────────────────────────────────

pub use roster::{build_roster, check_contiguous, validate_signer_refs, SignerProfile};
