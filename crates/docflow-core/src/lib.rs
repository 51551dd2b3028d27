//! # docflow-core — Foundational Types
//!
//! The leaf crate of the docflow workspace. Every other crate depends on it;
//! it depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `DocumentId`, `TemplateId`,
//!    `SequenceId`, `SignerId`, `DocumentSignerId` are distinct types, so a
//!    signer reference can never be passed where a document is expected.
//!
//! 2. **Validated constructors.** `SequenceCode`, `NumberFormat` and
//!    `Payload` can only be built through constructors that reject input the
//!    engine would otherwise have to re-check at every use site.
//!
//! 3. **Explicit sparse patches.** [`Patch`] distinguishes an absent field
//!    from an explicit `null` from a new value. No null-as-sentinel.
//!
//! 4. **Tagged error kinds.** [`DocflowError`] is one enum that callers match
//!    exhaustively; [`ErrorKind`] collapses it for transport mapping.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `docflow-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod identity;
pub mod patch;
pub mod payload;
pub mod sequence;
pub mod temporal;

pub use error::{DocflowError, ErrorKind, Missing, ValidationError};
pub use identity::{DocumentId, DocumentSignerId, SequenceId, SignerId, TemplateId};
pub use patch::Patch;
pub use payload::Payload;
pub use sequence::{NumberFormat, SequenceCode, MAX_PADDING};
pub use temporal::Timestamp;
