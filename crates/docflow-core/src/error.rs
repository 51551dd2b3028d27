//! # Error Types
//!
//! Two layers, both derived with `thiserror`:
//!
//! - [`ValidationError`] — every reason an input is rejected before any
//!   write begins. Always surfaces as [`ErrorKind::InvalidInput`].
//! - [`DocflowError`] — the top-level error returned by the engine. Each
//!   variant maps to exactly one [`ErrorKind`].
//!
//! `NotLinked` is kept distinct from `NotFound` so callers can tell a
//! missing document from a signer that was never on its roster, while
//! [`DocflowError::kind`] still reports both as `NotFound`.

use thiserror::Error;

use crate::identity::{DocumentId, SignerId, TemplateId};

/// Closed set of error kinds exposed to transport layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Referenced document, sequence, template, signer or link does not exist.
    NotFound,
    /// Input rejected before any side effect.
    InvalidInput,
    /// Transient contention or a duplicate registration.
    Conflict,
    /// Storage failure unrelated to business rules.
    Internal,
}

impl ErrorKind {
    /// Machine-readable code, e.g. for an error body.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::InvalidInput => "INVALID_INPUT",
            Self::Conflict => "CONFLICT",
            Self::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The resource a `NotFound` error refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    /// No document row with this id.
    Document(DocumentId),
    /// No number sequence registered under this code.
    Sequence(String),
    /// No template with this id in the template master data.
    Template(TemplateId),
    /// No signer with this id in the signer master data.
    Signer(SignerId),
}

impl std::fmt::Display for Missing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Document(id) => write!(f, "{id}"),
            Self::Sequence(code) => write!(f, "sequence:{code}"),
            Self::Template(id) => write!(f, "{id}"),
            Self::Signer(id) => write!(f, "{id}"),
        }
    }
}

/// Top-level error type for the docflow engine.
#[derive(Error, Debug)]
pub enum DocflowError {
    /// A referenced resource does not exist.
    #[error("not found: {0}")]
    NotFound(Missing),

    /// The signer is not on the document's roster.
    #[error("signer {signer_id} is not linked to document {document_id}")]
    NotLinked {
        /// The document whose roster was searched.
        document_id: DocumentId,
        /// The signer that has no roster row on it.
        signer_id: SignerId,
    },

    /// Input failed validation; nothing was written.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    /// A resource with the same unique key is already registered.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Transient lock contention reported by the store.
    ///
    /// The service retries on this and reports `Internal` once its attempts
    /// are exhausted.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The operation did not finish before its deadline and was rolled back.
    #[error("operation deadline exceeded")]
    DeadlineExceeded,

    /// Storage failure unrelated to business rules.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DocflowError {
    /// Collapse this error into its transport-facing kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) | Self::NotLinked { .. } => ErrorKind::NotFound,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::AlreadyExists(_) | Self::Conflict(_) => ErrorKind::Conflict,
            Self::DeadlineExceeded | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether retrying the whole operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Reasons an input is rejected as `InvalidInput`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required string field is empty or whitespace.
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    /// A field that may not be cleared was sent as explicit null.
    #[error("{0} cannot be cleared")]
    NotClearable(&'static str),

    /// A status value outside its enumerated set.
    #[error("invalid {field} status {value:?}; expected one of {expected}")]
    InvalidStatus {
        /// Which vocabulary was violated (`document` or `signer`).
        field: &'static str,
        /// The rejected value.
        value: String,
        /// The accepted values, comma separated.
        expected: &'static str,
    },

    /// An identifier reference that is not a well-formed UUID.
    #[error("malformed {field} reference {value:?}")]
    MalformedId {
        /// Which reference was malformed.
        field: &'static str,
        /// The rejected value.
        value: String,
    },

    /// The request body could not be decoded.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// The payload is not well-formed JSON.
    #[error("payload is not well-formed JSON: {0}")]
    MalformedPayload(String),

    /// The payload is JSON but not an object.
    #[error("payload must be a JSON object, got {0}")]
    PayloadNotObject(&'static str),

    /// A document must carry at least one signer.
    #[error("signer list must not be empty")]
    EmptyRoster,

    /// The same signer appears twice in one roster.
    #[error("signer {0} appears more than once")]
    DuplicateSigner(SignerId),

    /// Roster order numbers are not exactly 1..=N.
    #[error("roster order numbers must be contiguous from 1, got {0:?}")]
    NonContiguousRoster(Vec<u32>),

    /// Zero-padding width outside the supported range.
    #[error("padding {0} outside supported range 0..={max}", max = crate::sequence::MAX_PADDING)]
    InvalidPadding(i64),
}
