//! # Identifier Newtypes
//!
//! Each row kind the engine touches gets its own UUID newtype. Mixing them up
//! is a compile error rather than a foreign-key surprise at runtime.
//!
//! Parsing from text goes through [`std::str::FromStr`] and fails with
//! [`ValidationError::MalformedId`], which is how request validation rejects
//! malformed references before any write begins.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

macro_rules! uuid_newtype {
    ($(#[$meta:meta])* $name:ident, $prefix:literal, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Parse a textual reference, naming the offending field on failure.
            pub fn parse(value: &str) -> Result<Self, ValidationError> {
                Uuid::parse_str(value.trim())
                    .map(Self)
                    .map_err(|_| ValidationError::MalformedId {
                        field: $field,
                        value: value.to_string(),
                    })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

uuid_newtype!(
    /// Unique identifier for an issued document.
    DocumentId,
    "document",
    "document"
);

uuid_newtype!(
    /// Reference to a template owned by the template master data.
    TemplateId,
    "template",
    "templateId"
);

uuid_newtype!(
    /// Unique identifier for a number sequence row.
    SequenceId,
    "sequence",
    "sequence"
);

uuid_newtype!(
    /// Reference to a signer in the signer master data.
    SignerId,
    "signer",
    "signerId"
);

uuid_newtype!(
    /// Unique identifier for one roster row (a signer attached to a document).
    DocumentSignerId,
    "document-signer",
    "documentSigner"
);
