//! # Sequence Codes and Number Formatting
//!
//! A number sequence is a named counter. Its code is the lookup key callers
//! pass at document creation; its prefix and padding decide how the counter
//! value is rendered into the human-readable document number:
//!
//! ```text
//! <prefix><counter zero-padded to width = padding>
//! "DT-" + 4 + 1  ──▶  "DT-0001"
//! ```
//!
//! A counter wider than the padding is rendered in full, never truncated.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Widest zero-padding a sequence may declare.
pub const MAX_PADDING: u32 = 32;

/// The unique lookup key of a number sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SequenceCode(String);

impl SequenceCode {
    /// Build a code, trimming surrounding whitespace.
    pub fn new(code: impl AsRef<str>) -> Result<Self, ValidationError> {
        let trimmed = code.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyField("sequenceCode"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The code as stored.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SequenceCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SequenceCode> for String {
    fn from(code: SequenceCode) -> Self {
        code.0
    }
}

impl std::fmt::Display for SequenceCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a sequence renders its counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberFormat {
    prefix: String,
    padding: u32,
}

impl NumberFormat {
    /// Build a format. The prefix may be empty.
    pub fn new(prefix: impl Into<String>, padding: i64) -> Result<Self, ValidationError> {
        let padding = u32::try_from(padding)
            .ok()
            .filter(|p| *p <= MAX_PADDING)
            .ok_or(ValidationError::InvalidPadding(padding))?;
        Ok(Self {
            prefix: prefix.into(),
            padding,
        })
    }

    /// The literal prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The zero-padding width.
    pub fn padding(&self) -> u32 {
        self.padding
    }

    /// Render a counter value.
    pub fn render(&self, value: u64) -> String {
        format!(
            "{prefix}{value:0width$}",
            prefix = self.prefix,
            width = self.padding as usize
        )
    }
}
