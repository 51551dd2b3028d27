//! # Sparse Patch Fields
//!
//! A `Patch<T>` is one field of a partial update. It has three states:
//!
//! | wire form          | value          |
//! |--------------------|----------------|
//! | key absent         | `Patch::Keep`  |
//! | `"key": null`      | `Patch::Clear` |
//! | `"key": <value>`   | `Patch::Set`   |
//!
//! Struct fields must be annotated `#[serde(default)]` so an absent key
//! decodes to `Keep`; a present key (including `null`) goes through the
//! `Deserialize` impl below.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One field of a sparse update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    /// Leave the stored value unchanged.
    Keep,
    /// Reset the stored value to its field-specific default.
    Clear,
    /// Replace the stored value.
    Set(T),
}

impl<T> Patch<T> {
    /// Whether the field was sent at all.
    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }

    /// Map the carried value, preserving `Keep`/`Clear`.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Patch<U> {
        match self {
            Self::Keep => Patch::Keep,
            Self::Clear => Patch::Clear,
            Self::Set(v) => Patch::Set(f(v)),
        }
    }

    /// Fallible map, preserving `Keep`/`Clear`.
    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<Patch<U>, E> {
        Ok(match self {
            Self::Keep => Patch::Keep,
            Self::Clear => Patch::Clear,
            Self::Set(v) => Patch::Set(f(v)?),
        })
    }
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Self::Keep
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Set(v),
            None => Self::Clear,
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Self::from)
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Set(v) => serializer.serialize_some(v),
            Self::Keep | Self::Clear => serializer.serialize_none(),
        }
    }
}
