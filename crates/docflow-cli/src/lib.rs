//! # docflow-cli — Operator Command-Line Interface
//!
//! Thin clap front end over [`docflow_engine::DocumentService`].
//!
//! ## Subcommands
//!
//! - `migrate` — apply the embedded Postgres migrations
//! - `sequence register|show` — seed and inspect number sequences
//! - `template add`, `signer add` — master-data fixtures
//! - `document create|update|show|list` — the document lifecycle
//!
//! Results are printed to stdout as pretty JSON; logs go to stderr.
//!
//! ## Crate Policy
//!
//! - Argument parsing is separated from the handlers.
//! - Handlers are generic over the store and return JSON values, so they
//!   run unchanged against the in-memory backend in tests.
//! - No business logic here; validation happens in the engine.

pub mod document;
pub mod registry;
pub mod sequence;

use docflow_core::{DocflowError, ErrorKind};

/// Process exit code for a failed command.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<DocflowError>().map(DocflowError::kind) {
        Some(ErrorKind::InvalidInput) => 2,
        Some(ErrorKind::NotFound) => 3,
        Some(ErrorKind::Conflict) => 4,
        Some(ErrorKind::Internal) | None => 1,
    }
}

/// Render a command result for stdout.
pub fn render(value: &serde_json::Value) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
