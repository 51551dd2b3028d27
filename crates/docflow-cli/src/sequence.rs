//! # Sequence Subcommand
//!
//! - `register` — seed a new number sequence at 0.
//! - `show` — print a sequence's format and current value.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::{json, Value};

use docflow_engine::DocumentService;
use docflow_store::{DocumentStore, SequenceRecord};

/// Arguments for `docflow sequence`.
#[derive(Args, Debug)]
pub struct SequenceArgs {
    #[command(subcommand)]
    pub command: SequenceCommand,
}

/// Sequence subcommands.
#[derive(Subcommand, Debug)]
pub enum SequenceCommand {
    /// Register a number sequence.
    Register {
        /// Unique sequence code (e.g. "DOC").
        code: String,
        /// Literal prefix of every number.
        #[arg(long, default_value = "")]
        prefix: String,
        /// Zero-padding width of the counter (0..=32).
        #[arg(long, default_value_t = 4, allow_negative_numbers = true)]
        padding: i64,
    },

    /// Show a sequence.
    Show {
        /// Sequence code.
        code: String,
    },
}

fn sequence_json(record: &SequenceRecord) -> Value {
    json!({
        "id": record.id,
        "code": record.code,
        "prefix": record.format.prefix(),
        "padding": record.format.padding(),
        "currentValue": record.current_value,
        "nextNumber": record.current_value.checked_add(1).map(|n| record.format.render(n)),
    })
}

/// Execute the sequence subcommand.
pub async fn run_sequence<S: DocumentStore>(
    args: &SequenceArgs,
    service: &DocumentService<S>,
) -> Result<Value> {
    let record = match &args.command {
        SequenceCommand::Register {
            code,
            prefix,
            padding,
        } => service.register_sequence(code, prefix, *padding).await?,
        SequenceCommand::Show { code } => service.sequence(code).await?,
    };
    Ok(sequence_json(&record))
}
