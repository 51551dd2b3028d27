//! # Document Subcommand
//!
//! - `create` — mint a number and create a document with its roster.
//! - `update` — sparse update of title, status, payload and signer statuses.
//! - `show` — print the aggregate.
//! - `list` — newest documents first.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::Value;

use docflow_core::{DocflowError, Patch, Payload, ValidationError};
use docflow_engine::{
    parse_document_id, CreateDocumentRequest, DocumentService, SignerStatusPatch,
    UpdateDocumentRequest,
};
use docflow_store::DocumentStore;

/// Arguments for `docflow document`.
#[derive(Args, Debug)]
pub struct DocumentArgs {
    #[command(subcommand)]
    pub command: DocumentCommand,
}

/// Document subcommands.
#[derive(Subcommand, Debug)]
pub enum DocumentCommand {
    /// Create a document.
    Create {
        /// Template UUID.
        #[arg(long)]
        template: String,
        /// Sequence code to draw the number from.
        #[arg(long)]
        sequence: String,
        /// Document title.
        #[arg(long)]
        title: String,
        /// Payload as a JSON object.
        #[arg(long)]
        payload: Option<String>,
        /// Signer UUID; repeat in roster order.
        #[arg(long = "signer", required = true)]
        signers: Vec<String>,
        /// Initial status (draft, issued, signed, archived).
        #[arg(long)]
        status: Option<String>,
    },

    /// Update a document.
    Update {
        /// Document UUID.
        id: String,
        /// New title.
        #[arg(long)]
        title: Option<String>,
        /// New status.
        #[arg(long)]
        status: Option<String>,
        /// New payload as a JSON object.
        #[arg(long, conflicts_with = "clear_payload")]
        payload: Option<String>,
        /// Reset the payload to `{}`.
        #[arg(long)]
        clear_payload: bool,
        /// Signer status change as SIGNER_ID=STATUS; repeatable.
        #[arg(long = "signer-status")]
        signer_statuses: Vec<String>,
    },

    /// Show a document with its roster.
    Show {
        /// Document UUID.
        id: String,
    },

    /// List documents, newest first.
    List {
        /// Page size (1..=500).
        #[arg(long, default_value_t = 50)]
        limit: u32,
        /// Rows to skip.
        #[arg(long, default_value_t = 0)]
        offset: u64,
    },
}

fn payload_value(raw: &str) -> Result<Value> {
    Ok(Payload::parse(raw).map_err(DocflowError::from)?.to_value())
}

fn signer_status(raw: &str) -> Result<SignerStatusPatch> {
    let Some((signer_id, status)) = raw.split_once('=') else {
        let reason = format!("expected SIGNER_ID=STATUS, got {raw:?}");
        return Err(DocflowError::from(ValidationError::MalformedRequest(reason)).into());
    };
    Ok(SignerStatusPatch {
        signer_id: signer_id.trim().to_string(),
        status: status.trim().to_string(),
    })
}

/// Execute the document subcommand.
pub async fn run_document<S: DocumentStore>(
    args: &DocumentArgs,
    service: &DocumentService<S>,
) -> Result<Value> {
    match &args.command {
        DocumentCommand::Create {
            template,
            sequence,
            title,
            payload,
            signers,
            status,
        } => {
            let request = CreateDocumentRequest {
                template_id: template.clone(),
                sequence_code: sequence.clone(),
                title: title.clone(),
                payload: payload.as_deref().map(payload_value).transpose()?,
                signer_ids: signers.clone(),
                status: status.clone(),
            };
            let created = service.create_document(&request).await?;
            Ok(serde_json::to_value(&created)?)
        }

        DocumentCommand::Update {
            id,
            title,
            status,
            payload,
            clear_payload,
            signer_statuses,
        } => {
            let id = parse_document_id(id).map_err(DocflowError::from)?;
            let payload = match (payload, clear_payload) {
                (_, true) => Patch::Clear,
                (Some(raw), false) => Patch::Set(payload_value(raw)?),
                (None, false) => Patch::Keep,
            };
            let request = UpdateDocumentRequest {
                title: title.clone().map_or(Patch::Keep, Patch::Set),
                status: status.clone().map_or(Patch::Keep, Patch::Set),
                payload,
                signer_statuses: signer_statuses
                    .iter()
                    .map(|raw| signer_status(raw))
                    .collect::<Result<_>>()?,
            };
            let updated = service.update_document(id, &request).await?;
            Ok(serde_json::to_value(&updated)?)
        }

        DocumentCommand::Show { id } => {
            let id = parse_document_id(id).map_err(DocflowError::from)?;
            Ok(serde_json::to_value(service.get_document(id).await?)?)
        }

        DocumentCommand::List { limit, offset } => {
            let documents = service.list_documents(*limit, *offset).await?;
            Ok(serde_json::to_value(documents)?)
        }
    }
}
