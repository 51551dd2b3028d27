//! # Template and Signer Subcommands
//!
//! Master-data fixtures for the external template and signer
//! collaborators. Both are upserts keyed by id; an id is generated when
//! none is given.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::{json, Value};

use docflow_core::{DocflowError, SignerId, TemplateId};
use docflow_engine::DocumentService;
use docflow_state::SignerProfile;
use docflow_store::DocumentStore;

/// Arguments for `docflow template`.
#[derive(Args, Debug)]
pub struct TemplateArgs {
    #[command(subcommand)]
    pub command: TemplateCommand,
}

/// Template subcommands.
#[derive(Subcommand, Debug)]
pub enum TemplateCommand {
    /// Insert or rename a template.
    Add {
        /// Template UUID; generated if omitted.
        #[arg(long)]
        id: Option<String>,
        /// Display name.
        #[arg(long)]
        name: String,
    },
}

/// Arguments for `docflow signer`.
#[derive(Args, Debug)]
pub struct SignerArgs {
    #[command(subcommand)]
    pub command: SignerCommand,
}

/// Signer subcommands.
#[derive(Subcommand, Debug)]
pub enum SignerCommand {
    /// Insert or update a signer.
    Add {
        /// Signer UUID; generated if omitted.
        #[arg(long)]
        id: Option<String>,
        /// Full name.
        #[arg(long)]
        full_name: String,
        /// Email address.
        #[arg(long)]
        email: String,
    },
}

/// Execute the template subcommand.
pub async fn run_template<S: DocumentStore>(
    args: &TemplateArgs,
    service: &DocumentService<S>,
) -> Result<Value> {
    match &args.command {
        TemplateCommand::Add { id, name } => {
            let id = match id {
                Some(raw) => TemplateId::parse(raw).map_err(DocflowError::from)?,
                None => TemplateId::new(),
            };
            service.register_template(id, name).await?;
            Ok(json!({ "id": id, "name": name.trim() }))
        }
    }
}

/// Execute the signer subcommand.
pub async fn run_signer<S: DocumentStore>(
    args: &SignerArgs,
    service: &DocumentService<S>,
) -> Result<Value> {
    match &args.command {
        SignerCommand::Add {
            id,
            full_name,
            email,
        } => {
            let signer_id = match id {
                Some(raw) => SignerId::parse(raw).map_err(DocflowError::from)?,
                None => SignerId::new(),
            };
            let profile = SignerProfile {
                signer_id,
                full_name: full_name.trim().to_string(),
                email: email.trim().to_string(),
            };
            service.register_signer(&profile).await?;
            Ok(serde_json::to_value(&profile)?)
        }
    }
}
