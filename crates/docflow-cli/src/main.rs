//! # docflow CLI entry point
//!
//! Parses command-line arguments, connects to Postgres and dispatches to
//! the subcommand handlers.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use docflow_cli::document::{run_document, DocumentArgs};
use docflow_cli::registry::{run_signer, run_template, SignerArgs, TemplateArgs};
use docflow_cli::sequence::{run_sequence, SequenceArgs};
use docflow_engine::{DocflowConfig, DocumentService};
use docflow_store::PgDocumentStore;

/// Document issuance and signature lifecycle engine.
///
/// Mints document numbers from named sequences, creates documents with an
/// ordered signer roster, and applies document and signer status changes
/// atomically.
#[derive(Parser, Debug)]
#[command(name = "docflow", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Postgres URL. Overrides DATABASE_URL.
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply the embedded database migrations.
    Migrate,

    /// Register and inspect number sequences.
    Sequence(SequenceArgs),

    /// Template master data.
    Template(TemplateArgs),

    /// Signer master data.
    Signer(SignerArgs),

    /// Create, update and read documents.
    Document(DocumentArgs),
}

fn init_tracing(verbose: u8, json: bool) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> Result<Option<serde_json::Value>> {
    let config = DocflowConfig::from_env()?;
    tracing::debug!(?config, "loaded configuration");

    let url = cli
        .database_url
        .or_else(|| config.database_url.clone())
        .context("no database configured: pass --database-url or set DATABASE_URL")?;
    let store = PgDocumentStore::connect(&config.pg_options(url))
        .await
        .context("failed to connect to PostgreSQL")?;

    let service = DocumentService::with_policy(store, config.policy());
    let value = match &cli.command {
        Commands::Migrate => {
            service.store().migrate().await?;
            return Ok(None);
        }
        Commands::Sequence(args) => run_sequence(args, &service).await?,
        Commands::Template(args) => run_template(args, &service).await?,
        Commands::Signer(args) => run_signer(args, &service).await?,
        Commands::Document(args) => run_document(args, &service).await?,
    };
    Ok(Some(value))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match run(cli).await {
        Ok(Some(value)) => match docflow_cli::render(&value) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!("{e:#}");
                ExitCode::from(1)
            }
        },
        Ok(None) => {
            println!("OK");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(docflow_cli::exit_code(&e))
        }
    }
}
