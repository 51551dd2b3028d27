//! # docflow-engine — Document Issuance and Signature Lifecycle
//!
//! The transactional orchestrator. [`DocumentService`] is the only caller
//! of the sequence allocator, the document lifecycle and the signer roster
//! for a request, and runs each create or update as one store transaction.
//!
//! ## Operations
//!
//! | operation | transaction | errors |
//! |-----------|-------------|--------|
//! | `create_document` | allocate number, insert document, insert roster, read back | `InvalidInput`, `NotFound` (template, sequence, signer) |
//! | `update_document` | lease document, patch fields/status, patch signers, read back | `InvalidInput`, `NotFound`, `NotLinked` |
//! | `update_signer_status` | as `update_document` with one signer patch | `InvalidInput`, `NotFound`, `NotLinked` |
//! | `get_document` / `list_documents` | committed read | `NotFound` |
//! | `register_sequence` / `register_template` / `register_signer` | single write | `InvalidInput`, `AlreadyExists` |
//!
//! Callers observe either the state before an operation or the state after
//! all of it, never anything in between.
//!
//! ## Example
//!
//! ```no_run
//! # async fn demo() -> Result<(), docflow_core::DocflowError> {
//! use docflow_engine::{CreateDocumentRequest, DocumentService};
//! use docflow_store::MemoryDocumentStore;
//!
//! let service = DocumentService::new(MemoryDocumentStore::new());
//! service.register_sequence("DOC", "DT-", 4).await?;
//! let created = service
//!     .create_document(&CreateDocumentRequest::from_json(r#"{ "…": "…" }"#)?)
//!     .await?;
//! println!("{}", created.document.number);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod request;
pub mod service;

pub use config::{ConfigError, DocflowConfig};
pub use request::{
    parse_document_id, CreateDocumentRequest, SignerStatusPatch, UpdateDocumentRequest,
    ValidCreate, ValidUpdate,
};
pub use service::{DocumentService, ServicePolicy, MAX_PAGE_SIZE};

pub use docflow_store::DocumentAggregate;
