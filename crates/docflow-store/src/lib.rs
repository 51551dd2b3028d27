//! # docflow-store — Transactional Persistence
//!
//! The storage seam of the engine. Everything the orchestrator writes goes
//! through a [`StoreTx`], a scoped transaction obtained from
//! [`DocumentStore::begin`].
//!
//! ## Backends
//!
//! - **Postgres** ([`PgDocumentStore`]) — SQLx over a `PgPool`. Row leases are
//!   `SELECT … FOR UPDATE`; dropping an uncommitted transaction rolls it back.
//! - **In-memory** ([`MemoryDocumentStore`]) — for tests and embedding.
//!   Leases are owned `tokio::sync::Mutex` guards; writes are staged on the
//!   transaction and published atomically at commit.
//!
//! ## Transaction contract
//!
//! - A lease taken by `lock_*` is held until the transaction commits, rolls
//!   back, or is dropped. A second transaction asking for the same lease
//!   waits; it does not fail.
//! - A transaction reads its own staged writes.
//! - Dropping a transaction without `commit()` discards every write it made,
//!   including sequence increments. This is what makes cancellation safe.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod sequence;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use docflow_core::{DocumentId, NumberFormat, SequenceCode, SequenceId, SignerId, TemplateId};
use docflow_state::{Document, DocumentSigner, SignerProfile};

pub use error::StoreError;
pub use memory::{MemoryDocumentStore, MemoryTx};
pub use postgres::{PgDocumentStore, PgStoreOptions, PgStoreTx};
pub use sequence::{Allocation, SequenceAllocator};

// ─── Records ─────────────────────────────────────────────────────────

/// A number sequence row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceRecord {
    /// Row identifier.
    pub id: SequenceId,
    /// Unique lookup key.
    pub code: SequenceCode,
    /// Prefix and padding.
    pub format: NumberFormat,
    /// Last value handed out; 0 before the first allocation.
    pub current_value: u64,
}

/// A document together with its roster, ordered by `order_no`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAggregate {
    /// The document row.
    #[serde(flatten)]
    pub document: Document,
    /// Roster rows, ascending `order_no`.
    pub signers: Vec<DocumentSigner>,
}

impl DocumentAggregate {
    /// Find the roster row for a signer.
    pub fn signer(&self, signer_id: SignerId) -> Option<&DocumentSigner> {
        self.signers.iter().find(|s| s.signer_id == signer_id)
    }
}

// ─── Traits ──────────────────────────────────────────────────────────

/// A persistent store of documents, rosters and number sequences.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Transaction type handed out by [`DocumentStore::begin`].
    type Tx: StoreTx;

    /// Open a transaction.
    async fn begin(&self) -> Result<Self::Tx, StoreError>;

    /// Committed read of one aggregate.
    async fn fetch_aggregate(&self, id: DocumentId)
        -> Result<Option<DocumentAggregate>, StoreError>;

    /// Committed documents, newest first.
    async fn list_documents(&self, limit: u32, offset: u64) -> Result<Vec<Document>, StoreError>;

    /// Committed read of one sequence.
    async fn fetch_sequence(&self, code: &SequenceCode)
        -> Result<Option<SequenceRecord>, StoreError>;

    /// Register a sequence. Fails with `Duplicate` if the code exists.
    async fn register_sequence(&self, sequence: &SequenceRecord) -> Result<(), StoreError>;

    /// Insert or rename a template in the template master data.
    async fn register_template(&self, id: TemplateId, name: &str) -> Result<(), StoreError>;

    /// Insert or update a signer in the signer master data.
    async fn register_signer(&self, profile: &SignerProfile) -> Result<(), StoreError>;
}

/// A scoped transaction. Dropping it without [`StoreTx::commit`] rolls back.
#[async_trait]
pub trait StoreTx: Send {
    /// Take the exclusive lease on a sequence and read it.
    async fn lock_sequence(
        &mut self,
        code: &SequenceCode,
    ) -> Result<Option<SequenceRecord>, StoreError>;

    /// Write a new current value to a sequence this transaction has leased.
    async fn store_sequence_value(
        &mut self,
        code: &SequenceCode,
        value: u64,
    ) -> Result<(), StoreError>;

    /// Whether a template exists in the master data.
    async fn template_exists(&mut self, id: TemplateId) -> Result<bool, StoreError>;

    /// Look up signer profiles, returned in the order requested.
    ///
    /// Fails with `Missing(Signer)` for the first id that does not exist.
    async fn signer_profiles(&mut self, ids: &[SignerId])
        -> Result<Vec<SignerProfile>, StoreError>;

    /// Insert a new document row.
    async fn insert_document(&mut self, document: &Document) -> Result<(), StoreError>;

    /// Take the exclusive lease on a document row and read it.
    async fn lock_document(&mut self, id: DocumentId) -> Result<Option<Document>, StoreError>;

    /// Write back a document row this transaction has leased.
    async fn update_document(&mut self, document: &Document) -> Result<(), StoreError>;

    /// Insert roster rows for a document.
    async fn insert_signers(&mut self, signers: &[DocumentSigner]) -> Result<(), StoreError>;

    /// Take the exclusive lease on one roster row and read it.
    async fn lock_signer_link(
        &mut self,
        document_id: DocumentId,
        signer_id: SignerId,
    ) -> Result<Option<DocumentSigner>, StoreError>;

    /// Write back a roster row this transaction has leased.
    async fn update_signer(&mut self, signer: &DocumentSigner) -> Result<(), StoreError>;

    /// Read an aggregate as this transaction sees it.
    async fn load_aggregate(
        &mut self,
        id: DocumentId,
    ) -> Result<Option<DocumentAggregate>, StoreError>;

    /// Publish every write and release every lease.
    async fn commit(self) -> Result<(), StoreError>;

    /// Discard every write and release every lease.
    async fn rollback(self) -> Result<(), StoreError>;
}
