//! # In-Memory Backend
//!
//! A `DocumentStore` with the same transactional behavior as the Postgres
//! backend, for tests and single-process embedding.
//!
//! ## Leases
//!
//! Every sequence code and every document id has a `tokio::sync::Mutex<()>`
//! in a lease table. `lock_sequence` / `lock_document` / `lock_signer_link`
//! acquire the owned guard and park it on the transaction, so a competing
//! transaction waits (FIFO) until this one commits or is dropped. Roster
//! rows share their document's lease.
//!
//! ## Staging
//!
//! Writes go to per-transaction staging maps and are invisible to other
//! transactions. `commit()` re-checks `(sequence_id, number)` uniqueness and
//! publishes all staged rows under one write lock. Dropping the transaction
//! discards the staging maps and releases the guards. A released lease
//! whose entry has no other holder or waiter is removed from the table, so
//! the table only grows with concurrent transactions.
//!
//! Committed state lives behind `parking_lot` locks that are never held
//! across an `.await`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::OwnedMutexGuard;

use docflow_core::{DocumentId, Missing, SequenceCode, SequenceId, SignerId, TemplateId};
use docflow_state::{Document, DocumentSigner, SignerProfile};

use crate::error::StoreError;
use crate::{DocumentAggregate, DocumentStore, SequenceRecord, StoreTx};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LeaseKey {
    Sequence(SequenceCode),
    Document(DocumentId),
}

#[derive(Debug, Default)]
struct Tables {
    sequences: HashMap<SequenceCode, SequenceRecord>,
    documents: HashMap<DocumentId, DocumentAggregate>,
    numbers: HashSet<(SequenceId, String)>,
}

#[derive(Debug, Default)]
struct MasterData {
    templates: HashMap<TemplateId, String>,
    signers: HashMap<SignerId, SignerProfile>,
}

#[derive(Debug, Default)]
struct Shared {
    leases: Mutex<HashMap<LeaseKey, Arc<tokio::sync::Mutex<()>>>>,
    tables: RwLock<Tables>,
    master: RwLock<MasterData>,
}

impl Shared {
    fn lease_handle(&self, key: &LeaseKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut leases = self.leases.lock();
        Arc::clone(leases.entry(key.clone()).or_default())
    }

    /// Drop lease entries nobody holds or waits on. Handles are only cloned
    /// under the table lock, so a count of one cannot race a new waiter.
    fn prune_leases(&self) {
        self.leases
            .lock()
            .retain(|_, handle| Arc::strong_count(handle) > 1);
    }
}

/// A held lease. Releasing it removes idle entries from the lease table.
struct Lease {
    shared: Arc<Shared>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.shared.prune_leases();
    }
}

/// Thread-safe, cloneable in-memory document store.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    shared: Arc<Shared>,
}

impl MemoryDocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed documents.
    pub fn document_count(&self) -> usize {
        self.shared.tables.read().documents.len()
    }

    /// Entries in the lease table, held or awaited.
    pub fn lease_count(&self) -> usize {
        self.shared.leases.lock().len()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StoreError> {
        Ok(MemoryTx {
            shared: Arc::clone(&self.shared),
            leases: HashMap::new(),
            sequences: HashMap::new(),
            documents: HashMap::new(),
            inserted: Vec::new(),
        })
    }

    async fn fetch_aggregate(
        &self,
        id: DocumentId,
    ) -> Result<Option<DocumentAggregate>, StoreError> {
        Ok(self.shared.tables.read().documents.get(&id).cloned())
    }

    async fn list_documents(&self, limit: u32, offset: u64) -> Result<Vec<Document>, StoreError> {
        let tables = self.shared.tables.read();
        let mut docs: Vec<Document> = tables
            .documents
            .values()
            .map(|agg| agg.document.clone())
            .collect();
        docs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        Ok(docs.into_iter().skip(offset).take(limit as usize).collect())
    }

    async fn fetch_sequence(
        &self,
        code: &SequenceCode,
    ) -> Result<Option<SequenceRecord>, StoreError> {
        Ok(self.shared.tables.read().sequences.get(code).cloned())
    }

    async fn register_sequence(&self, sequence: &SequenceRecord) -> Result<(), StoreError> {
        let mut tables = self.shared.tables.write();
        if tables.sequences.contains_key(&sequence.code) {
            return Err(StoreError::Duplicate(format!(
                "number_sequences.code {}",
                sequence.code
            )));
        }
        tables
            .sequences
            .insert(sequence.code.clone(), sequence.clone());
        Ok(())
    }

    async fn register_template(&self, id: TemplateId, name: &str) -> Result<(), StoreError> {
        self.shared
            .master
            .write()
            .templates
            .insert(id, name.to_string());
        Ok(())
    }

    async fn register_signer(&self, profile: &SignerProfile) -> Result<(), StoreError> {
        self.shared
            .master
            .write()
            .signers
            .insert(profile.signer_id, profile.clone());
        Ok(())
    }
}

/// A transaction over [`MemoryDocumentStore`].
pub struct MemoryTx {
    shared: Arc<Shared>,
    leases: HashMap<LeaseKey, Lease>,
    sequences: HashMap<SequenceCode, SequenceRecord>,
    documents: HashMap<DocumentId, DocumentAggregate>,
    inserted: Vec<DocumentId>,
}

impl std::fmt::Debug for MemoryTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTx")
            .field("leases", &self.leases.len())
            .field("staged_sequences", &self.sequences.len())
            .field("staged_documents", &self.documents.len())
            .finish()
    }
}

impl MemoryTx {
    async fn acquire(&mut self, key: LeaseKey) {
        if self.leases.contains_key(&key) {
            return;
        }
        let handle = self.shared.lease_handle(&key);
        let guard = handle.lock_owned().await;
        self.leases.insert(
            key,
            Lease {
                shared: Arc::clone(&self.shared),
                guard: Some(guard),
            },
        );
    }

    fn holds(&self, key: &LeaseKey) -> bool {
        self.leases.contains_key(key)
    }

    fn is_new(&self, id: DocumentId) -> bool {
        self.inserted.contains(&id)
    }

    /// The aggregate as this transaction sees it.
    fn view(&self, id: DocumentId) -> Option<DocumentAggregate> {
        self.documents
            .get(&id)
            .cloned()
            .or_else(|| self.shared.tables.read().documents.get(&id).cloned())
    }

    /// Stage a copy of the aggregate for mutation.
    fn staged_mut(&mut self, id: DocumentId) -> Result<&mut DocumentAggregate, StoreError> {
        if !self.documents.contains_key(&id) {
            let committed = self
                .shared
                .tables
                .read()
                .documents
                .get(&id)
                .cloned()
                .ok_or(StoreError::Missing(Missing::Document(id)))?;
            self.documents.insert(id, committed);
        }
        self.documents
            .get_mut(&id)
            .ok_or(StoreError::Missing(Missing::Document(id)))
    }

    fn require_document_lease(&self, id: DocumentId) -> Result<(), StoreError> {
        if self.is_new(id) || self.holds(&LeaseKey::Document(id)) {
            Ok(())
        } else {
            Err(StoreError::LeaseNotHeld(id.to_string()))
        }
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_sequence(
        &mut self,
        code: &SequenceCode,
    ) -> Result<Option<SequenceRecord>, StoreError> {
        self.acquire(LeaseKey::Sequence(code.clone())).await;
        Ok(self
            .sequences
            .get(code)
            .cloned()
            .or_else(|| self.shared.tables.read().sequences.get(code).cloned()))
    }

    async fn store_sequence_value(
        &mut self,
        code: &SequenceCode,
        value: u64,
    ) -> Result<(), StoreError> {
        if !self.holds(&LeaseKey::Sequence(code.clone())) {
            return Err(StoreError::LeaseNotHeld(format!("sequence:{code}")));
        }
        let mut record = match self.sequences.get(code) {
            Some(staged) => staged.clone(),
            None => self
                .shared
                .tables
                .read()
                .sequences
                .get(code)
                .cloned()
                .ok_or_else(|| StoreError::Missing(Missing::Sequence(code.to_string())))?,
        };
        record.current_value = value;
        self.sequences.insert(code.clone(), record);
        Ok(())
    }

    async fn template_exists(&mut self, id: TemplateId) -> Result<bool, StoreError> {
        Ok(self.shared.master.read().templates.contains_key(&id))
    }

    async fn signer_profiles(
        &mut self,
        ids: &[SignerId],
    ) -> Result<Vec<SignerProfile>, StoreError> {
        let master = self.shared.master.read();
        ids.iter()
            .map(|id| {
                master
                    .signers
                    .get(id)
                    .cloned()
                    .ok_or(StoreError::Missing(Missing::Signer(*id)))
            })
            .collect()
    }

    async fn insert_document(&mut self, document: &Document) -> Result<(), StoreError> {
        if !self
            .shared
            .master
            .read()
            .templates
            .contains_key(&document.template_id)
        {
            return Err(StoreError::Missing(Missing::Template(document.template_id)));
        }
        if self.view(document.id).is_some() {
            return Err(StoreError::Duplicate(format!("documents.id {}", document.id)));
        }
        self.documents.insert(
            document.id,
            DocumentAggregate {
                document: document.clone(),
                signers: Vec::new(),
            },
        );
        self.inserted.push(document.id);
        Ok(())
    }

    async fn lock_document(&mut self, id: DocumentId) -> Result<Option<Document>, StoreError> {
        self.acquire(LeaseKey::Document(id)).await;
        Ok(self.view(id).map(|agg| agg.document))
    }

    async fn update_document(&mut self, document: &Document) -> Result<(), StoreError> {
        self.require_document_lease(document.id)?;
        let staged = self.staged_mut(document.id)?;
        staged.document = document.clone();
        Ok(())
    }

    async fn insert_signers(&mut self, signers: &[DocumentSigner]) -> Result<(), StoreError> {
        for signer in signers {
            if !self
                .shared
                .master
                .read()
                .signers
                .contains_key(&signer.signer_id)
            {
                return Err(StoreError::Missing(Missing::Signer(signer.signer_id)));
            }
            self.require_document_lease(signer.document_id)?;
            let staged = self.staged_mut(signer.document_id)?;
            if staged
                .signers
                .iter()
                .any(|s| s.order_no == signer.order_no || s.signer_id == signer.signer_id)
            {
                return Err(StoreError::Duplicate(format!(
                    "document_signers ({}, {})",
                    signer.document_id, signer.signer_id
                )));
            }
            staged.signers.push(signer.clone());
            staged.signers.sort_by_key(|s| s.order_no);
        }
        Ok(())
    }

    async fn lock_signer_link(
        &mut self,
        document_id: DocumentId,
        signer_id: SignerId,
    ) -> Result<Option<DocumentSigner>, StoreError> {
        self.acquire(LeaseKey::Document(document_id)).await;
        Ok(self
            .view(document_id)
            .and_then(|agg| agg.signer(signer_id).cloned()))
    }

    async fn update_signer(&mut self, signer: &DocumentSigner) -> Result<(), StoreError> {
        self.require_document_lease(signer.document_id)?;
        let staged = self.staged_mut(signer.document_id)?;
        let row = staged
            .signers
            .iter_mut()
            .find(|s| s.id == signer.id)
            .ok_or_else(|| StoreError::Corrupt(format!("roster row {} vanished", signer.id)))?;
        *row = signer.clone();
        Ok(())
    }

    async fn load_aggregate(
        &mut self,
        id: DocumentId,
    ) -> Result<Option<DocumentAggregate>, StoreError> {
        Ok(self.view(id))
    }

    async fn commit(self) -> Result<(), StoreError> {
        let MemoryTx {
            shared,
            leases,
            sequences,
            mut documents,
            inserted,
        } = self;
        {
            let mut tables = shared.tables.write();
            for id in &inserted {
                if let Some(agg) = documents.get(id) {
                    let key = (agg.document.sequence_id, agg.document.number.clone());
                    if tables.numbers.contains(&key) {
                        return Err(StoreError::Corrupt(format!(
                            "number {} already issued on {}",
                            key.1, key.0
                        )));
                    }
                }
            }
            for (code, record) in sequences {
                tables.sequences.insert(code, record);
            }
            for id in &inserted {
                if let Some(agg) = documents.get(id) {
                    tables
                        .numbers
                        .insert((agg.document.sequence_id, agg.document.number.clone()));
                }
            }
            for (id, agg) in documents.drain() {
                tables.documents.insert(id, agg);
            }
        }
        drop(leases);
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        tracing::debug!(
            staged_documents = self.documents.len(),
            staged_sequences = self.sequences.len(),
            "discarding in-memory transaction"
        );
        Ok(())
    }
}
