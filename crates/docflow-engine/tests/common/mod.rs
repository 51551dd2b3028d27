//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use docflow_core::{DocumentId, SequenceCode, SignerId, TemplateId};
use docflow_engine::{CreateDocumentRequest, DocumentService, ServicePolicy};
use docflow_state::{Document, DocumentSigner, SignerProfile};
use docflow_store::{
    DocumentAggregate, DocumentStore, MemoryDocumentStore, MemoryTx, SequenceRecord, StoreError,
    StoreTx,
};

pub const SEQUENCE: &str = "DOC-TEST";

pub struct Fixture<S> {
    pub service: DocumentService<S>,
    pub sequence: String,
    pub template: TemplateId,
    pub alice: SignerProfile,
    pub bob: SignerProfile,
}

fn profile(name: &str) -> SignerProfile {
    SignerProfile {
        signer_id: SignerId::new(),
        full_name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
    }
}

/// Register the `DOC-TEST` sequence (`DT-`, width 4), one template and two
/// signers on `store`.
pub async fn fixture_with<S: DocumentStore>(store: S, policy: ServicePolicy) -> Fixture<S> {
    fixture_on(store, policy, SEQUENCE).await
}

/// Like [`fixture_with`] but with its own sequence code, for stores that
/// outlive one test.
pub async fn fixture_on<S: DocumentStore>(
    store: S,
    policy: ServicePolicy,
    sequence: &str,
) -> Fixture<S> {
    let service = DocumentService::with_policy(store, policy);
    service.register_sequence(sequence, "DT-", 4).await.unwrap();
    let template = TemplateId::new();
    service
        .register_template(template, "Delivery note")
        .await
        .unwrap();
    let alice = profile("Alice");
    let bob = profile("Bob");
    service.register_signer(&alice).await.unwrap();
    service.register_signer(&bob).await.unwrap();
    Fixture {
        service,
        sequence: sequence.to_string(),
        template,
        alice,
        bob,
    }
}

pub async fn fixture() -> Fixture<MemoryDocumentStore> {
    fixture_with(MemoryDocumentStore::new(), ServicePolicy::default()).await
}

impl<S: DocumentStore> Fixture<S> {
    pub fn request(&self, signers: &[&SignerProfile], status: Option<&str>) -> CreateDocumentRequest {
        CreateDocumentRequest {
            template_id: self.template.as_uuid().to_string(),
            sequence_code: self.sequence.clone(),
            title: "Delivery note".to_string(),
            payload: Some(serde_json::json!({"lines": 2})),
            signer_ids: signers
                .iter()
                .map(|p| p.signer_id.as_uuid().to_string())
                .collect(),
            status: status.map(str::to_string),
        }
    }

    pub async fn current_value(&self) -> u64 {
        self.service.sequence(&self.sequence).await.unwrap().current_value
    }
}

// ─── Fault injection ─────────────────────────────────────────────────

/// What [`FaultyStore`] does when a document row is inserted.
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// Fail with a storage error.
    FailInsert,
    /// Stall before inserting.
    StallInsert(Duration),
    /// Report lock contention for the first `n` inserts.
    ContendTimes(u32),
    /// Insert normally, then stall inside `commit()` before publishing.
    StallCommit(Duration),
}

/// A memory store whose transactions misbehave after the number has been
/// allocated.
#[derive(Debug, Clone)]
pub struct FaultyStore {
    inner: MemoryDocumentStore,
    fault: Fault,
    inserts: Arc<AtomicU32>,
}

impl FaultyStore {
    pub fn new(fault: Fault) -> Self {
        Self {
            inner: MemoryDocumentStore::new(),
            fault,
            inserts: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn inner(&self) -> &MemoryDocumentStore {
        &self.inner
    }

    pub fn insert_attempts(&self) -> u32 {
        self.inserts.load(Ordering::SeqCst)
    }
}

pub struct FaultyTx {
    inner: MemoryTx,
    fault: Fault,
    inserts: Arc<AtomicU32>,
}

#[async_trait]
impl DocumentStore for FaultyStore {
    type Tx = FaultyTx;

    async fn begin(&self) -> Result<FaultyTx, StoreError> {
        Ok(FaultyTx {
            inner: self.inner.begin().await?,
            fault: self.fault,
            inserts: Arc::clone(&self.inserts),
        })
    }

    async fn fetch_aggregate(
        &self,
        id: DocumentId,
    ) -> Result<Option<DocumentAggregate>, StoreError> {
        self.inner.fetch_aggregate(id).await
    }

    async fn list_documents(&self, limit: u32, offset: u64) -> Result<Vec<Document>, StoreError> {
        self.inner.list_documents(limit, offset).await
    }

    async fn fetch_sequence(
        &self,
        code: &SequenceCode,
    ) -> Result<Option<SequenceRecord>, StoreError> {
        self.inner.fetch_sequence(code).await
    }

    async fn register_sequence(&self, sequence: &SequenceRecord) -> Result<(), StoreError> {
        self.inner.register_sequence(sequence).await
    }

    async fn register_template(&self, id: TemplateId, name: &str) -> Result<(), StoreError> {
        self.inner.register_template(id, name).await
    }

    async fn register_signer(&self, profile: &SignerProfile) -> Result<(), StoreError> {
        self.inner.register_signer(profile).await
    }
}

#[async_trait]
impl StoreTx for FaultyTx {
    async fn lock_sequence(
        &mut self,
        code: &SequenceCode,
    ) -> Result<Option<SequenceRecord>, StoreError> {
        self.inner.lock_sequence(code).await
    }

    async fn store_sequence_value(
        &mut self,
        code: &SequenceCode,
        value: u64,
    ) -> Result<(), StoreError> {
        self.inner.store_sequence_value(code, value).await
    }

    async fn template_exists(&mut self, id: TemplateId) -> Result<bool, StoreError> {
        self.inner.template_exists(id).await
    }

    async fn signer_profiles(
        &mut self,
        ids: &[SignerId],
    ) -> Result<Vec<SignerProfile>, StoreError> {
        self.inner.signer_profiles(ids).await
    }

    async fn insert_document(&mut self, document: &Document) -> Result<(), StoreError> {
        let n = self.inserts.fetch_add(1, Ordering::SeqCst);
        match self.fault {
            Fault::FailInsert => Err(StoreError::Corrupt("injected insert failure".into())),
            Fault::StallInsert(delay) => {
                tokio::time::sleep(delay).await;
                self.inner.insert_document(document).await
            }
            Fault::ContendTimes(times) if n < times => {
                Err(StoreError::Contention("injected deadlock".into()))
            }
            Fault::ContendTimes(_) | Fault::StallCommit(_) => {
                self.inner.insert_document(document).await
            }
        }
    }

    async fn lock_document(&mut self, id: DocumentId) -> Result<Option<Document>, StoreError> {
        self.inner.lock_document(id).await
    }

    async fn update_document(&mut self, document: &Document) -> Result<(), StoreError> {
        self.inner.update_document(document).await
    }

    async fn insert_signers(&mut self, signers: &[DocumentSigner]) -> Result<(), StoreError> {
        self.inner.insert_signers(signers).await
    }

    async fn lock_signer_link(
        &mut self,
        document_id: DocumentId,
        signer_id: SignerId,
    ) -> Result<Option<DocumentSigner>, StoreError> {
        self.inner.lock_signer_link(document_id, signer_id).await
    }

    async fn update_signer(&mut self, signer: &DocumentSigner) -> Result<(), StoreError> {
        self.inner.update_signer(signer).await
    }

    async fn load_aggregate(
        &mut self,
        id: DocumentId,
    ) -> Result<Option<DocumentAggregate>, StoreError> {
        self.inner.load_aggregate(id).await
    }

    async fn commit(self) -> Result<(), StoreError> {
        if let Fault::StallCommit(delay) = self.fault {
            tokio::time::sleep(delay).await;
        }
        self.inner.commit().await
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.inner.rollback().await
    }
}
