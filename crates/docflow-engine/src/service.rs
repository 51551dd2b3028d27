//! # Document Service
//!
//! Composes the sequence allocator, the document lifecycle and the signer
//! roster into atomic operations over a [`DocumentStore`].
//!
//! ## Execution model
//!
//! Every write runs as one store transaction:
//!
//! ```text
//! validate ──▶ begin ──▶ lease/read ──▶ write ──▶ read back ──▶ commit
//!    │                                                           │
//!    └─ InvalidInput, nothing opened      any error: tx dropped ─┘
//! ```
//!
//! The transaction is dropped on every exit path that does not reach
//! `commit()`, so a failed or cancelled operation leaves no document,
//! roster row or consumed number behind.
//!
//! Transient contention (`Conflict`) restarts the whole transaction, up to
//! `max_attempts`. The operation deadline covers all attempts up to
//! `commit()`: when it fires, the in-flight transaction is dropped and
//! `DeadlineExceeded` returned. A commit that has started always runs to
//! completion, so `DeadlineExceeded` means nothing was written.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use docflow_core::{
    DocflowError, DocumentId, Missing, NumberFormat, SequenceCode, SequenceId, SignerId,
    TemplateId, Timestamp, ValidationError,
};
use docflow_state::{
    build_roster, Document, DocumentPatch, NewDocument, SignerProfile, SignerStatus,
    SignerTransition, StatusTransition,
};
use docflow_store::{
    DocumentAggregate, DocumentStore, SequenceAllocator, SequenceRecord, StoreTx,
};

use crate::request::{CreateDocumentRequest, UpdateDocumentRequest, ValidCreate, ValidUpdate};

/// Largest page `list_documents` returns.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Retry and deadline policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServicePolicy {
    /// Deadline for one operation, all attempts included.
    pub operation_timeout: Duration,
    /// Attempts on transient contention. At least 1.
    pub max_attempts: u32,
}

impl Default for ServicePolicy {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(10),
            max_attempts: 3,
        }
    }
}

/// The document issuance and signature lifecycle service.
#[derive(Debug, Clone)]
pub struct DocumentService<S> {
    store: S,
    policy: ServicePolicy,
}

impl<S: DocumentStore> DocumentService<S> {
    /// Service with the default policy.
    pub fn new(store: S) -> Self {
        Self::with_policy(store, ServicePolicy::default())
    }

    /// Service with an explicit policy.
    pub fn with_policy(store: S, policy: ServicePolicy) -> Self {
        Self { store, policy }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The active policy.
    pub fn policy(&self) -> ServicePolicy {
        self.policy
    }

    // ── Create / update ─────────────────────────────────────────────

    /// Mint a number, insert the document and its roster, and return the
    /// committed aggregate.
    pub async fn create_document(
        &self,
        request: &CreateDocumentRequest,
    ) -> Result<DocumentAggregate, DocflowError> {
        let valid = request.validate()?;
        let valid = &valid;
        self.run("create_document", move |deadline| {
            self.create_once(valid, deadline)
        })
        .await
    }

    /// Apply a sparse update to a document and its roster.
    pub async fn update_document(
        &self,
        id: DocumentId,
        request: &UpdateDocumentRequest,
    ) -> Result<DocumentAggregate, DocflowError> {
        let valid = request.validate()?;
        if valid.is_empty() {
            return self.get_document(id).await;
        }
        let valid = &valid;
        self.run("update_document", move |deadline| {
            self.update_once(id, valid, deadline)
        })
        .await
    }

    /// Change one signer's status on a document.
    pub async fn update_signer_status(
        &self,
        document_id: DocumentId,
        signer_id: SignerId,
        status: SignerStatus,
    ) -> Result<DocumentAggregate, DocflowError> {
        let valid = ValidUpdate {
            document: DocumentPatch::default(),
            signers: vec![(signer_id, status)],
        };
        let valid = &valid;
        self.run("update_signer_status", move |deadline| {
            self.update_once(document_id, valid, deadline)
        })
        .await
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// Committed aggregate for `id`.
    pub async fn get_document(&self, id: DocumentId) -> Result<DocumentAggregate, DocflowError> {
        self.store
            .fetch_aggregate(id)
            .await?
            .ok_or(DocflowError::NotFound(Missing::Document(id)))
    }

    /// Committed documents, newest first. `limit` is clamped to `1..=500`.
    pub async fn list_documents(
        &self,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<Document>, DocflowError> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        Ok(self.store.list_documents(limit, offset).await?)
    }

    /// Committed state of a sequence.
    pub async fn sequence(&self, code: &str) -> Result<SequenceRecord, DocflowError> {
        let code = SequenceCode::new(code)?;
        self.store
            .fetch_sequence(&code)
            .await?
            .ok_or_else(|| DocflowError::NotFound(Missing::Sequence(code.to_string())))
    }

    // ── Registration ────────────────────────────────────────────────

    /// Register a number sequence starting at 0.
    pub async fn register_sequence(
        &self,
        code: &str,
        prefix: &str,
        padding: i64,
    ) -> Result<SequenceRecord, DocflowError> {
        let record = SequenceRecord {
            id: SequenceId::new(),
            code: SequenceCode::new(code)?,
            format: NumberFormat::new(prefix, padding)?,
            current_value: 0,
        };
        self.store.register_sequence(&record).await?;
        tracing::info!(
            sequence_code = %record.code,
            prefix = record.format.prefix(),
            padding = record.format.padding(),
            "registered number sequence"
        );
        Ok(record)
    }

    /// Insert or rename a template.
    pub async fn register_template(&self, id: TemplateId, name: &str) -> Result<(), DocflowError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyField("name").into());
        }
        self.store.register_template(id, name).await?;
        tracing::info!(template_id = %id, "registered template");
        Ok(())
    }

    /// Insert or update a signer.
    pub async fn register_signer(&self, profile: &SignerProfile) -> Result<(), DocflowError> {
        let profile = SignerProfile {
            signer_id: profile.signer_id,
            full_name: profile.full_name.trim().to_string(),
            email: profile.email.trim().to_string(),
        };
        if profile.full_name.is_empty() {
            return Err(ValidationError::EmptyField("fullName").into());
        }
        if profile.email.is_empty() {
            return Err(ValidationError::EmptyField("email").into());
        }
        self.store.register_signer(&profile).await?;
        tracing::info!(signer_id = %profile.signer_id, "registered signer");
        Ok(())
    }

    // ── Transaction bodies ──────────────────────────────────────────

    async fn create_once(
        &self,
        valid: &ValidCreate,
        deadline: Instant,
    ) -> Result<DocumentAggregate, DocflowError> {
        let (tx, aggregate) = before_deadline(deadline, self.stage_create(valid)).await?;
        tx.commit().await?;

        let document = &aggregate.document;
        metrics::counter!("docflow_documents_created_total").increment(1);
        tracing::info!(
            document_id = %document.id,
            number = %document.number,
            sequence_code = %valid.sequence_code,
            status = %document.status,
            signers = aggregate.signers.len(),
            "document created"
        );
        Ok(aggregate)
    }

    async fn stage_create(
        &self,
        valid: &ValidCreate,
    ) -> Result<(S::Tx, DocumentAggregate), DocflowError> {
        let mut tx = self.store.begin().await?;

        if !tx.template_exists(valid.template_id).await? {
            return Err(DocflowError::NotFound(Missing::Template(valid.template_id)));
        }
        let profiles = tx.signer_profiles(&valid.signer_ids).await?;

        let allocation = SequenceAllocator::allocate(&mut tx, &valid.sequence_code).await?;
        let document = Document::create(
            NewDocument {
                template_id: valid.template_id,
                sequence_id: allocation.sequence_id,
                number: allocation.number,
                title: valid.title.clone(),
                payload: valid.payload.clone(),
                status: valid.status,
            },
            Timestamp::now(),
        );
        tx.insert_document(&document).await?;

        let roster = build_roster(document.id, profiles)?;
        tx.insert_signers(&roster).await?;

        let aggregate = tx
            .load_aggregate(document.id)
            .await?
            .ok_or_else(|| DocflowError::Internal(format!("{} not readable", document.id)))?;
        Ok((tx, aggregate))
    }

    async fn update_once(
        &self,
        id: DocumentId,
        valid: &ValidUpdate,
        deadline: Instant,
    ) -> Result<DocumentAggregate, DocflowError> {
        let staged = before_deadline(deadline, self.stage_update(id, valid)).await?;
        staged.tx.commit().await?;

        if let Some(transition) = staged.transition {
            tracing::info!(
                document_id = %id,
                from = %transition.from,
                to = %transition.to,
                at = %transition.at,
                "document status transition"
            );
        }
        for transition in &staged.signer_transitions {
            tracing::info!(
                document_id = %id,
                signer_id = %transition.signer_id,
                from = %transition.from,
                to = %transition.to,
                "signer status transition"
            );
        }
        metrics::counter!("docflow_documents_updated_total").increment(1);
        Ok(staged.aggregate)
    }

    async fn stage_update(
        &self,
        id: DocumentId,
        valid: &ValidUpdate,
    ) -> Result<StagedUpdate<S::Tx>, DocflowError> {
        let mut tx = self.store.begin().await?;

        let mut document = tx
            .lock_document(id)
            .await?
            .ok_or(DocflowError::NotFound(Missing::Document(id)))?;

        let now = Timestamp::now();
        let outcome = document.apply_patch(&valid.document, now);
        if outcome.changed {
            tx.update_document(&document).await?;
        }

        let mut signer_transitions = Vec::with_capacity(valid.signers.len());
        for (signer_id, status) in &valid.signers {
            let mut signer = tx
                .lock_signer_link(id, *signer_id)
                .await?
                .ok_or(DocflowError::NotLinked {
                    document_id: id,
                    signer_id: *signer_id,
                })?;
            signer_transitions.push(signer.apply_status(*status, now));
            tx.update_signer(&signer).await?;
        }

        let aggregate = tx
            .load_aggregate(id)
            .await?
            .ok_or(DocflowError::NotFound(Missing::Document(id)))?;
        Ok(StagedUpdate {
            tx,
            aggregate,
            transition: outcome.transition,
            signer_transitions,
        })
    }

    // ── Retry and deadline ──────────────────────────────────────────

    async fn run<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T, DocflowError>
    where
        F: FnMut(Instant) -> Fut,
        Fut: Future<Output = Result<T, DocflowError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let deadline = Instant::now() + self.policy.operation_timeout;
        let mut n = 1;
        loop {
            let err = match attempt(deadline).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            metrics::counter!("docflow_transaction_rollbacks_total", "operation" => operation)
                .increment(1);

            if matches!(err, DocflowError::DeadlineExceeded) {
                tracing::warn!(
                    operation,
                    timeout_ms = self.policy.operation_timeout.as_millis() as u64,
                    "operation deadline exceeded; transaction rolled back"
                );
                return Err(err);
            }
            if !err.is_transient() {
                tracing::debug!(operation, error = %err, "transaction rolled back");
                return Err(err);
            }
            if n >= max_attempts {
                tracing::error!(operation, attempts = n, error = %err, "contention persisted");
                return Err(DocflowError::Internal(format!(
                    "{operation}: contention persisted after {n} attempts: {err}"
                )));
            }
            tracing::warn!(operation, attempt = n, error = %err, "transient contention, retrying");
            metrics::counter!("docflow_transaction_retries_total", "operation" => operation)
                .increment(1);
            n += 1;
        }
    }
}

/// A staged update, ready to commit.
struct StagedUpdate<Tx> {
    tx: Tx,
    aggregate: DocumentAggregate,
    transition: Option<StatusTransition>,
    signer_transitions: Vec<SignerTransition>,
}

/// Run the uncommitted part of an attempt under the operation deadline.
/// On expiry `work` is dropped, and with it the transaction it opened.
async fn before_deadline<T>(
    deadline: Instant,
    work: impl Future<Output = Result<T, DocflowError>>,
) -> Result<T, DocflowError> {
    tokio::time::timeout_at(deadline, work)
        .await
        .map_err(|_| DocflowError::DeadlineExceeded)?
}
