//! # Postgres Backend
//!
//! SQLx over a `PgPool`. Each [`PgStoreTx`] owns one
//! `sqlx::Transaction`; leases are row locks taken with
//! `SELECT … FOR UPDATE`, which block a competing transaction until this one
//! ends. Dropping the transaction without committing rolls it back.
//!
//! Committed reads of an aggregate run in a `REPEATABLE READ, READ ONLY`
//! transaction so the document row and its roster come from one snapshot.
//!
//! Foreign-key and unique violations are translated at the call site that
//! knows which reference was being written, so the engine sees
//! `Missing(Template)` rather than a constraint name.

mod rows;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use docflow_core::{DocumentId, Missing, SequenceCode, SignerId, TemplateId};
use docflow_state::{Document, DocumentSigner, SignerProfile};

use crate::error::StoreError;
use crate::{DocumentAggregate, DocumentStore, SequenceRecord, StoreTx};

use rows::{
    DocumentRow, ProfileRow, SequenceRow, SignerRow, DOCUMENT_COLUMNS, SEQUENCE_COLUMNS,
    SIGNER_COLUMNS,
};

const TEMPLATE_FKEY: &str = "documents_template_id_fkey";
const SEQUENCE_FKEY: &str = "documents_sequence_id_fkey";
const DOCUMENT_FKEY: &str = "document_signers_document_id_fkey";
const SIGNER_FKEY: &str = "document_signers_signer_id_fkey";
const NUMBER_KEY: &str = "documents_sequence_number_key";

// ─── Connection ──────────────────────────────────────────────────────

/// Pool settings for [`PgDocumentStore::connect`].
#[derive(Clone)]
pub struct PgStoreOptions {
    /// Connection URL.
    pub url: String,
    /// Upper bound on pooled connections.
    pub max_connections: u32,
    /// Connections kept open while idle.
    pub min_connections: u32,
    /// How long to wait for a free connection.
    pub acquire_timeout: Duration,
}

impl PgStoreOptions {
    /// Default pool settings for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 20,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

impl std::fmt::Debug for PgStoreOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgStoreOptions")
            .field("url", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

/// Postgres-backed document store.
#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    /// Open a connection pool. Does not run migrations.
    pub async fn connect(options: &PgStoreOptions) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .min_connections(options.min_connections)
            .acquire_timeout(options.acquire_timeout)
            .connect(&options.url)
            .await
            .map_err(StoreError::from)?;

        tracing::info!(
            max_connections = options.max_connections,
            "connected to PostgreSQL"
        );
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

async fn select_aggregate(
    conn: &mut PgConnection,
    id: DocumentId,
) -> Result<Option<DocumentAggregate>, StoreError> {
    let row = sqlx::query_as::<_, DocumentRow>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1"
    ))
    .bind(*id.as_uuid())
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let document = row.into_document()?;

    let signer_rows = sqlx::query_as::<_, SignerRow>(&format!(
        "SELECT {SIGNER_COLUMNS} FROM document_signers WHERE document_id = $1 ORDER BY order_no"
    ))
    .bind(*id.as_uuid())
    .fetch_all(&mut *conn)
    .await?;

    let signers = signer_rows
        .into_iter()
        .map(SignerRow::into_signer)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(DocumentAggregate { document, signers }))
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    type Tx = PgStoreTx;

    async fn begin(&self) -> Result<PgStoreTx, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(PgStoreTx { tx })
    }

    async fn fetch_aggregate(
        &self,
        id: DocumentId,
    ) -> Result<Option<DocumentAggregate>, StoreError> {
        // Document row and roster must come from one snapshot.
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;
        let aggregate = select_aggregate(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(aggregate)
    }

    async fn list_documents(&self, limit: u32, offset: u64) -> Result<Vec<Document>, StoreError> {
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents \
             ORDER BY created_at DESC, id LIMIT $1 OFFSET $2"
        ))
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DocumentRow::into_document).collect()
    }

    async fn fetch_sequence(
        &self,
        code: &SequenceCode,
    ) -> Result<Option<SequenceRecord>, StoreError> {
        let row = sqlx::query_as::<_, SequenceRow>(&format!(
            "SELECT {SEQUENCE_COLUMNS} FROM number_sequences WHERE code = $1"
        ))
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(SequenceRow::into_record).transpose()
    }

    async fn register_sequence(&self, sequence: &SequenceRecord) -> Result<(), StoreError> {
        let current = i64::try_from(sequence.current_value)
            .map_err(|_| StoreError::Corrupt(format!("current_value {}", sequence.current_value)))?;
        let padding = i32::try_from(sequence.format.padding())
            .map_err(|_| StoreError::Corrupt(format!("padding {}", sequence.format.padding())))?;

        sqlx::query(
            "INSERT INTO number_sequences (id, code, prefix, padding, current_value)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(*sequence.id.as_uuid())
        .bind(sequence.code.as_str())
        .bind(sequence.format.prefix())
        .bind(padding)
        .bind(current)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn register_template(&self, id: TemplateId, name: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO document_templates (id, name) VALUES ($1, $2)
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name",
        )
        .bind(*id.as_uuid())
        .bind(name)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn register_signer(&self, profile: &SignerProfile) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO signers (id, full_name, email) VALUES ($1, $2, $3)
             ON CONFLICT (id) DO UPDATE SET
                full_name = EXCLUDED.full_name,
                email = EXCLUDED.email",
        )
        .bind(*profile.signer_id.as_uuid())
        .bind(&profile.full_name)
        .bind(&profile.email)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// ─── Transaction ─────────────────────────────────────────────────────

/// A transaction over [`PgDocumentStore`].
pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

impl std::fmt::Debug for PgStoreTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgStoreTx").finish_non_exhaustive()
    }
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn lock_sequence(
        &mut self,
        code: &SequenceCode,
    ) -> Result<Option<SequenceRecord>, StoreError> {
        let row = sqlx::query_as::<_, SequenceRow>(&format!(
            "SELECT {SEQUENCE_COLUMNS} FROM number_sequences WHERE code = $1 FOR UPDATE"
        ))
        .bind(code.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(SequenceRow::into_record).transpose()
    }

    async fn store_sequence_value(
        &mut self,
        code: &SequenceCode,
        value: u64,
    ) -> Result<(), StoreError> {
        let value = i64::try_from(value)
            .map_err(|_| StoreError::Corrupt(format!("sequence {code} overflowed at {value}")))?;

        let result = sqlx::query(
            "UPDATE number_sequences SET current_value = $1, updated_at = now() WHERE code = $2",
        )
        .bind(value)
        .bind(code.as_str())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing(Missing::Sequence(code.to_string())));
        }
        Ok(())
    }

    async fn template_exists(&mut self, id: TemplateId) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM document_templates WHERE id = $1)",
        )
        .bind(*id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(exists)
    }

    async fn signer_profiles(
        &mut self,
        ids: &[SignerId],
    ) -> Result<Vec<SignerProfile>, StoreError> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query_as::<_, ProfileRow>(
            "SELECT id, full_name, email FROM signers WHERE id = ANY($1)",
        )
        .bind(uuids)
        .fetch_all(&mut *self.tx)
        .await?;

        let found: HashMap<SignerId, SignerProfile> = rows
            .into_iter()
            .map(SignerProfile::from)
            .map(|p| (p.signer_id, p))
            .collect();

        ids.iter()
            .map(|id| {
                found
                    .get(id)
                    .cloned()
                    .ok_or(StoreError::Missing(Missing::Signer(*id)))
            })
            .collect()
    }

    async fn insert_document(&mut self, document: &Document) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO documents (id, template_id, sequence_id, number, title, status, payload,
             issued_at, signed_at, archived_at, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(*document.id.as_uuid())
        .bind(*document.template_id.as_uuid())
        .bind(*document.sequence_id.as_uuid())
        .bind(&document.number)
        .bind(&document.title)
        .bind(document.status.as_str())
        .bind(document.payload.to_value())
        .bind(document.timestamps.issued_at.map(|t| t.into_datetime()))
        .bind(document.timestamps.signed_at.map(|t| t.into_datetime()))
        .bind(document.timestamps.archived_at.map(|t| t.into_datetime()))
        .bind(document.created_at.into_datetime())
        .bind(document.updated_at.into_datetime())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| match StoreError::from(e) {
            err if err.foreign_key() == Some(TEMPLATE_FKEY) => {
                StoreError::Missing(Missing::Template(document.template_id))
            }
            err if err.foreign_key() == Some(SEQUENCE_FKEY) => {
                StoreError::Missing(Missing::Sequence(document.sequence_id.as_uuid().to_string()))
            }
            StoreError::Duplicate(key) if key == NUMBER_KEY => StoreError::Corrupt(format!(
                "number {} already issued on {}",
                document.number, document.sequence_id
            )),
            other => other,
        })?;

        Ok(())
    }

    async fn lock_document(&mut self, id: DocumentId) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1 FOR UPDATE"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(DocumentRow::into_document).transpose()
    }

    async fn update_document(&mut self, document: &Document) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE documents SET title = $1, status = $2, payload = $3,
             issued_at = $4, signed_at = $5, archived_at = $6, updated_at = $7
             WHERE id = $8",
        )
        .bind(&document.title)
        .bind(document.status.as_str())
        .bind(document.payload.to_value())
        .bind(document.timestamps.issued_at.map(|t| t.into_datetime()))
        .bind(document.timestamps.signed_at.map(|t| t.into_datetime()))
        .bind(document.timestamps.archived_at.map(|t| t.into_datetime()))
        .bind(document.updated_at.into_datetime())
        .bind(*document.id.as_uuid())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing(Missing::Document(document.id)));
        }
        Ok(())
    }

    async fn insert_signers(&mut self, signers: &[DocumentSigner]) -> Result<(), StoreError> {
        for signer in signers {
            let order_no = i32::try_from(signer.order_no)
                .map_err(|_| StoreError::Corrupt(format!("order_no {}", signer.order_no)))?;

            sqlx::query(
                "INSERT INTO document_signers (id, document_id, signer_id, full_name, email,
                 status, order_no, signed_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(*signer.id.as_uuid())
            .bind(*signer.document_id.as_uuid())
            .bind(*signer.signer_id.as_uuid())
            .bind(&signer.full_name)
            .bind(&signer.email)
            .bind(signer.status.as_str())
            .bind(order_no)
            .bind(signer.signed_at.map(|t| t.into_datetime()))
            .execute(&mut *self.tx)
            .await
            .map_err(|e| match StoreError::from(e) {
                err if err.foreign_key() == Some(SIGNER_FKEY) => {
                    StoreError::Missing(Missing::Signer(signer.signer_id))
                }
                err if err.foreign_key() == Some(DOCUMENT_FKEY) => {
                    StoreError::Missing(Missing::Document(signer.document_id))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    async fn lock_signer_link(
        &mut self,
        document_id: DocumentId,
        signer_id: SignerId,
    ) -> Result<Option<DocumentSigner>, StoreError> {
        let row = sqlx::query_as::<_, SignerRow>(&format!(
            "SELECT {SIGNER_COLUMNS} FROM document_signers
             WHERE document_id = $1 AND signer_id = $2 FOR UPDATE"
        ))
        .bind(*document_id.as_uuid())
        .bind(*signer_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(SignerRow::into_signer).transpose()
    }

    async fn update_signer(&mut self, signer: &DocumentSigner) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE document_signers SET status = $1, signed_at = $2, updated_at = now()
             WHERE id = $3",
        )
        .bind(signer.status.as_str())
        .bind(signer.signed_at.map(|t| t.into_datetime()))
        .bind(*signer.id.as_uuid())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Corrupt(format!("roster row {} vanished", signer.id)));
        }
        Ok(())
    }

    async fn load_aggregate(
        &mut self,
        id: DocumentId,
    ) -> Result<Option<DocumentAggregate>, StoreError> {
        select_aggregate(&mut *self.tx, id).await
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
