//! Document store port and upsert reconciliation
//!
//! A store handle is bound to one target collection and is reused for every
//! write in a run. The reconciler decides between replace and create with a
//! point existence check by identifier; each record results in exactly one
//! write. Nothing here is transactional: processing is sequential, so two
//! reconciliations for the same identifier never race within a run.

use async_trait::async_trait;
use docsink_common::{DocsinkError, Result};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::config::{validate_collection_name, TargetConfig};
use crate::record::Record;

/// Which write path the reconciler took for a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Replaced,
}

impl std::fmt::Display for UpsertOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpsertOutcome::Created => write!(f, "created"),
            UpsertOutcome::Replaced => write!(f, "replaced"),
        }
    }
}

/// Write-side port over the target collection
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Point existence check by identifier. Only the identifier is
    /// consulted, never the document content.
    async fn id_exists(&self, id: &str) -> Result<bool>;

    /// Replace the full content of the document addressed by `id`.
    async fn replace(&self, id: &str, body: &Value) -> Result<()>;

    /// Create a new document with the given identifier and content.
    async fn create(&self, id: &str, body: &Value) -> Result<()>;
}

/// Upsert one record into the target collection.
///
/// Existence check, then exactly one write. The per-record log line is an
/// operational requirement, not optional instrumentation.
pub async fn upsert<S: DocumentStore + ?Sized>(store: &S, record: &Record) -> Result<UpsertOutcome> {
    let outcome = if store.id_exists(&record.id).await? {
        store.replace(&record.id, &record.body).await?;
        UpsertOutcome::Replaced
    } else {
        store.create(&record.id, &record.body).await?;
        UpsertOutcome::Created
    };

    info!("{} {}", record.id, outcome);

    Ok(outcome)
}

/// Postgres adapter for [`DocumentStore`]
///
/// A collection is a table of `id TEXT PRIMARY KEY, body JSONB NOT NULL`.
/// The collection name is validated as a plain identifier before it is ever
/// interpolated into SQL.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
    collection: String,
}

impl PgDocumentStore {
    pub async fn connect(target: &TargetConfig) -> Result<Self> {
        validate_collection_name(&target.collection)?;

        debug!("Connecting to document store for collection: {}", target.collection);

        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&target.database_url)
            .await
            .map_err(|e| DocsinkError::Document(format!("failed to connect: {e}")))?;

        info!("Document store connected, collection: {}", target.collection);

        Ok(Self {
            pool,
            collection: target.collection.clone(),
        })
    }

    /// Create the collection table if it does not exist yet.
    pub async fn ensure_collection(&self) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, body JSONB NOT NULL)",
            self.collection
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| DocsinkError::Document(format!("failed to ensure collection: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn id_exists(&self, id: &str) -> Result<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
            self.collection
        );
        sqlx::query_scalar::<_, bool>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DocsinkError::Document(format!("existence check failed for {id}: {e}")))
    }

    async fn replace(&self, id: &str, body: &Value) -> Result<()> {
        let sql = format!("UPDATE {} SET body = $2 WHERE id = $1", self.collection);
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(body)
            .execute(&self.pool)
            .await
            .map_err(|e| DocsinkError::Document(format!("replace failed for {id}: {e}")))?;
        ensure_one_row("replace", id, result.rows_affected())
    }

    async fn create(&self, id: &str, body: &Value) -> Result<()> {
        let sql = format!("INSERT INTO {} (id, body) VALUES ($1, $2)", self.collection);
        sqlx::query(&sql)
            .bind(id)
            .bind(body)
            .execute(&self.pool)
            .await
            .map_err(|e| DocsinkError::Document(format!("create failed for {id}: {e}")))?;
        Ok(())
    }
}

/// A replace that touches no row means the document vanished between the
/// existence check and the write; surfacing that keeps every record at
/// exactly one effective write.
fn ensure_one_row(action: &str, id: &str, rows: u64) -> Result<()> {
    if rows == 1 {
        Ok(())
    } else {
        Err(DocsinkError::Document(format!(
            "{action} affected {rows} rows for {id}, expected 1"
        )))
    }
}
