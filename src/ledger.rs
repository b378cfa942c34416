use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::str::FromStr;

use crate::core::error::{PipelineError, PipelineResult};
use crate::core::types::{Entity, LedgerRecord};

const CREATE_FILINGS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS filings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ticker TEXT NOT NULL,
        entity_id TEXT NOT NULL,
        form_type TEXT NOT NULL,
        report_date TEXT NOT NULL,
        accession_number TEXT NOT NULL,
        file_path TEXT NOT NULL
    )
"#;

const CREATE_ACCESSION_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_filings_accession ON filings (accession_number)";

type RecordRow = (String, String, String, String, String, String);

/// Durable record of every filing already retrieved.
///
/// The pool holds a single connection, so the pool-level lookups below must
/// not be called while an [`EntityBatch`] is open; use the batch's own
/// methods instead.
#[derive(Clone)]
pub struct Ledger {
    pool: SqlitePool,
}

impl Ledger {
    pub async fn open(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid ledger database URL: {}", database_url))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open ledger at {}", database_url))?;

        sqlx::query(CREATE_FILINGS_TABLE).execute(&pool).await?;
        sqlx::query(CREATE_ACCESSION_INDEX).execute(&pool).await?;

        log::debug!("Opened filing ledger at {}", database_url);
        Ok(Self { pool })
    }

    pub async fn in_memory() -> Result<Self> {
        Self::open("sqlite::memory:").await
    }

    pub async fn already_downloaded(&self, accession_number: &str) -> PipelineResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM filings WHERE accession_number = ?")
                .bind(accession_number)
                .fetch_one(&self.pool)
                .await
                .map_err(PipelineError::LedgerRead)?;
        Ok(count > 0)
    }

    /// The resume cursor: entity of the most recently inserted record.
    pub async fn last_processed_entity(&self) -> PipelineResult<Option<Entity>> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT ticker, entity_id FROM filings ORDER BY id DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await
                .map_err(PipelineError::LedgerRead)?;
        Ok(row.map(|(ticker, id)| Entity { ticker, id }))
    }

    pub async fn count(&self) -> PipelineResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM filings")
            .fetch_one(&self.pool)
            .await
            .map_err(PipelineError::LedgerRead)?;
        Ok(count as u64)
    }

    pub async fn records_for(&self, entity_id: &str) -> PipelineResult<Vec<LedgerRecord>> {
        let rows: Vec<RecordRow> = sqlx::query_as(
            "SELECT ticker, entity_id, form_type, report_date, accession_number, file_path
             FROM filings WHERE entity_id = ? ORDER BY id",
        )
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await
        .map_err(PipelineError::LedgerRead)?;

        Ok(rows
            .into_iter()
            .map(
                |(ticker, entity_id, form_type, report_date, accession_number, file_path)| {
                    LedgerRecord {
                        ticker,
                        entity_id,
                        form_type,
                        report_date,
                        accession_number,
                        file_path,
                    }
                },
            )
            .collect())
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Opens the transaction that collects one entity's records.
    pub async fn begin_entity(&self) -> PipelineResult<EntityBatch> {
        let tx = self.pool.begin().await.map_err(PipelineError::LedgerWrite)?;
        Ok(EntityBatch { tx, recorded: 0 })
    }
}

/// One entity's pending ledger writes. Dropping the batch without
/// [`EntityBatch::commit`] rolls them back.
pub struct EntityBatch {
    tx: Transaction<'static, Sqlite>,
    recorded: usize,
}

impl EntityBatch {
    /// Sees records written earlier in this batch as well as committed ones.
    pub async fn already_downloaded(&mut self, accession_number: &str) -> PipelineResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM filings WHERE accession_number = ?")
                .bind(accession_number)
                .fetch_one(&mut *self.tx)
                .await
                .map_err(PipelineError::LedgerRead)?;
        Ok(count > 0)
    }

    pub async fn record(&mut self, record: &LedgerRecord) -> PipelineResult<()> {
        sqlx::query(
            "INSERT INTO filings
                 (ticker, entity_id, form_type, report_date, accession_number, file_path)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.ticker)
        .bind(&record.entity_id)
        .bind(&record.form_type)
        .bind(&record.report_date)
        .bind(&record.accession_number)
        .bind(&record.file_path)
        .execute(&mut *self.tx)
        .await
        .map_err(PipelineError::LedgerWrite)?;

        self.recorded += 1;
        Ok(())
    }

    pub fn recorded(&self) -> usize {
        self.recorded
    }

    pub async fn commit(self) -> PipelineResult<()> {
        self.tx.commit().await.map_err(PipelineError::LedgerWrite)
    }

    pub async fn rollback(self) -> PipelineResult<()> {
        self.tx.rollback().await.map_err(PipelineError::LedgerWrite)
    }
}
