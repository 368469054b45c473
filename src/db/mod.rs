//! Postgres-backed relay state
//!
//! Durable implementations of [`WatermarkStore`] and [`DedupIndex`]. With
//! these the at-most-once guarantee survives restarts.

use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use eyre::{Result, WrapErr};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashSet;

use crate::error::StoreError;
use crate::store::{check_monotonic, DedupIndex, DedupRecord, WatermarkStore};
use crate::types::SubmitMode;

pub mod models;

pub use models::RelayedTransfer;

/// Create a database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .wrap_err("Failed to connect to database")
}

/// Run pending migrations (uses the migration files in migrations/)
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .wrap_err("Failed to run database migrations")?;
    Ok(())
}

/// Watermark row key: one stream per source chain, bridge and submit mode
pub fn watermark_stream_key(chain_id: u64, bridge: &Address, mode: SubmitMode) -> String {
    format!("{}:{:#x}:{}", chain_id, bridge, mode)
}

fn to_db_block(block: u64) -> Result<i64, StoreError> {
    i64::try_from(block).map_err(|_| StoreError::Corrupt(format!("block {} exceeds BIGINT", block)))
}

fn from_db_block(block: i64) -> Result<u64, StoreError> {
    u64::try_from(block).map_err(|_| StoreError::Corrupt(format!("negative block {}", block)))
}

/// Persisted last-scanned block for one stream
pub struct PgWatermark {
    pool: PgPool,
    stream_key: String,
    current: u64,
}

impl PgWatermark {
    /// Read the persisted watermark, if the stream has one
    pub async fn load(pool: &PgPool, stream_key: &str) -> Result<Option<u64>, StoreError> {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"SELECT last_scanned_block FROM relay_watermarks WHERE stream_key = $1"#,
        )
        .bind(stream_key)
        .fetch_optional(pool)
        .await?;

        row.map(|r| from_db_block(r.0)).transpose()
    }

    /// Open the stream, seeding it with `start` if it has no row yet.
    /// An existing row is kept as is.
    pub async fn init(pool: PgPool, stream_key: String, start: u64) -> Result<Self, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO relay_watermarks (stream_key, last_scanned_block)
            VALUES ($1, $2)
            ON CONFLICT (stream_key) DO NOTHING
            "#,
        )
        .bind(&stream_key)
        .bind(to_db_block(start)?)
        .execute(&pool)
        .await?;

        let current = Self::load(&pool, &stream_key)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("watermark {} vanished", stream_key)))?;

        Ok(Self {
            pool,
            stream_key,
            current,
        })
    }
}

#[async_trait]
impl WatermarkStore for PgWatermark {
    fn get(&self) -> u64 {
        self.current
    }

    async fn advance(&mut self, to: u64) -> Result<(), StoreError> {
        check_monotonic(self.current, to)?;

        let result = sqlx::query(
            r#"
            UPDATE relay_watermarks
            SET last_scanned_block = $2, updated_at = NOW()
            WHERE stream_key = $1 AND last_scanned_block <= $2
            "#,
        )
        .bind(&self.stream_key)
        .bind(to_db_block(to)?)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Row moved past us: some other writer is using this stream
            let stored = Self::load(&self.pool, &self.stream_key).await?.unwrap_or(0);
            return Err(StoreError::NonMonotonic {
                current: stored,
                requested: to,
            });
        }

        self.current = to;
        Ok(())
    }
}

/// Persisted dedup index, scoped to one submit mode
pub struct PgDedupIndex {
    pool: PgPool,
    mode: SubmitMode,
    /// Ids inserted by this process; saves a round trip on re-scans
    inserted: HashSet<B256>,
}

impl PgDedupIndex {
    pub fn new(pool: PgPool, mode: SubmitMode) -> Self {
        Self {
            pool,
            mode,
            inserted: HashSet::new(),
        }
    }

    /// Fetch the stored record for a transfer
    pub async fn get(&self, transaction_id: &B256) -> Result<Option<RelayedTransfer>, StoreError> {
        let row = sqlx::query_as::<_, RelayedTransfer>(
            r#"SELECT transaction_id, mode, source_block, destination_tx_hash, relayed_at
               FROM relayed_transfers WHERE transaction_id = $1 AND mode = $2"#,
        )
        .bind(transaction_id.as_slice())
        .bind(self.mode)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}

#[async_trait]
impl DedupIndex for PgDedupIndex {
    async fn contains(&self, transaction_id: &B256) -> Result<bool, StoreError> {
        if self.inserted.contains(transaction_id) {
            return Ok(true);
        }

        let row: (bool,) = sqlx::query_as(
            r#"SELECT EXISTS(SELECT 1 FROM relayed_transfers WHERE transaction_id = $1 AND mode = $2)"#,
        )
        .bind(transaction_id.as_slice())
        .bind(self.mode)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    async fn insert(&mut self, record: DedupRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO relayed_transfers (transaction_id, mode, source_block, destination_tx_hash)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (transaction_id, mode) DO NOTHING
            "#,
        )
        .bind(record.transaction_id.as_slice())
        .bind(record.mode)
        .bind(to_db_block(record.source_block)?)
        .bind(record.destination_tx_hash.as_slice())
        .execute(&self.pool)
        .await?;

        self.inserted.insert(record.transaction_id);
        Ok(())
    }
}
