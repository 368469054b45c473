//! Relay state: scan watermark and dedup index
//!
//! Both stores have one writer, the relay loop, so neither needs locking.
//! In-memory backends live here; the Postgres backends are in [`crate::db`].
//!
//! Lifecycle: resolved once at startup ([`resolve_start`]), then read and
//! advanced by the loop. Nothing is torn down beyond process exit.
//!
//! The in-memory dedup index only guarantees at-most-once relay for the
//! lifetime of the process. A restart with an un-advanced watermark will
//! re-relay; use the durable backend to carry the guarantee across restarts.

use alloy::primitives::B256;
use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::StoreError;
use crate::types::SubmitMode;

/// Proof that a transfer has been relayed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupRecord {
    pub transaction_id: B256,
    pub source_block: u64,
    pub destination_tx_hash: B256,
    pub mode: SubmitMode,
}

/// Last fully scanned source block
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    fn get(&self) -> u64;

    /// Move the watermark to `to`. Moving backwards is an invariant violation.
    async fn advance(&mut self, to: u64) -> Result<(), StoreError>;
}

/// Transfers that already produced a destination action
#[async_trait]
pub trait DedupIndex: Send + Sync {
    async fn contains(&self, transaction_id: &B256) -> Result<bool, StoreError>;

    /// Record a relay. Inserting an id that is already present is a no-op.
    async fn insert(&mut self, record: DedupRecord) -> Result<(), StoreError>;
}

/// Where the initial watermark came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartSource {
    Persisted,
    Configured,
    SourceHead,
}

/// Pick the initial watermark: persisted state wins, then the configured
/// start block, then the current source head.
pub fn resolve_start(
    persisted: Option<u64>,
    configured: Option<u64>,
    head: u64,
) -> (u64, StartSource) {
    match (persisted, configured) {
        (Some(block), _) => (block, StartSource::Persisted),
        (None, Some(block)) => (block, StartSource::Configured),
        (None, None) => (head, StartSource::SourceHead),
    }
}

pub(crate) fn check_monotonic(current: u64, requested: u64) -> Result<(), StoreError> {
    if requested < current {
        return Err(StoreError::NonMonotonic { current, requested });
    }
    Ok(())
}

#[derive(Debug)]
pub struct MemoryWatermark {
    current: u64,
}

impl MemoryWatermark {
    pub fn new(start: u64) -> Self {
        Self { current: start }
    }
}

#[async_trait]
impl WatermarkStore for MemoryWatermark {
    fn get(&self) -> u64 {
        self.current
    }

    async fn advance(&mut self, to: u64) -> Result<(), StoreError> {
        check_monotonic(self.current, to)?;
        self.current = to;
        Ok(())
    }
}

/// Volatile dedup index. Entries are never evicted: an evicted id could be
/// relayed again.
#[derive(Debug, Default)]
pub struct MemoryDedupIndex {
    records: HashMap<B256, DedupRecord>,
}

impl MemoryDedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, transaction_id: &B256) -> Option<&DedupRecord> {
        self.records.get(transaction_id)
    }
}

#[async_trait]
impl DedupIndex for MemoryDedupIndex {
    async fn contains(&self, transaction_id: &B256) -> Result<bool, StoreError> {
        Ok(self.records.contains_key(transaction_id))
    }

    async fn insert(&mut self, record: DedupRecord) -> Result<(), StoreError> {
        // First record wins
        self.records.entry(record.transaction_id).or_insert(record);
        Ok(())
    }
}
