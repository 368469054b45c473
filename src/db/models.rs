use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::SubmitMode;

/// A row of `relayed_transfers`
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RelayedTransfer {
    pub transaction_id: Vec<u8>,
    pub mode: SubmitMode,
    pub source_block: i64,
    pub destination_tx_hash: Vec<u8>,
    pub relayed_at: DateTime<Utc>,
}
