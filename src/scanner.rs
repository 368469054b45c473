//! Source-chain event scanner
//!
//! Reads `BridgeTransferInitiated` logs for one bounded block range and
//! decodes them. No retries here; the relay loop owns the retry policy.

use alloy::primitives::{Address, B256};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::contracts::bridge::transfer_initiated_signature;
use crate::error::LedgerError;
use crate::ledger::LedgerClient;
use crate::types::BridgeEvent;

pub struct EventScanner<L> {
    ledger: Arc<L>,
    contract: Address,
    signature: B256,
    max_range: u64,
}

impl<L: LedgerClient> EventScanner<L> {
    pub fn new(ledger: Arc<L>, contract: Address, max_range: u64) -> Self {
        Self {
            ledger,
            contract,
            signature: transfer_initiated_signature(),
            max_range: max_range.max(1),
        }
    }

    /// Largest number of blocks a single `scan` covers
    pub fn max_range(&self) -> u64 {
        self.max_range
    }

    /// Events emitted in `[from, to]`, in emission order.
    ///
    /// Reorged-out logs are dropped. A log that matches the topic but does not
    /// decode is reported and skipped: it can never become relayable.
    pub async fn scan(&self, from: u64, to: u64) -> Result<Vec<BridgeEvent>, LedgerError> {
        if from > to {
            return Err(LedgerError::InvalidRange { from, to });
        }
        if to - from >= self.max_range {
            return Err(LedgerError::RangeTooLarge { from, to });
        }

        let logs = self
            .ledger
            .query_events(self.contract, self.signature, from, to)
            .await?;

        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            if log.removed {
                warn!(
                    block = ?log.block_number,
                    log_index = ?log.log_index,
                    "Skipping removed log"
                );
                continue;
            }

            match BridgeEvent::from_log(&log) {
                Ok(event) => events.push(event),
                Err(e) => {
                    error!(
                        error = %e,
                        block = ?log.block_number,
                        log_index = ?log.log_index,
                        tx_hash = ?log.transaction_hash,
                        "Failed to parse BridgeTransferInitiated log"
                    );
                }
            }
        }

        events.sort_by_key(BridgeEvent::position);

        debug!(from_block = from, to_block = to, count = events.len(), "Scanned range");
        Ok(events)
    }
}
