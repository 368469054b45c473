//! Release submission strategies
//!
//! Simulation and live broadcast are two implementations of one capability,
//! picked once from configuration. The dispatcher never branches on mode.

use alloy::primitives::B256;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::DispatchError;
use crate::ledger::{LedgerClient, ReceiptStatus};
use crate::signer::SignedRelayTx;
use crate::types::SubmitMode;

#[async_trait]
pub trait Submitter: Send + Sync {
    fn mode(&self) -> SubmitMode;

    /// Deliver a signed release. `Ok` means the release is final for this mode.
    async fn submit(&self, tx: &SignedRelayTx) -> Result<B256, DispatchError>;
}

/// Build-and-sign only; logs the transaction instead of sending it
#[derive(Debug, Default)]
pub struct SimulationSubmitter;

#[async_trait]
impl Submitter for SimulationSubmitter {
    fn mode(&self) -> SubmitMode {
        SubmitMode::Simulated
    }

    async fn submit(&self, tx: &SignedRelayTx) -> Result<B256, DispatchError> {
        info!(
            tx_hash = %tx.hash,
            raw_len = tx.raw.len(),
            "[SIMULATION] Release signed, not broadcast"
        );
        Ok(tx.hash)
    }
}

/// Sends the raw transaction and waits for a successful receipt
pub struct BroadcastSubmitter<L> {
    ledger: Arc<L>,
    receipt_timeout: Duration,
}

impl<L: LedgerClient> BroadcastSubmitter<L> {
    pub fn new(ledger: Arc<L>, receipt_timeout: Duration) -> Self {
        Self {
            ledger,
            receipt_timeout,
        }
    }
}

#[async_trait]
impl<L: LedgerClient + 'static> Submitter for BroadcastSubmitter<L> {
    fn mode(&self) -> SubmitMode {
        SubmitMode::Broadcast
    }

    async fn submit(&self, tx: &SignedRelayTx) -> Result<B256, DispatchError> {
        let tx_hash = self.ledger.send_raw(&tx.raw).await?;
        info!(%tx_hash, "Release transaction sent, waiting for receipt");

        match self.ledger.wait_receipt(tx_hash, self.receipt_timeout).await? {
            ReceiptStatus::Success => Ok(tx_hash),
            ReceiptStatus::Reverted => {
                warn!(%tx_hash, "Release transaction reverted");
                Err(DispatchError::ChainRejected(format!(
                    "transaction {} reverted",
                    tx_hash
                )))
            }
        }
    }
}

/// Pick the submitter for the configured mode
pub fn submitter_for<L: LedgerClient + 'static>(
    simulation_mode: bool,
    ledger: Arc<L>,
    receipt_timeout: Duration,
) -> Box<dyn Submitter> {
    if simulation_mode {
        Box::new(SimulationSubmitter)
    } else {
        Box::new(BroadcastSubmitter::new(ledger, receipt_timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLedger;
    use alloy::primitives::Bytes;

    fn signed() -> SignedRelayTx {
        SignedRelayTx {
            hash: B256::repeat_byte(0x11),
            raw: Bytes::from_static(&[0x02, 0xf8, 0x01]),
        }
    }

    #[tokio::test]
    async fn test_simulation_never_touches_ledger() {
        let ledger = Arc::new(MockLedger::new(100));
        let submitter = submitter_for(true, ledger.clone(), Duration::from_secs(1));

        assert_eq!(submitter.mode(), SubmitMode::Simulated);
        assert_eq!(submitter.submit(&signed()).await, Ok(B256::repeat_byte(0x11)));
        assert!(ledger.sent().is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_sends_and_confirms() {
        let ledger = Arc::new(MockLedger::new(100));
        let submitter = submitter_for(false, ledger.clone(), Duration::from_secs(1));

        assert_eq!(submitter.mode(), SubmitMode::Broadcast);
        let tx_hash = submitter.submit(&signed()).await.unwrap();
        assert_eq!(ledger.sent(), vec![signed().raw]);
        assert_eq!(tx_hash, ledger.sent_hashes()[0]);
    }

    #[tokio::test]
    async fn test_broadcast_reverted_receipt_is_chain_rejected() {
        let ledger = Arc::new(MockLedger::new(100));
        ledger.set_receipt(ReceiptStatus::Reverted);
        let submitter = BroadcastSubmitter::new(ledger, Duration::from_secs(1));

        let err = submitter.submit(&signed()).await.unwrap_err();
        assert_eq!(err.kind(), "chain_rejected");
    }

    #[tokio::test]
    async fn test_broadcast_missing_receipt_is_timeout() {
        let ledger = Arc::new(MockLedger::new(100));
        ledger.withhold_receipts();
        let submitter = BroadcastSubmitter::new(ledger, Duration::from_secs(120));

        let err = submitter.submit(&signed()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Timeout { timeout, .. } if timeout == Duration::from_secs(120)));
    }

    #[tokio::test]
    async fn test_broadcast_send_failure_is_reported() {
        let ledger = Arc::new(MockLedger::new(100));
        ledger.reject_next_sends(1);
        let submitter = BroadcastSubmitter::new(ledger.clone(), Duration::from_secs(1));

        let err = submitter.submit(&signed()).await.unwrap_err();
        assert_eq!(err.kind(), "chain_rejected");
        assert!(ledger.sent().is_empty());
    }
}
