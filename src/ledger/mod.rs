//! Chain access boundary
//!
//! Everything the relay pipeline needs from a node goes through
//! [`LedgerClient`]. Production uses [`EvmLedgerClient`] over alloy's HTTP
//! provider; tests substitute an in-memory ledger.

use alloy::primitives::{Address, B256};
use alloy::rpc::types::Log;
use async_trait::async_trait;
use std::time::Duration;

use crate::error::LedgerError;

pub mod classify;
pub mod evm;

pub use classify::{classify_error, ErrorClass};
pub use evm::EvmLedgerClient;

/// Per-dispatch transaction parameters, read fresh from the node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxParams {
    pub nonce: u64,
    pub gas_price: u128,
    pub chain_id: u64,
}

/// Final state of a mined transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn chain_id(&self) -> Result<u64, LedgerError>;

    /// Latest block height
    async fn current_height(&self) -> Result<u64, LedgerError>;

    /// Logs for `signature` emitted by `contract` in `[from, to]`
    async fn query_events(
        &self,
        contract: Address,
        signature: B256,
        from: u64,
        to: u64,
    ) -> Result<Vec<Log>, LedgerError>;

    /// Pending nonce of `account`, current gas price and chain id
    async fn tx_params(&self, account: Address) -> Result<TxParams, LedgerError>;

    /// Broadcast a signed, EIP-2718 encoded transaction
    async fn send_raw(&self, raw: &[u8]) -> Result<B256, LedgerError>;

    /// Wait until `tx_hash` is mined or `timeout` elapses
    async fn wait_receipt(
        &self,
        tx_hash: B256,
        timeout: Duration,
    ) -> Result<ReceiptStatus, LedgerError>;
}
