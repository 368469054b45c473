//! Test fixtures: a scriptable in-memory ledger and event builders

use alloy::primitives::{address, keccak256, Address, Bytes, B256, U256};
use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use crate::contracts::SourceBridge;
use crate::error::LedgerError;
use crate::ledger::{LedgerClient, ReceiptStatus, TxParams};
use crate::types::BridgeEvent;

/// Source bridge address used by fixtures
pub const BRIDGE: Address = address!("00000000000000000000000000000000000000b1");
/// Destination bridge address used by fixtures
pub const DESTINATION_BRIDGE: Address = address!("00000000000000000000000000000000000000d2");
pub const SENDER: Address = address!("00000000000000000000000000000000000000a1");
pub const TOKEN: Address = address!("00000000000000000000000000000000000000c3");
/// Destination chain id carried by [`sample_event`]
pub const DEST_CHAIN_ID: u64 = 56;
/// Anvil account #0
pub const TEST_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub fn sample_event(block: u64, index: u64, id_byte: u8, amount: u64) -> BridgeEvent {
    BridgeEvent {
        transaction_id: B256::repeat_byte(id_byte),
        sender: SENDER,
        destination_chain_id: U256::from(DEST_CHAIN_ID),
        token: TOKEN,
        amount: U256::from(amount),
        source_block: block,
        log_index: index,
        source_tx_hash: None,
    }
}

/// Encoded `BridgeTransferInitiated` log as a node would return it
pub fn transfer_log(
    contract: Address,
    transaction_id: B256,
    destination_chain_id: u64,
    amount: u64,
    block: u64,
    index: u64,
) -> Log {
    let event = SourceBridge::BridgeTransferInitiated {
        transactionId: transaction_id,
        sender: SENDER,
        destinationChainId: U256::from(destination_chain_id),
        token: TOKEN,
        amount: U256::from(amount),
    };

    Log {
        inner: alloy::primitives::Log {
            address: contract,
            data: event.encode_log_data(),
        },
        block_number: Some(block),
        log_index: Some(index),
        transaction_hash: Some(keccak256(transaction_id)),
        ..Default::default()
    }
}

#[derive(Debug)]
struct MockState {
    chain_id: u64,
    head: u64,
    head_unavailable: bool,
    logs_unavailable: bool,
    params_unavailable: bool,
    /// Largest span `query_events` accepts, like a provider's getLogs cap
    range_limit: Option<u64>,
    logs: Vec<Log>,
    queries: Vec<(u64, u64)>,
    height_calls: usize,
    nonce: u64,
    send_attempts: usize,
    reject_next_sends: usize,
    failing_send_attempts: HashSet<usize>,
    sent: Vec<Bytes>,
    receipt: ReceiptStatus,
    withhold_receipts: bool,
}

/// In-memory [`LedgerClient`]. Interior mutability so tests can script it
/// through a shared `Arc` while the code under test holds another.
#[derive(Debug)]
pub struct MockLedger {
    state: Mutex<MockState>,
}

impl MockLedger {
    pub fn new(head: u64) -> Self {
        Self {
            state: Mutex::new(MockState {
                chain_id: 31337,
                head,
                head_unavailable: false,
                logs_unavailable: false,
                params_unavailable: false,
                range_limit: None,
                logs: Vec::new(),
                queries: Vec::new(),
                height_calls: 0,
                nonce: 0,
                send_attempts: 0,
                reject_next_sends: 0,
                failing_send_attempts: HashSet::new(),
                sent: Vec::new(),
                receipt: ReceiptStatus::Success,
                withhold_receipts: false,
            }),
        }
    }

    pub fn with_chain_id(self, chain_id: u64) -> Self {
        self.state.lock().unwrap().chain_id = chain_id;
        self
    }

    pub fn set_head(&self, head: u64) {
        self.state.lock().unwrap().head = head;
    }

    pub fn set_head_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().head_unavailable = unavailable;
    }

    pub fn set_logs_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().logs_unavailable = unavailable;
    }

    pub fn set_params_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().params_unavailable = unavailable;
    }

    pub fn set_range_limit(&self, limit: u64) {
        self.state.lock().unwrap().range_limit = Some(limit);
    }

    pub fn push_log(&self, log: Log) {
        self.state.lock().unwrap().logs.push(log);
    }

    /// Every `(from, to)` passed to `query_events`, in call order
    pub fn queries(&self) -> Vec<(u64, u64)> {
        self.state.lock().unwrap().queries.clone()
    }

    pub fn height_calls(&self) -> usize {
        self.state.lock().unwrap().height_calls
    }

    /// Raw transactions accepted by `send_raw`
    pub fn sent(&self) -> Vec<Bytes> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn sent_hashes(&self) -> Vec<B256> {
        self.sent().iter().map(keccak256).collect()
    }

    pub fn set_receipt(&self, status: ReceiptStatus) {
        self.state.lock().unwrap().receipt = status;
    }

    /// Make `wait_receipt` time out straight away
    pub fn withhold_receipts(&self) {
        self.state.lock().unwrap().withhold_receipts = true;
    }

    pub fn reject_next_sends(&self, count: usize) {
        self.state.lock().unwrap().reject_next_sends = count;
    }

    /// Reject the `attempt`-th call to `send_raw` (0-based)
    pub fn fail_send_attempt(&self, attempt: usize) {
        self.state
            .lock()
            .unwrap()
            .failing_send_attempts
            .insert(attempt);
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn chain_id(&self) -> Result<u64, LedgerError> {
        Ok(self.state.lock().unwrap().chain_id)
    }

    async fn current_height(&self) -> Result<u64, LedgerError> {
        let mut state = self.state.lock().unwrap();
        state.height_calls += 1;
        if state.head_unavailable {
            return Err(LedgerError::RpcUnavailable("connection refused".into()));
        }
        Ok(state.head)
    }

    async fn query_events(
        &self,
        contract: Address,
        signature: B256,
        from: u64,
        to: u64,
    ) -> Result<Vec<Log>, LedgerError> {
        let mut state = self.state.lock().unwrap();
        state.queries.push((from, to));

        if from > to {
            return Err(LedgerError::InvalidRange { from, to });
        }
        if let Some(limit) = state.range_limit {
            if to - from >= limit {
                return Err(LedgerError::RangeTooLarge { from, to });
            }
        }
        if state.logs_unavailable {
            return Err(LedgerError::RpcUnavailable("connection reset".into()));
        }

        Ok(state
            .logs
            .iter()
            .filter(|log| log.address() == contract)
            .filter(|log| log.topic0() == Some(&signature))
            .filter(|log| matches!(log.block_number, Some(b) if b >= from && b <= to))
            .cloned()
            .collect())
    }

    async fn tx_params(&self, _account: Address) -> Result<TxParams, LedgerError> {
        let state = self.state.lock().unwrap();
        if state.params_unavailable {
            return Err(LedgerError::RpcUnavailable("connection refused".into()));
        }
        Ok(TxParams {
            nonce: state.nonce,
            gas_price: 1_000_000_000,
            chain_id: state.chain_id,
        })
    }

    async fn send_raw(&self, raw: &[u8]) -> Result<B256, LedgerError> {
        let mut state = self.state.lock().unwrap();
        let attempt = state.send_attempts;
        state.send_attempts += 1;

        if state.reject_next_sends > 0 {
            state.reject_next_sends -= 1;
            return Err(LedgerError::Rejected("nonce too low".into()));
        }
        if state.failing_send_attempts.contains(&attempt) {
            return Err(LedgerError::Rejected("execution reverted".into()));
        }

        state.sent.push(Bytes::copy_from_slice(raw));
        state.nonce += 1;
        Ok(keccak256(raw))
    }

    async fn wait_receipt(
        &self,
        tx_hash: B256,
        timeout: Duration,
    ) -> Result<ReceiptStatus, LedgerError> {
        let state = self.state.lock().unwrap();
        if state.withhold_receipts {
            return Err(LedgerError::Timeout { tx_hash, timeout });
        }
        Ok(state.receipt)
    }
}
