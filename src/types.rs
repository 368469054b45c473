//! Relay domain types
//!
//! [`BridgeEvent`] is what the scanner reads off the source chain and
//! [`RelayAction`] is the `releaseTokens` call derived from it.

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::rpc::types::{Log, TransactionRequest};
use alloy::sol_types::SolCall;
use eyre::{eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::contracts::{DestinationBridge, SourceBridge};
use crate::ledger::TxParams;

/// A `BridgeTransferInitiated` event observed on the source chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeEvent {
    /// Unique per transfer; the dedup key
    pub transaction_id: B256,
    /// Source-chain sender, released to on the destination chain
    pub sender: Address,
    pub destination_chain_id: U256,
    pub token: Address,
    pub amount: U256,
    pub source_block: u64,
    /// Position of the log inside its block
    pub log_index: u64,
    pub source_tx_hash: Option<B256>,
}

impl BridgeEvent {
    /// Decode a raw source-bridge log
    pub fn from_log(log: &Log) -> Result<Self> {
        let decoded = log
            .log_decode::<SourceBridge::BridgeTransferInitiated>()
            .wrap_err("Failed to decode BridgeTransferInitiated log")?;
        let data = decoded.inner.data;

        let source_block = log
            .block_number
            .ok_or_else(|| eyre!("Missing block number"))?;
        let log_index = log.log_index.ok_or_else(|| eyre!("Missing log index"))?;

        Ok(Self {
            transaction_id: data.transactionId,
            sender: data.sender,
            destination_chain_id: data.destinationChainId,
            token: data.token,
            amount: data.amount,
            source_block,
            log_index,
            source_tx_hash: log.transaction_hash,
        })
    }

    /// Emission order key: ascending block, then ascending log index
    pub fn position(&self) -> (u64, u64) {
        (self.source_block, self.log_index)
    }
}

/// The destination-chain `releaseTokens` call for one event.
///
/// Derived from the event alone; two events with the same payload always
/// produce byte-identical calldata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayAction {
    pub source_transaction_id: B256,
    pub recipient: Address,
    pub token: Address,
    pub amount: U256,
}

impl RelayAction {
    pub fn from_event(event: &BridgeEvent) -> Self {
        Self {
            source_transaction_id: event.transaction_id,
            recipient: event.sender,
            token: event.token,
            amount: event.amount,
        }
    }

    /// ABI-encoded `releaseTokens(bytes32,address,address,uint256)` call
    pub fn calldata(&self) -> Bytes {
        DestinationBridge::releaseTokensCall {
            sourceTransactionId: self.source_transaction_id,
            recipient: self.recipient,
            token: self.token,
            amount: self.amount,
        }
        .abi_encode()
        .into()
    }

    /// Fully specified legacy transaction ready for signing
    pub fn to_request(
        &self,
        from: Address,
        bridge: Address,
        params: &TxParams,
        gas_limit: u64,
    ) -> TransactionRequest {
        TransactionRequest::default()
            .with_from(from)
            .with_to(bridge)
            .with_input(self.calldata())
            .with_nonce(params.nonce)
            .with_gas_limit(gas_limit)
            .with_gas_price(params.gas_price)
            .with_chain_id(params.chain_id)
    }
}

/// How a relayed transfer reached the destination chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
pub enum SubmitMode {
    /// Built and signed only, never broadcast
    Simulated,
    /// Broadcast and confirmed with a successful receipt
    Broadcast,
}

impl SubmitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmitMode::Simulated => "simulated",
            SubmitMode::Broadcast => "broadcast",
        }
    }
}

impl fmt::Display for SubmitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_event, transfer_log, BRIDGE};
    use alloy::primitives::{address, b256};

    #[test]
    fn test_relay_action_derivation_is_deterministic() {
        let event = sample_event(103, 0, 0xAA, 50);
        let first = RelayAction::from_event(&event);
        let second = RelayAction::from_event(&event.clone());

        assert_eq!(first, second);
        assert_eq!(first.calldata(), second.calldata());
        assert_eq!(first.recipient, event.sender);
        assert_eq!(first.amount, U256::from(50u64));
    }

    #[test]
    fn test_relay_action_ignores_position_fields() {
        // Same transfer seen at a different log position encodes the same call
        let a = sample_event(103, 0, 0xAA, 50);
        let mut b = a.clone();
        b.source_block = 200;
        b.log_index = 7;
        assert_eq!(
            RelayAction::from_event(&a).calldata(),
            RelayAction::from_event(&b).calldata()
        );
    }

    #[test]
    fn test_calldata_starts_with_release_selector() {
        let action = RelayAction::from_event(&sample_event(1, 0, 0x01, 1));
        let calldata = action.calldata();
        assert_eq!(&calldata[..4], DestinationBridge::releaseTokensCall::SELECTOR.as_slice());
        // selector + 4 static words
        assert_eq!(calldata.len(), 4 + 4 * 32);
    }

    #[test]
    fn test_to_request_carries_params() {
        let action = RelayAction::from_event(&sample_event(1, 0, 0x01, 1));
        let from = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        let params = TxParams {
            nonce: 7,
            gas_price: 1_000_000_000,
            chain_id: 31337,
        };
        let request = action.to_request(from, BRIDGE, &params, 200_000);

        assert_eq!(request.from, Some(from));
        assert_eq!(request.nonce, Some(7));
        assert_eq!(request.gas, Some(200_000));
        assert_eq!(request.gas_price, Some(1_000_000_000));
        assert_eq!(request.chain_id, Some(31337));
    }

    #[test]
    fn test_from_log_decodes_indexed_and_data_fields() {
        let tx_id = b256!("00000000000000000000000000000000000000000000000000000000000000aa");
        let log = transfer_log(BRIDGE, tx_id, 56, 50, 103, 2);
        let event = BridgeEvent::from_log(&log).unwrap();

        assert_eq!(event.transaction_id, tx_id);
        assert_eq!(event.destination_chain_id, U256::from(56u64));
        assert_eq!(event.amount, U256::from(50u64));
        assert_eq!(event.position(), (103, 2));
    }

    #[test]
    fn test_from_log_requires_block_number() {
        let mut log = transfer_log(BRIDGE, B256::repeat_byte(1), 56, 50, 103, 2);
        log.block_number = None;
        assert!(BridgeEvent::from_log(&log).is_err());
    }

    #[test]
    fn test_submit_mode_display() {
        assert_eq!(SubmitMode::Simulated.to_string(), "simulated");
        assert_eq!(SubmitMode::Broadcast.as_str(), "broadcast");
    }
}
