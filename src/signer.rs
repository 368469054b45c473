//! Relayer signing credential
//!
//! Wraps alloy's `PrivateKeySigner` and `EthereumWallet`. Signing is local;
//! the key never leaves process memory and is never logged.

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder, TransactionBuilderError};
use alloy::primitives::{Address, Bytes, B256};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use eyre::{eyre, Result};
use std::fmt;

use crate::error::DispatchError;

/// A signed release transaction, ready to broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRelayTx {
    pub hash: B256,
    /// EIP-2718 encoded bytes for `eth_sendRawTransaction`
    pub raw: Bytes,
}

pub struct RelaySigner {
    wallet: EthereumWallet,
    address: Address,
}

impl RelaySigner {
    /// Parse a hex private key (with or without 0x prefix)
    pub fn from_private_key(private_key: &str) -> Result<Self> {
        let signer: PrivateKeySigner = private_key
            .parse()
            .map_err(|e| eyre!("Invalid private key: {}", e))?;
        let address = signer.address();

        Ok(Self {
            wallet: EthereumWallet::from(signer),
            address,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a fully populated transaction request
    pub async fn sign(&self, request: TransactionRequest) -> Result<SignedRelayTx, DispatchError> {
        let envelope = request.build(&self.wallet).await.map_err(|e| match e {
            TransactionBuilderError::Signer(err) => DispatchError::Credential(err.to_string()),
            other => DispatchError::Build(other.to_string()),
        })?;

        Ok(SignedRelayTx {
            hash: *envelope.tx_hash(),
            raw: envelope.encoded_2718().into(),
        })
    }
}

impl fmt::Debug for RelaySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelaySigner")
            .field("address", &self.address)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::TxParams;
    use crate::testing::{sample_event, BRIDGE, TEST_PRIVATE_KEY};
    use crate::types::RelayAction;
    use alloy::primitives::{address, keccak256};

    fn release_request(signer: &RelaySigner) -> TransactionRequest {
        let params = TxParams {
            nonce: 0,
            gas_price: 1_000_000_000,
            chain_id: 31337,
        };
        RelayAction::from_event(&sample_event(103, 0, 0xAA, 50)).to_request(
            signer.address(),
            BRIDGE,
            &params,
            200_000,
        )
    }

    #[test]
    fn test_address_derivation() {
        let signer = RelaySigner::from_private_key(TEST_PRIVATE_KEY).unwrap();
        assert_eq!(
            signer.address(),
            address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
        );
    }

    #[test]
    fn test_invalid_key_rejected() {
        assert!(RelaySigner::from_private_key("0x1234").is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let signer = RelaySigner::from_private_key(TEST_PRIVATE_KEY).unwrap();
        let debug = format!("{:?}", signer);
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains(TEST_PRIVATE_KEY.trim_start_matches("0x")));
    }

    #[tokio::test]
    async fn test_sign_produces_hash_of_raw_bytes() {
        let signer = RelaySigner::from_private_key(TEST_PRIVATE_KEY).unwrap();
        let signed = signer.sign(release_request(&signer)).await.unwrap();
        assert_eq!(keccak256(&signed.raw), signed.hash);
    }

    #[tokio::test]
    async fn test_sign_is_deterministic() {
        let signer = RelaySigner::from_private_key(TEST_PRIVATE_KEY).unwrap();
        let a = signer.sign(release_request(&signer)).await.unwrap();
        let b = signer.sign(release_request(&signer)).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_incomplete_request_is_build_error() {
        let signer = RelaySigner::from_private_key(TEST_PRIVATE_KEY).unwrap();
        let request = TransactionRequest::default().with_to(BRIDGE);
        let err = signer.sign(request).await.unwrap_err();
        assert_eq!(err.kind(), "build");
    }
}
