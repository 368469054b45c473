//! Bridge contract ABI definitions
//!
//! Uses alloy's sol! macro to generate type-safe bindings. The relayer only
//! needs the transfer event on the source side and the release call on the
//! destination side.

use alloy::primitives::B256;
use alloy::sol;
use alloy::sol_types::SolEvent;

sol! {
    /// Source bridge: emits one event per locked transfer
    contract SourceBridge {
        /// Emitted when a user initiates a transfer to another chain
        ///
        /// `transactionId` is unique per transfer and is the relayer's dedup key.
        event BridgeTransferInitiated(
            bytes32 indexed transactionId,
            address indexed sender,
            uint256 indexed destinationChainId,
            address token,
            uint256 amount
        );
    }

    /// Destination bridge: releases funds for a relayed transfer
    contract DestinationBridge {
        function releaseTokens(
            bytes32 sourceTransactionId,
            address recipient,
            address token,
            uint256 amount
        ) external;
    }
}

/// Topic0 of `BridgeTransferInitiated(bytes32,address,uint256,address,uint256)`
pub fn transfer_initiated_signature() -> B256 {
    SourceBridge::BridgeTransferInitiated::SIGNATURE_HASH
}
