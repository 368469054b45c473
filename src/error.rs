//! Error types for the relay pipeline
//!
//! Each layer has its own enum so the loop can decide what is transient,
//! what is handled locally, and what is fatal:
//!
//! - [`LedgerError`] - failures talking to a chain node
//! - [`DispatchError`] - why a single event was not relayed
//! - [`StoreError`] - watermark / dedup backend failures
//! - [`CycleError`] - anything that aborts one scan/dispatch cycle

use alloy::primitives::{B256, U256};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("RPC unavailable: {0}")]
    RpcUnavailable(String),

    #[error("block range {from}..={to} exceeds the query limit")]
    RangeTooLarge { from: u64, to: u64 },

    #[error("invalid block range: from {from} is after to {to}")]
    InvalidRange { from: u64, to: u64 },

    #[error("rejected by node: {0}")]
    Rejected(String),

    #[error("no receipt for {tx_hash} after {timeout:?}")]
    Timeout { tx_hash: B256, timeout: Duration },
}

impl LedgerError {
    /// Short stable label used in log fields and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::RpcUnavailable(_) => "rpc_unavailable",
            LedgerError::RangeTooLarge { .. } => "range_too_large",
            LedgerError::InvalidRange { .. } => "invalid_range",
            LedgerError::Rejected(_) => "rejected",
            LedgerError::Timeout { .. } => "timeout",
        }
    }
}

/// Reason a dispatch ended in `Failed`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("cannot sign with relayer credential: {0}")]
    Credential(String),

    #[error("destination RPC unavailable: {0}")]
    RpcUnavailable(String),

    #[error("failed to build release transaction: {0}")]
    Build(String),

    #[error("destination chain rejected release: {0}")]
    ChainRejected(String),

    #[error("release {tx_hash} not confirmed within {timeout:?}")]
    Timeout { tx_hash: B256, timeout: Duration },

    #[error("event targets chain {actual}, relayer serves chain {expected}")]
    WrongDestination { expected: u64, actual: U256 },

    #[error("dedup index unavailable: {0}")]
    Index(String),
}

impl DispatchError {
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Credential(_) => "credential",
            DispatchError::RpcUnavailable(_) => "rpc_unavailable",
            DispatchError::Build(_) => "build",
            DispatchError::ChainRejected(_) => "chain_rejected",
            DispatchError::Timeout { .. } => "timeout",
            DispatchError::WrongDestination { .. } => "wrong_destination",
            DispatchError::Index(_) => "index",
        }
    }

    /// Whether re-dispatching the same event on a later cycle can succeed.
    ///
    /// A destination mismatch is a pure function of the event, so it never
    /// holds back the watermark. Everything else does. This is the one failed
    /// dispatch that still lets the watermark advance past its block.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, DispatchError::WrongDestination { .. })
    }
}

impl From<LedgerError> for DispatchError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::RpcUnavailable(msg) => DispatchError::RpcUnavailable(msg),
            LedgerError::Rejected(msg) => DispatchError::ChainRejected(msg),
            LedgerError::Timeout { tx_hash, timeout } => DispatchError::Timeout { tx_hash, timeout },
            other @ (LedgerError::RangeTooLarge { .. } | LedgerError::InvalidRange { .. }) => {
                DispatchError::Build(other.to_string())
            }
        }
    }
}

impl From<StoreError> for DispatchError {
    fn from(err: StoreError) -> Self {
        DispatchError::Index(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("watermark cannot move backwards: current {current}, requested {requested}")]
    NonMonotonic { current: u64, requested: u64 },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt stored value: {0}")]
    Corrupt(String),
}

/// Failure that aborts a single relay cycle
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("source ledger: {0}")]
    Source(#[from] LedgerError),

    #[error("relay state store: {0}")]
    Store(#[from] StoreError),
}

impl CycleError {
    pub fn kind(&self) -> &'static str {
        match self {
            CycleError::Source(e) => e.kind(),
            CycleError::Store(StoreError::NonMonotonic { .. }) => "non_monotonic",
            CycleError::Store(_) => "store",
        }
    }

    /// Invariant violations stop the relayer; everything else is retried next tick
    pub fn is_fatal(&self) -> bool {
        matches!(self, CycleError::Store(StoreError::NonMonotonic { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_destination_is_permanent() {
        let err = DispatchError::WrongDestination {
            expected: 56,
            actual: U256::from(1u64),
        };
        assert!(!err.is_retryable());
        assert!(DispatchError::RpcUnavailable("down".into()).is_retryable());
        assert!(DispatchError::ChainRejected("reverted".into()).is_retryable());
    }

    #[test]
    fn test_ledger_error_maps_into_dispatch_taxonomy() {
        let err: DispatchError = LedgerError::RpcUnavailable("connection refused".into()).into();
        assert_eq!(err.kind(), "rpc_unavailable");

        let err: DispatchError = LedgerError::Rejected("nonce too low".into()).into();
        assert_eq!(err.kind(), "chain_rejected");

        let err: DispatchError = LedgerError::Timeout {
            tx_hash: B256::ZERO,
            timeout: Duration::from_secs(120),
        }
        .into();
        assert_eq!(err.kind(), "timeout");
    }

    #[test]
    fn test_only_non_monotonic_is_fatal() {
        let fatal = CycleError::Store(StoreError::NonMonotonic {
            current: 10,
            requested: 9,
        });
        assert!(fatal.is_fatal());
        assert_eq!(fatal.kind(), "non_monotonic");

        let transient = CycleError::Source(LedgerError::RpcUnavailable("timeout".into()));
        assert!(!transient.is_fatal());
        assert_eq!(transient.kind(), "rpc_unavailable");
    }
}
