//! Node error classification
//!
//! alloy surfaces most node failures as a transport error with a free-form
//! message. These helpers sort them into the relayer's ledger taxonomy.

use crate::error::LedgerError;

/// Coarse class of a node error message
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorClass {
    /// Connectivity problem - node may recover (RPC timeout, network issues)
    Transient,
    /// Node refused the block span for eth_getLogs
    RangeLimit,
    /// Node or chain rejected the request itself
    Rejected,
    /// Anything else
    Unknown,
}

/// Classify an error message
pub fn classify_error(error: &str) -> ErrorClass {
    let error_lower = error.to_lowercase();

    // Range limits first: some providers phrase them as "limit exceeded"
    if error_lower.contains("block range")
        || error_lower.contains("range too large")
        || error_lower.contains("query returned more than")
        || error_lower.contains("too many results")
        || error_lower.contains("exceed maximum block range")
        || error_lower.contains("response size exceeded")
    {
        return ErrorClass::RangeLimit;
    }

    if error_lower.contains("timeout")
        || error_lower.contains("timed out")
        || error_lower.contains("connection")
        || error_lower.contains("network")
        || error_lower.contains("error sending request")
        || error_lower.contains("rate limit")
        || error_lower.contains("too many requests")
        || error_lower.contains("503")
        || error_lower.contains("502")
        || error_lower.contains("temporarily unavailable")
    {
        return ErrorClass::Transient;
    }

    if error_lower.contains("reverted")
        || error_lower.contains("underpriced")
        || error_lower.contains("nonce too low")
        || error_lower.contains("nonce too high")
        || error_lower.contains("already known")
        || error_lower.contains("insufficient funds")
        || error_lower.contains("invalid signature")
        || error_lower.contains("intrinsic gas too low")
        || error_lower.contains("out of gas")
    {
        return ErrorClass::Rejected;
    }

    ErrorClass::Unknown
}

/// Map a failed read (head, logs, nonce, gas price) to a ledger error.
///
/// Reads have no side effects, so anything not recognisably a range limit is
/// treated as the node being unavailable.
pub fn read_error(error: &str, from: u64, to: u64) -> LedgerError {
    match classify_error(error) {
        ErrorClass::RangeLimit => LedgerError::RangeTooLarge { from, to },
        _ => LedgerError::RpcUnavailable(error.to_string()),
    }
}

/// Map a failed broadcast to a ledger error
pub fn submit_error(error: &str) -> LedgerError {
    match classify_error(error) {
        ErrorClass::Transient => LedgerError::RpcUnavailable(error.to_string()),
        _ => LedgerError::Rejected(error.to_string()),
    }
}
