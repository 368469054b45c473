//! Bridge Relayer - Library interface
//!
//! Watches a source bridge contract for `BridgeTransferInitiated` events and
//! releases each transfer exactly once on the destination bridge.
//! Re-exports internal modules for use in integration tests.

pub mod config;
pub mod contracts;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod ledger;
pub mod relay_loop;
pub mod retry;
pub mod scanner;
pub mod server;
pub mod signer;
pub mod startup;
pub mod store;
pub mod submitter;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;
