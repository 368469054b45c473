//! Relay dispatcher
//!
//! Turns one [`BridgeEvent`] into at most one destination `releaseTokens`
//! transaction. The dedup index is checked first and written last, only after
//! the submitter reports the release final, so a failed attempt can simply be
//! dispatched again on a later cycle.
//!
//! A release that went out but could not be recorded is kept in memory. Later
//! dispatches of that transfer retry the record only, never the release.

use alloy::primitives::{Address, B256, U256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::error::{DispatchError, StoreError};
use crate::ledger::LedgerClient;
use crate::signer::RelaySigner;
use crate::store::{DedupIndex, DedupRecord};
use crate::submitter::Submitter;
use crate::types::{BridgeEvent, RelayAction, SubmitMode};

/// Proof of a completed relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayReceipt {
    pub transaction_id: B256,
    pub destination_tx_hash: B256,
    pub mode: SubmitMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Relayed(RelayReceipt),
    /// The dedup index already holds this transfer; nothing was done
    AlreadyRelayed,
    Failed(DispatchError),
}

impl DispatchOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchOutcome::Relayed(_) => "relayed",
            DispatchOutcome::AlreadyRelayed => "already_relayed",
            DispatchOutcome::Failed(_) => "failed",
        }
    }

    /// Terminal for watermark purposes: nothing left to retry for this event
    pub fn is_settled(&self) -> bool {
        match self {
            DispatchOutcome::Failed(e) => !e.is_retryable(),
            _ => true,
        }
    }
}

/// Destination-side settings for building releases
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub destination_bridge: Address,
    /// When set, events addressed to any other chain are refused
    pub expected_chain_id: Option<u64>,
    pub gas_limit: u64,
}

pub struct RelayDispatcher<L> {
    destination: Arc<L>,
    signer: RelaySigner,
    submitter: Box<dyn Submitter>,
    dedup: Box<dyn DedupIndex>,
    settings: DispatchSettings,
    /// Submitted releases whose dedup insert failed
    unrecorded: HashMap<B256, DedupRecord>,
}

impl<L: LedgerClient> RelayDispatcher<L> {
    pub fn new(
        destination: Arc<L>,
        signer: RelaySigner,
        submitter: Box<dyn Submitter>,
        dedup: Box<dyn DedupIndex>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            destination,
            signer,
            submitter,
            dedup,
            settings,
            unrecorded: HashMap::new(),
        }
    }

    pub fn mode(&self) -> SubmitMode {
        self.submitter.mode()
    }

    pub async fn is_relayed(&self, transaction_id: &B256) -> Result<bool, StoreError> {
        if self.unrecorded.contains_key(transaction_id) {
            return Ok(true);
        }
        self.dedup.contains(transaction_id).await
    }

    /// Dispatch one event. Performs zero or one destination write.
    pub async fn dispatch(&mut self, event: &BridgeEvent) -> DispatchOutcome {
        match self.try_dispatch(event).await {
            Ok(Some(receipt)) => DispatchOutcome::Relayed(receipt),
            Ok(None) => DispatchOutcome::AlreadyRelayed,
            Err(e) => DispatchOutcome::Failed(e),
        }
    }

    async fn try_dispatch(
        &mut self,
        event: &BridgeEvent,
    ) -> Result<Option<RelayReceipt>, DispatchError> {
        if let Some(record) = self.unrecorded.get(&event.transaction_id) {
            self.dedup.insert(record.clone()).await?;
            self.unrecorded.remove(&event.transaction_id);
            info!(transaction_id = %event.transaction_id, "Recorded earlier release");
            return Ok(None);
        }

        if self.dedup.contains(&event.transaction_id).await? {
            debug!(transaction_id = %event.transaction_id, "Transfer already relayed");
            return Ok(None);
        }

        if let Some(expected) = self.settings.expected_chain_id {
            if event.destination_chain_id != U256::from(expected) {
                return Err(DispatchError::WrongDestination {
                    expected,
                    actual: event.destination_chain_id,
                });
            }
        }

        let action = RelayAction::from_event(event);
        let params = self.destination.tx_params(self.signer.address()).await?;
        let request = action.to_request(
            self.signer.address(),
            self.settings.destination_bridge,
            &params,
            self.settings.gas_limit,
        );

        debug!(
            transaction_id = %event.transaction_id,
            nonce = params.nonce,
            gas_price = params.gas_price,
            chain_id = params.chain_id,
            "Built release transaction"
        );

        let signed = self.signer.sign(request).await?;
        let destination_tx_hash = self.submitter.submit(&signed).await?;
        let mode = self.submitter.mode();

        let record = DedupRecord {
            transaction_id: event.transaction_id,
            source_block: event.source_block,
            destination_tx_hash,
            mode,
        };
        if let Err(e) = self.dedup.insert(record.clone()).await {
            self.unrecorded.insert(event.transaction_id, record);
            error!(
                transaction_id = %event.transaction_id,
                %destination_tx_hash,
                error = %e,
                "Release submitted but dedup record failed, will retry the record only"
            );
            return Err(e.into());
        }

        info!(
            transaction_id = %event.transaction_id,
            recipient = %action.recipient,
            token = %action.token,
            amount = %action.amount,
            %destination_tx_hash,
            %mode,
            "Transfer relayed"
        );

        Ok(Some(RelayReceipt {
            transaction_id: event.transaction_id,
            destination_tx_hash,
            mode,
        }))
    }
}
