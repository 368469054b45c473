use alloy::primitives::{Address, B256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{Filter, Log};
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use eyre::{Result, WrapErr};
use std::time::Duration;
use tracing::debug;

use super::classify::{read_error, submit_error};
use super::{LedgerClient, ReceiptStatus, TxParams};
use crate::error::LedgerError;

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// [`LedgerClient`] over an alloy HTTP provider
pub struct EvmLedgerClient {
    provider: RootProvider<Http<Client>>,
    rpc_url: String,
}

impl EvmLedgerClient {
    /// Create a client for one chain endpoint. No request is made until first use.
    pub fn new(rpc_url: &str) -> Result<Self> {
        let url = rpc_url
            .parse()
            .wrap_err_with(|| format!("Invalid RPC URL: {}", rpc_url))?;
        let provider = ProviderBuilder::new().on_http(url);

        Ok(Self {
            provider,
            rpc_url: rpc_url.to_string(),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }
}

fn unavailable(error: impl ToString) -> LedgerError {
    LedgerError::RpcUnavailable(error.to_string())
}

#[async_trait]
impl LedgerClient for EvmLedgerClient {
    async fn chain_id(&self) -> Result<u64, LedgerError> {
        self.provider.get_chain_id().await.map_err(unavailable)
    }

    async fn current_height(&self) -> Result<u64, LedgerError> {
        self.provider.get_block_number().await.map_err(unavailable)
    }

    async fn query_events(
        &self,
        contract: Address,
        signature: B256,
        from: u64,
        to: u64,
    ) -> Result<Vec<Log>, LedgerError> {
        if from > to {
            return Err(LedgerError::InvalidRange { from, to });
        }

        let filter = Filter::new()
            .address(contract)
            .event_signature(signature)
            .from_block(from)
            .to_block(to);

        self.provider
            .get_logs(&filter)
            .await
            .map_err(|e| read_error(&e.to_string(), from, to))
    }

    async fn tx_params(&self, account: Address) -> Result<TxParams, LedgerError> {
        let nonce = self
            .provider
            .get_transaction_count(account)
            .pending()
            .await
            .map_err(unavailable)?;
        let gas_price = self.provider.get_gas_price().await.map_err(unavailable)?;
        let chain_id = self.provider.get_chain_id().await.map_err(unavailable)?;

        Ok(TxParams {
            nonce,
            gas_price,
            chain_id,
        })
    }

    async fn send_raw(&self, raw: &[u8]) -> Result<B256, LedgerError> {
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(|e| submit_error(&e.to_string()))?;
        Ok(*pending.tx_hash())
    }

    async fn wait_receipt(
        &self,
        tx_hash: B256,
        timeout: Duration,
    ) -> Result<ReceiptStatus, LedgerError> {
        let poll = async {
            loop {
                match self.provider.get_transaction_receipt(tx_hash).await {
                    Ok(Some(receipt)) => {
                        return if receipt.status() {
                            ReceiptStatus::Success
                        } else {
                            ReceiptStatus::Reverted
                        };
                    }
                    Ok(None) => {}
                    // Receipt polling is read-only; a flaky node just costs a poll
                    Err(e) => debug!(%tx_hash, error = %e, "Receipt poll failed"),
                }
                tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
            }
        };

        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| LedgerError::Timeout { tx_hash, timeout })
    }
}
