//! Relayer assembly
//!
//! Turns a validated [`Config`] into a ready [`RelayLoop`]: chain clients,
//! signer, relay state backends and the initial watermark.

use eyre::{Result, WrapErr};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::{self, PgDedupIndex, PgWatermark};
use crate::dispatcher::{DispatchSettings, RelayDispatcher};
use crate::ledger::{EvmLedgerClient, LedgerClient};
use crate::relay_loop::RelayLoop;
use crate::retry::{with_retry, RetryConfig};
use crate::scanner::EventScanner;
use crate::server::{SharedMetrics, SharedStats};
use crate::signer::RelaySigner;
use crate::store::{
    resolve_start, DedupIndex, MemoryDedupIndex, MemoryWatermark, StartSource, WatermarkStore,
};
use crate::submitter::submitter_for;
use crate::types::SubmitMode;

pub type EvmRelayLoop = RelayLoop<EvmLedgerClient, EvmLedgerClient>;

/// Build the relay loop. Fails on bad configuration or a node that stays
/// unreachable through the startup retries.
pub async fn build_relayer(
    config: &Config,
    stats: SharedStats,
    metrics: SharedMetrics,
) -> Result<EvmRelayLoop> {
    let source_bridge = config.source_bridge()?;
    let destination_bridge = config.destination_bridge()?;
    let signer = RelaySigner::from_private_key(&config.relayer.private_key)?;

    let source = Arc::new(
        EvmLedgerClient::new(&config.source.rpc_url).wrap_err("Failed to create source client")?,
    );
    let destination = Arc::new(
        EvmLedgerClient::new(&config.destination.rpc_url)
            .wrap_err("Failed to create destination client")?,
    );

    let retry = RetryConfig::default();
    let source_chain_id = with_retry(&retry, "source_chain_id", || source.chain_id())
        .await
        .wrap_err("Source chain unreachable")?;
    let destination_chain_id =
        with_retry(&retry, "destination_chain_id", || destination.chain_id())
            .await
            .wrap_err("Destination chain unreachable")?;
    let head = with_retry(&retry, "source_head", || source.current_height())
        .await
        .wrap_err("Failed to read source head")?;

    info!(
        source_chain_id,
        destination_chain_id,
        source_head = head,
        relayer = %signer.address(),
        "Connected to chains"
    );

    if let Some(expected) = config.destination.chain_id {
        if expected != destination_chain_id {
            warn!(
                expected,
                destination_chain_id,
                "DESTINATION_CHAIN_ID differs from the destination node's chain id"
            );
        }
    }

    let mode = if config.relayer.simulation_mode {
        SubmitMode::Simulated
    } else {
        SubmitMode::Broadcast
    };

    let (watermark, dedup) = match &config.database {
        Some(database) => {
            let pool = db::create_pool(&database.url).await?;
            db::run_migrations(&pool).await?;
            info!("Database connected, migrations complete");

            let stream_key = db::watermark_stream_key(source_chain_id, &source_bridge, mode);
            let persisted = PgWatermark::load(&pool, &stream_key)
                .await
                .wrap_err("Failed to read persisted watermark")?;
            let (start, from) = resolve_start(persisted, config.source.start_block, head);
            log_start(start, from, head);

            let watermark: Box<dyn WatermarkStore> = Box::new(
                PgWatermark::init(pool.clone(), stream_key, start)
                    .await
                    .wrap_err("Failed to initialise watermark")?,
            );
            let dedup: Box<dyn DedupIndex> = Box::new(PgDedupIndex::new(pool, mode));
            (watermark, dedup)
        }
        None => {
            warn!(
                "No DATABASE_URL set: relay state is in memory. A restart forgets relayed \
                 transfers and may relay them again"
            );
            let (start, from) = resolve_start(None, config.source.start_block, head);
            log_start(start, from, head);
            let watermark: Box<dyn WatermarkStore> = Box::new(MemoryWatermark::new(start));
            let dedup: Box<dyn DedupIndex> = Box::new(MemoryDedupIndex::new());
            (watermark, dedup)
        }
    };

    let scanner = EventScanner::new(source.clone(), source_bridge, config.source.max_scan_range);
    let submitter = submitter_for(
        config.relayer.simulation_mode,
        destination.clone(),
        config.receipt_timeout(),
    );
    let dispatcher = RelayDispatcher::new(
        destination,
        signer,
        submitter,
        dedup,
        DispatchSettings {
            destination_bridge,
            expected_chain_id: config.destination.chain_id,
            gas_limit: config.destination.gas_limit,
        },
    );

    if mode == SubmitMode::Simulated {
        info!("SIMULATION_MODE is on: releases are signed and logged, never broadcast");
    }

    {
        let mut stats = stats.write().await;
        stats.mode = mode.to_string();
        stats.last_scanned_block = watermark.get();
        stats.source_head = head;
    }

    Ok(RelayLoop::new(source, scanner, dispatcher, watermark, config.poll_interval())
        .with_monitoring(stats, metrics))
}

fn log_start(start: u64, from: StartSource, head: u64) {
    match from {
        StartSource::Persisted => info!(watermark = start, head, "Resuming from persisted watermark"),
        StartSource::Configured => info!(watermark = start, head, "Starting from START_BLOCK"),
        StartSource::SourceHead => info!(watermark = start, "No START_BLOCK, starting at source head"),
    }
    if start > head {
        warn!(watermark = start, head, "Watermark is ahead of the source head");
    }
}
