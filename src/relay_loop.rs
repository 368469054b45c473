//! Relay loop
//!
//! Drives scan → dispatch cycles against the source chain and owns the scan
//! watermark. One task, strictly sequential dispatch: the relayer's nonce is
//! only safe with a single in-flight release.
//!
//! The watermark moves to the cycle's head only after every event in
//! `(watermark, head]` is settled. Any retryable dispatch failure or scan
//! error leaves it where it was and the whole range is scanned again next
//! cycle; the dedup index keeps already-relayed events from going out twice.

use eyre::{Result, WrapErr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::dispatcher::{DispatchOutcome, RelayDispatcher};
use crate::error::{CycleError, LedgerError};
use crate::ledger::LedgerClient;
use crate::scanner::EventScanner;
use crate::server::{Metrics, RelayStats, SharedMetrics, SharedStats};
use crate::store::WatermarkStore;
use crate::types::BridgeEvent;

/// What one cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub head: u64,
    /// Watermark when the cycle started
    pub from_watermark: u64,
    pub events: usize,
    pub relayed: usize,
    pub already_relayed: usize,
    pub failed_retryable: usize,
    pub failed_permanent: usize,
    /// Set when the watermark moved to `head`
    pub advanced: bool,
}

impl CycleReport {
    /// No new blocks since the last cycle
    pub fn is_idle(&self) -> bool {
        self.head <= self.from_watermark
    }
}

pub struct RelayLoop<S, D> {
    source: Arc<S>,
    scanner: EventScanner<S>,
    dispatcher: RelayDispatcher<D>,
    watermark: Box<dyn WatermarkStore>,
    poll_interval: Duration,
    stats: SharedStats,
    metrics: SharedMetrics,
}

impl<S: LedgerClient, D: LedgerClient> RelayLoop<S, D> {
    pub fn new(
        source: Arc<S>,
        scanner: EventScanner<S>,
        dispatcher: RelayDispatcher<D>,
        watermark: Box<dyn WatermarkStore>,
        poll_interval: Duration,
    ) -> Self {
        let stats = RelayStats {
            mode: dispatcher.mode().to_string(),
            last_scanned_block: watermark.get(),
            ..Default::default()
        };

        Self {
            source,
            scanner,
            dispatcher,
            watermark,
            poll_interval,
            stats: Arc::new(RwLock::new(stats)),
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Share stats and metrics with the health server
    pub fn with_monitoring(mut self, stats: SharedStats, metrics: SharedMetrics) -> Self {
        self.stats = stats;
        self.metrics = metrics;
        self
    }

    pub fn stats(&self) -> SharedStats {
        self.stats.clone()
    }

    pub fn watermark(&self) -> u64 {
        self.watermark.get()
    }

    pub fn dispatcher(&self) -> &RelayDispatcher<D> {
        &self.dispatcher
    }

    /// Run cycles until a shutdown signal arrives or a fatal error occurs.
    ///
    /// Shutdown is only observed between cycles; a started cycle always
    /// finishes its dispatches.
    pub async fn run(mut self, mut shutdown: mpsc::Receiver<()>) -> Result<()> {
        info!(
            watermark = self.watermark.get(),
            mode = %self.dispatcher.mode(),
            poll_interval = ?self.poll_interval,
            max_scan_range = self.scanner.max_range(),
            "Relay loop starting"
        );

        loop {
            match self.run_cycle().await {
                Ok(report) if report.is_idle() => {
                    debug!(head = report.head, "No new blocks");
                }
                Ok(report) => {
                    info!(
                        head = report.head,
                        events = report.events,
                        relayed = report.relayed,
                        already_relayed = report.already_relayed,
                        failed = report.failed_retryable + report.failed_permanent,
                        advanced = report.advanced,
                        "Relay cycle complete"
                    );
                }
                Err(e) if e.is_fatal() => {
                    error!(error_kind = e.kind(), error = %e, "Fatal relay error, stopping");
                    self.metrics.record_error(e.kind());
                    return Err(e).wrap_err("Relay loop stopped");
                }
                Err(e) => {
                    warn!(error_kind = e.kind(), error = %e, "Relay cycle failed, retrying next tick");
                    self.metrics.record_error(e.kind());
                    self.stats.write().await.last_error = Some(e.to_string());
                }
            }

            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!(watermark = self.watermark.get(), "Relay loop stopped");
        Ok(())
    }

    /// Run exactly one scan → dispatch cycle
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        let head = self.source.current_height().await?;
        let watermark = self.watermark.get();

        let mut report = CycleReport {
            head,
            from_watermark: watermark,
            ..Default::default()
        };

        if head <= watermark {
            self.finish_cycle(&report).await;
            return Ok(report);
        }

        info!(from_block = watermark + 1, to_block = head, head, "Scanning source range");

        let mut chunk = self.scanner.max_range();
        let mut from = watermark + 1;
        while from <= head {
            let to = head.min(from.saturating_add(chunk - 1));
            let span = to - from + 1;

            let events = match self.scanner.scan(from, to).await {
                Ok(events) => events,
                Err(LedgerError::RangeTooLarge { .. }) if span > 1 => {
                    chunk = span / 2;
                    debug!(from_block = from, to_block = to, chunk, "Node refused range, splitting");
                    continue;
                }
                Err(e) => {
                    warn!(
                        from_block = from,
                        to_block = to,
                        error_kind = e.kind(),
                        error = %e,
                        "Scan failed, watermark held"
                    );
                    return Err(e.into());
                }
            };

            report.events += events.len();
            self.metrics.events_scanned_total.inc_by(events.len() as u64);

            for event in &events {
                self.dispatch_one(event, &mut report).await;
            }

            from = to + 1;
        }

        if report.failed_retryable == 0 {
            self.watermark.advance(head).await?;
            report.advanced = true;
        } else {
            warn!(
                watermark,
                head,
                failed = report.failed_retryable,
                "Retryable failures in range, watermark held"
            );
        }

        self.finish_cycle(&report).await;
        Ok(report)
    }

    async fn dispatch_one(&mut self, event: &BridgeEvent, report: &mut CycleReport) {
        let outcome = self.dispatcher.dispatch(event).await;
        self.metrics.record_outcome(outcome.kind());

        match &outcome {
            DispatchOutcome::Relayed(_) => report.relayed += 1,
            DispatchOutcome::AlreadyRelayed => {
                debug!(
                    transaction_id = %event.transaction_id,
                    source_block = event.source_block,
                    outcome = outcome.kind(),
                    "Skipping relayed transfer"
                );
                report.already_relayed += 1;
            }
            DispatchOutcome::Failed(e) => {
                self.metrics.record_error(e.kind());
                if e.is_retryable() {
                    warn!(
                        transaction_id = %event.transaction_id,
                        source_block = event.source_block,
                        error_kind = e.kind(),
                        error = %e,
                        "Dispatch failed, will retry"
                    );
                    report.failed_retryable += 1;
                } else {
                    error!(
                        transaction_id = %event.transaction_id,
                        source_block = event.source_block,
                        error_kind = e.kind(),
                        error = %e,
                        "Dispatch failed permanently, transfer will not be relayed"
                    );
                    report.failed_permanent += 1;
                }
            }
        }
    }

    async fn finish_cycle(&self, report: &CycleReport) {
        self.metrics.cycles_total.inc();

        let mut stats = self.stats.write().await;
        stats.cycles_completed += 1;
        stats.events_scanned += report.events as u64;
        stats.relayed += report.relayed as u64;
        stats.already_relayed += report.already_relayed as u64;
        stats.failed += (report.failed_retryable + report.failed_permanent) as u64;
        stats.source_head = report.head;
        stats.last_scanned_block = self.watermark.get();
    }
}
