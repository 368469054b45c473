//! HTTP server for health and metrics endpoints

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use eyre::eyre;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::info;

/// Relay statistics shared between the relay loop and the HTTP server
#[derive(Debug, Default, Clone)]
pub struct RelayStats {
    /// Cycles that ran to completion (including ones that found nothing new)
    pub cycles_completed: u64,
    pub events_scanned: u64,
    pub relayed: u64,
    pub already_relayed: u64,
    pub failed: u64,
    pub last_scanned_block: u64,
    pub source_head: u64,
    /// "simulated" or "broadcast"
    pub mode: String,
    pub last_error: Option<String>,
}

/// Prometheus metrics
pub struct Metrics {
    pub cycles_total: IntCounter,
    pub events_scanned_total: IntCounter,
    /// Labelled by `outcome`: relayed, already_relayed, failed
    pub dispatch_outcomes_total: IntCounterVec,
    /// Labelled by error `kind`
    pub errors_total: IntCounterVec,
    pub watermark_block: IntGauge,
    pub source_head_block: IntGauge,
    pub registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let cycles_total = IntCounter::new(
            "relayer_cycles_total",
            "Total number of completed scan/dispatch cycles",
        )
        .expect("constant metric name is valid");

        let events_scanned_total = IntCounter::new(
            "relayer_events_scanned_total",
            "Total number of BridgeTransferInitiated events decoded",
        )
        .expect("constant metric name is valid");

        let dispatch_outcomes_total = IntCounterVec::new(
            Opts::new(
                "relayer_dispatch_outcomes_total",
                "Dispatch results by outcome",
            ),
            &["outcome"],
        )
        .expect("constant metric name is valid");

        let errors_total = IntCounterVec::new(
            Opts::new("relayer_errors_total", "Relay errors by kind"),
            &["kind"],
        )
        .expect("constant metric name is valid");

        let watermark_block = IntGauge::new(
            "relayer_watermark_block",
            "Last fully scanned source block",
        )
        .expect("constant metric name is valid");

        let source_head_block = IntGauge::new(
            "relayer_source_head_block",
            "Latest source block height observed",
        )
        .expect("constant metric name is valid");

        // Names are unique constants and registration happens once per registry
        registry
            .register(Box::new(cycles_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(events_scanned_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(dispatch_outcomes_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(errors_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(watermark_block.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(source_head_block.clone()))
            .expect("metric registration must not be called twice");

        Self {
            cycles_total,
            events_scanned_total,
            dispatch_outcomes_total,
            errors_total,
            watermark_block,
            source_head_block,
            registry,
        }
    }

    pub fn record_error(&self, kind: &str) {
        self.errors_total.with_label_values(&[kind]).inc();
    }

    pub fn record_outcome(&self, outcome: &str) {
        self.dispatch_outcomes_total
            .with_label_values(&[outcome])
            .inc();
    }
}

/// Shared state for the HTTP server
pub type SharedStats = Arc<RwLock<RelayStats>>;
pub type SharedMetrics = Arc<Metrics>;

/// Combined app state
#[derive(Clone)]
pub struct AppState {
    pub stats: SharedStats,
    pub metrics: SharedMetrics,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub mode: String,
    pub cycles_completed: u64,
    pub events_scanned: u64,
    pub relayed: u64,
    pub already_relayed: u64,
    pub failed: u64,
    pub last_scanned_block: u64,
    pub source_head: u64,
    pub blocks_behind: u64,
    pub last_error: Option<String>,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.stats.read().await;
    Json(HealthResponse {
        status: "healthy".to_string(),
        mode: stats.mode.clone(),
        cycles_completed: stats.cycles_completed,
        events_scanned: stats.events_scanned,
        relayed: stats.relayed,
        already_relayed: stats.already_relayed,
        failed: stats.failed,
        last_scanned_block: stats.last_scanned_block,
        source_head: stats.source_head,
        blocks_behind: stats.source_head.saturating_sub(stats.last_scanned_block),
        last_error: stats.last_error.clone(),
    })
}

/// Liveness probe (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Readiness probe: ready once the relay loop has completed a cycle
async fn readiness(State(state): State<AppState>) -> Response {
    let stats = state.stats.read().await;
    if stats.cycles_completed > 0 {
        "OK".into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT_READY").into_response()
    }
}

/// Prometheus metrics endpoint
async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    let stats = state.stats.read().await;
    state
        .metrics
        .watermark_block
        .set(stats.last_scanned_block as i64);
    state.metrics.source_head_block.set(stats.source_head as i64);
    drop(stats);

    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry.gather();
    let mut buffer = Vec::new();

    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response();
    }

    match Response::builder()
        .header(header::CONTENT_TYPE, encoder.format_type())
        .body(axum::body::Body::from(buffer))
    {
        Ok(resp) => resp,
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to build metrics response",
        )
            .into_response(),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(liveness))
        .route("/readyz", get(readiness))
        .route("/metrics", get(prometheus_metrics))
        .with_state(state)
}

/// Start the HTTP server for health and metrics
pub async fn start_server(
    bind_address: &str,
    stats: SharedStats,
    prom_metrics: SharedMetrics,
) -> eyre::Result<()> {
    let state = AppState {
        stats,
        metrics: prom_metrics,
    };

    let addr: SocketAddr = bind_address
        .parse()
        .map_err(|e| eyre!("Invalid bind address {}: {}", bind_address, e))?;
    let listener = TcpListener::bind(addr).await?;
    info!("Health server listening on {}", addr);
    info!("  /health  - Full health status (JSON)");
    info!("  /metrics - Prometheus metrics");

    axum::serve(listener, router(state)).await?;

    Ok(())
}
