use alloy::primitives::Address;
use eyre::{eyre, Result, WrapErr};
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Main configuration for the relayer
#[derive(Debug, Clone)]
pub struct Config {
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    pub relayer: RelayerConfig,
    /// Durable relay state; in-memory stores when absent
    pub database: Option<DatabaseConfig>,
    pub api: ApiConfig,
}

/// Chain the relayer watches
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub rpc_url: String,
    pub bridge_address: String,
    /// First block to consider when no watermark is persisted.
    /// If not set, scanning starts at the current head.
    pub start_block: Option<u64>,
    pub max_scan_range: u64,
}

/// Chain the relayer releases on
#[derive(Debug, Clone)]
pub struct DestinationConfig {
    pub rpc_url: String,
    pub bridge_address: String,
    /// Chain id events must target; no cross-check when unset
    pub chain_id: Option<u64>,
    pub gas_limit: u64,
    pub receipt_timeout_secs: u64,
}

#[derive(Clone)]
pub struct RelayerConfig {
    pub private_key: String,
    pub poll_interval_secs: u64,
    /// Sign releases but never broadcast them
    pub simulation_mode: bool,
}

/// Custom Debug that redacts the private key.
impl fmt::Debug for RelayerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayerConfig")
            .field("private_key", &"<redacted>")
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("simulation_mode", &self.simulation_mode)
            .finish()
    }
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Custom Debug that redacts the database URL (may contain credentials).
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"<redacted>")
            .finish()
    }
}

/// Health and metrics server
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_address: String,
}

/// Default functions
fn default_poll_interval() -> u64 {
    15
}

fn default_simulation_mode() -> bool {
    true
}

fn default_max_scan_range() -> u64 {
    10_000
}

fn default_gas_limit() -> u64 {
    200_000
}

fn default_receipt_timeout() -> u64 {
    120
}

fn default_api_bind_address() -> String {
    "0.0.0.0:9090".to_string()
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|_| eyre!("{} environment variable is required", name))
}

/// Read an optional variable. Present but unparseable is an error, never a
/// silent fallback to the default.
fn optional<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| eyre!("{} has invalid value {:?}: {}", name, raw, e)),
        Err(_) => Ok(None),
    }
}

fn is_hex_address(value: &str) -> bool {
    value.len() == 42 && value.starts_with("0x") && value[2..].chars().all(|c| c.is_ascii_hexdigit())
}

fn is_hex_key(value: &str) -> bool {
    value.len() == 66 && value.starts_with("0x") && value[2..].chars().all(|c| c.is_ascii_hexdigit())
}

impl Config {
    /// Load configuration from environment variables
    /// Loads .env file if present, then reads from environment
    pub fn load() -> Result<Self> {
        Self::load_from_file(".env")
    }

    /// Load from a specific .env file path
    pub fn load_from_file(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            dotenvy::from_filename(path)
                .wrap_err_with(|| format!("Failed to load .env file from {}", path))?;
        }
        Self::load_from_env()
    }

    /// Load configuration from environment variables
    pub fn load_from_env() -> Result<Self> {
        let source = SourceConfig {
            rpc_url: required("SOURCE_RPC_URL")?,
            bridge_address: required("SOURCE_BRIDGE_ADDRESS")?,
            start_block: optional("START_BLOCK")?,
            max_scan_range: optional("MAX_SCAN_RANGE")?.unwrap_or(default_max_scan_range()),
        };

        let destination = DestinationConfig {
            rpc_url: required("DESTINATION_RPC_URL")?,
            bridge_address: required("DESTINATION_BRIDGE_ADDRESS")?,
            chain_id: optional("DESTINATION_CHAIN_ID")?,
            gas_limit: optional("RELEASE_GAS_LIMIT")?.unwrap_or(default_gas_limit()),
            receipt_timeout_secs: optional("RECEIPT_TIMEOUT_SECONDS")?
                .unwrap_or(default_receipt_timeout()),
        };

        let relayer = RelayerConfig {
            private_key: required("RELAYER_PRIVATE_KEY")?,
            poll_interval_secs: optional("POLL_INTERVAL_SECONDS")?
                .unwrap_or(default_poll_interval()),
            simulation_mode: optional("SIMULATION_MODE")?.unwrap_or(default_simulation_mode()),
        };

        let database = optional::<String>("DATABASE_URL")?.map(|url| DatabaseConfig { url });

        let api = ApiConfig {
            bind_address: optional("API_BIND_ADDRESS")?.unwrap_or_else(default_api_bind_address),
        };

        let config = Config {
            source,
            destination,
            relayer,
            database,
            api,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.source.rpc_url.is_empty() {
            return Err(eyre!("source.rpc_url cannot be empty"));
        }
        if self.destination.rpc_url.is_empty() {
            return Err(eyre!("destination.rpc_url cannot be empty"));
        }

        if !is_hex_address(&self.source.bridge_address) {
            return Err(eyre!(
                "source.bridge_address must be a valid hex address (42 chars with 0x prefix)"
            ));
        }
        if !is_hex_address(&self.destination.bridge_address) {
            return Err(eyre!(
                "destination.bridge_address must be a valid hex address (42 chars with 0x prefix)"
            ));
        }

        if !is_hex_key(&self.relayer.private_key) {
            return Err(eyre!("relayer.private_key must be 66 chars (0x + 64 hex chars)"));
        }

        if self.relayer.poll_interval_secs == 0 {
            return Err(eyre!("relayer.poll_interval_secs must be greater than 0"));
        }
        if self.source.max_scan_range == 0 {
            return Err(eyre!("source.max_scan_range must be greater than 0"));
        }
        if self.destination.gas_limit == 0 {
            return Err(eyre!("destination.gas_limit must be greater than 0"));
        }
        if self.destination.receipt_timeout_secs == 0 {
            return Err(eyre!("destination.receipt_timeout_secs must be greater than 0"));
        }

        if let Some(ref db) = self.database {
            if db.url.is_empty() {
                return Err(eyre!("database.url cannot be empty"));
            }
        }

        Ok(())
    }

    pub fn source_bridge(&self) -> Result<Address> {
        Address::from_str(&self.source.bridge_address)
            .wrap_err("Invalid source bridge address")
    }

    pub fn destination_bridge(&self) -> Result<Address> {
        Address::from_str(&self.destination.bridge_address)
            .wrap_err("Invalid destination bridge address")
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.relayer.poll_interval_secs)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.destination.receipt_timeout_secs)
    }
}
