//! Environment-driven runner configuration.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use thiserror::Error;

use giftscan_core::{EventFilter, ScannerConfig};

/// Everything the runner binary needs, read from `.env`/process variables.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    rpc_url: String,
    contract_address: String,
    event_topic: String,
    db_path: String,
    notify_url: String,
    notification_kind: String,
    category_names: HashMap<String, String>,
    scanner: ScannerConfig,
}

impl RunnerConfig {
    /// Loads configuration by hydrating `.env` (if present) and reading
    /// process variables. Scanner knobs are optional and fall back to the
    /// built-in defaults.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        hydrate_env_file()?;

        let mut scanner = ScannerConfig::default();
        if let Some(genesis) = get_optional_u64("GIFTSCAN_GENESIS_BLOCK")? {
            scanner.genesis_block = genesis;
        }
        if let Some(safety) = get_optional_u64("GIFTSCAN_REORG_SAFETY_BLOCKS")? {
            scanner.reorg_safety_blocks = safety;
        }
        if let Some(min) = get_optional_u64("GIFTSCAN_MIN_CHUNK_SIZE")? {
            scanner.min_chunk_size = min;
            scanner.start_chunk_size = min;
        }
        if let Some(max) = get_optional_u64("GIFTSCAN_MAX_CHUNK_SIZE")? {
            scanner.max_chunk_size = max;
        }
        if let Some(retries) = get_optional_u64("GIFTSCAN_MAX_REQUEST_RETRIES")? {
            scanner.max_request_retries = retries as u32;
        }
        if let Some(secs) = get_optional_u64("GIFTSCAN_POLL_INTERVAL_SECS")? {
            scanner.poll_interval = Duration::from_secs(secs);
        }

        Ok(Self {
            rpc_url: get_required_var("GIFTSCAN_RPC_URL")?,
            contract_address: get_required_var("GIFTSCAN_CONTRACT_ADDRESS")?,
            event_topic: get_required_var("GIFTSCAN_EVENT_TOPIC")?,
            db_path: get_optional_var("GIFTSCAN_DB_PATH")
                .unwrap_or_else(|| "./giftscan.db".to_string()),
            notify_url: get_required_var("GIFTSCAN_NOTIFY_URL")?,
            notification_kind: get_optional_var("GIFTSCAN_NOTIFICATION_KIND")
                .unwrap_or_else(|| "nft_conversion".to_string()),
            category_names: parse_category_names(
                get_optional_var("GIFTSCAN_CATEGORY_NAMES").as_deref(),
            ),
            scanner,
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    pub fn notify_url(&self) -> &str {
        &self.notify_url
    }

    pub fn notification_kind(&self) -> &str {
        &self.notification_kind
    }

    pub fn category_names(&self) -> &HashMap<String, String> {
        &self.category_names
    }

    pub fn scanner(&self) -> &ScannerConfig {
        &self.scanner
    }

    /// The log filter for the monitored contract event.
    pub fn event_filter(&self) -> EventFilter {
        EventFilter::new(self.contract_address.clone(), self.event_topic.clone())
    }
}

/// Parse `"2=Silver,3=Gold"` into a category_id → name map. Malformed
/// entries are skipped.
fn parse_category_names(raw: Option<&str>) -> HashMap<String, String> {
    raw.unwrap_or_default()
        .split(',')
        .filter_map(|pair| {
            let (id, name) = pair.split_once('=')?;
            let (id, name) = (id.trim(), name.trim());
            if id.is_empty() || name.is_empty() {
                None
            } else {
                Some((id.to_string(), name.to_string()))
            }
        })
        .collect()
}

fn get_required_var(key: &'static str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                Err(ConfigError::MissingVar { key })
            } else {
                Ok(trimmed.to_string())
            }
        }
        Err(_) => Err(ConfigError::MissingVar { key }),
    }
}

fn get_optional_var(key: &'static str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn get_optional_u64(key: &'static str) -> Result<Option<u64>, ConfigError> {
    get_optional_var(key)
        .map(|value| {
            value
                .parse()
                .map_err(|source| ConfigError::InvalidNumber { key, source })
        })
        .transpose()
}

pub fn hydrate_env_file() -> Result<(), ConfigError> {
    if env::var_os("GIFTSCAN_SKIP_DOTENV").is_some() {
        return Ok(());
    }
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(ConfigError::Dotenv { source: err }),
    }

    Ok(())
}

/// Errors emitted when `.env` hydration or environment parsing fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable `{key}`")]
    MissingVar { key: &'static str },
    #[error("invalid integer in `{key}`: {source}")]
    InvalidNumber {
        key: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to load .env file: {source}")]
    Dotenv {
        #[from]
        source: dotenvy::Error,
    },
}
