//! Runtime configuration for central and edge processes
//!
//! Everything is environment-driven with serde-style defaults, so the
//! same structs also deserialize from a config file when an embedder
//! prefers one. The shared AES key arrives as 64 hex characters in
//! `FARWATCH_SECRET_KEY` and is validated before use.

use crate::crypto::SharedKey;
use crate::error::{FarwatchError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings for the central ingest side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CentralConfig {
    /// Shared AES-256 key as 64 hex characters
    #[serde(default)]
    pub secret_key_hex: String,

    /// Static bearer token expected on encrypted ingest requests.
    /// `None` disables the gate (trusted-network deployments).
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Ceiling on incoming envelope size, checked before any decrypt
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,

    /// Heartbeat cadence issued to registering nodes, in seconds
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Collection cadence issued to registering nodes, in seconds
    #[serde(default = "default_collection_interval")]
    pub collection_interval_secs: u64,

    /// How often the liveness monitor sweeps the registry, in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Most recent alerts kept in memory
    #[serde(default = "default_alert_history")]
    pub alert_history: usize,

    /// Most recent audit events kept in memory
    #[serde(default = "default_event_history")]
    pub event_history: usize,

    /// Directory for daily JSONL audit files; `None` disables file mirroring
    #[serde(default)]
    pub audit_log_dir: Option<PathBuf>,
}

/// Settings for an edge node agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Operator-assigned node identifier
    #[serde(default = "default_node_id")]
    pub node_id: String,

    /// Shared AES-256 key as 64 hex characters
    #[serde(default)]
    pub secret_key_hex: String,

    /// Bearer token presented to central, when one is required
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Store-and-forward buffer capacity; oldest entries are evicted
    /// beyond this
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Heartbeat cadence before a policy is received, in seconds
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Collection cadence before a policy is received, in seconds
    #[serde(default = "default_collection_interval")]
    pub collection_interval_secs: u64,

    /// Delay between registration attempts, in seconds
    #[serde(default = "default_register_retry")]
    pub register_retry_secs: u64,

    /// Hostname reported at registration
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Address reported at registration, informational only
    #[serde(default = "default_advertised_ip")]
    pub advertised_ip: String,
}

fn default_max_payload_bytes() -> usize {
    1_048_576
}

fn default_heartbeat_interval() -> u64 {
    60
}

fn default_collection_interval() -> u64 {
    30
}

fn default_sweep_interval() -> u64 {
    10
}

fn default_alert_history() -> usize {
    1_000
}

fn default_event_history() -> usize {
    5_000
}

fn default_node_id() -> String {
    "edge-001".to_string()
}

fn default_buffer_capacity() -> usize {
    100
}

fn default_register_retry() -> u64 {
    10
}

fn default_hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_advertised_ip() -> String {
    "127.0.0.1".to_string()
}

impl Default for CentralConfig {
    fn default() -> Self {
        Self {
            secret_key_hex: String::new(),
            bearer_token: None,
            max_payload_bytes: default_max_payload_bytes(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            collection_interval_secs: default_collection_interval(),
            sweep_interval_secs: default_sweep_interval(),
            alert_history: default_alert_history(),
            event_history: default_event_history(),
            audit_log_dir: None,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            secret_key_hex: String::new(),
            bearer_token: None,
            buffer_capacity: default_buffer_capacity(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            collection_interval_secs: default_collection_interval(),
            register_retry_secs: default_register_retry(),
            hostname: default_hostname(),
            advertised_ip: default_advertised_ip(),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(var = key, value = %raw, "Unparsable value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

impl CentralConfig {
    /// Build configuration from `FARWATCH_*` environment variables,
    /// falling back to defaults for anything unset
    pub fn from_env() -> Self {
        Self {
            secret_key_hex: std::env::var("FARWATCH_SECRET_KEY").unwrap_or_default(),
            bearer_token: std::env::var("FARWATCH_BEARER_TOKEN").ok(),
            max_payload_bytes: env_or("FARWATCH_MAX_PAYLOAD_BYTES", default_max_payload_bytes()),
            heartbeat_interval_secs: env_or(
                "FARWATCH_HEARTBEAT_INTERVAL",
                default_heartbeat_interval(),
            ),
            collection_interval_secs: env_or(
                "FARWATCH_COLLECTION_INTERVAL",
                default_collection_interval(),
            ),
            sweep_interval_secs: env_or("FARWATCH_SWEEP_INTERVAL", default_sweep_interval()),
            alert_history: env_or("FARWATCH_ALERT_HISTORY", default_alert_history()),
            event_history: env_or("FARWATCH_EVENT_HISTORY", default_event_history()),
            audit_log_dir: std::env::var("FARWATCH_AUDIT_DIR").ok().map(PathBuf::from),
        }
    }

    /// Parse and validate the shared key
    pub fn shared_key(&self) -> Result<SharedKey> {
        if self.secret_key_hex.trim().is_empty() {
            return Err(FarwatchError::Config(
                "FARWATCH_SECRET_KEY is not set".to_string(),
            ));
        }
        SharedKey::from_hex(&self.secret_key_hex)
    }
}

impl AgentConfig {
    /// Build configuration from `FARWATCH_*` environment variables,
    /// falling back to defaults for anything unset
    pub fn from_env() -> Self {
        Self {
            node_id: std::env::var("FARWATCH_NODE_ID").unwrap_or_else(|_| default_node_id()),
            secret_key_hex: std::env::var("FARWATCH_SECRET_KEY").unwrap_or_default(),
            bearer_token: std::env::var("FARWATCH_BEARER_TOKEN").ok(),
            buffer_capacity: env_or("FARWATCH_BUFFER_CAPACITY", default_buffer_capacity()),
            heartbeat_interval_secs: env_or(
                "FARWATCH_HEARTBEAT_INTERVAL",
                default_heartbeat_interval(),
            ),
            collection_interval_secs: env_or(
                "FARWATCH_COLLECTION_INTERVAL",
                default_collection_interval(),
            ),
            register_retry_secs: env_or("FARWATCH_REGISTER_RETRY", default_register_retry()),
            hostname: std::env::var("FARWATCH_HOSTNAME").unwrap_or_else(|_| default_hostname()),
            advertised_ip: std::env::var("FARWATCH_ADVERTISED_IP")
                .unwrap_or_else(|_| default_advertised_ip()),
        }
    }

    /// Parse and validate the shared key
    pub fn shared_key(&self) -> Result<SharedKey> {
        if self.secret_key_hex.trim().is_empty() {
            return Err(FarwatchError::Config(
                "FARWATCH_SECRET_KEY is not set".to_string(),
            ));
        }
        SharedKey::from_hex(&self.secret_key_hex)
    }
}
