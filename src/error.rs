//! Error types for farwatch

use thiserror::Error;

/// Errors that can occur in the telemetry system
#[derive(Debug, Error)]
pub enum FarwatchError {
    /// Authentication failure: bad bearer token, bad API key, or an
    /// envelope that failed GCM tag verification
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Tenant exists but is administratively disabled
    #[error("Tenant '{0}' is disabled")]
    TenantDisabled(String),

    /// Tenant identifier does not resolve to a known tenant
    #[error("Tenant '{0}' not found")]
    TenantNotFound(String),

    /// Malformed envelope: bad base64, truncated payload, or a
    /// decrypted body that is not the expected structure
    #[error("Malformed payload: {0}")]
    Format(String),

    /// Request body exceeds the configured size ceiling
    #[error("Payload of {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge {
        size: usize,
        limit: usize,
    },

    /// Node not known to the registry
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backing-store failure. Counted by callers, never surfaced to
    /// ingest clients.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Outbound delivery failure on the edge side
    #[error("Transmission failed: {0}")]
    Transmission(String),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for telemetry operations
pub type Result<T> = std::result::Result<T, FarwatchError>;
