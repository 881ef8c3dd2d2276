//! Core domain types for the farwatch system
//!
//! All types use camelCase JSON serialization for wire compatibility.
//! Statuses serialize as SCREAMING_SNAKE_CASE strings (`"ONLINE"`,
//! `"DEGRADED"`, ...) to stay readable in dashboards and log lines.

use serde::{Deserialize, Serialize};

/// Liveness state of a monitored node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    /// Heartbeats arriving, no local buffering reported
    Online,
    /// Heartbeats arriving but the node reports an active backlog
    Degraded,
    /// No heartbeat within three heartbeat intervals
    Offline,
    /// Seen on the wire but never completed a registration handshake
    Unknown,
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NodeStatus::Online => "ONLINE",
            NodeStatus::Degraded => "DEGRADED",
            NodeStatus::Offline => "OFFLINE",
            NodeStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Administrative state of a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenantStatus {
    Active,
    Disabled,
}

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// A monitored node as tracked by the central registry
///
/// Records are keyed by `(tenant_id, node_id)`; the same `node_id` under
/// two tenants is two independent records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    /// Operator-assigned node identifier (stable across restarts)
    pub node_id: String,

    /// Server-assigned identity, minted at registration
    pub node_uuid: String,

    /// Owning tenant
    pub tenant_id: String,

    /// Hostname reported at registration
    #[serde(default)]
    pub hostname: String,

    /// IP address reported at registration
    #[serde(default)]
    pub ip: String,

    /// Operating system reported at registration
    #[serde(default)]
    pub os: String,

    /// CPU architecture reported at registration
    #[serde(default)]
    pub arch: String,

    /// Agent software version reported at registration
    #[serde(default)]
    pub version: String,

    /// Current liveness state
    pub status: NodeStatus,

    /// Heartbeat cadence this node was issued, in seconds
    ///
    /// Staleness is judged against this per-record value, so fleets with
    /// mixed cadences evaluate correctly.
    pub heartbeat_interval_secs: u64,

    /// Unix millis of the last heartbeat or registration
    pub last_seen: u64,

    /// Unix millis of the most recent registration handshake
    pub registered_at: u64,

    /// Backlog depth the node reported in its last heartbeat
    #[serde(default)]
    pub buffer_size: u64,
}

/// A tenant in the multi-tenant partition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    /// Tenant identifier (lowercase slug, e.g. "acme")
    pub id: String,

    /// Display name
    pub name: String,

    /// Administrative state
    pub status: TenantStatus,

    /// Unix millis of creation
    pub created_at: u64,
}

impl Tenant {
    /// Create an active tenant
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: TenantStatus::Active,
            created_at: now_millis(),
        }
    }
}

/// Stored representation of an issued API key
///
/// Only the SHA-256 hash of the key material is kept; the raw key is
/// shown once at creation and never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyRecord {
    /// Key identifier (key-<uuid>)
    pub key_id: String,

    /// Tenant the key authenticates as
    pub tenant_id: String,

    /// SHA-256 hex digest of the raw key
    pub key_hash: String,

    /// Operator label (e.g. "site-7 probes")
    #[serde(default)]
    pub label: String,

    /// Whether the key is accepted for authentication
    pub active: bool,

    /// Unix millis of creation
    pub created_at: u64,

    /// Unix millis of the last successful validation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<u64>,
}

/// A liveness state change observed by the registry
///
/// Produced under the registry's per-node guard and handed to the alert
/// engine after the guard drops. Exactly one is emitted per state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTransition {
    pub tenant_id: String,
    pub node_id: String,
    pub from: NodeStatus,
    pub to: NodeStatus,
}

/// An alert raised for a node state transition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Unique alert identifier (alt-<uuid>)
    pub id: String,

    /// Tenant partition this alert belongs to
    pub tenant_id: String,

    /// Node the transition was observed on
    pub node_id: String,

    /// Alert severity
    pub severity: Severity,

    /// Human-readable description of the transition
    pub message: String,

    /// State before the transition
    pub previous_status: NodeStatus,

    /// State after the transition
    pub new_status: NodeStatus,

    /// Which path observed the transition ("heartbeat" or "monitor")
    #[serde(default)]
    pub source: String,

    /// Unix millis when the alert was raised
    pub timestamp: u64,
}

impl Alert {
    /// Create an alert with auto-generated id and timestamp
    pub fn new(
        tenant_id: impl Into<String>,
        node_id: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        previous_status: NodeStatus,
        new_status: NodeStatus,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("alt-{}", uuid::Uuid::new_v4()),
            tenant_id: tenant_id.into(),
            node_id: node_id.into(),
            severity,
            message: message.into(),
            previous_status,
            new_status,
            source: source.into(),
            timestamp: now_millis(),
        }
    }
}

/// An audit-trail event recorded by the ingest pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    /// Unique event identifier (evt-<uuid>)
    pub id: String,

    /// Tenant partition this event belongs to
    pub tenant_id: String,

    /// Event type tag (e.g. "TELEMETRY_RECEIVED")
    pub event_type: String,

    /// Node involved, when the event is node-scoped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,

    /// Human-readable summary
    pub message: String,

    /// Subsystem that recorded the event
    pub source: String,

    /// Arbitrary structured detail
    #[serde(default)]
    pub details: serde_json::Value,

    /// Unix millis when the event was recorded
    pub timestamp: u64,
}

impl AuditEvent {
    /// Create an event with auto-generated id and timestamp
    pub fn new(
        tenant_id: impl Into<String>,
        event_type: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: format!("evt-{}", uuid::Uuid::new_v4()),
            tenant_id: tenant_id.into(),
            event_type: event_type.into(),
            node_id: None,
            message: message.into(),
            source: source.into(),
            details,
            timestamp: now_millis(),
        }
    }

    /// Attach the node this event concerns
    pub fn with_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }
}

/// Current time in Unix milliseconds
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
