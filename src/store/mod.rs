//! Pluggable persistence for the central pipeline
//!
//! The in-memory registry and histories are authoritative; a
//! `TelemetryStore` is a write-behind mirror plus the system of record
//! for tenants and API keys. Store failures are recorded in
//! `PersistStats` and logged, and must never fail an ingest request.

use crate::error::Result;
use crate::types::{Alert, AuditEvent, NodeRecord, Tenant};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

pub mod memory;

pub use memory::MemoryStore;

/// Persistence backend for nodes, alerts, events, tenants, and API keys
///
/// Implementations are free to fail any call independently; callers
/// treat failures as counter increments, not request errors.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Insert or update a node record
    async fn upsert_node(&self, node: &NodeRecord) -> Result<()>;

    /// Append an alert
    async fn insert_alert(&self, alert: &Alert) -> Result<()>;

    /// Append an audit event
    async fn insert_event(&self, event: &AuditEvent) -> Result<()>;

    /// Fetch a tenant by id
    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>>;

    /// Create or replace a tenant
    async fn put_tenant(&self, tenant: &Tenant) -> Result<()>;

    /// List all tenants
    async fn list_tenants(&self) -> Result<Vec<Tenant>>;

    /// Mint an API key for a tenant
    ///
    /// Returns `(key_id, raw_key)`. The raw key is shown exactly once;
    /// only its hash is retained.
    async fn create_api_key(&self, tenant_id: &str, label: &str) -> Result<(String, String)>;

    /// Resolve a raw API key to its owning tenant
    ///
    /// Returns `None` for unknown or revoked keys. A successful
    /// validation refreshes the key's last-used timestamp.
    async fn validate_api_key(&self, raw_key: &str) -> Result<Option<String>>;

    /// Revoke an API key by id
    ///
    /// Returns `false` when the key id is unknown.
    async fn revoke_api_key(&self, key_id: &str) -> Result<bool>;

    /// Delete events and alerts older than the given cutoffs (Unix millis)
    ///
    /// Returns `(events_removed, alerts_removed)`.
    async fn purge_older_than(&self, events_before: u64, alerts_before: u64)
        -> Result<(u64, u64)>;

    /// Release backend resources
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Write-behind failure accounting
///
/// Shared by everything that mirrors state into a `TelemetryStore`.
/// Counters are relaxed atomics; the last error is kept for operator
/// inspection.
#[derive(Debug, Default)]
pub struct PersistStats {
    writes: AtomicU64,
    failures: AtomicU64,
    last_error: RwLock<Option<String>>,
}

impl PersistStats {
    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, error: impl std::fmt::Display) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_error.write() {
            *last = Some(error.to_string());
        }
    }

    pub fn snapshot(&self) -> PersistSnapshot {
        PersistSnapshot {
            writes: self.writes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            last_error: self.last_error.read().ok().and_then(|e| e.clone()),
        }
    }
}

/// Point-in-time view of `PersistStats`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistSnapshot {
    pub writes: u64,
    pub failures: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persist_stats_counts() {
        let stats = PersistStats::default();
        stats.record_write();
        stats.record_write();
        stats.record_failure("connection refused");

        let snap = stats.snapshot();
        assert_eq!(snap.writes, 2);
        assert_eq!(snap.failures, 1);
        assert_eq!(snap.last_error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_persist_stats_last_error_overwrites() {
        let stats = PersistStats::default();
        stats.record_failure("first");
        stats.record_failure("second");
        assert_eq!(stats.snapshot().last_error.as_deref(), Some("second"));
    }

    #[test]
    fn test_snapshot_serialization() {
        let stats = PersistStats::default();
        stats.record_write();

        let json = serde_json::to_string(&stats.snapshot()).unwrap();
        assert!(json.contains("\"writes\":1"));
        assert!(!json.contains("lastError"));
    }
}
