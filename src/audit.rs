//! Operational audit trail
//!
//! Every noteworthy ingest action becomes an `AuditEvent`: held in a
//! bounded in-memory list for dashboards, mirrored to the store, and
//! optionally appended to a dated JSONL file for offline tooling.
//! Mirror failures are counted, never surfaced to the caller.

use crate::error::{FarwatchError, Result};
use crate::store::{PersistStats, TelemetryStore};
use crate::types::AuditEvent;
use chrono::Utc;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

/// Audit event type tags
pub mod event_type {
    pub const NODE_REGISTERED: &str = "NODE_REGISTERED";
    pub const TELEMETRY_RECEIVED: &str = "TELEMETRY_RECEIVED";
    pub const AGENT_INGEST_RECEIVED: &str = "AGENT_INGEST_RECEIVED";
    pub const ALERT_GENERATED: &str = "ALERT_GENERATED";
    pub const STATE_CHANGE: &str = "STATE_CHANGE";
}

/// Bounded audit log with store and file mirrors
pub struct EventAuditor {
    events: RwLock<Vec<AuditEvent>>,
    max_events: usize,
    store: Arc<dyn TelemetryStore>,
    stats: Arc<PersistStats>,
    log_dir: Option<PathBuf>,
}

impl EventAuditor {
    pub fn new(
        store: Arc<dyn TelemetryStore>,
        stats: Arc<PersistStats>,
        max_events: usize,
        log_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            max_events,
            store,
            stats,
            log_dir,
        }
    }

    /// Record one audit event.
    ///
    /// The in-memory list is authoritative and bounded; the store and
    /// JSONL mirrors are best-effort.
    pub async fn record(&self, event: AuditEvent) {
        {
            let mut events = self.events.write().await;
            events.push(event.clone());
            if self.max_events > 0 && events.len() > self.max_events {
                let drain_count = events.len() - self.max_events;
                events.drain(..drain_count);
            }
        }

        match self.store.insert_event(&event).await {
            Ok(()) => self.stats.record_write(),
            Err(e) => {
                self.stats.record_failure(&e);
                warn!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    error = %e,
                    "audit event store mirror failed"
                );
            }
        }

        if let Err(e) = self.append_jsonl(&event) {
            self.stats.record_failure(&e);
            warn!(
                event_id = %event.id,
                error = %e,
                "audit event file mirror failed"
            );
        }
    }

    /// Recent events for one tenant, most recent first
    pub async fn recent(&self, tenant_id: &str, limit: usize) -> Vec<AuditEvent> {
        let events = self.events.read().await;
        events
            .iter()
            .rev()
            .filter(|e| e.tenant_id == tenant_id)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Number of events currently held in memory
    pub async fn count(&self) -> usize {
        self.events.read().await.len()
    }

    // One JSON object per line in events-YYYY-MM-DD.log; rotation is
    // the operator's concern.
    fn append_jsonl(&self, event: &AuditEvent) -> Result<()> {
        let dir = match &self.log_dir {
            Some(dir) => dir,
            None => return Ok(()),
        };
        let io_err = |e: std::io::Error| FarwatchError::Persistence(e.to_string());

        std::fs::create_dir_all(dir).map_err(io_err)?;
        let path = dir.join(format!("events-{}.log", Utc::now().format("%Y-%m-%d")));
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err)?;
        let line = serde_json::to_string(event)?;
        writeln!(file, "{line}").map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn auditor_with(max_events: usize, log_dir: Option<PathBuf>) -> (EventAuditor, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let auditor = EventAuditor::new(
            store.clone(),
            Arc::new(PersistStats::default()),
            max_events,
            log_dir,
        );
        (auditor, store)
    }

    fn event(event_type: &str, message: &str) -> AuditEvent {
        AuditEvent::new("default", event_type, message, "ingest", json!({}))
    }

    #[tokio::test]
    async fn test_record_and_recent() {
        let (auditor, _) = auditor_with(100, None);
        for i in 0..5 {
            auditor
                .record(event(event_type::TELEMETRY_RECEIVED, &format!("payload {i}")))
                .await;
        }

        let recent = auditor.recent("default", 3).await;
        assert_eq!(recent.len(), 3);
        // Most recent first
        assert_eq!(recent[0].message, "payload 4");
        assert_eq!(recent[2].message, "payload 2");
    }

    #[tokio::test]
    async fn test_capacity_drains_oldest() {
        let (auditor, _) = auditor_with(3, None);
        for i in 0..5 {
            auditor
                .record(event(event_type::TELEMETRY_RECEIVED, &format!("payload {i}")))
                .await;
        }

        assert_eq!(auditor.count().await, 3);
        let all = auditor.recent("default", 10).await;
        assert_eq!(all[0].message, "payload 4");
        assert_eq!(all[2].message, "payload 2");
    }

    #[tokio::test]
    async fn test_recent_is_tenant_scoped() {
        let (auditor, _) = auditor_with(100, None);
        auditor.record(event(event_type::NODE_REGISTERED, "a")).await;
        auditor
            .record(AuditEvent::new(
                "acme",
                event_type::NODE_REGISTERED,
                "b",
                "ingest",
                json!({}),
            ))
            .await;

        assert_eq!(auditor.recent("default", 10).await.len(), 1);
        assert_eq!(auditor.recent("acme", 10).await.len(), 1);
    }

    #[tokio::test]
    async fn test_store_mirror_receives_events() {
        let (auditor, store) = auditor_with(100, None);
        auditor.record(event(event_type::NODE_REGISTERED, "n1 up")).await;

        let mirrored = store.events_for("default").await;
        assert_eq!(mirrored.len(), 1);
        assert_eq!(mirrored[0].event_type, event_type::NODE_REGISTERED);
    }

    #[tokio::test]
    async fn test_jsonl_mirror_appends_dated_file() {
        let dir = tempfile::tempdir().unwrap();
        let (auditor, _) = auditor_with(100, Some(dir.path().to_path_buf()));

        auditor.record(event(event_type::TELEMETRY_RECEIVED, "first")).await;
        auditor.record(event(event_type::TELEMETRY_RECEIVED, "second")).await;

        let path = dir
            .path()
            .join(format!("events-{}.log", Utc::now().format("%Y-%m-%d")));
        let contents = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: AuditEvent = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.message, "first");
    }

    #[tokio::test]
    async fn test_unwritable_log_dir_is_swallowed() {
        let stats = Arc::new(PersistStats::default());
        let auditor = EventAuditor::new(
            Arc::new(MemoryStore::new()),
            stats.clone(),
            100,
            Some(PathBuf::from("/proc/no-such-dir/audit")),
        );

        auditor.record(event(event_type::TELEMETRY_RECEIVED, "x")).await;
        assert_eq!(auditor.count().await, 1);
        assert_eq!(stats.snapshot().failures, 1);
        assert!(stats.snapshot().last_error.is_some());
    }
}
