//! Alert generation from liveness transitions
//!
//! The registry reports state changes; this engine turns each one into
//! exactly one alert, keeps a bounded newest-first history, mirrors the
//! alert to the store, and fans out `ALERT_GENERATED` / `STATE_CHANGE`
//! audit events.

use crate::audit::{event_type, EventAuditor};
use crate::store::{PersistStats, TelemetryStore};
use crate::types::{Alert, AuditEvent, NodeStatus, Severity, StatusTransition};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Bounded alert history plus mirroring and audit fan-out
pub struct AlertEngine {
    alerts: RwLock<Vec<Alert>>,
    max_alerts: usize,
    store: Arc<dyn TelemetryStore>,
    stats: Arc<PersistStats>,
    auditor: Arc<EventAuditor>,
}

impl AlertEngine {
    pub fn new(
        store: Arc<dyn TelemetryStore>,
        stats: Arc<PersistStats>,
        auditor: Arc<EventAuditor>,
        max_alerts: usize,
    ) -> Self {
        Self {
            alerts: RwLock::new(Vec::new()),
            max_alerts,
            store,
            stats,
            auditor,
        }
    }

    /// Turn one transition into one alert.
    ///
    /// `source` names the observer that saw the transition (heartbeat
    /// handler, background monitor). Store and audit mirrors are
    /// best-effort; this method itself cannot fail.
    pub async fn raise(&self, transition: &StatusTransition, source: &str) -> Alert {
        let (severity, message) = Self::classify(transition);
        let alert = Alert::new(
            &transition.tenant_id,
            &transition.node_id,
            severity,
            message,
            transition.from,
            transition.to,
            source,
        );

        {
            let mut alerts = self.alerts.write().await;
            alerts.push(alert.clone());
            if self.max_alerts > 0 && alerts.len() > self.max_alerts {
                let drain_count = alerts.len() - self.max_alerts;
                alerts.drain(..drain_count);
            }
        }

        match severity {
            Severity::Info => info!(
                tenant = %transition.tenant_id,
                node = %transition.node_id,
                from = %transition.from,
                to = %transition.to,
                "alert raised"
            ),
            _ => warn!(
                tenant = %transition.tenant_id,
                node = %transition.node_id,
                from = %transition.from,
                to = %transition.to,
                severity = %alert.severity,
                "alert raised"
            ),
        }

        match self.store.insert_alert(&alert).await {
            Ok(()) => self.stats.record_write(),
            Err(e) => {
                self.stats.record_failure(&e);
                warn!(alert_id = %alert.id, error = %e, "alert store mirror failed");
            }
        }

        self.auditor
            .record(
                AuditEvent::new(
                    &transition.tenant_id,
                    event_type::ALERT_GENERATED,
                    alert.message.clone(),
                    source,
                    json!({
                        "alertId": alert.id,
                        "severity": alert.severity,
                        "previousStatus": transition.from,
                        "newStatus": transition.to,
                    }),
                )
                .with_node(&transition.node_id),
            )
            .await;
        self.auditor
            .record(
                AuditEvent::new(
                    &transition.tenant_id,
                    event_type::STATE_CHANGE,
                    format!(
                        "Node {} status changed from {} to {}",
                        transition.node_id, transition.from, transition.to
                    ),
                    source,
                    json!({ "from": transition.from, "to": transition.to }),
                )
                .with_node(&transition.node_id),
            )
            .await;

        alert
    }

    /// Recent alerts for one tenant, most recent first
    pub async fn recent(&self, tenant_id: &str, limit: usize) -> Vec<Alert> {
        let alerts = self.alerts.read().await;
        alerts
            .iter()
            .rev()
            .filter(|a| a.tenant_id == tenant_id)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Number of alerts currently held in memory
    pub async fn count(&self) -> usize {
        self.alerts.read().await.len()
    }

    // Severity and message per the transition's destination; recovery
    // from OFFLINE gets its own wording.
    fn classify(transition: &StatusTransition) -> (Severity, String) {
        match (transition.from, transition.to) {
            (_, NodeStatus::Offline) => (
                Severity::Critical,
                format!("Node {} stopped responding", transition.node_id),
            ),
            (_, NodeStatus::Degraded) => (
                Severity::Warning,
                format!(
                    "Node {} operating with local buffering active",
                    transition.node_id
                ),
            ),
            (NodeStatus::Offline, NodeStatus::Online) => (
                Severity::Info,
                format!("Node {} recovered", transition.node_id),
            ),
            (from, to) => (
                Severity::Info,
                format!("Node {} status changed from {from} to {to}", transition.node_id),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FarwatchError, Result};
    use crate::store::MemoryStore;
    use crate::types::{NodeRecord, Tenant};
    use async_trait::async_trait;

    fn transition(node_id: &str, from: NodeStatus, to: NodeStatus) -> StatusTransition {
        StatusTransition {
            tenant_id: "default".to_string(),
            node_id: node_id.to_string(),
            from,
            to,
        }
    }

    fn engine_with(max_alerts: usize) -> (AlertEngine, Arc<MemoryStore>, Arc<EventAuditor>) {
        let store = Arc::new(MemoryStore::new());
        let stats = Arc::new(PersistStats::default());
        let auditor = Arc::new(EventAuditor::new(store.clone(), stats.clone(), 100, None));
        let engine = AlertEngine::new(store.clone(), stats, auditor.clone(), max_alerts);
        (engine, store, auditor)
    }

    #[tokio::test]
    async fn test_offline_transition_is_critical() {
        let (engine, _, _) = engine_with(100);
        let alert = engine
            .raise(&transition("n1", NodeStatus::Online, NodeStatus::Offline), "monitor")
            .await;

        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.message, "Node n1 stopped responding");
        assert_eq!(alert.previous_status, NodeStatus::Online);
        assert_eq!(alert.new_status, NodeStatus::Offline);
        assert_eq!(alert.source, "monitor");
    }

    #[tokio::test]
    async fn test_degraded_transition_is_warning() {
        let (engine, _, _) = engine_with(100);
        let alert = engine
            .raise(&transition("n1", NodeStatus::Online, NodeStatus::Degraded), "heartbeat")
            .await;

        assert_eq!(alert.severity, Severity::Warning);
        assert_eq!(alert.message, "Node n1 operating with local buffering active");
    }

    #[tokio::test]
    async fn test_recovery_is_info() {
        let (engine, _, _) = engine_with(100);
        let alert = engine
            .raise(&transition("n1", NodeStatus::Offline, NodeStatus::Online), "heartbeat")
            .await;

        assert_eq!(alert.severity, Severity::Info);
        assert_eq!(alert.message, "Node n1 recovered");
    }

    #[tokio::test]
    async fn test_other_transitions_are_info() {
        let (engine, _, _) = engine_with(100);
        let alert = engine
            .raise(&transition("n1", NodeStatus::Unknown, NodeStatus::Online), "heartbeat")
            .await;

        assert_eq!(alert.severity, Severity::Info);
        assert_eq!(alert.message, "Node n1 status changed from UNKNOWN to ONLINE");
    }

    #[tokio::test]
    async fn test_alert_mirrored_and_audited() {
        let (engine, store, auditor) = engine_with(100);
        engine
            .raise(&transition("n1", NodeStatus::Online, NodeStatus::Offline), "monitor")
            .await;

        assert_eq!(store.alerts_for("default").await.len(), 1);

        let events = auditor.recent("default", 10).await;
        assert_eq!(events.len(), 2);
        let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert!(types.contains(&event_type::ALERT_GENERATED));
        assert!(types.contains(&event_type::STATE_CHANGE));
        assert_eq!(events[0].node_id.as_deref(), Some("n1"));
    }

    #[tokio::test]
    async fn test_capacity_drains_oldest() {
        let (engine, _, _) = engine_with(2);
        engine
            .raise(&transition("n1", NodeStatus::Online, NodeStatus::Degraded), "heartbeat")
            .await;
        engine
            .raise(&transition("n2", NodeStatus::Online, NodeStatus::Degraded), "heartbeat")
            .await;
        engine
            .raise(&transition("n3", NodeStatus::Online, NodeStatus::Degraded), "heartbeat")
            .await;

        assert_eq!(engine.count().await, 2);
        let recent = engine.recent("default", 10).await;
        assert_eq!(recent[0].node_id, "n3");
        assert_eq!(recent[1].node_id, "n2");
    }

    #[tokio::test]
    async fn test_recent_is_tenant_scoped() {
        let (engine, _, _) = engine_with(100);
        engine
            .raise(&transition("n1", NodeStatus::Online, NodeStatus::Offline), "monitor")
            .await;
        engine
            .raise(
                &StatusTransition {
                    tenant_id: "acme".to_string(),
                    node_id: "n9".to_string(),
                    from: NodeStatus::Online,
                    to: NodeStatus::Offline,
                },
                "monitor",
            )
            .await;

        assert_eq!(engine.recent("default", 10).await.len(), 1);
        assert_eq!(engine.recent("acme", 10).await.len(), 1);
    }

    /// Store whose writes always fail, for exercising mirror accounting
    struct FailingStore;

    #[async_trait]
    impl crate::store::TelemetryStore for FailingStore {
        async fn upsert_node(&self, _: &NodeRecord) -> Result<()> {
            Err(FarwatchError::Persistence("store offline".into()))
        }
        async fn insert_alert(&self, _: &Alert) -> Result<()> {
            Err(FarwatchError::Persistence("store offline".into()))
        }
        async fn insert_event(&self, _: &AuditEvent) -> Result<()> {
            Err(FarwatchError::Persistence("store offline".into()))
        }
        async fn get_tenant(&self, _: &str) -> Result<Option<Tenant>> {
            Err(FarwatchError::Persistence("store offline".into()))
        }
        async fn put_tenant(&self, _: &Tenant) -> Result<()> {
            Err(FarwatchError::Persistence("store offline".into()))
        }
        async fn list_tenants(&self) -> Result<Vec<Tenant>> {
            Err(FarwatchError::Persistence("store offline".into()))
        }
        async fn create_api_key(&self, _: &str, _: &str) -> Result<(String, String)> {
            Err(FarwatchError::Persistence("store offline".into()))
        }
        async fn validate_api_key(&self, _: &str) -> Result<Option<String>> {
            Err(FarwatchError::Persistence("store offline".into()))
        }
        async fn revoke_api_key(&self, _: &str) -> Result<bool> {
            Err(FarwatchError::Persistence("store offline".into()))
        }
        async fn purge_older_than(&self, _: u64, _: u64) -> Result<(u64, u64)> {
            Err(FarwatchError::Persistence("store offline".into()))
        }
    }

    #[tokio::test]
    async fn test_store_failures_counted_not_raised() {
        let store = Arc::new(FailingStore);
        let stats = Arc::new(PersistStats::default());
        let auditor = Arc::new(EventAuditor::new(store.clone(), stats.clone(), 100, None));
        let engine = AlertEngine::new(store, stats.clone(), auditor.clone(), 100);

        let alert = engine
            .raise(&transition("n1", NodeStatus::Online, NodeStatus::Offline), "monitor")
            .await;

        // Alert and audit events still land in memory.
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(engine.count().await, 1);
        assert_eq!(auditor.count().await, 2);

        // One failed alert write plus two failed event writes.
        assert_eq!(stats.snapshot().failures, 3);
        assert_eq!(
            stats.snapshot().last_error.as_deref(),
            Some("Persistence error: store offline")
        );
    }
}
