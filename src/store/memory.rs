//! In-memory store for embedded deployments and tests

use crate::error::{FarwatchError, Result};
use crate::tenant::{generate_api_key, hash_api_key, DEFAULT_TENANT};
use crate::types::{now_millis, Alert, ApiKeyRecord, AuditEvent, NodeRecord, Tenant};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::TelemetryStore;

/// `TelemetryStore` backed by process memory
///
/// The default tenant is seeded at construction, so unattributed
/// traffic always has somewhere to land. Everything vanishes on drop.
pub struct MemoryStore {
    nodes: RwLock<HashMap<(String, String), NodeRecord>>,
    alerts: RwLock<Vec<Alert>>,
    events: RwLock<Vec<AuditEvent>>,
    tenants: RwLock<HashMap<String, Tenant>>,
    api_keys: RwLock<HashMap<String, ApiKeyRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let mut tenants = HashMap::new();
        tenants.insert(
            DEFAULT_TENANT.to_string(),
            Tenant::new(DEFAULT_TENANT, "Default Tenant"),
        );
        Self {
            nodes: RwLock::new(HashMap::new()),
            alerts: RwLock::new(Vec::new()),
            events: RwLock::new(Vec::new()),
            tenants: RwLock::new(tenants),
            api_keys: RwLock::new(HashMap::new()),
        }
    }

    /// Number of node records held
    pub async fn node_count(&self) -> usize {
        self.nodes.read().await.len()
    }

    /// Stored node record, if any
    pub async fn get_node(&self, tenant_id: &str, node_id: &str) -> Option<NodeRecord> {
        self.nodes
            .read()
            .await
            .get(&(tenant_id.to_string(), node_id.to_string()))
            .cloned()
    }

    /// Alerts mirrored for one tenant, oldest first
    pub async fn alerts_for(&self, tenant_id: &str) -> Vec<Alert> {
        self.alerts
            .read()
            .await
            .iter()
            .filter(|a| a.tenant_id == tenant_id)
            .cloned()
            .collect()
    }

    /// Audit events mirrored for one tenant, oldest first
    pub async fn events_for(&self, tenant_id: &str) -> Vec<AuditEvent> {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| e.tenant_id == tenant_id)
            .cloned()
            .collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TelemetryStore for MemoryStore {
    async fn upsert_node(&self, node: &NodeRecord) -> Result<()> {
        self.nodes.write().await.insert(
            (node.tenant_id.clone(), node.node_id.clone()),
            node.clone(),
        );
        Ok(())
    }

    async fn insert_alert(&self, alert: &Alert) -> Result<()> {
        self.alerts.write().await.push(alert.clone());
        Ok(())
    }

    async fn insert_event(&self, event: &AuditEvent) -> Result<()> {
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>> {
        Ok(self.tenants.read().await.get(tenant_id).cloned())
    }

    async fn put_tenant(&self, tenant: &Tenant) -> Result<()> {
        self.tenants
            .write()
            .await
            .insert(tenant.id.clone(), tenant.clone());
        Ok(())
    }

    async fn list_tenants(&self) -> Result<Vec<Tenant>> {
        let mut tenants: Vec<Tenant> = self.tenants.read().await.values().cloned().collect();
        tenants.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tenants)
    }

    async fn create_api_key(&self, tenant_id: &str, label: &str) -> Result<(String, String)> {
        if !self.tenants.read().await.contains_key(tenant_id) {
            return Err(FarwatchError::TenantNotFound(tenant_id.to_string()));
        }

        let raw = generate_api_key();
        let record = ApiKeyRecord {
            key_id: format!("key-{}", Uuid::new_v4()),
            tenant_id: tenant_id.to_string(),
            key_hash: hash_api_key(&raw),
            label: label.to_string(),
            active: true,
            created_at: now_millis(),
            last_used_at: None,
        };
        let key_id = record.key_id.clone();
        self.api_keys.write().await.insert(key_id.clone(), record);
        Ok((key_id, raw))
    }

    async fn validate_api_key(&self, raw_key: &str) -> Result<Option<String>> {
        let hash = hash_api_key(raw_key);
        let mut keys = self.api_keys.write().await;
        for record in keys.values_mut() {
            if record.active && record.key_hash == hash {
                record.last_used_at = Some(now_millis());
                return Ok(Some(record.tenant_id.clone()));
            }
        }
        Ok(None)
    }

    async fn revoke_api_key(&self, key_id: &str) -> Result<bool> {
        match self.api_keys.write().await.get_mut(key_id) {
            Some(record) => {
                record.active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn purge_older_than(
        &self,
        events_before: u64,
        alerts_before: u64,
    ) -> Result<(u64, u64)> {
        let mut events = self.events.write().await;
        let before = events.len();
        events.retain(|e| e.timestamp >= events_before);
        let events_removed = (before - events.len()) as u64;
        drop(events);

        let mut alerts = self.alerts.write().await;
        let before = alerts.len();
        alerts.retain(|a| a.timestamp >= alerts_before);
        let alerts_removed = (before - alerts.len()) as u64;

        Ok((events_removed, alerts_removed))
    }
}
