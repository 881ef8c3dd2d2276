//! Authoritative node registry and liveness state machine
//!
//! One record per `(tenant, node)` pair, held in a sharded map so
//! heartbeats for different nodes never contend. Every decide-and-commit
//! step for a key happens under that key's map guard; callers mirror the
//! returned record to storage and raise alerts only after the guard is
//! gone.

use crate::types::{now_millis, NodeRecord, NodeStatus, StatusTransition};
use crate::wire::{Heartbeat, NodePolicy, RegisterRequest};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

/// Staleness multiplier: a node is declared OFFLINE once it has been
/// silent for this many heartbeat intervals.
pub const STALE_INTERVALS: u64 = 3;

/// Registry key, scoped so identical node ids under different tenants
/// stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub tenant_id: String,
    pub node_id: String,
}

impl NodeKey {
    pub fn new(tenant_id: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            node_id: node_id.into(),
        }
    }
}

/// Result of folding one heartbeat into the registry
#[derive(Debug, Clone)]
pub struct HeartbeatOutcome {
    /// Record after the heartbeat was applied
    pub record: NodeRecord,
    /// State change to alert on, at most one per heartbeat
    pub transition: Option<StatusTransition>,
    /// True when the heartbeat arrived for a node the registry had
    /// never seen and a placeholder record was created
    pub created: bool,
}

/// In-memory registry of node records keyed by `(tenant, node)`
pub struct NodeRegistry {
    nodes: DashMap<NodeKey, NodeRecord>,
    heartbeat_interval_secs: u64,
    collection_interval_secs: u64,
}

impl NodeRegistry {
    pub fn new(heartbeat_interval_secs: u64, collection_interval_secs: u64) -> Self {
        Self {
            nodes: DashMap::new(),
            heartbeat_interval_secs,
            collection_interval_secs,
        }
    }

    /// Create or overwrite a node record and issue its policy.
    ///
    /// Registration always lands the node ONLINE with a fresh node uuid
    /// and fresh timestamps. It never produces an alert: a node coming
    /// back through registration is treated as a new lease, not a
    /// recovery.
    pub fn register(&self, tenant_id: &str, req: &RegisterRequest) -> (NodeRecord, NodePolicy) {
        let now = now_millis();
        let record = NodeRecord {
            node_id: req.node_id.clone(),
            node_uuid: format!("node-{}", Uuid::new_v4()),
            tenant_id: tenant_id.to_string(),
            hostname: req.hostname.clone(),
            ip: req.ip.clone(),
            os: req.os.clone(),
            arch: req.arch.clone(),
            version: req.version.clone(),
            status: NodeStatus::Online,
            heartbeat_interval_secs: self.heartbeat_interval_secs,
            last_seen: now,
            registered_at: now,
            buffer_size: 0,
        };
        let policy = NodePolicy {
            node_uuid: record.node_uuid.clone(),
            collection_interval_secs: self.collection_interval_secs,
            heartbeat_interval_secs: self.heartbeat_interval_secs,
        };

        self.nodes
            .insert(NodeKey::new(tenant_id, &req.node_id), record.clone());
        debug!(
            tenant = %tenant_id,
            node = %req.node_id,
            node_uuid = %record.node_uuid,
            "node registered"
        );
        (record, policy)
    }

    /// Fold a heartbeat into the registry.
    ///
    /// `last_seen` is refreshed unconditionally. The target state is
    /// DEGRADED while the node reports an active relay buffer, ONLINE
    /// otherwise; a change of state yields exactly one transition. A
    /// heartbeat for an unregistered node creates a placeholder record
    /// in UNKNOWN without a transition, so the node shows up for
    /// operators without firing a recovery alert nobody armed.
    pub fn apply_heartbeat(&self, tenant_id: &str, hb: &Heartbeat) -> HeartbeatOutcome {
        let now = now_millis();
        let target = if hb.buffer_status.is_active() {
            NodeStatus::Degraded
        } else {
            NodeStatus::Online
        };

        match self.nodes.entry(NodeKey::new(tenant_id, &hb.node_id)) {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                let previous = record.status;
                record.last_seen = now;
                // An omitted version deserializes empty; keep the one
                // captured at registration.
                if !hb.version.is_empty() {
                    record.version = hb.version.clone();
                }
                record.buffer_size = hb.buffer_size;

                let transition = if target == previous {
                    None
                } else {
                    record.status = target;
                    Some(StatusTransition {
                        tenant_id: tenant_id.to_string(),
                        node_id: hb.node_id.clone(),
                        from: previous,
                        to: target,
                    })
                };
                HeartbeatOutcome {
                    record: record.clone(),
                    transition,
                    created: false,
                }
            }
            Entry::Vacant(vacant) => {
                warn!(
                    tenant = %tenant_id,
                    node = %hb.node_id,
                    "heartbeat from unregistered node, creating placeholder record"
                );
                let record = NodeRecord {
                    node_id: hb.node_id.clone(),
                    node_uuid: format!("node-{}", Uuid::new_v4()),
                    tenant_id: tenant_id.to_string(),
                    hostname: String::new(),
                    ip: String::new(),
                    os: String::new(),
                    arch: String::new(),
                    version: hb.version.clone(),
                    status: NodeStatus::Unknown,
                    heartbeat_interval_secs: self.heartbeat_interval_secs,
                    last_seen: now,
                    registered_at: now,
                    buffer_size: hb.buffer_size,
                };
                vacant.insert(record.clone());
                HeartbeatOutcome {
                    record,
                    transition: None,
                    created: true,
                }
            }
        }
    }

    /// Declare every stale node OFFLINE.
    ///
    /// A node is stale once `now - last_seen` exceeds three times its
    /// heartbeat interval. Returns one transition per node that actually
    /// changed state; nodes already OFFLINE are left alone, so repeated
    /// sweeps over a dead fleet stay quiet.
    pub fn sweep(&self, now: u64) -> Vec<StatusTransition> {
        let mut transitions = Vec::new();
        for mut entry in self.nodes.iter_mut() {
            let record = entry.value_mut();
            if record.status == NodeStatus::Offline {
                continue;
            }
            let threshold = record
                .heartbeat_interval_secs
                .saturating_mul(STALE_INTERVALS)
                .saturating_mul(1000);
            if now.saturating_sub(record.last_seen) > threshold {
                let previous = record.status;
                record.status = NodeStatus::Offline;
                transitions.push(StatusTransition {
                    tenant_id: record.tenant_id.clone(),
                    node_id: record.node_id.clone(),
                    from: previous,
                    to: NodeStatus::Offline,
                });
            }
        }
        transitions
    }

    /// Record for one node, if known
    pub fn get(&self, tenant_id: &str, node_id: &str) -> Option<NodeRecord> {
        self.nodes
            .get(&NodeKey::new(tenant_id, node_id))
            .map(|entry| entry.value().clone())
    }

    /// All records for one tenant, ordered by node id
    pub fn nodes(&self, tenant_id: &str) -> Vec<NodeRecord> {
        let mut records: Vec<NodeRecord> = self
            .nodes
            .iter()
            .filter(|entry| entry.key().tenant_id == tenant_id)
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        records
    }

    /// Total records across all tenants
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Per-status record counts for one tenant
    pub fn status_summary(&self, tenant_id: &str) -> HashMap<NodeStatus, usize> {
        let mut summary = HashMap::new();
        for entry in self.nodes.iter() {
            if entry.key().tenant_id == tenant_id {
                *summary.entry(entry.value().status).or_insert(0) += 1;
            }
        }
        summary
    }

    #[cfg(test)]
    pub(crate) fn backdate(&self, tenant_id: &str, node_id: &str, millis_ago: u64) {
        if let Some(mut entry) = self.nodes.get_mut(&NodeKey::new(tenant_id, node_id)) {
            entry.value_mut().last_seen = now_millis().saturating_sub(millis_ago);
        }
    }
}
