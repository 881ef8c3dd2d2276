//! Central ingest surface
//!
//! Four typed operations matching the ingest endpoints one to one. Each
//! takes the raw request body plus the credential headers and runs the
//! same gate sequence: bearer token, size ceiling, tenant resolution,
//! then parsing and decryption. The cheap checks come first so oversized
//! or unauthenticated traffic never reaches the cipher. In-memory state
//! is authoritative throughout; store writes are best-effort mirrors.

use crate::alerts::AlertEngine;
use crate::audit::{event_type, EventAuditor};
use crate::config::CentralConfig;
use crate::crypto::PayloadCipher;
use crate::error::{FarwatchError, Result};
use crate::registry::NodeRegistry;
use crate::store::{PersistStats, TelemetryStore};
use crate::tenant::TenantResolver;
use crate::types::{AuditEvent, NodeRecord};
use crate::wire::{
    AgentAck, AgentReport, Heartbeat, HeartbeatAck, RegisterAck, RegisterRequest, SealedRequest,
    TelemetryAck,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Credential headers accompanying an ingest request
///
/// The embedding HTTP layer extracts these; `bearer` carries the token
/// itself, with the `Bearer ` scheme already stripped.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestHeaders<'a> {
    pub bearer: Option<&'a str>,
    pub api_key: Option<&'a str>,
    pub tenant: Option<&'a str>,
}

/// The central pipeline: gates, registry, alerting, and audit in one place
pub struct IngestService {
    cipher: PayloadCipher,
    resolver: TenantResolver,
    registry: Arc<NodeRegistry>,
    alerts: Arc<AlertEngine>,
    auditor: Arc<EventAuditor>,
    store: Arc<dyn TelemetryStore>,
    stats: Arc<PersistStats>,
    bearer_token: Option<String>,
    max_payload_bytes: usize,
}

impl IngestService {
    pub fn new(config: &CentralConfig, store: Arc<dyn TelemetryStore>) -> Result<Self> {
        let cipher = PayloadCipher::new(&config.shared_key()?);
        let stats = Arc::new(PersistStats::default());
        let auditor = Arc::new(EventAuditor::new(
            store.clone(),
            stats.clone(),
            config.event_history,
            config.audit_log_dir.clone(),
        ));
        let alerts = Arc::new(AlertEngine::new(
            store.clone(),
            stats.clone(),
            auditor.clone(),
            config.alert_history,
        ));
        let registry = Arc::new(NodeRegistry::new(
            config.heartbeat_interval_secs,
            config.collection_interval_secs,
        ));

        Ok(Self {
            cipher,
            resolver: TenantResolver::new(store.clone()),
            registry,
            alerts,
            auditor,
            store,
            stats,
            bearer_token: config.bearer_token.clone(),
            max_payload_bytes: config.max_payload_bytes,
        })
    }

    /// Node registration handshake.
    ///
    /// Opens the sealed identity, lands the node ONLINE in the registry,
    /// and answers with the node's operating policy sealed under the
    /// same key.
    pub async fn register(&self, body: &str, headers: &IngestHeaders<'_>) -> Result<RegisterAck> {
        self.check_bearer(headers)?;
        self.check_size(body)?;
        let tenant = self.resolver.resolve(headers.api_key, headers.tenant).await?;

        let sealed = parse_body::<SealedRequest>(body)?;
        let request: RegisterRequest = self.cipher.open(&sealed.payload)?;
        let (record, policy) = self.registry.register(&tenant.id, &request);
        self.mirror_node(&record).await;

        self.auditor
            .record(
                AuditEvent::new(
                    &tenant.id,
                    event_type::NODE_REGISTERED,
                    format!("Node {} registered from {}", request.node_id, request.hostname),
                    "ingest",
                    json!({
                        "nodeUuid": record.node_uuid,
                        "hostname": request.hostname,
                        "version": request.version,
                    }),
                )
                .with_node(&request.node_id),
            )
            .await;
        info!(
            tenant = %tenant.id,
            node = %request.node_id,
            node_uuid = %record.node_uuid,
            "registration accepted"
        );

        Ok(RegisterAck::registered(self.cipher.seal(&policy)?))
    }

    /// Liveness heartbeat.
    ///
    /// Refreshes the node's lease and lets the registry decide whether
    /// the reported buffer state changes its status; any transition is
    /// alerted exactly once.
    pub async fn heartbeat(&self, body: &str, headers: &IngestHeaders<'_>) -> Result<HeartbeatAck> {
        self.check_bearer(headers)?;
        self.check_size(body)?;
        let tenant = self.resolver.resolve(headers.api_key, headers.tenant).await?;

        let sealed = parse_body::<SealedRequest>(body)?;
        let hb: Heartbeat = self.cipher.open(&sealed.payload)?;
        let outcome = self.registry.apply_heartbeat(&tenant.id, &hb);
        self.mirror_node(&outcome.record).await;

        if let Some(transition) = &outcome.transition {
            self.alerts.raise(transition, "heartbeat").await;
        }
        debug!(
            tenant = %tenant.id,
            node = %hb.node_id,
            status = %outcome.record.status,
            buffer_size = hb.buffer_size,
            "heartbeat applied"
        );

        Ok(HeartbeatAck::alive())
    }

    /// Sealed metric reading.
    ///
    /// The payload stays opaque beyond decryption: the gate proves the
    /// sender holds the shared key, the content is acknowledged and
    /// audited, and the registry is left untouched.
    pub async fn telemetry(&self, body: &str, headers: &IngestHeaders<'_>) -> Result<TelemetryAck> {
        self.check_bearer(headers)?;
        self.check_size(body)?;
        let tenant = self.resolver.resolve(headers.api_key, headers.tenant).await?;

        let sealed = parse_body::<SealedRequest>(body)?;
        let reading: serde_json::Value = self.cipher.open(&sealed.payload)?;
        let bytes_processed = body.len() as u64;

        let node_id = reading
            .get("nodeId")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let mut event = AuditEvent::new(
            &tenant.id,
            event_type::TELEMETRY_RECEIVED,
            "Telemetry payload received",
            "ingest",
            json!({ "bytesProcessed": bytes_processed }),
        );
        if let Some(id) = &node_id {
            event = event.with_node(id);
        }
        self.auditor.record(event).await;
        debug!(
            tenant = %tenant.id,
            node = node_id.as_deref().unwrap_or("unknown"),
            bytes = bytes_processed,
            "telemetry received"
        );

        Ok(TelemetryAck::received(bytes_processed))
    }

    /// Plaintext host report from a lightweight agent.
    ///
    /// Agents bypass the envelope protocol and authenticate with their
    /// API key alone. The report is validated into its wire form here
    /// and preserved as the audit event's details.
    pub async fn agent_report(&self, body: &str, headers: &IngestHeaders<'_>) -> Result<AgentAck> {
        self.check_bearer(headers)?;
        self.check_size(body)?;
        let tenant = self.resolver.resolve(headers.api_key, headers.tenant).await?;

        let report = parse_body::<AgentReport>(body)?;
        let agent_id = report
            .agent_id
            .clone()
            .or_else(|| report.host_info.as_ref().map(|h| h.hostname.clone()))
            .unwrap_or_else(|| "unknown".to_string());

        self.auditor
            .record(
                AuditEvent::new(
                    &tenant.id,
                    event_type::AGENT_INGEST_RECEIVED,
                    format!("Agent report received from {agent_id}"),
                    "agent",
                    serde_json::to_value(&report)?,
                )
                .with_node(&agent_id),
            )
            .await;
        debug!(tenant = %tenant.id, agent = %agent_id, "agent report received");

        Ok(AgentAck::received(agent_id))
    }

    /// Close the backing store; failures are counted like any other
    /// persistence trouble.
    pub async fn shutdown(&self) {
        if let Err(e) = self.store.close().await {
            self.stats.record_failure(&e);
            warn!(error = %e, "store close failed");
        }
    }

    pub fn registry(&self) -> Arc<NodeRegistry> {
        self.registry.clone()
    }

    pub fn alerts(&self) -> Arc<AlertEngine> {
        self.alerts.clone()
    }

    pub fn auditor(&self) -> Arc<EventAuditor> {
        self.auditor.clone()
    }

    pub fn persist_stats(&self) -> Arc<PersistStats> {
        self.stats.clone()
    }

    pub fn resolver(&self) -> &TenantResolver {
        &self.resolver
    }

    fn check_bearer(&self, headers: &IngestHeaders<'_>) -> Result<()> {
        let expected = match &self.bearer_token {
            Some(token) => token,
            None => return Ok(()),
        };
        match headers.bearer {
            Some(provided) if provided == expected => Ok(()),
            _ => Err(FarwatchError::Auth("invalid bearer token".into())),
        }
    }

    fn check_size(&self, body: &str) -> Result<()> {
        if body.len() > self.max_payload_bytes {
            return Err(FarwatchError::PayloadTooLarge {
                size: body.len(),
                limit: self.max_payload_bytes,
            });
        }
        Ok(())
    }

    async fn mirror_node(&self, record: &NodeRecord) {
        match self.store.upsert_node(record).await {
            Ok(()) => self.stats.record_write(),
            Err(e) => {
                self.stats.record_failure(&e);
                warn!(
                    tenant = %record.tenant_id,
                    node = %record.node_id,
                    error = %e,
                    "node store mirror failed"
                );
            }
        }
    }
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| FarwatchError::Format(format!("invalid request body: {e}")))
}
