//! Agent-to-central transport seam
//!
//! The agent never talks to an `IngestService` directly; everything it
//! sends crosses an `Uplink`. That keeps the agent loop free of
//! transport detail and lets tests script delivery failures.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{FarwatchError, Result};
use crate::ingest::{IngestHeaders, IngestService};
use crate::wire::{HeartbeatAck, RegisterAck, TelemetryAck};

/// Transport used by an edge agent to reach central
///
/// Calls are expected to resolve quickly; implementations backed by a
/// network own a short per-call timeout (a few seconds) and surface
/// expiry as [`FarwatchError::Transmission`] so the agent can fall back
/// to buffering without stalling its timers.
#[async_trait]
pub trait Uplink: Send + Sync {
    async fn register(&self, body: &str) -> Result<RegisterAck>;
    async fn heartbeat(&self, body: &str) -> Result<HeartbeatAck>;
    async fn telemetry(&self, body: &str) -> Result<TelemetryAck>;
}

/// In-process uplink wired straight into an [`IngestService`]
///
/// Used by the integration suite and demos: the loopback call keeps
/// full envelope sealing and gate semantics while `set_offline` lets a
/// test simulate an unreachable central.
pub struct MemoryUplink {
    service: Arc<IngestService>,
    offline: AtomicBool,
    bearer: Option<String>,
    api_key: Option<String>,
    tenant: Option<String>,
    register_calls: AtomicU64,
    heartbeat_calls: AtomicU64,
    telemetry_calls: AtomicU64,
    telemetry_log: Mutex<Vec<String>>,
}

impl MemoryUplink {
    pub fn new(service: Arc<IngestService>) -> Self {
        Self {
            service,
            offline: AtomicBool::new(false),
            bearer: None,
            api_key: None,
            tenant: None,
            register_calls: AtomicU64::new(0),
            heartbeat_calls: AtomicU64::new(0),
            telemetry_calls: AtomicU64::new(0),
            telemetry_log: Mutex::new(Vec::new()),
        }
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    /// Simulate central being unreachable
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    pub fn register_calls(&self) -> u64 {
        self.register_calls.load(Ordering::Relaxed)
    }

    pub fn heartbeat_calls(&self) -> u64 {
        self.heartbeat_calls.load(Ordering::Relaxed)
    }

    pub fn telemetry_calls(&self) -> u64 {
        self.telemetry_calls.load(Ordering::Relaxed)
    }

    /// Telemetry bodies that made it through, in delivery order
    pub fn delivered_telemetry(&self) -> Vec<String> {
        self.telemetry_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    fn headers(&self) -> IngestHeaders<'_> {
        IngestHeaders {
            bearer: self.bearer.as_deref(),
            api_key: self.api_key.as_deref(),
            tenant: self.tenant.as_deref(),
        }
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::Relaxed) {
            return Err(FarwatchError::Transmission("uplink offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Uplink for MemoryUplink {
    async fn register(&self, body: &str) -> Result<RegisterAck> {
        self.register_calls.fetch_add(1, Ordering::Relaxed);
        self.ensure_online()?;
        self.service.register(body, &self.headers()).await
    }

    async fn heartbeat(&self, body: &str) -> Result<HeartbeatAck> {
        self.heartbeat_calls.fetch_add(1, Ordering::Relaxed);
        self.ensure_online()?;
        self.service.heartbeat(body, &self.headers()).await
    }

    async fn telemetry(&self, body: &str) -> Result<TelemetryAck> {
        self.telemetry_calls.fetch_add(1, Ordering::Relaxed);
        self.ensure_online()?;
        let ack = self.service.telemetry(body, &self.headers()).await?;
        if let Ok(mut log) = self.telemetry_log.lock() {
            log.push(body.to_string());
        }
        Ok(ack)
    }
}
