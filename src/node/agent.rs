//! Edge node agent
//!
//! The agent is a state machine with three phases. It starts
//! unregistered, loops registration attempts until central accepts and
//! issues a policy, then settles into steady-state operation: sealed
//! heartbeats on one cadence, sealed telemetry on another. Delivery
//! failures park telemetry in the relay buffer; heartbeats are fire and
//! forget and are never buffered, since a stale liveness claim is worse
//! than a missing one.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::time::{interval, sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::crypto::PayloadCipher;
use crate::error::Result;
use crate::metrics::MetricSource;
use crate::node::buffer::RelayBuffer;
use crate::node::uplink::Uplink;
use crate::node::AGENT_VERSION;
use crate::types::now_millis;
use crate::wire::{BufferState, Heartbeat, NodePolicy, RegisterRequest, SealedRequest};

/// Lifecycle phase of an edge agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentPhase {
    /// Never registered with central
    Unregistered,
    /// Retrying the registration handshake
    Registering,
    /// Registered and running the collection loop
    Operating,
}

/// Edge collection agent
///
/// Owns the sealed channel to central and the local relay buffer.
/// Constructed with a transport and a metric source, then driven by
/// [`EdgeAgent::run`] until a shutdown signal arrives.
pub struct EdgeAgent {
    config: AgentConfig,
    cipher: PayloadCipher,
    uplink: Arc<dyn Uplink>,
    source: Box<dyn MetricSource>,
    buffer: RelayBuffer,
    phase: AgentPhase,
    node_uuid: Option<String>,
    heartbeat_interval_secs: u64,
    collection_interval_secs: u64,
}

impl EdgeAgent {
    pub fn new(
        config: AgentConfig,
        uplink: Arc<dyn Uplink>,
        source: impl MetricSource + 'static,
    ) -> Result<Self> {
        let cipher = PayloadCipher::new(&config.shared_key()?);
        let buffer = RelayBuffer::new(config.buffer_capacity);
        // Pre-policy cadence; replaced by whatever registration issues.
        let heartbeat_interval_secs = config.heartbeat_interval_secs.max(1);
        let collection_interval_secs = config.collection_interval_secs.max(1);

        Ok(Self {
            cipher,
            uplink,
            source: Box::new(source),
            buffer,
            phase: AgentPhase::Unregistered,
            node_uuid: None,
            heartbeat_interval_secs,
            collection_interval_secs,
            config,
        })
    }

    /// Register with central, retrying until the handshake succeeds
    ///
    /// Blocks the caller for as long as central stays unreachable; the
    /// agent sends nothing else until it holds a policy.
    pub async fn register(&mut self) {
        self.phase = AgentPhase::Registering;
        loop {
            match self.try_register().await {
                Ok(policy) => {
                    self.node_uuid = Some(policy.node_uuid.clone());
                    self.heartbeat_interval_secs = policy.heartbeat_interval_secs.max(1);
                    self.collection_interval_secs = policy.collection_interval_secs.max(1);
                    self.phase = AgentPhase::Operating;
                    info!(
                        node_id = %self.config.node_id,
                        node_uuid = %policy.node_uuid,
                        heartbeat_secs = self.heartbeat_interval_secs,
                        collection_secs = self.collection_interval_secs,
                        "node registered"
                    );
                    return;
                }
                Err(e) => {
                    warn!(
                        node_id = %self.config.node_id,
                        error = %e,
                        retry_secs = self.config.register_retry_secs,
                        "registration failed, will retry"
                    );
                    sleep(Duration::from_secs(self.config.register_retry_secs)).await;
                }
            }
        }
    }

    async fn try_register(&self) -> Result<NodePolicy> {
        let request = RegisterRequest {
            node_id: self.config.node_id.clone(),
            hostname: self.config.hostname.clone(),
            ip: self.config.advertised_ip.clone(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            version: AGENT_VERSION.to_string(),
            timestamp: now_millis(),
        };
        let body = self.seal_body(&request)?;
        let ack = self.uplink.register(&body).await?;
        self.cipher.open(&ack.payload)
    }

    /// Drive the agent until `shutdown` flips
    ///
    /// Registers first if needed, then ticks heartbeat and collection
    /// timers. Returns the agent so a caller can inspect its final
    /// state after shutdown.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Self {
        if self.phase != AgentPhase::Operating {
            tokio::select! {
                _ = self.register() => {}
                _ = shutdown.changed() => {
                    info!(node_id = %self.config.node_id, "edge agent stopped before registration");
                    return self;
                }
            }
        }

        let mut ticker = interval(Duration::from_secs(1));
        // Both timers fire on the first tick after registration.
        let mut heartbeat_due = Instant::now();
        let mut collection_due = Instant::now();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = Instant::now();
                    if now >= heartbeat_due {
                        self.send_heartbeat().await;
                        heartbeat_due = now + Duration::from_secs(self.heartbeat_interval_secs);
                    }
                    if now >= collection_due {
                        self.collect_cycle().await;
                        collection_due = now + Duration::from_secs(self.collection_interval_secs);
                    }
                }
                _ = shutdown.changed() => {
                    info!(node_id = %self.config.node_id, "edge agent stopped");
                    break;
                }
            }
        }
        self
    }

    /// Send one liveness ping; delivery failures are logged and dropped
    async fn send_heartbeat(&self) {
        let heartbeat = Heartbeat {
            node_id: self.config.node_id.clone(),
            version: AGENT_VERSION.to_string(),
            buffer_status: if self.buffer.is_empty() {
                BufferState::Inactive
            } else {
                BufferState::Active
            },
            buffer_size: self.buffer.len() as u64,
            timestamp: now_millis(),
        };

        let body = match self.seal_body(&heartbeat) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "failed to seal heartbeat");
                return;
            }
        };

        // A heartbeat is a liveness claim for this instant; a late
        // replay would be a lie, so it is never buffered.
        if let Err(e) = self.uplink.heartbeat(&body).await {
            warn!(error = %e, "heartbeat dropped");
        }
    }

    /// Collect one reading, then deliver it or park it in the buffer
    async fn collect_cycle(&mut self) {
        let reading = self.wrap_reading(self.source.collect());
        let envelope = match self.seal_body(&reading) {
            Ok(envelope) => envelope,
            // Readings travel sealed or not at all.
            Err(e) => {
                warn!(error = %e, "failed to seal reading, discarding");
                return;
            }
        };

        if self.buffer.is_empty() {
            if let Err(e) = self.uplink.telemetry(&envelope).await {
                warn!(error = %e, "delivery failed, buffering reading");
                self.buffer.push(envelope);
            }
        } else {
            // Keep collection order: the new reading queues behind the
            // backlog, then a flush attempt drains from the front.
            self.buffer.push(envelope);
            self.flush().await;
        }
    }

    /// Drain buffered envelopes oldest-first, stopping at the first
    /// failure. Returns how many were delivered.
    pub async fn flush(&mut self) -> usize {
        let mut delivered = 0;
        while let Some(envelope) = self.buffer.peek() {
            match self.uplink.telemetry(envelope).await {
                Ok(_) => {
                    self.buffer.pop();
                    delivered += 1;
                }
                Err(e) => {
                    debug!(
                        error = %e,
                        remaining = self.buffer.len(),
                        "flush stopped, backlog retained"
                    );
                    break;
                }
            }
        }
        if delivered > 0 {
            info!(delivered, remaining = self.buffer.len(), "flushed backlog");
        }
        delivered
    }

    fn wrap_reading(&self, metrics: Value) -> Value {
        json!({
            "nodeId": self.config.node_id,
            "nodeUuid": self.node_uuid,
            "timestamp": now_millis(),
            "metrics": metrics,
        })
    }

    fn seal_body<T: Serialize>(&self, payload: &T) -> Result<String> {
        let sealed = SealedRequest::new(self.cipher.seal(payload)?);
        Ok(serde_json::to_string(&sealed)?)
    }

    pub fn phase(&self) -> AgentPhase {
        self.phase
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// Server-assigned identity, present once registered
    pub fn node_uuid(&self) -> Option<&str> {
        self.node_uuid.as_deref()
    }
}
