//! # farwatch
//!
//! Sealed telemetry collection and liveness monitoring for fleets of
//! edge nodes.
//!
//! ## Overview
//!
//! `farwatch` gives a central process everything it needs to ingest
//! encrypted telemetry from edge agents, track which nodes are alive,
//! and alert on status transitions. Edge and central share one AES-256
//! key; every registration, heartbeat, and reading travels as a sealed
//! envelope, so possession of the key is what authenticates a node.
//! Tenants partition the whole system: nodes, alerts, and audit events
//! from one tenant are invisible to every other.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use farwatch::{
//!     CentralConfig, IngestHeaders, IngestService, MemoryStore, PayloadCipher, SealedRequest,
//! };
//!
//! # async fn example() -> farwatch::Result<()> {
//! let config = CentralConfig {
//!     secret_key_hex: "0b".repeat(32),
//!     ..Default::default()
//! };
//! let service = IngestService::new(&config, Arc::new(MemoryStore::new()))?;
//!
//! // An edge node seals every body with the shared key before sending.
//! let cipher = PayloadCipher::new(&config.shared_key()?);
//! let reading = serde_json::json!({"nodeId": "edge-001", "latencyMs": 12.5});
//! let body = serde_json::to_string(&SealedRequest::new(cipher.seal(&reading)?))?;
//!
//! let ack = service.telemetry(&body, &IngestHeaders::default()).await?;
//! println!("processed {} bytes", ack.bytes_processed);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **IngestService**: gated entry point for the four ingest operations
//! - **NodeRegistry**: authoritative in-memory liveness state per tenant
//! - **AlertEngine** / **EventAuditor**: bounded alert and audit trails
//! - **HealthMonitor**: background sweep that marks silent nodes offline
//! - **TelemetryStore** trait: write-behind persistence seam
//! - **EdgeAgent**: node-side collection loop with store-and-forward

pub mod alerts;
pub mod audit;
pub mod config;
pub mod crypto;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod monitor;
pub mod node;
pub mod registry;
pub mod store;
pub mod tenant;
pub mod types;
pub mod wire;

// Re-export core types
pub use alerts::AlertEngine;
pub use audit::{event_type, EventAuditor};
pub use config::{AgentConfig, CentralConfig};
pub use crypto::{PayloadCipher, SharedKey};
pub use error::{FarwatchError, Result};
pub use ingest::{IngestHeaders, IngestService};
pub use metrics::{availability_index, IdrStatus, MetricSource, SimulatedMetrics};
pub use monitor::{HealthMonitor, MonitorHandle};
pub use node::{AgentPhase, EdgeAgent, MemoryUplink, RelayBuffer, Uplink, AGENT_VERSION};
pub use registry::{HeartbeatOutcome, NodeKey, NodeRegistry};
pub use store::{MemoryStore, PersistSnapshot, PersistStats, TelemetryStore};
pub use tenant::{TenantResolver, DEFAULT_TENANT};
pub use types::{
    Alert, ApiKeyRecord, AuditEvent, NodeRecord, NodeStatus, Severity, StatusTransition, Tenant,
    TenantStatus,
};
pub use wire::{
    AgentAck, AgentMetrics, AgentReport, BufferState, Heartbeat, HeartbeatAck, HostInfo,
    NodePolicy, RegisterAck, RegisterRequest, SealedRequest, TelemetryAck,
};
