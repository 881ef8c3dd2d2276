//! Request and acknowledgement types for the ingest boundary
//!
//! Everything the edge sends travels as a `SealedRequest` whose `payload`
//! field is an encrypted envelope; node identity lives inside the envelope,
//! never in the outer body. Agent reports are the one plaintext path and
//! authenticate with an API key instead.
//!
//! All types use camelCase JSON serialization for wire compatibility.
//! Bodies are deserialized (and thereby validated) exactly once at this
//! boundary; interior code works with the typed forms.

use crate::types::now_millis;
use serde::{Deserialize, Serialize};

/// Outer body of every encrypted ingest request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedRequest {
    /// Base64 envelope (nonce || ciphertext || tag)
    pub payload: String,
}

impl SealedRequest {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }
}

/// Registration handshake body (sealed)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Operator-assigned node identifier
    pub node_id: String,

    /// Hostname of the machine the agent runs on
    pub hostname: String,

    /// Primary IP address, when resolvable
    #[serde(default)]
    pub ip: String,

    /// Operating system name
    #[serde(default)]
    pub os: String,

    /// CPU architecture
    #[serde(default)]
    pub arch: String,

    /// Agent software version
    pub version: String,

    /// Unix millis the request was built
    #[serde(default = "now_millis")]
    pub timestamp: u64,
}

/// Operating policy issued to a node at registration (sealed)
///
/// Carries the cadence the node must adopt. A node that re-registers
/// after a central config change picks up the current values here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePolicy {
    /// Server-assigned node identity
    pub node_uuid: String,

    /// How often to collect and push telemetry, in seconds
    pub collection_interval_secs: u64,

    /// How often to send heartbeats, in seconds
    pub heartbeat_interval_secs: u64,
}

/// Registration response; `payload` is the sealed `NodePolicy`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterAck {
    pub status: String,
    pub payload: String,
}

impl RegisterAck {
    pub fn registered(payload: impl Into<String>) -> Self {
        Self {
            status: "registered".to_string(),
            payload: payload.into(),
        }
    }
}

/// Whether a node currently holds undelivered telemetry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferState {
    Active,
    Inactive,
}

impl BufferState {
    /// True when the node reports an undelivered backlog
    pub fn is_active(&self) -> bool {
        matches!(self, BufferState::Active)
    }
}

/// Liveness ping body (sealed)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heartbeat {
    /// Operator-assigned node identifier
    pub node_id: String,

    /// Agent software version
    #[serde(default)]
    pub version: String,

    /// Whether the local store-and-forward buffer holds items
    pub buffer_status: BufferState,

    /// Current backlog depth
    #[serde(default)]
    pub buffer_size: u64,

    /// Unix millis the heartbeat was built
    #[serde(default = "now_millis")]
    pub timestamp: u64,
}

/// Heartbeat response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatAck {
    pub status: String,
    pub server_time: u64,
}

impl HeartbeatAck {
    pub fn alive() -> Self {
        Self {
            status: "alive".to_string(),
            server_time: now_millis(),
        }
    }
}

/// Telemetry push response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryAck {
    pub status: String,
    pub bytes_processed: u64,
}

impl TelemetryAck {
    pub fn received(bytes_processed: u64) -> Self {
        Self {
            status: "received".to_string(),
            bytes_processed,
        }
    }
}

/// System metrics reported by a host agent
///
/// Percentages are 0..=100; a `latency_ms` of -1 means the probe target
/// was unreachable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMetrics {
    #[serde(default)]
    pub cpu_usage: f64,
    #[serde(default)]
    pub ram_usage: f64,
    #[serde(default)]
    pub ram_free_gb: f64,
    #[serde(default)]
    pub disk_usage: f64,
    #[serde(default)]
    pub disk_free_gb: f64,
    #[serde(default)]
    pub net_sent_mb: f64,
    #[serde(default)]
    pub net_recv_mb: f64,
    #[serde(default)]
    pub latency_ms: f64,
}

/// Static facts about the host an agent runs on
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostInfo {
    pub hostname: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub arch: String,
    #[serde(default)]
    pub cpu_count: u32,
    #[serde(default)]
    pub ram_total_gb: f64,
}

/// One plaintext report from a host agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentReport {
    /// Agent identifier; absent reports fall back to the hostname
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,

    /// Metrics sample; may be omitted but must be well-formed when present
    #[serde(default)]
    pub metrics: AgentMetrics,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_info: Option<HostInfo>,

    /// Unix millis the report was built
    #[serde(default = "now_millis")]
    pub timestamp: u64,
}

/// Agent ingest response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentAck {
    pub status: String,
    pub agent_id: String,
    pub timestamp: u64,
}

impl AgentAck {
    pub fn received(agent_id: impl Into<String>) -> Self {
        Self {
            status: "received".to_string(),
            agent_id: agent_id.into(),
            timestamp: now_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_serialization() {
        let req = RegisterRequest {
            node_id: "edge-01".to_string(),
            hostname: "edge-01.local".to_string(),
            ip: "10.0.0.5".to_string(),
            os: "Linux".to_string(),
            arch: "x86_64".to_string(),
            version: "1.2.0".to_string(),
            timestamp: 1700000000000,
        };

        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"nodeId\":\"edge-01\""));
        assert!(json.contains("\"version\":\"1.2.0\""));

        let parsed: RegisterRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.node_id, "edge-01");
        assert_eq!(parsed.arch, "x86_64");
    }

    #[test]
    fn test_register_request_defaults() {
        // Minimal body from an older agent still parses
        let json = r#"{"nodeId": "edge-02", "hostname": "h", "version": "1.0.0"}"#;
        let parsed: RegisterRequest = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.ip, "");
        assert_eq!(parsed.os, "");
        assert!(parsed.timestamp > 0);
    }

    #[test]
    fn test_buffer_state_wire_format() {
        assert_eq!(
            serde_json::to_string(&BufferState::Active).unwrap(),
            "\"active\""
        );
        let parsed: BufferState = serde_json::from_str("\"inactive\"").unwrap();
        assert_eq!(parsed, BufferState::Inactive);
        assert!(!parsed.is_active());
    }

    #[test]
    fn test_heartbeat_roundtrip() {
        let hb = Heartbeat {
            node_id: "edge-01".to_string(),
            version: "1.2.0".to_string(),
            buffer_status: BufferState::Active,
            buffer_size: 7,
            timestamp: now_millis(),
        };

        let json = serde_json::to_string(&hb).unwrap();
        assert!(json.contains("\"bufferStatus\":\"active\""));
        assert!(json.contains("\"bufferSize\":7"));

        let parsed: Heartbeat = serde_json::from_str(&json).unwrap();
        assert!(parsed.buffer_status.is_active());
        assert_eq!(parsed.buffer_size, 7);
    }

    #[test]
    fn test_ack_constructors() {
        let ack = HeartbeatAck::alive();
        assert_eq!(ack.status, "alive");
        assert!(ack.server_time > 0);

        let ack = TelemetryAck::received(512);
        assert_eq!(ack.status, "received");
        assert_eq!(ack.bytes_processed, 512);

        let ack = AgentAck::received("web-42");
        assert_eq!(ack.status, "received");
        assert_eq!(ack.agent_id, "web-42");
    }

    #[test]
    fn test_node_policy_roundtrip() {
        let policy = NodePolicy {
            node_uuid: uuid::Uuid::new_v4().to_string(),
            collection_interval_secs: 30,
            heartbeat_interval_secs: 60,
        };

        let json = serde_json::to_string(&policy).unwrap();
        assert!(json.contains("\"collectionIntervalSecs\":30"));
        assert!(json.contains("\"heartbeatIntervalSecs\":60"));

        let parsed: NodePolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.heartbeat_interval_secs, 60);
    }

    #[test]
    fn test_agent_report_minimal() {
        // Reports without agent_id or host_info still parse
        let json = r#"{"metrics": {"cpuUsage": 85.5}}"#;
        let report: AgentReport = serde_json::from_str(json).unwrap();
        assert!(report.agent_id.is_none());
        assert_eq!(report.metrics.cpu_usage, 85.5);
        assert_eq!(report.metrics.disk_usage, 0.0);

        // Omitted metrics default to zeroes; a non-object is malformed.
        let bare: AgentReport = serde_json::from_str("{}").unwrap();
        assert_eq!(bare.metrics.cpu_usage, 0.0);
        assert!(serde_json::from_str::<AgentReport>(r#"{"metrics": 3}"#).is_err());
    }

    #[test]
    fn test_agent_report_full() {
        let report = AgentReport {
            agent_id: Some("web-42".to_string()),
            metrics: AgentMetrics {
                cpu_usage: 41.0,
                ram_usage: 63.2,
                ram_free_gb: 5.8,
                disk_usage: 71.0,
                disk_free_gb: 120.4,
                net_sent_mb: 840.2,
                net_recv_mb: 1290.8,
                latency_ms: 12.0,
            },
            host_info: Some(HostInfo {
                hostname: "web-42.internal".to_string(),
                os: "Linux 6.1".to_string(),
                arch: "aarch64".to_string(),
                cpu_count: 8,
                ram_total_gb: 16.0,
            }),
            timestamp: now_millis(),
        };

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"agentId\":\"web-42\""));
        assert!(json.contains("\"hostInfo\""));
        assert!(json.contains("\"cpuCount\":8"));

        let parsed: AgentReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.host_info.unwrap().cpu_count, 8);
    }

    #[test]
    fn test_sealed_request_shape() {
        let req = SealedRequest::new("AAAA");
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, "{\"payload\":\"AAAA\"}");
    }
}
