//! Edge node side of the pipeline
//!
//! Everything a collection node runs: the agent state machine, its
//! store-and-forward buffer, and the transport seam back to central.

pub mod agent;
pub mod buffer;
pub mod uplink;

pub use agent::{AgentPhase, EdgeAgent};
pub use buffer::{RelayBuffer, DEFAULT_BUFFER_CAPACITY};
pub use uplink::{MemoryUplink, Uplink};

/// Version string reported by agents at registration and in heartbeats
pub const AGENT_VERSION: &str = "1.2.0";
