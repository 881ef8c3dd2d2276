//! Metric sources and the availability index
//!
//! The collection pipeline treats readings as opaque JSON; a
//! `MetricSource` is the only seam where actual sampling plugs in.
//! `SimulatedMetrics` stands in for host introspection in demos and
//! tests. The availability index is the dashboard-level saturation
//! score derived from a reading's resource percentages.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Supplies one reading per collection cycle
///
/// Implementations decide what a reading contains; the pipeline only
/// ever serializes it, seals it, and forwards it.
pub trait MetricSource: Send + Sync {
    fn collect(&self) -> Value;
}

/// Randomized stand-in for real host sampling
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedMetrics;

impl MetricSource for SimulatedMetrics {
    fn collect(&self) -> Value {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        json!({
            "latencyMs": rng.gen_range(5.0..120.0),
            "packetLoss": rng.gen_range(0.0..2.5),
            "bandwidthMbps": rng.gen_range(40.0..950.0),
            "cpuUsage": rng.gen_range(3.0..85.0),
            "memoryUsage": rng.gen_range(20.0..90.0),
        })
    }
}

/// Dashboard classification of an availability index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdrStatus {
    Critical,
    Warning,
    Healthy,
}

impl IdrStatus {
    /// Classify an index: below 10 is critical, below 30 is a warning
    pub fn classify(index: f64) -> Self {
        if index < 10.0 {
            IdrStatus::Critical
        } else if index < 30.0 {
            IdrStatus::Warning
        } else {
            IdrStatus::Healthy
        }
    }
}

impl std::fmt::Display for IdrStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IdrStatus::Critical => "CRITICAL",
            IdrStatus::Warning => "WARNING",
            IdrStatus::Healthy => "HEALTHY",
        };
        f.write_str(s)
    }
}

/// Availability index: 100 minus the most saturated resource, floored
/// at zero. All inputs are usage percentages.
pub fn availability_index(cpu: f64, ram: f64, disk: f64) -> f64 {
    (100.0 - cpu.max(ram).max(disk)).max(0.0)
}
