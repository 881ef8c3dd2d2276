//! Background liveness evaluator
//!
//! One supervised task owns the staleness rule: every sweep interval it
//! asks the registry for nodes that have gone silent and routes the
//! resulting transitions through the alert engine. The task is started
//! at boot and stopped through its handle at shutdown; nothing else
//! flips nodes OFFLINE.

use crate::alerts::AlertEngine;
use crate::registry::NodeRegistry;
use crate::types::now_millis;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, info};

/// Default seconds between liveness sweeps
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 10;

/// Periodic liveness sweeper
pub struct HealthMonitor {
    registry: Arc<NodeRegistry>,
    alerts: Arc<AlertEngine>,
    interval_secs: u64,
}

/// Control handle for a spawned [`HealthMonitor`]
pub struct MonitorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Signal the monitor to stop and wait for the task to finish
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl HealthMonitor {
    pub fn new(registry: Arc<NodeRegistry>, alerts: Arc<AlertEngine>, interval_secs: u64) -> Self {
        Self {
            registry,
            alerts,
            // A zero interval would spin; clamp to one second.
            interval_secs: interval_secs.max(1),
        }
    }

    /// Start the sweep loop on the current runtime
    pub fn spawn(self) -> MonitorHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(self.interval_secs));
            info!(interval_secs = self.interval_secs, "health monitor started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let transitions = self.registry.sweep(now_millis());
                        if !transitions.is_empty() {
                            debug!(count = transitions.len(), "sweep found stale nodes");
                        }
                        for transition in &transitions {
                            self.alerts.raise(transition, "monitor").await;
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        info!("health monitor stopped");
                        break;
                    }
                }
            }
        });

        MonitorHandle { shutdown, task }
    }
}
