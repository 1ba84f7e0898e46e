//! # Heartbeat Reporter
//!
//! Periodic liveness signal to the fleet collector.
//!
//! ## Sample Assembly
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Heartbeat Assembly                                 │
//! │                                                                         │
//! │  ┌──────────────┐  ┌──────────────┐  ┌───────────────────────────────┐ │
//! │  │ HostMetrics  │  │ActivityProbe │  │ GET /health (3 s, best-effort)│ │
//! │  │              │  │              │  │                               │ │
//! │  │ memory %/MB  │  │ work units   │  │ server rss / heap / uptime    │ │
//! │  │ disk %/MB    │  │ is_active    │  │                               │ │
//! │  │ app uptime   │  │ (host app)   │  │ FAILURE TOLERATED: sample is  │ │
//! │  └──────┬───────┘  └──────┬───────┘  │ sent without server fields    │ │
//! │         │                 │          └───────────────┬───────────────┘ │
//! │         └────────┬────────┴──────────────────────────┘                 │
//! │                  ▼                                                      │
//! │          HeartbeatSample ──► POST /fleet/heartbeat (X-Device-Key)      │
//! │                                                                         │
//! │  Failure is logged and NOT retried before the next period:             │
//! │  heartbeats are a liveness signal, not a delivery-guaranteed channel.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::{Arc, Mutex};
use std::time::Instant;

use sysinfo::{DiskExt, System, SystemExt};
use tracing::{debug, warn};

use encore_core::HeartbeatSample;
use encore_store::DeviceCredentials;

use crate::api::{Collector, HealthSource};

const BYTES_PER_MB: u64 = 1024 * 1024;

// =============================================================================
// Activity Probe
// =============================================================================

/// Host-application counters folded into each heartbeat.
///
/// The engine cannot know what the booth counts as live work (queued
/// announcements, a running set); the hosting application implements this.
pub trait ActivityProbe: Send + Sync {
    /// Work units currently queued or in flight.
    fn active_work_units(&self) -> u32;

    /// True while a performance is live.
    fn is_active(&self) -> bool;
}

/// Default probe for hosts that track no activity.
pub struct IdleProbe;

impl ActivityProbe for IdleProbe {
    fn active_work_units(&self) -> u32 {
        0
    }

    fn is_active(&self) -> bool {
        false
    }
}

// =============================================================================
// Host Metrics
// =============================================================================

/// Local resource counters behind one refreshable `sysinfo` handle.
pub struct HostMetrics {
    sys: Mutex<System>,
    started: Instant,
}

impl Default for HostMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl HostMetrics {
    pub fn new() -> Self {
        HostMetrics {
            sys: Mutex::new(System::new_all()),
            started: Instant::now(),
        }
    }

    /// Seconds since this engine started.
    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Refreshes and reads memory/disk counters.
    fn read(&self) -> (f64, u64, u64, f64, u64) {
        let mut sys = match self.sys.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        sys.refresh_memory();
        sys.refresh_disks();

        let mem_total = sys.total_memory();
        let mem_used = sys.used_memory();
        let memory_percent = percent(mem_used, mem_total);

        let disk_total: u64 = sys.disks().iter().map(|d| d.total_space()).sum();
        let disk_free: u64 = sys.disks().iter().map(|d| d.available_space()).sum();
        let disk_used = disk_total.saturating_sub(disk_free);
        let disk_percent = percent(disk_used, disk_total);

        (
            memory_percent,
            mem_used / BYTES_PER_MB,
            mem_total / BYTES_PER_MB,
            disk_percent,
            disk_used / BYTES_PER_MB,
        )
    }
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = used as f64 / total as f64 * 100.0;
    (raw * 10.0).round() / 10.0
}

// =============================================================================
// Heartbeat Reporter
// =============================================================================

/// Assembles and posts the periodic health snapshot.
pub struct HeartbeatReporter {
    collector: Arc<dyn Collector>,
    health: Arc<dyn HealthSource>,
    metrics: Arc<HostMetrics>,
    probe: Arc<dyn ActivityProbe>,
    creds: DeviceCredentials,
    app_version: String,
}

impl HeartbeatReporter {
    pub fn new(
        collector: Arc<dyn Collector>,
        health: Arc<dyn HealthSource>,
        metrics: Arc<HostMetrics>,
        probe: Arc<dyn ActivityProbe>,
        creds: DeviceCredentials,
        app_version: String,
    ) -> Self {
        HeartbeatReporter {
            collector,
            health,
            metrics,
            probe,
            creds,
            app_version,
        }
    }

    /// Builds a fresh sample, enriched by the best-effort health fetch.
    pub async fn sample(&self) -> HeartbeatSample {
        let (memory_percent, memory_used_mb, memory_total_mb, disk_percent, disk_used_mb) =
            self.metrics.read();

        let mut sample = HeartbeatSample {
            app_version: self.app_version.clone(),
            memory_percent,
            memory_used_mb,
            memory_total_mb,
            disk_percent,
            disk_used_mb,
            uptime_seconds: self.metrics.uptime_seconds(),
            active_work_units: self.probe.active_work_units(),
            is_active: self.probe.is_active(),
            server_memory_rss_mb: None,
            server_heap_used_mb: None,
            server_uptime_seconds: None,
        };

        match self.health.fetch_health().await {
            Ok(health) => {
                sample.server_memory_rss_mb = Some(health.memory.rss / BYTES_PER_MB as f64);
                sample.server_heap_used_mb = Some(health.memory.heap_used / BYTES_PER_MB as f64);
                sample.server_uptime_seconds = Some(health.uptime.max(0.0) as u64);
            }
            Err(e) => {
                // Tolerated: the sample goes out without the server fields.
                debug!(error = %e, "Health fetch failed, sending heartbeat without server fields");
            }
        }

        sample
    }

    /// Runs one heartbeat cycle. Failure is logged, never retried early.
    pub async fn run_once(&self) {
        let sample = self.sample().await;

        match self.collector.push_heartbeat(&self.creds, &sample).await {
            Ok(()) => debug!("Heartbeat sent"),
            Err(e) => warn!(error = %e, "Heartbeat failed"),
        }
    }
}
