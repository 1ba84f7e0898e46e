//! # Credential Gate
//!
//! Withholds all collector traffic until a collector endpoint and device
//! key are both provisioned.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Credential Gate States                              │
//! │                                                                         │
//! │  ┌────────────┐   both endpoint + key present   ┌────────────┐         │
//! │  │  WAITING   │ ───────────────────────────────►│   ACTIVE   │         │
//! │  │            │                                 │            │         │
//! │  │ polls the  │ ◄───────────────────────────────│ flush +    │         │
//! │  │ credential │     credentials removed         │ heartbeat  │         │
//! │  │ store      │                                 │ timers run │         │
//! │  │ every 30 s │                                 │            │         │
//! │  └────────────┘                                 └────────────┘         │
//! │                                                                         │
//! │  On the FIRST transition to ACTIVE:                                    │
//! │  1. one immediate flush cycle                                          │
//! │  2. one immediate heartbeat cycle                                      │
//! │  3. both periodic timers start (first tick one full period later)      │
//! │  4. the polling timer is cancelled                                     │
//! │                                                                         │
//! │  Re-entrant configuration (e.g. updated endpoint) REPLACES the         │
//! │  running timers; it never stacks duplicates and never repeats the      │
//! │  immediate cycle.                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! While WAITING the gate performs zero network activity: telemetry
//! accumulates in the buffer (bounded, persisted) until provisioning.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use encore_store::{CredentialStore, DeviceCredentials};

use crate::api::{Collector, HealthSource};
use crate::buffer::TelemetryBuffer;
use crate::config::SyncConfig;
use crate::flusher::TelemetryFlusher;
use crate::heartbeat::{ActivityProbe, HeartbeatReporter, HostMetrics};

// =============================================================================
// Gate State
// =============================================================================

/// Activation state of the credential gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// No endpoint+credential pair known; collector traffic withheld.
    Waiting,
    /// Both present; flusher and heartbeat timers running.
    Active,
}

impl std::fmt::Display for GateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateState::Waiting => write!(f, "waiting"),
            GateState::Active => write!(f, "active"),
        }
    }
}

// =============================================================================
// Periodic Task Guard
// =============================================================================

/// Guard for a spawned periodic task; dropping it stops the loop.
struct PeriodicTask {
    _shutdown_tx: mpsc::Sender<()>,
}

impl PeriodicTask {
    /// Spawns a loop running `work` every `period`, first run one full
    /// period from now.
    fn spawn<F, Fut>(period: Duration, mut work: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => work().await,
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        PeriodicTask {
            _shutdown_tx: shutdown_tx,
        }
    }
}

// =============================================================================
// Credential Gate
// =============================================================================

struct GateInner {
    state: GateState,
    active_creds: Option<DeviceCredentials>,
    poll: Option<PeriodicTask>,
    flush: Option<PeriodicTask>,
    heartbeat: Option<PeriodicTask>,
}

/// Activation guard for the telemetry flusher and heartbeat reporter.
pub struct CredentialGate {
    credentials: CredentialStore,
    buffer: Arc<TelemetryBuffer>,
    collector: Arc<dyn Collector>,
    health: Arc<dyn HealthSource>,
    probe: Arc<dyn ActivityProbe>,
    metrics: Arc<HostMetrics>,
    app_version: String,
    flush_interval: Duration,
    heartbeat_interval: Duration,
    poll_interval: Duration,
    inner: Mutex<GateInner>,
}

impl CredentialGate {
    pub fn new(
        config: &SyncConfig,
        credentials: CredentialStore,
        buffer: Arc<TelemetryBuffer>,
        collector: Arc<dyn Collector>,
        health: Arc<dyn HealthSource>,
        probe: Arc<dyn ActivityProbe>,
        metrics: Arc<HostMetrics>,
    ) -> Self {
        CredentialGate {
            credentials,
            buffer,
            collector,
            health,
            probe,
            metrics,
            app_version: config.device.app_version.clone(),
            flush_interval: config.flush_interval(),
            heartbeat_interval: config.heartbeat_interval(),
            poll_interval: config.credential_poll(),
            inner: Mutex::new(GateInner {
                state: GateState::Waiting,
                active_creds: None,
                poll: None,
                flush: None,
                heartbeat: None,
            }),
        }
    }

    /// Current gate state.
    pub async fn state(&self) -> GateState {
        self.inner.lock().await.state
    }

    /// Checks credentials once and starts the waiting-state poll timer if
    /// they are not yet provisioned.
    pub async fn start(self: &Arc<Self>) {
        if self.poll_once().await {
            return;
        }

        let mut inner = self.inner.lock().await;
        if inner.state == GateState::Waiting && inner.poll.is_none() {
            debug!(period = ?self.poll_interval, "Credential gate waiting for provisioning");
            inner.poll = Some(self.spawn_poll());
        }
    }

    /// Re-reads the credential store and reconciles the gate state.
    ///
    /// Called by the poll timer while waiting, and by the application after
    /// provisioning new credentials at runtime. Returns true when the gate
    /// is active afterwards.
    pub async fn poll_once(self: &Arc<Self>) -> bool {
        let creds = match self.credentials.load_ready() {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "Failed to read collector credentials");
                None
            }
        };

        let mut inner = self.inner.lock().await;
        match (creds, inner.state) {
            (Some(creds), GateState::Waiting) => {
                self.activate(&mut inner, creds, true).await;
                true
            }
            (Some(creds), GateState::Active) => {
                // Re-entrant configuration: replace the timers only when the
                // pair actually changed, and never repeat the immediate cycle.
                if inner.active_creds.as_ref() != Some(&creds) {
                    self.activate(&mut inner, creds, false).await;
                }
                true
            }
            (None, GateState::Active) => {
                info!("Collector credentials removed, gate returning to waiting");
                self.deactivate(&mut inner);
                false
            }
            (None, GateState::Waiting) => false,
        }
    }

    /// Stops every timer and returns to the waiting state without
    /// restarting the poll loop.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        inner.poll = None;
        inner.flush = None;
        inner.heartbeat = None;
        inner.active_creds = None;
        inner.state = GateState::Waiting;
        info!("Credential gate stopped");
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn activate(&self, inner: &mut GateInner, creds: DeviceCredentials, first: bool) {
        info!(collector = %creds.collector_url, "Credential gate active");
        inner.state = GateState::Active;
        // Cancels the waiting-state poll timer.
        inner.poll = None;

        let flusher = Arc::new(TelemetryFlusher::new(
            self.buffer.clone(),
            self.collector.clone(),
            creds.clone(),
        ));
        let reporter = Arc::new(HeartbeatReporter::new(
            self.collector.clone(),
            self.health.clone(),
            self.metrics.clone(),
            self.probe.clone(),
            creds.clone(),
            self.app_version.clone(),
        ));

        if first {
            flusher.run_once().await;
            reporter.run_once().await;
        }

        // Replacing the Option drops the previous guard, which stops the
        // old loop: timers are replaced, never stacked.
        let f = flusher.clone();
        inner.flush = Some(PeriodicTask::spawn(self.flush_interval, move || {
            let f = f.clone();
            async move { f.run_once().await }
        }));

        let r = reporter.clone();
        inner.heartbeat = Some(PeriodicTask::spawn(self.heartbeat_interval, move || {
            let r = r.clone();
            async move { r.run_once().await }
        }));

        inner.active_creds = Some(creds);
    }

    fn deactivate(self: &Arc<Self>, inner: &mut GateInner) {
        inner.flush = None;
        inner.heartbeat = None;
        inner.active_creds = None;
        inner.state = GateState::Waiting;
        inner.poll = Some(self.spawn_poll());
    }

    fn spawn_poll(self: &Arc<Self>) -> PeriodicTask {
        let gate = Arc::clone(self);
        PeriodicTask::spawn(self.poll_interval, move || {
            let gate = gate.clone();
            async move {
                gate.poll_once().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use encore_core::{HeartbeatSample, TelemetryEntry};
    use encore_store::TelemetryJournal;

    use crate::api::ServerHealth;
    use crate::error::{SyncError, SyncResult};
    use crate::heartbeat::IdleProbe;

    struct CountingCollector {
        log_pushes: AtomicUsize,
        heartbeats: AtomicUsize,
    }

    impl CountingCollector {
        fn new() -> Arc<Self> {
            Arc::new(CountingCollector {
                log_pushes: AtomicUsize::new(0),
                heartbeats: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Collector for CountingCollector {
        async fn push_logs(
            &self,
            _creds: &DeviceCredentials,
            _entries: &[TelemetryEntry],
        ) -> SyncResult<()> {
            self.log_pushes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn push_heartbeat(
            &self,
            _creds: &DeviceCredentials,
            _sample: &HeartbeatSample,
        ) -> SyncResult<()> {
            self.heartbeats.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct NoHealth;

    #[async_trait]
    impl HealthSource for NoHealth {
        async fn fetch_health(&self) -> SyncResult<ServerHealth> {
            Err(SyncError::Network("unreachable".into()))
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        credentials: CredentialStore,
        collector: Arc<CountingCollector>,
        gate: Arc<CredentialGate>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let credentials = CredentialStore::new(dir.path().join("credentials.toml"));
        let journal = TelemetryJournal::new(dir.path().join("telemetry.json"));
        let buffer = Arc::new(TelemetryBuffer::new(journal, 200, "1.0.0".into()));
        // Seed one entry so a flush attempt actually reaches the collector.
        buffer.error("test", "seeded", None);

        let collector = CountingCollector::new();
        let gate = Arc::new(CredentialGate::new(
            &SyncConfig::default(),
            credentials.clone(),
            buffer,
            collector.clone(),
            Arc::new(NoHealth),
            Arc::new(IdleProbe),
            Arc::new(HostMetrics::new()),
        ));

        Fixture {
            _dir: dir,
            credentials,
            collector,
            gate,
        }
    }

    #[tokio::test]
    async fn test_no_collector_traffic_without_credentials() {
        let fx = fixture();

        for _ in 0..3 {
            assert!(!fx.gate.poll_once().await);
        }

        assert_eq!(fx.gate.state().await, GateState::Waiting);
        assert_eq!(fx.collector.log_pushes.load(Ordering::SeqCst), 0);
        assert_eq!(fx.collector.heartbeats.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_activation_fires_exactly_one_immediate_cycle() {
        let fx = fixture();
        fx.credentials
            .save(&DeviceCredentials {
                collector_url: "https://fleet.example.com".into(),
                device_key: "key-123".into(),
            })
            .unwrap();

        assert!(fx.gate.poll_once().await);

        assert_eq!(fx.gate.state().await, GateState::Active);
        assert_eq!(fx.collector.log_pushes.load(Ordering::SeqCst), 1);
        assert_eq!(fx.collector.heartbeats.load(Ordering::SeqCst), 1);

        // Polling again with unchanged credentials: no duplicate cycle.
        assert!(fx.gate.poll_once().await);
        assert_eq!(fx.collector.log_pushes.load(Ordering::SeqCst), 1);
        assert_eq!(fx.collector.heartbeats.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reconfiguration_replaces_without_immediate_cycle() {
        let fx = fixture();
        fx.credentials
            .save(&DeviceCredentials {
                collector_url: "https://fleet.example.com".into(),
                device_key: "key-123".into(),
            })
            .unwrap();
        assert!(fx.gate.poll_once().await);

        // Endpoint updated at runtime.
        fx.credentials
            .set_collector_url("https://fleet-2.example.com")
            .unwrap();
        assert!(fx.gate.poll_once().await);

        assert_eq!(fx.gate.state().await, GateState::Active);
        // Timers replaced, immediate cycle not repeated.
        assert_eq!(fx.collector.log_pushes.load(Ordering::SeqCst), 1);
        assert_eq!(fx.collector.heartbeats.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_credential_removal_deactivates() {
        let fx = fixture();
        fx.credentials
            .save(&DeviceCredentials {
                collector_url: "https://fleet.example.com".into(),
                device_key: "key-123".into(),
            })
            .unwrap();
        assert!(fx.gate.poll_once().await);

        fx.credentials.clear().unwrap();
        assert!(!fx.gate.poll_once().await);
        assert_eq!(fx.gate.state().await, GateState::Waiting);

        fx.gate.shutdown().await;
    }
}
