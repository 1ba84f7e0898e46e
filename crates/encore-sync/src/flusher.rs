//! # Telemetry Flusher
//!
//! Drains the telemetry buffer to the fleet collector.
//!
//! ## Flush Cycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Flush Cycle                                       │
//! │                                                                         │
//! │  1. take_all()          snapshot + clear + persist empty, one lock     │
//! │         │                                                               │
//! │  2. empty? ──yes──► done (no network call)                             │
//! │         │                                                               │
//! │  3. POST /fleet/logs with X-Device-Key (single attempt, 10 s timeout)  │
//! │         │                                                               │
//! │     ┌───┴────┐                                                          │
//! │     ▼        ▼                                                          │
//! │  success   failure (network error or non-2xx)                          │
//! │     │        │                                                          │
//! │     │        └──► requeue(batch): back at the FRONT of the buffer,     │
//! │     │             re-persisted, retried on the NEXT scheduled cycle    │
//! │     │             (never an immediate retry loop - no amplifying       │
//! │     │              an outage)                                          │
//! │     ▼                                                                   │
//! │  batch permanently discarded                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The flusher only runs while the credential gate is active; the gate owns
//! its timer and tears it down on reconfiguration or shutdown.

use std::sync::Arc;

use tracing::{debug, warn};

use encore_store::DeviceCredentials;

use crate::api::Collector;
use crate::buffer::TelemetryBuffer;

/// Drains the telemetry buffer to the collector, requeueing on failure.
pub struct TelemetryFlusher {
    buffer: Arc<TelemetryBuffer>,
    collector: Arc<dyn Collector>,
    creds: DeviceCredentials,
}

impl TelemetryFlusher {
    pub fn new(
        buffer: Arc<TelemetryBuffer>,
        collector: Arc<dyn Collector>,
        creds: DeviceCredentials,
    ) -> Self {
        TelemetryFlusher {
            buffer,
            collector,
            creds,
        }
    }

    /// Runs one flush cycle.
    ///
    /// Failures are swallowed here by design: a flush failure is an
    /// operational event, not an application error, and the entries are
    /// already safely requeued when this returns.
    pub async fn run_once(&self) {
        let batch = self.buffer.take_all();
        if batch.is_empty() {
            debug!("No telemetry to flush");
            return;
        }

        let count = batch.len();
        match self.collector.push_logs(&self.creds, &batch).await {
            Ok(()) => {
                debug!(count, "Flushed telemetry batch");
            }
            Err(e) => {
                warn!(count, error = %e, "Telemetry flush failed, requeueing batch");
                self.buffer.requeue(batch);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use encore_core::{HeartbeatSample, LogLevel, TelemetryEntry};
    use encore_store::TelemetryJournal;

    use crate::error::{SyncError, SyncResult};

    struct FakeCollector {
        fail_logs: bool,
        log_batches: Mutex<Vec<Vec<TelemetryEntry>>>,
        heartbeats: AtomicUsize,
    }

    impl FakeCollector {
        fn new(fail_logs: bool) -> Arc<Self> {
            Arc::new(FakeCollector {
                fail_logs,
                log_batches: Mutex::new(Vec::new()),
                heartbeats: AtomicUsize::new(0),
            })
        }

        fn batches(&self) -> usize {
            self.log_batches.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Collector for FakeCollector {
        async fn push_logs(
            &self,
            _creds: &DeviceCredentials,
            entries: &[TelemetryEntry],
        ) -> SyncResult<()> {
            if self.fail_logs {
                return Err(SyncError::Status {
                    endpoint: "/fleet/logs".into(),
                    status: 503,
                });
            }
            self.log_batches.lock().unwrap().push(entries.to_vec());
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

    fn creds() -> DeviceCredentials {
        DeviceCredentials {
            collector_url: "https://fleet.example.com".into(),
            device_key: "key-123".into(),
        }
    }

    fn buffer() -> (tempfile::TempDir, Arc<TelemetryBuffer>) {
        let dir = tempfile::tempdir().unwrap();
        let journal = TelemetryJournal::new(dir.path().join("telemetry.json"));
        (dir, Arc::new(TelemetryBuffer::new(journal, 200, "1.0.0".into())))
    }

    #[tokio::test]
    async fn test_failed_flush_leaves_buffer_unchanged() {
        let (_dir, buffer) = buffer();
        for i in 0..5 {
            buffer.record(LogLevel::Error, "test", &format!("entry-{}", i), None);
        }
        let before = buffer.drain_snapshot();

        let collector = FakeCollector::new(true);
        let flusher = TelemetryFlusher::new(buffer.clone(), collector, creds());
        flusher.run_once().await;

        // Non-success status: all 5 entries back, order intact.
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.drain_snapshot(), before);
    }

    #[tokio::test]
    async fn test_successful_flush_discards_batch() {
        let (_dir, buffer) = buffer();
        buffer.info("test", "one");
        buffer.info("test", "two");

        let collector = FakeCollector::new(false);
        let flusher = TelemetryFlusher::new(buffer.clone(), collector.clone(), creds());
        flusher.run_once().await;

        assert!(buffer.is_empty());
        assert_eq!(collector.batches(), 1);
        assert_eq!(collector.log_batches.lock().unwrap()[0].len(), 2);
    }

    #[tokio::test]
    async fn test_empty_buffer_skips_network_call() {
        let (_dir, buffer) = buffer();
        let collector = FakeCollector::new(false);
        let flusher = TelemetryFlusher::new(buffer.clone(), collector.clone(), creds());

        flusher.run_once().await;
        assert_eq!(collector.batches(), 0);
    }
}
