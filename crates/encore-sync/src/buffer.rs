//! # Telemetry Buffer
//!
//! Bounded, persisted FIFO of client-observed telemetry.
//!
//! ## Buffer Invariants
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Telemetry Buffer Policy                            │
//! │                                                                         │
//! │  record()                                                              │
//! │  ────────                                                              │
//! │  append ──► trim HEAD while over capacity ──► persist                  │
//! │  (overflow drops the OLDEST entries, never the newest)                 │
//! │                                                                         │
//! │  flush cycle (TelemetryFlusher)                                        │
//! │  ──────────────────────────────                                        │
//! │  take_all() ──► POST ──ok──► entries discarded forever                 │
//! │        │              │                                                 │
//! │        │              └─fail─► requeue(batch)                          │
//! │        │                       prepend ──► trim TAIL to capacity       │
//! │        │                       (entries awaiting retry are preferred   │
//! │        │                        over entries recorded mid-outage)      │
//! │        └── clears + persists the now-empty buffer atomically           │
//! │                                                                         │
//! │  EVERY mutation persists to the journal: telemetry about a crash       │
//! │  must survive the crash.                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `record` is synchronous and infallible by design: it is invoked from
//! fault-handling contexts where raising a secondary error would be
//! catastrophic. Journal write failures are logged and swallowed.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use tracing::warn;

use encore_core::{LogLevel, TelemetryEntry};
use encore_store::TelemetryJournal;

/// Bounded, persisted telemetry queue.
///
/// The only structure in the engine mutated from multiple call sites
/// (application code, fault handlers, the flusher); a single mutex keeps
/// `record`, `drain_snapshot`, and `requeue` mutually exclusive so the
/// ordering and capacity invariants hold at every observable point.
pub struct TelemetryBuffer {
    entries: Mutex<VecDeque<TelemetryEntry>>,
    capacity: usize,
    journal: TelemetryJournal,
    app_version: String,
}

impl TelemetryBuffer {
    /// Creates a buffer seeded from the persisted journal.
    ///
    /// Entries that were buffered when the previous process died are loaded
    /// back and flushed as soon as the credential gate opens.
    pub fn new(journal: TelemetryJournal, capacity: usize, app_version: String) -> Self {
        let mut seeded: VecDeque<TelemetryEntry> = match journal.load() {
            Ok(entries) => entries.into(),
            Err(e) => {
                warn!(error = %e, "Failed to load telemetry journal, starting empty");
                VecDeque::new()
            }
        };
        seeded.truncate(capacity);

        TelemetryBuffer {
            entries: Mutex::new(seeded),
            capacity,
            journal,
            app_version,
        }
    }

    // =========================================================================
    // Recording (synchronous, never fails)
    // =========================================================================

    /// Appends an entry, trims to capacity, persists. Never fails.
    pub fn record(&self, level: LogLevel, component: &str, message: &str, stack: Option<&str>) {
        let entry = TelemetryEntry::record(level, component, message, stack, &self.app_version);
        self.push_entry(entry);
    }

    /// Shorthand for [`record`](Self::record) at info level.
    pub fn info(&self, component: &str, message: &str) {
        self.record(LogLevel::Info, component, message, None);
    }

    /// Shorthand for [`record`](Self::record) at warn level.
    pub fn warn(&self, component: &str, message: &str) {
        self.record(LogLevel::Warn, component, message, None);
    }

    /// Shorthand for [`record`](Self::record) at error level.
    pub fn error(&self, component: &str, message: &str, stack: Option<&str>) {
        self.record(LogLevel::Error, component, message, stack);
    }

    /// Appends a pre-built entry, trims to capacity, persists. Never fails.
    pub fn push_entry(&self, entry: TelemetryEntry) {
        let mut entries = self.lock();

        entries.push_back(entry);
        while entries.len() > self.capacity {
            // Capacity overflow is lossy degradation, not a failure.
            entries.pop_front();
        }

        self.persist(&entries);
    }

    // =========================================================================
    // Draining
    // =========================================================================

    /// Returns a copy of the current contents without removing them.
    pub fn drain_snapshot(&self) -> Vec<TelemetryEntry> {
        self.lock().iter().cloned().collect()
    }

    /// Removes and returns all entries, persisting the now-empty buffer
    /// under the same lock acquisition.
    pub fn take_all(&self) -> Vec<TelemetryEntry> {
        let mut entries = self.lock();
        let batch: Vec<TelemetryEntry> = entries.drain(..).collect();
        self.persist(&entries);
        batch
    }

    /// Prepends entries back to the front of the buffer so they are retried
    /// before newer entries, then re-applies the capacity trim from the
    /// tail. Used exactly once per failed flush attempt.
    pub fn requeue(&self, batch: Vec<TelemetryEntry>) {
        if batch.is_empty() {
            return;
        }

        let mut entries = self.lock();
        for entry in batch.into_iter().rev() {
            entries.push_front(entry);
        }
        entries.truncate(self.capacity);

        self.persist(&entries);
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn lock(&self) -> MutexGuard<'_, VecDeque<TelemetryEntry>> {
        // A poisoned lock still guards valid data; record must not panic
        // just because another thread died mid-append.
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn persist(&self, entries: &VecDeque<TelemetryEntry>) {
        let snapshot: Vec<TelemetryEntry> = entries.iter().cloned().collect();
        if let Err(e) = self.journal.save(&snapshot) {
            warn!(error = %e, "Failed to persist telemetry journal");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(capacity: usize) -> (tempfile::TempDir, TelemetryBuffer) {
        let dir = tempfile::tempdir().unwrap();
        let journal = TelemetryJournal::new(dir.path().join("telemetry.json"));
        let buffer = TelemetryBuffer::new(journal, capacity, "1.0.0".into());
        (dir, buffer)
    }

    #[test]
    fn test_capacity_keeps_most_recent_in_arrival_order() {
        let (_dir, buffer) = buffer(200);

        for i in 0..250 {
            buffer.record(LogLevel::Error, "test", &format!("entry-{}", i), None);
        }

        let snapshot = buffer.drain_snapshot();
        assert_eq!(snapshot.len(), 200);
        // 50 oldest dropped: the first retained entry is input #50 (0-indexed).
        assert_eq!(snapshot[0].message, "entry-50");
        assert_eq!(snapshot[199].message, "entry-249");

        // Arrival order preserved throughout.
        for (i, entry) in snapshot.iter().enumerate() {
            assert_eq!(entry.message, format!("entry-{}", i + 50));
        }
    }

    #[test]
    fn test_drain_snapshot_does_not_remove() {
        let (_dir, buffer) = buffer(10);
        buffer.info("test", "one");
        buffer.info("test", "two");

        assert_eq!(buffer.drain_snapshot().len(), 2);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_take_all_clears_and_persists_empty() {
        let (dir, buffer) = buffer(10);
        buffer.info("test", "one");

        let batch = buffer.take_all();
        assert_eq!(batch.len(), 1);
        assert!(buffer.is_empty());

        // The journal reflects the cleared state.
        let journal = TelemetryJournal::new(dir.path().join("telemetry.json"));
        assert!(journal.load().unwrap().is_empty());
    }

    #[test]
    fn test_requeue_orders_failed_batch_before_new_entries() {
        let (_dir, buffer) = buffer(200);

        for i in 0..5 {
            buffer.record(LogLevel::Error, "test", &format!("old-{}", i), None);
        }
        let batch = buffer.take_all();

        // Entries recorded while the flush attempt was in flight.
        buffer.warn("test", "new-0");
        buffer.warn("test", "new-1");

        buffer.requeue(batch);

        let snapshot = buffer.drain_snapshot();
        assert_eq!(snapshot.len(), 7);
        assert_eq!(snapshot[0].message, "old-0");
        assert_eq!(snapshot[4].message, "old-4");
        assert_eq!(snapshot[5].message, "new-0");
        assert_eq!(snapshot[6].message, "new-1");
    }

    #[test]
    fn test_requeue_trims_newest_past_capacity() {
        let (_dir, buffer) = buffer(4);

        for i in 0..3 {
            buffer.record(LogLevel::Error, "test", &format!("old-{}", i), None);
        }
        let batch = buffer.take_all();

        buffer.warn("test", "new-0");
        buffer.warn("test", "new-1");

        buffer.requeue(batch);

        // 3 requeued + 2 new = 5, trimmed from the tail to 4: the entries
        // awaiting retry win over the ones recorded during the outage.
        let snapshot = buffer.drain_snapshot();
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot[0].message, "old-0");
        assert_eq!(snapshot[3].message, "new-0");
    }

    #[test]
    fn test_restart_recovers_journal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.json");

        {
            let buffer = TelemetryBuffer::new(TelemetryJournal::new(path.clone()), 10, "1.0.0".into());
            buffer.error("test", "crash imminent", Some("stack trace"));
        }

        // Fresh process: the unflushed entry is still there.
        let buffer = TelemetryBuffer::new(TelemetryJournal::new(path), 10, "1.0.0".into());
        let snapshot = buffer.drain_snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].message, "crash imminent");
    }

    #[test]
    fn test_record_never_fails_with_unwritable_journal() {
        // Journal path points into a directory that does not exist.
        let journal = TelemetryJournal::new("/nonexistent/encore/telemetry.json".into());
        let buffer = TelemetryBuffer::new(journal, 10, "1.0.0".into());

        buffer.error("test", "still records", None);
        assert_eq!(buffer.len(), 1);
    }
}
