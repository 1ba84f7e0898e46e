//! # Command Cursor
//!
//! At-least-once delivery of server-issued commands.
//!
//! ## Acknowledgement Protocol
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Command Cursor Protocol                              │
//! │                                                                         │
//! │  SERVER QUEUE    [.. 40] [41] [42] [43]        ids assigned by the     │
//! │                     ▲                          server, monotonic       │
//! │                     │ acknowledged = 40                                │
//! │                     │                                                  │
//! │  1. fetch_since(40)       → [41, 42, 43]                               │
//! │  2. apply 41 locally      → cursor stays 40 until 41 is DONE           │
//! │  3. apply 42, 43          → cursor = 43 only after all applied         │
//! │  4. acknowledge(43)       → server discards ≤ 43                       │
//! │                                                                         │
//! │  FAILURE MODES                                                         │
//! │  ─────────────                                                         │
//! │  • ack POST fails     → non-fatal; ids ≤ cursor are re-acked on the    │
//! │                         next pump cycle (protocol is idempotent)       │
//! │  • crash mid-apply    → cursor never advanced past the last DONE       │
//! │                         command; the rest are re-delivered             │
//! │                         (at-least-once ⇒ handlers must be idempotent)  │
//! │  • handler error      → batch stops there; applied prefix is acked,    │
//! │                         the failing command is re-delivered            │
//! │                                                                         │
//! │  INVARIANT: the local cursor is monotonically non-decreasing and is    │
//! │  advanced only AFTER local application, never before.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Fetch and acknowledge are serialized behind one mutex: concurrency buys
//! nothing here and serialization keeps the monotonicity reasoning trivial.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use encore_core::CommandEnvelope;

use crate::api::CommandFeed;
use crate::error::SyncResult;

struct CursorState {
    /// Highest id fully applied locally.
    acknowledged: i64,

    /// False when a server-side ack is still owed for `acknowledged`.
    synced: bool,
}

/// Tracks the highest acknowledged command id against the queue endpoint.
pub struct CommandCursor {
    feed: Arc<dyn CommandFeed>,
    state: Mutex<CursorState>,
}

impl CommandCursor {
    pub fn new(feed: Arc<dyn CommandFeed>, initial: i64) -> Self {
        CommandCursor {
            feed,
            state: Mutex::new(CursorState {
                acknowledged: initial,
                synced: true,
            }),
        }
    }

    /// Highest command id known to be fully applied locally.
    pub async fn acknowledged(&self) -> i64 {
        self.state.lock().await.acknowledged
    }

    /// Fetches every not-yet-acknowledged command.
    pub async fn fetch_pending(&self) -> SyncResult<Vec<CommandEnvelope>> {
        let state = self.state.lock().await;
        self.feed.fetch_since(state.acknowledged).await
    }

    /// Marks everything up to `max_id` as applied and tells the server.
    ///
    /// The local cursor never moves backwards. A failed server ack is
    /// non-fatal: re-fetching already-applied ids is safe, and the ack is
    /// retried on the next pump cycle.
    pub async fn acknowledge(&self, max_id: i64) -> SyncResult<()> {
        let mut state = self.state.lock().await;

        if max_id > state.acknowledged {
            state.acknowledged = max_id;
            state.synced = false;
        } else if state.synced {
            return Ok(());
        }

        Self::push_ack(&*self.feed, &mut state).await;
        Ok(())
    }

    /// Fetches pending commands, applies each through `handler` in id
    /// order, then commits the cursor.
    ///
    /// A handler failure stops the batch: commands applied so far are
    /// acknowledged, the failing command is left for re-delivery, and the
    /// error propagates to the caller. Returns the number applied.
    pub async fn pump<F, Fut>(&self, mut handler: F) -> SyncResult<usize>
    where
        F: FnMut(CommandEnvelope) -> Fut,
        Fut: Future<Output = SyncResult<()>>,
    {
        let mut state = self.state.lock().await;

        // Settle any ack still owed from a previous failed attempt.
        if !state.synced {
            Self::push_ack(&*self.feed, &mut state).await;
        }

        let mut batch = self.feed.fetch_since(state.acknowledged).await?;
        batch.sort_by_key(|c| c.id);

        let mut applied = 0usize;
        let mut failure = None;

        for command in batch {
            // Duplicate delivery of already-applied ids is expected under
            // at-least-once; skip them.
            if command.id <= state.acknowledged {
                debug!(id = command.id, "Skipping already-applied command");
                continue;
            }

            let id = command.id;
            match handler(command).await {
                Ok(()) => {
                    state.acknowledged = id;
                    state.synced = false;
                    applied += 1;
                }
                Err(e) => {
                    warn!(id, error = %e, "Command handler failed, stopping batch");
                    failure = Some(e);
                    break;
                }
            }
        }

        if !state.synced {
            Self::push_ack(&*self.feed, &mut state).await;
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(applied),
        }
    }

    async fn push_ack(feed: &dyn CommandFeed, state: &mut CursorState) {
        match feed.acknowledge(state.acknowledged).await {
            Ok(()) => {
                debug!(up_to = state.acknowledged, "Command cursor committed");
                state.synced = true;
            }
            Err(e) => {
                // Retried on the next cycle; re-delivery of applied ids is
                // safe under the idempotent protocol.
                warn!(up_to = state.acknowledged, error = %e, "Command ack failed");
                state.synced = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
    use std::sync::Mutex as StdMutex;

    use crate::error::SyncError;

    struct FakeFeed {
        queue: StdMutex<Vec<CommandEnvelope>>,
        server_acked: AtomicI64,
        fail_ack: AtomicBool,
    }

    impl FakeFeed {
        fn new(ids: &[i64]) -> Arc<Self> {
            let queue = ids
                .iter()
                .map(|&id| CommandEnvelope {
                    id,
                    action: "announce".into(),
                    payload: serde_json::Value::Null,
                })
                .collect();
            Arc::new(FakeFeed {
                queue: StdMutex::new(queue),
                server_acked: AtomicI64::new(0),
                fail_ack: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl CommandFeed for FakeFeed {
        async fn fetch_since(&self, cursor: i64) -> SyncResult<Vec<CommandEnvelope>> {
            // The server keeps everything past its own acked watermark; the
            // client filter is the `since` argument.
            Ok(self
                .queue
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.id > cursor)
                .cloned()
                .collect())
        }

        async fn acknowledge(&self, up_to: i64) -> SyncResult<()> {
            if self.fail_ack.load(Ordering::SeqCst) {
                return Err(SyncError::Network("collector offline".into()));
            }
            self.server_acked.fetch_max(up_to, Ordering::SeqCst);
            self.queue.lock().unwrap().retain(|c| c.id > up_to);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_acknowledged_is_non_decreasing() {
        let feed = FakeFeed::new(&[]);
        let cursor = CommandCursor::new(feed.clone(), 0);

        cursor.acknowledge(5).await.unwrap();
        assert_eq!(cursor.acknowledged().await, 5);

        // A lower ack never rewinds the cursor.
        cursor.acknowledge(3).await.unwrap();
        assert_eq!(cursor.acknowledged().await, 5);

        cursor.acknowledge(9).await.unwrap();
        assert_eq!(cursor.acknowledged().await, 9);
        assert_eq!(feed.server_acked.load(Ordering::SeqCst), 9);
    }

    #[tokio::test]
    async fn test_pump_applies_in_order_and_commits() {
        let feed = FakeFeed::new(&[41, 42, 43]);
        let cursor = CommandCursor::new(feed.clone(), 40);

        let applied = StdMutex::new(Vec::new());
        let count = cursor
            .pump(|cmd| {
                applied.lock().unwrap().push(cmd.id);
                async { Ok(()) }
            })
            .await
            .unwrap();

        assert_eq!(count, 3);
        assert_eq!(*applied.lock().unwrap(), vec![41, 42, 43]);
        assert_eq!(cursor.acknowledged().await, 43);
        assert_eq!(feed.server_acked.load(Ordering::SeqCst), 43);

        // Acknowledged commands are never re-fetched.
        assert!(cursor.fetch_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_handler_failure_stops_batch_without_advancing() {
        let feed = FakeFeed::new(&[1, 2, 3]);
        let cursor = CommandCursor::new(feed.clone(), 0);

        let result = cursor
            .pump(|cmd| async move {
                if cmd.id == 2 {
                    Err(SyncError::Protocol("unknown action".into()))
                } else {
                    Ok(())
                }
            })
            .await;

        assert!(result.is_err());
        // Only the applied prefix is acknowledged; 2 and 3 re-deliver.
        assert_eq!(cursor.acknowledged().await, 1);
        let pending = cursor.fetch_pending().await.unwrap();
        assert_eq!(pending.iter().map(|c| c.id).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_failed_ack_is_retried_next_cycle() {
        let feed = FakeFeed::new(&[1]);
        let cursor = CommandCursor::new(feed.clone(), 0);

        feed.fail_ack.store(true, Ordering::SeqCst);
        let count = cursor.pump(|_cmd| async { Ok(()) }).await.unwrap();
        assert_eq!(count, 1);

        // Applied locally, but the server never heard the ack.
        assert_eq!(cursor.acknowledged().await, 1);
        assert_eq!(feed.server_acked.load(Ordering::SeqCst), 0);

        // Next cycle settles the owed ack before fetching.
        feed.fail_ack.store(false, Ordering::SeqCst);
        let count = cursor.pump(|_cmd| async { Ok(()) }).await.unwrap();
        assert_eq!(count, 0);
        assert_eq!(feed.server_acked.load(Ordering::SeqCst), 1);
    }
}
