//! # Event Stream
//!
//! Server-push (SSE) subscription with a cancellable fixed-delay reconnect
//! state machine.
//!
//! ## Connection Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Event Stream States                                 │
//! │                                                                         │
//! │  ┌────────────┐    spawn()      ┌────────────┐   response OK           │
//! │  │Disconnected│ ──────────────► │ Connecting │ ─────────────┐          │
//! │  └────────────┘                 └─────┬──────┘              ▼          │
//! │        ▲                              │              ┌────────────┐    │
//! │        │                     transport│error         │ Connected  │    │
//! │        │                              │      ┌───────└─────┬──────┘    │
//! │        │ close()                      ▼      ▼ error       │           │
//! │        │ (any state)            ┌────────────┐             │           │
//! │        └─────────────────────── │Reconnecting│ ◄───────────┘           │
//! │                                 └─────┬──────┘                         │
//! │                                       │ fixed 3000 ms delay            │
//! │                                       └──────► back to Connecting,     │
//! │                                                indefinitely            │
//! │                                                                         │
//! │  • No token ⇒ spawn returns NotStarted, nothing ever connects          │
//! │  • Malformed payloads: logged + dropped, connection stays up           │
//! │  • After a reconnect, the subscriber gets Reconnected{epoch} first     │
//! │  • close() suppresses any pending scheduled reconnect                  │
//! │  • 401 ⇒ session cleared, stream ends (a stale token cannot succeed)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The stream transport cannot carry custom headers, so the token rides as
//! a query credential on the subscription URL.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{SyncError, SyncResult};
use crate::session::SessionStore;

/// Capacity of the notice channel to the subscriber.
const NOTICE_CAPACITY: usize = 64;

// =============================================================================
// Stream State & Notices
// =============================================================================

/// Connection state of the event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Not connected (initial and terminal state).
    Disconnected,
    /// Attempting to connect.
    Connecting,
    /// Subscribed and receiving.
    Connected,
    /// Waiting out the fixed delay before the next attempt.
    Reconnecting,
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamState::Disconnected => write!(f, "disconnected"),
            StreamState::Connecting => write!(f, "connecting"),
            StreamState::Connected => write!(f, "connected"),
            StreamState::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

/// What the subscriber receives.
#[derive(Debug, Clone)]
pub enum StreamNotice {
    /// A decoded server event.
    Event(serde_json::Value),

    /// The stream re-established itself after a drop. Carries the new
    /// connection epoch so callers can rebind handle-specific accounting.
    Reconnected { epoch: u64 },
}

/// Configuration for the event stream.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Subscription endpoint, without credentials.
    pub endpoint: Url,

    /// Fixed delay before each reconnection attempt.
    pub reconnect_delay: Duration,

    /// Connection timeout per attempt.
    pub connect_timeout: Duration,
}

// =============================================================================
// Handle
// =============================================================================

/// Handle for observing and closing a running event stream.
#[derive(Clone)]
pub struct EventStreamHandle {
    state: Arc<RwLock<StreamState>>,
    shutdown_tx: mpsc::Sender<()>,
}

impl EventStreamHandle {
    /// Current connection state.
    pub async fn state(&self) -> StreamState {
        *self.state.read().await
    }

    /// True while subscribed.
    pub async fn is_connected(&self) -> bool {
        *self.state.read().await == StreamState::Connected
    }

    /// Closes the stream and suppresses any pending scheduled reconnect.
    pub async fn close(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

// =============================================================================
// Event Stream
// =============================================================================

enum LoopEnd {
    Shutdown,
    ReceiverDropped,
}

/// SSE subscription task.
pub struct EventStream {
    url: Url,
    reconnect_delay: Duration,
    client: reqwest::Client,
    session: SessionStore,
    state: Arc<RwLock<StreamState>>,
    notice_tx: mpsc::Sender<StreamNotice>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl EventStream {
    /// Spawns the stream task and returns a handle plus the notice receiver.
    ///
    /// With no token available this is terminal: it returns
    /// [`SyncError::NotStarted`] immediately and no connection is ever
    /// attempted.
    pub fn spawn(
        config: StreamConfig,
        token: Option<String>,
        session: SessionStore,
    ) -> SyncResult<(EventStreamHandle, mpsc::Receiver<StreamNotice>)> {
        let token = token.ok_or(SyncError::NotStarted)?;

        let mut url = config.endpoint;
        url.query_pairs_mut().append_pair("token", &token);

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| SyncError::Network(e.to_string()))?;

        let (notice_tx, notice_rx) = mpsc::channel(NOTICE_CAPACITY);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let state = Arc::new(RwLock::new(StreamState::Disconnected));

        let stream = EventStream {
            url,
            reconnect_delay: config.reconnect_delay,
            client,
            session,
            state: state.clone(),
            notice_tx,
            shutdown_rx,
        };

        tokio::spawn(stream.run());

        let handle = EventStreamHandle { state, shutdown_tx };
        Ok((handle, notice_rx))
    }

    /// Main reconnect loop.
    async fn run(mut self) {
        let mut epoch: u64 = 0;
        let mut resuming = false;

        loop {
            if self.shutdown_rx.try_recv().is_ok() {
                break;
            }

            self.set_state(StreamState::Connecting).await;
            epoch += 1;

            match self.connection_loop(epoch, resuming).await {
                Ok(LoopEnd::Shutdown) => break,
                Ok(LoopEnd::ReceiverDropped) => {
                    debug!("Stream subscriber dropped, closing");
                    break;
                }
                Err(SyncError::Unauthorized) => {
                    // A stale token cannot succeed on retry; clear the
                    // session and let its invalidation signal drive teardown.
                    warn!("Event stream unauthorized, clearing session");
                    self.session.clear().await;
                    break;
                }
                Err(e) => {
                    warn!(error = %e, epoch, "Event stream dropped");
                }
            }

            resuming = true;
            self.set_state(StreamState::Reconnecting).await;

            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = self.shutdown_rx.recv() => {
                    // Closing suppresses the pending reconnect.
                    break;
                }
            }
        }

        self.set_state(StreamState::Disconnected).await;
        info!("Event stream stopped");
    }

    /// One subscription attempt: connect, then forward until it drops.
    async fn connection_loop(&mut self, epoch: u64, announce: bool) -> SyncResult<LoopEnd> {
        let request = self.client.get(self.url.clone());
        let mut source =
            EventSource::new(request).map_err(|e| SyncError::Network(e.to_string()))?;

        let state = self.state.clone();
        let notice_tx = self.notice_tx.clone();

        loop {
            tokio::select! {
                event = source.next() => match event {
                    Some(Ok(Event::Open)) => {
                        info!(epoch, "Event stream connected");
                        *state.write().await = StreamState::Connected;

                        if announce {
                            let notice = StreamNotice::Reconnected { epoch };
                            if notice_tx.send(notice).await.is_err() {
                                source.close();
                                return Ok(LoopEnd::ReceiverDropped);
                            }
                        }
                    }
                    Some(Ok(Event::Message(message))) => {
                        match serde_json::from_str::<serde_json::Value>(&message.data) {
                            Ok(value) => {
                                if notice_tx.send(StreamNotice::Event(value)).await.is_err() {
                                    source.close();
                                    return Ok(LoopEnd::ReceiverDropped);
                                }
                            }
                            Err(e) => {
                                // Malformed payloads are dropped without
                                // tearing down the connection.
                                warn!(error = %e, "Dropping malformed stream payload");
                            }
                        }
                    }
                    Some(Err(err)) => {
                        source.close();
                        return Err(map_stream_error(err));
                    }
                    None => {
                        return Err(SyncError::Network("event stream ended".into()));
                    }
                },

                _ = self.shutdown_rx.recv() => {
                    source.close();
                    return Ok(LoopEnd::Shutdown);
                }
            }
        }
    }

    async fn set_state(&self, state: StreamState) {
        *self.state.write().await = state;
    }
}

fn map_stream_error(err: reqwest_eventsource::Error) -> SyncError {
    use reqwest_eventsource::Error as EsError;

    match err {
        EsError::InvalidStatusCode(status, ..) if status.as_u16() == 401 => {
            SyncError::Unauthorized
        }
        EsError::InvalidStatusCode(status, ..) => SyncError::Status {
            endpoint: "/booth/events".to_string(),
            status: status.as_u16(),
        },
        EsError::Transport(e) => SyncError::from(e),
        other => SyncError::Network(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str, delay_ms: u64) -> StreamConfig {
        StreamConfig {
            endpoint: Url::parse(endpoint).unwrap(),
            reconnect_delay: Duration::from_millis(delay_ms),
            connect_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_stream_state_display() {
        assert_eq!(StreamState::Connected.to_string(), "connected");
        assert_eq!(StreamState::Reconnecting.to_string(), "reconnecting");
    }

    #[tokio::test]
    async fn test_no_token_is_terminal() {
        let result = EventStream::spawn(
            config("http://127.0.0.1:4600/booth/events", 3000),
            None,
            SessionStore::new(),
        );

        assert!(matches!(result, Err(SyncError::NotStarted)));
    }

    #[tokio::test]
    async fn test_transport_errors_keep_reconnecting_until_closed() {
        // Nothing listens on this port: every attempt fails at connect.
        let (handle, _rx) = EventStream::spawn(
            config("http://127.0.0.1:9/booth/events", 30),
            Some("tok-1".into()),
            SessionStore::new(),
        )
        .unwrap();

        // Over several failure/delay cycles the stream must keep cycling
        // through Connecting/Reconnecting, never settling Disconnected.
        let mut observed_active = 0;
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            match handle.state().await {
                StreamState::Connecting | StreamState::Reconnecting => observed_active += 1,
                StreamState::Connected => {}
                StreamState::Disconnected => {}
            }
        }
        assert!(observed_active > 0, "stream never entered an active state");

        // Closing suppresses the pending reconnect and parks the machine.
        handle.close().await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(handle.state().await, StreamState::Disconnected);
    }
}
