//! Transport lifecycle: connect/disconnect, heartbeat, reconnection.
//!
//! One persistent duplex websocket per client. A writer task drains the
//! outbound channel into the sink; a reader task feeds inbound frames to
//! the router; a heartbeat task pings on a fixed interval. The server's
//! pong is not verified for liveness — there is no missed-pong timeout.
//!
//! Reconnection policy: an unexpected close while a room is active
//! schedules exactly one reconnect attempt after a flat delay, and on
//! success replays `join_room` for the room that was active. A failed
//! attempt parks the state at `Error` until the caller connects again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use crate::engine::CollabEvent;
use crate::error::CollabError;
use crate::protocol::MessageType;
use crate::room;
use crate::router::{self, Outbound};
use crate::session::{ConnectionState, Session};

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interval between outbound `ping` frames while connected.
    pub heartbeat_interval: Duration,
    /// Flat delay before the single reconnect attempt.
    pub reconnect_delay: Duration,
    /// How long an operation sits in the pending queue before it is
    /// assumed delivered and cleared.
    pub pending_op_debounce: Duration,
    /// URL scheme used for share links.
    pub link_scheme: String,
    /// Capacity of the UI event channel.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(15),
            reconnect_delay: Duration::from_secs(3),
            pending_op_debounce: Duration::from_secs(1),
            link_scheme: "tessera".to_string(),
            event_capacity: 256,
        }
    }
}

#[derive(Default)]
struct TaskSet {
    writer: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
    reconnect: Option<JoinHandle<()>>,
}

struct ConnInner {
    session: Arc<RwLock<Session>>,
    outbound: Outbound,
    events: mpsc::Sender<CollabEvent>,
    config: EngineConfig,
    /// Endpoint of the current (or last) connection.
    url: StdMutex<Option<String>>,
    /// Set while `disconnect` tears the connection down intentionally.
    closing: AtomicBool,
    tasks: StdMutex<TaskSet>,
}

/// Owns the transport socket and its lifecycle tasks.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ConnInner>,
}

impl ConnectionManager {
    pub(crate) fn new(
        session: Arc<RwLock<Session>>,
        outbound: Outbound,
        events: mpsc::Sender<CollabEvent>,
        config: EngineConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ConnInner {
                session,
                outbound,
                events,
                config,
                url: StdMutex::new(None),
                closing: AtomicBool::new(false),
                tasks: StdMutex::new(TaskSet::default()),
            }),
        }
    }

    /// Current endpoint, if a connection was established.
    pub fn endpoint(&self) -> Option<String> {
        self.inner.url.lock().unwrap().clone()
    }

    /// Open the transport. Resolves once the handshake completes; a
    /// failure parks the state at `Error`. No-op when already connected
    /// to the same endpoint.
    pub async fn connect(&self, url: &str) -> Result<(), CollabError> {
        {
            let s = self.inner.session.read().await;
            if s.connection_state == ConnectionState::Connected
                && self.inner.url.lock().unwrap().as_deref() == Some(url)
            {
                return Ok(());
            }
        }
        self.inner.closing.store(false, Ordering::SeqCst);
        self.set_state(ConnectionState::Connecting).await;

        let ws = match tokio_tungstenite::connect_async(url).await {
            Ok((ws, _)) => ws,
            Err(e) => {
                let mut s = self.inner.session.write().await;
                s.connection_state = ConnectionState::Error;
                s.last_error = Some(format!("connect to {url} failed: {e}"));
                return Err(CollabError::Transport(e.to_string()));
            }
        };
        log::info!("transport open: {url}");

        let (mut sink, mut stream) = ws.split();
        let (tx, mut rx) = mpsc::channel::<Message>(256);
        self.inner.outbound.attach(tx);
        *self.inner.url.lock().unwrap() = Some(url.to_string());

        let writer = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if sink.send(frame).await.is_err() {
                    return;
                }
            }
            // Channel detached: clean shutdown with a normal-closure code.
            let _ = sink
                .send(Message::Close(Some(CloseFrame {
                    code: CloseCode::Normal,
                    reason: "client disconnect".into(),
                })))
                .await;
        });

        let inner = self.inner.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(raw)) => {
                        router::dispatch(&inner.session, &inner.events, raw.as_str()).await;
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }
            inner.outbound.detach();
            on_reader_closed(inner).await;
        });

        let outbound = self.inner.outbound.clone();
        let interval = self.inner.config.heartbeat_interval;
        let heartbeat = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if !outbound.is_open() {
                    break;
                }
                outbound.send(MessageType::Ping, serde_json::json!({}));
            }
        });

        {
            let mut tasks = self.inner.tasks.lock().unwrap();
            for old in [
                tasks.writer.replace(writer),
                tasks.reader.replace(reader),
                tasks.heartbeat.replace(heartbeat),
            ]
            .into_iter()
            .flatten()
            {
                old.abort();
            }
        }

        self.set_state(ConnectionState::Connected).await;
        let _ = self.inner.events.send(CollabEvent::Connected).await;
        Ok(())
    }

    /// Tear the connection down and reset the session. Idempotent.
    pub async fn disconnect(&self) {
        self.inner.closing.store(true, Ordering::SeqCst);
        {
            let mut tasks = self.inner.tasks.lock().unwrap();
            for handle in [
                tasks.reconnect.take(),
                tasks.heartbeat.take(),
                tasks.reader.take(),
            ]
            .into_iter()
            .flatten()
            {
                handle.abort();
            }
            // The writer drains and sends the close frame once detached.
        }
        self.inner.outbound.detach();
        *self.inner.url.lock().unwrap() = None;
        self.inner.session.write().await.reset();
        let _ = self.inner.events.send(CollabEvent::Disconnected).await;
    }

    async fn set_state(&self, state: ConnectionState) {
        self.inner.session.write().await.connection_state = state;
    }
}

/// Unexpected-close handling (the clean path clears state in `disconnect`).
async fn on_reader_closed(inner: Arc<ConnInner>) {
    if inner.closing.load(Ordering::SeqCst) {
        return;
    }
    let has_room = inner.session.read().await.current_room.is_some();
    if has_room {
        log::warn!("transport lost with active room, scheduling reconnect");
        inner.session.write().await.connection_state = ConnectionState::Reconnecting;
        let _ = inner.events.send(CollabEvent::Reconnecting).await;
        schedule_reconnect(inner);
    } else {
        inner.session.write().await.connection_state = ConnectionState::Disconnected;
        let _ = inner.events.send(CollabEvent::Disconnected).await;
    }
}

/// One attempt, flat delay, then rejoin the room that was active.
fn schedule_reconnect(inner: Arc<ConnInner>) {
    let delay = inner.config.reconnect_delay;
    let task_inner = inner.clone();
    let handle = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let url = task_inner.url.lock().unwrap().clone();
        let Some(url) = url else {
            return;
        };
        let mgr = ConnectionManager {
            inner: task_inner.clone(),
        };
        match mgr.connect(&url).await {
            Ok(()) => {
                let payload = {
                    let s = task_inner.session.read().await;
                    room::rejoin_payload(&s)
                };
                if let Some(p) = payload {
                    log::info!("reconnected, rejoining room");
                    task_inner.outbound.send(MessageType::JoinRoom, p);
                }
            }
            Err(e) => log::warn!("reconnect failed: {e}"),
        }
    });
    let mut tasks = inner.tasks.lock().unwrap();
    if let Some(old) = tasks.reconnect.replace(handle) {
        old.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (ConnectionManager, Arc<RwLock<Session>>) {
        let session = Arc::new(RwLock::new(Session::new()));
        let (events, _rx) = mpsc::channel(64);
        let mgr = ConnectionManager::new(
            session.clone(),
            Outbound::new(),
            events,
            EngineConfig::default(),
        );
        (mgr, session)
    }

    #[tokio::test]
    async fn test_connect_failure_sets_error_state() {
        let (mgr, session) = manager();
        // Nothing listens on port 1.
        let result = mgr.connect("ws://127.0.0.1:1").await;
        assert!(result.is_err());

        let s = session.read().await;
        assert_eq!(s.connection_state, ConnectionState::Error);
        assert!(s.last_error.is_some());
    }

    #[tokio::test]
    async fn test_error_state_is_recoverable_by_connect() {
        let (mgr, session) = manager();
        let _ = mgr.connect("ws://127.0.0.1:1").await;
        assert_eq!(
            session.read().await.connection_state,
            ConnectionState::Error
        );

        // A second attempt transitions back through `connecting` instead
        // of being wedged.
        let _ = mgr.connect("ws://127.0.0.1:1").await;
        assert_eq!(
            session.read().await.connection_state,
            ConnectionState::Error
        );
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (mgr, session) = manager();
        mgr.disconnect().await;
        mgr.disconnect().await;

        let s = session.read().await;
        assert_eq!(s.connection_state, ConnectionState::Disconnected);
        assert!(s.current_room.is_none());
    }

    #[tokio::test]
    async fn test_disconnect_resets_session() {
        let (mgr, session) = manager();
        session.write().await.unread_chat_count = 7;
        mgr.disconnect().await;
        assert_eq!(session.read().await.unread_chat_count, 0);
    }

    #[test]
    fn test_default_config() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.link_scheme, "tessera");
        assert!(cfg.reconnect_delay > Duration::ZERO);
        assert!(cfg.heartbeat_interval > cfg.reconnect_delay);
    }
}
