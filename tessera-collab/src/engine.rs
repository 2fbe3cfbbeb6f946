//! The client-side collaboration engine.
//!
//! [`CollabClient`] composes the session state, the connection manager,
//! and the external service seams into one facade. The UI layer drives it
//! through the async API and observes it through the [`CollabEvent`]
//! stream taken once via [`CollabClient::take_event_rx`].

use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::connection::{ConnectionManager, EngineConfig};
use crate::error::CollabError;
use crate::protocol::CallKind;
use crate::registry::{DocumentEngine, SessionRegistry};
use crate::router::Outbound;
use crate::session::{
    ChatMessage, ConnectionState, InviteLink, Operation, Permission, Room, Session, SharedTerminal,
    User,
};

/// Events surfaced to the UI collaborator.
#[derive(Debug, Clone)]
pub enum CollabEvent {
    Connected,
    Disconnected,
    Reconnecting,
    /// Authoritative room snapshot replaced local state.
    RoomSynced(Room),
    ParticipantJoined(User),
    ParticipantLeft(Uuid),
    CursorMoved { user_id: Uuid },
    SelectionChanged { user_id: Uuid },
    /// A remote edit intent to hand to the document engine.
    RemoteOperation(Operation),
    FollowChanged { user_id: Uuid, target_id: Option<Uuid> },
    PermissionChanged { user_id: Uuid, permission: Permission },
    InviteCreated(InviteLink),
    TerminalShared(SharedTerminal),
    TerminalUnshared(Uuid),
    /// Terminal output is fire-and-forget, never stored in session state.
    TerminalOutput { terminal_id: Uuid, data: String },
    ChatReceived(ChatMessage),
    MediaStateChanged { user_id: Uuid },
    CallStarted { user_id: Uuid, kind: CallKind },
    CallEnded { user_id: Uuid, kind: CallKind },
    ServerError(String),
}

/// Client-side orchestrator for a realtime collaboration session.
pub struct CollabClient {
    pub(crate) session: Arc<RwLock<Session>>,
    pub(crate) conn: ConnectionManager,
    pub(crate) outbound: Outbound,
    pub(crate) registry: Arc<dyn SessionRegistry>,
    pub(crate) documents: Arc<dyn DocumentEngine>,
    pub(crate) config: EngineConfig,
    event_rx: Option<mpsc::Receiver<CollabEvent>>,
}

impl CollabClient {
    /// Create an engine with default configuration.
    pub fn new(registry: Arc<dyn SessionRegistry>, documents: Arc<dyn DocumentEngine>) -> Self {
        Self::with_config(registry, documents, EngineConfig::default())
    }

    pub fn with_config(
        registry: Arc<dyn SessionRegistry>,
        documents: Arc<dyn DocumentEngine>,
        config: EngineConfig,
    ) -> Self {
        let session = Arc::new(RwLock::new(Session::new()));
        let outbound = Outbound::new();
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity);
        let conn = ConnectionManager::new(
            session.clone(),
            outbound.clone(),
            event_tx,
            config.clone(),
        );
        Self {
            session,
            conn,
            outbound,
            registry,
            documents,
            config,
            event_rx: Some(event_rx),
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<CollabEvent>> {
        self.event_rx.take()
    }

    /// Open the transport to a collaboration server.
    pub async fn connect(&self, url: &str) -> Result<(), CollabError> {
        self.conn.connect(url).await
    }

    /// Close the transport and reset the session. Idempotent.
    pub async fn disconnect(&self) {
        self.conn.disconnect().await;
    }

    /// Snapshot of the current session state.
    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.session.read().await.connection_state
    }

    pub async fn current_room(&self) -> Option<Room> {
        self.session.read().await.current_room.clone()
    }

    pub async fn current_user(&self) -> Option<User> {
        self.session.read().await.current_user.clone()
    }

    pub async fn participant_count(&self) -> usize {
        self.session.read().await.participants.len()
    }

    pub async fn last_error(&self) -> Option<String> {
        self.session.read().await.last_error.clone()
    }

    /// Endpoint of the active connection, if any.
    pub fn endpoint(&self) -> Option<String> {
        self.conn.endpoint()
    }
}
