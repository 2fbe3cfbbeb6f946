//! Seams to the external collaborator services.
//!
//! Two services live outside this engine and are reached through opaque
//! async calls: the session registry (room lifecycle, invites, presence
//! durability) and the CRDT document engine (conflict-free merge of
//! concurrent edits). Both are traits so hosts can plug in their own
//! transport; the engine never assumes anything about what is behind them.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::protocol::epoch_ms;
use crate::session::{Cursor, InviteLink, Permission, Selection};

/// Failure from an external service call.
#[derive(Debug, Clone)]
pub enum ServiceError {
    /// The service could not be reached.
    Unavailable(String),
    /// The service refused the request.
    Rejected(String),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(e) => write!(f, "Service unavailable: {e}"),
            Self::Rejected(e) => write!(f, "Request rejected: {e}"),
        }
    }
}

impl std::error::Error for ServiceError {}

/// What the registry hands back when a room is created or joined.
#[derive(Debug, Clone)]
pub struct RoomGrant {
    pub room_id: Uuid,
    /// Server-assigned local user id, stable for the session.
    pub user_id: Uuid,
    /// One-time token presented in the `join_room` envelope.
    pub session_token: String,
    /// Where the realtime transport lives.
    pub transport_url: String,
}

/// The session registry: room lifecycle, invites, and durable presence.
#[async_trait]
pub trait SessionRegistry: Send + Sync {
    async fn create_room(
        &self,
        name: &str,
        default_permission: Permission,
    ) -> Result<RoomGrant, ServiceError>;

    async fn join_room(
        &self,
        room_id: Uuid,
        display_name: &str,
        permission: Permission,
    ) -> Result<RoomGrant, ServiceError>;

    async fn leave_room(&self, room_id: Uuid, user_id: Uuid) -> Result<(), ServiceError>;

    async fn create_invite(
        &self,
        room_id: Uuid,
        permission: Permission,
        expires_in: Option<Duration>,
        max_uses: Option<u32>,
    ) -> Result<InviteLink, ServiceError>;

    /// Durability mirror for cursor moves. The broadcast path is
    /// authoritative; callers wrap this in `best_effort`.
    async fn update_cursor(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        cursor: &Cursor,
    ) -> Result<(), ServiceError>;

    /// Durability mirror for selection changes.
    async fn update_selection(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        selection: &Selection,
    ) -> Result<(), ServiceError>;

    /// Whether the registry is reachable.
    async fn server_status(&self) -> Result<bool, ServiceError>;

    /// Lazy-start the companion registry when this process is the host.
    async fn start_server(&self) -> Result<(), ServiceError>;
}

/// The external CRDT document engine. Merge correctness lives entirely
/// behind these two calls; this engine only relays bytes.
#[async_trait]
pub trait DocumentEngine: Send + Sync {
    /// Seed a new shared document.
    async fn init_document(&self, file_id: &str, content: &str) -> Result<(), ServiceError>;

    /// Exchange a binary update, returning the engine's reconciled update
    /// to merge locally.
    async fn sync_document(&self, file_id: &str, update: &[u8]) -> Result<Vec<u8>, ServiceError>;
}

/// In-process registry issuing grants against a fixed transport URL.
///
/// Backs single-host sessions where this process runs the whole stack,
/// and doubles as the registry for integration tests.
pub struct LoopbackRegistry {
    transport_url: String,
    invites: Mutex<HashMap<Uuid, InviteLink>>,
}

impl LoopbackRegistry {
    pub fn new(transport_url: impl Into<String>) -> Self {
        Self {
            transport_url: transport_url.into(),
            invites: Mutex::new(HashMap::new()),
        }
    }

    /// Whether an invite id was actually registered here.
    pub fn has_invite(&self, id: Uuid) -> bool {
        self.invites.lock().unwrap().contains_key(&id)
    }
}

#[async_trait]
impl SessionRegistry for LoopbackRegistry {
    async fn create_room(
        &self,
        _name: &str,
        _default_permission: Permission,
    ) -> Result<RoomGrant, ServiceError> {
        Ok(RoomGrant {
            room_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            session_token: Uuid::new_v4().to_string(),
            transport_url: self.transport_url.clone(),
        })
    }

    async fn join_room(
        &self,
        room_id: Uuid,
        _display_name: &str,
        _permission: Permission,
    ) -> Result<RoomGrant, ServiceError> {
        Ok(RoomGrant {
            room_id,
            user_id: Uuid::new_v4(),
            session_token: Uuid::new_v4().to_string(),
            transport_url: self.transport_url.clone(),
        })
    }

    async fn leave_room(&self, _room_id: Uuid, _user_id: Uuid) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn create_invite(
        &self,
        room_id: Uuid,
        permission: Permission,
        expires_in: Option<Duration>,
        max_uses: Option<u32>,
    ) -> Result<InviteLink, ServiceError> {
        let link = InviteLink {
            id: Uuid::new_v4(),
            room_id,
            permission,
            expires_at: expires_in.map(|d| epoch_ms() + d.as_millis() as u64),
            max_uses,
            used_count: 0,
        };
        self.invites.lock().unwrap().insert(link.id, link.clone());
        Ok(link)
    }

    async fn update_cursor(
        &self,
        _room_id: Uuid,
        _user_id: Uuid,
        _cursor: &Cursor,
    ) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn update_selection(
        &self,
        _room_id: Uuid,
        _user_id: Uuid,
        _selection: &Selection,
    ) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn server_status(&self) -> Result<bool, ServiceError> {
        Ok(true)
    }

    async fn start_server(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// Document engine stand-in that accepts every init and answers every
/// sync with an empty reconciled update. For sessions (and tests) where
/// no CRDT service is wired up yet.
#[derive(Default)]
pub struct NullDocumentEngine;

#[async_trait]
impl DocumentEngine for NullDocumentEngine {
    async fn init_document(&self, file_id: &str, _content: &str) -> Result<(), ServiceError> {
        log::debug!("null document engine: init {file_id}");
        Ok(())
    }

    async fn sync_document(&self, _file_id: &str, _update: &[u8]) -> Result<Vec<u8>, ServiceError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_loopback_grants_carry_transport_url() {
        let reg = LoopbackRegistry::new("ws://127.0.0.1:9100");
        let grant = reg.create_room("Team", Permission::Editor).await.unwrap();
        assert_eq!(grant.transport_url, "ws://127.0.0.1:9100");
        assert!(!grant.session_token.is_empty());
    }

    #[tokio::test]
    async fn test_loopback_join_preserves_room_id() {
        let reg = LoopbackRegistry::new("ws://127.0.0.1:9100");
        let room_id = Uuid::new_v4();
        let grant = reg
            .join_room(room_id, "Bob", Permission::Editor)
            .await
            .unwrap();
        assert_eq!(grant.room_id, room_id);
    }

    #[tokio::test]
    async fn test_loopback_registers_invites() {
        let reg = LoopbackRegistry::new("ws://127.0.0.1:9100");
        let room_id = Uuid::new_v4();
        let link = reg
            .create_invite(room_id, Permission::Viewer, Some(Duration::from_secs(60)), Some(3))
            .await
            .unwrap();
        assert!(reg.has_invite(link.id));
        assert_eq!(link.room_id, room_id);
        assert!(link.expires_at.is_some());
        assert_eq!(link.max_uses, Some(3));
    }

    #[tokio::test]
    async fn test_null_engine_returns_empty_update() {
        let engine = NullDocumentEngine;
        engine.init_document("main.rs", "fn main() {}").await.unwrap();
        let update = engine.sync_document("main.rs", &[1, 2, 3]).await.unwrap();
        assert!(update.is_empty());
    }
}
