//! Room lifecycle: create, join, join-with-link, leave, and the inbound
//! roster appliers.
//!
//! Creation and joining leave the session partially populated if the
//! transport leg fails after the registry grant — the reconnect path is
//! expected to recover that state rather than roll it back.

use uuid::Uuid;

use crate::engine::{CollabClient, CollabEvent};
use crate::error::{best_effort, CollabError};
use crate::protocol::{
    epoch_ms, JoinRoomPayload, LeaveRoomPayload, MessageType, RoomStatePayload, UserJoinedPayload,
    UserLeftPayload,
};
use crate::session::{Permission, Room, Session, User};

impl CollabClient {
    /// Create a room named after `name` and become its host.
    ///
    /// Lazy-starts the companion session registry when it is not
    /// reachable, obtains a grant, then opens the transport and announces
    /// the room. Registry and transport failures are rethrown after being
    /// recorded on the session.
    pub async fn create_room(
        &self,
        name: &str,
        display_name: &str,
        default_permission: Permission,
    ) -> Result<Room, CollabError> {
        if !matches!(self.registry.server_status().await, Ok(true)) {
            log::info!("session registry not reachable, starting it");
            if let Err(e) = self.registry.start_server().await {
                self.session.write().await.last_error = Some(e.to_string());
                return Err(e.into());
            }
        }

        let grant = match self.registry.create_room(name, default_permission).await {
            Ok(g) => g,
            Err(e) => {
                self.session.write().await.last_error = Some(e.to_string());
                return Err(e.into());
            }
        };

        let user = User::new(grant.user_id, display_name, Permission::Owner);
        let room = Room {
            id: grant.room_id,
            name: format!("{name}'s Room"),
            host_id: user.id,
            created_at: epoch_ms(),
            participants: vec![user.clone()],
            shared_files: Vec::new(),
            default_permission,
            shared_terminals: Vec::new(),
            chat_messages: Vec::new(),
            invites: Vec::new(),
        };
        {
            let mut s = self.session.write().await;
            s.current_user = Some(user.clone());
            s.current_room = Some(room.clone());
            s.participants = vec![user.clone()];
        }

        // Session stays populated on transport failure; reconnection
        // recovers it later.
        self.conn.connect(&grant.transport_url).await?;
        self.outbound.send(
            MessageType::JoinRoom,
            JoinRoomPayload {
                room: Some(room.clone()),
                user,
                session_token: Some(grant.session_token),
                invite_link_id: None,
            },
        );
        Ok(room)
    }

    /// Join an existing room as an editor.
    ///
    /// The room snapshot is provisional until the authoritative
    /// `room_state` arrives.
    pub async fn join_room(
        &self,
        room_id: Uuid,
        display_name: &str,
    ) -> Result<(), CollabError> {
        let grant = match self
            .registry
            .join_room(room_id, display_name, Permission::Editor)
            .await
        {
            Ok(g) => g,
            Err(e) => {
                self.session.write().await.last_error = Some(e.to_string());
                return Err(e.into());
            }
        };

        let user = User::new(grant.user_id, display_name, Permission::Editor);
        let room = Room::pending(grant.room_id);
        {
            let mut s = self.session.write().await;
            s.current_user = Some(user.clone());
            s.current_room = Some(room.clone());
            s.participants = vec![user.clone()];
        }

        self.conn.connect(&grant.transport_url).await?;
        self.outbound.send(
            MessageType::JoinRoom,
            JoinRoomPayload {
                room: Some(room),
                user,
                session_token: Some(grant.session_token),
                invite_link_id: None,
            },
        );
        Ok(())
    }

    /// Redeem an invite link over an already-open transport.
    ///
    /// Client-only path: a local user id is generated and `viewer` is
    /// assumed; the authoritative permission is whatever the server
    /// assigns back via `room_state` / `permission_updated`.
    pub async fn join_room_with_link(
        &self,
        invite_link_id: Uuid,
        display_name: &str,
    ) -> Result<(), CollabError> {
        if !self.outbound.is_open() {
            return Err(CollabError::NotConnected);
        }

        let user = User::new(Uuid::new_v4(), display_name, Permission::Viewer);
        {
            let mut s = self.session.write().await;
            s.current_user = Some(user.clone());
            s.participants = vec![user.clone()];
        }
        self.outbound.send(
            MessageType::JoinRoom,
            JoinRoomPayload {
                room: None,
                user,
                session_token: None,
                invite_link_id: Some(invite_link_id),
            },
        );
        Ok(())
    }

    /// Leave the current room. Best-effort notifies the registry and the
    /// peer group, then resets the session. Never fails.
    pub async fn leave_room(&self) {
        let ids = {
            let s = self.session.read().await;
            s.current_room
                .as_ref()
                .zip(s.current_user.as_ref())
                .map(|(r, u)| (r.id, u.id))
        };
        if let Some((room_id, user_id)) = ids {
            best_effort(
                "registry leave_room",
                self.registry.leave_room(room_id, user_id),
            )
            .await;
            self.outbound
                .send(MessageType::LeaveRoom, LeaveRoomPayload { room_id, user_id });
        }
        // The transport is room-scoped; tearing it down also resets the
        // session.
        self.conn.disconnect().await;
    }
}

/// `join_room` payload used when reconnection replays the active room.
pub(crate) fn rejoin_payload(s: &Session) -> Option<JoinRoomPayload> {
    let room = s.current_room.clone()?;
    let user = s.current_user.clone()?;
    Some(JoinRoomPayload {
        room: Some(room),
        user,
        session_token: None,
        invite_link_id: None,
    })
}

/// Authoritative full sync: replaces the entire room and roster.
pub(crate) fn apply_room_state(s: &mut Session, p: RoomStatePayload) -> Option<CollabEvent> {
    s.current_room = Some(p.room.clone());
    s.participants = p.participants;
    // Track our own entry in the new roster.
    if let Some(me) = s.current_user.as_ref().map(|u| u.id) {
        if let Some(updated) = s.participant(me).cloned() {
            s.current_user = Some(updated);
        }
    }
    Some(CollabEvent::RoomSynced(p.room))
}

pub(crate) fn apply_user_joined(s: &mut Session, p: UserJoinedPayload) -> Option<CollabEvent> {
    let joined = s.add_participant(p.user)?.clone();
    log::info!("{} joined", joined.display_name);
    Some(CollabEvent::ParticipantJoined(joined))
}

pub(crate) fn apply_user_left(s: &mut Session, p: UserLeftPayload) -> Option<CollabEvent> {
    let left = s.remove_participant(p.user_id)?;
    log::info!("{} left", left.display_name);
    Some(CollabEvent::ParticipantLeft(p.user_id))
}
