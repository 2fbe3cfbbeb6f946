//! Shared session state: the local actor's view of a collaboration room.
//!
//! `Session` is the single mutable structure every component funnels its
//! mutations through. There is no internal parallelism — mutation happens
//! in discrete steps under one lock, interleaved between local API calls
//! and inbound transport frames — so each update is atomic as far as any
//! observer is concerned.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Connection lifecycle of the transport.
///
/// ```text
/// disconnected → connecting → connected
/// connected → disconnected            (clean close)
/// connected → reconnecting → connecting → connected   (unexpected close)
/// connecting → error                  (handshake failure, recover via connect)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Error,
}

/// Role of a participant inside a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Owner,
    Editor,
    Viewer,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Owner => "owner",
            Permission::Editor => "editor",
            Permission::Viewer => "viewer",
        }
    }

    pub fn parse(s: &str) -> Option<Permission> {
        match s {
            "owner" => Some(Permission::Owner),
            "editor" => Some(Permission::Editor),
            "viewer" => Some(Permission::Viewer),
            _ => None,
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cursor colors, assigned by join order. Indexes into this palette are
/// what travels on the wire, not RGB values.
pub const CURSOR_PALETTE: [&str; 8] = [
    "#e06c75", "#61afef", "#98c379", "#c678dd", "#e5c07b", "#56b6c2", "#d19a66", "#f28779",
];

/// Lowest palette index not used by any current participant, wrapping by
/// participant count once the palette is exhausted.
pub fn next_color_index(participants: &[User]) -> u8 {
    let n = CURSOR_PALETTE.len() as u8;
    for i in 0..n {
        if !participants.iter().any(|u| u.color == i) {
            return i;
        }
    }
    (participants.len() as u8) % n
}

/// A cursor position inside a shared file.
///
/// `timestamp` is the sender's monotonic presence clock. It exists for
/// last-write-wins display only and carries no ordering guarantee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub file_id: String,
    pub line: u32,
    pub column: u32,
    pub timestamp: u64,
}

/// A text selection inside a shared file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub file_id: String,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
    pub timestamp: u64,
}

/// A participant, local or remote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub display_name: String,
    /// Index into [`CURSOR_PALETTE`], assigned by join order.
    pub color: u8,
    pub permission: Permission,
    #[serde(default)]
    pub cursor: Option<Cursor>,
    #[serde(default)]
    pub selection: Option<Selection>,
    #[serde(default)]
    pub is_audio_enabled: bool,
    #[serde(default)]
    pub is_video_enabled: bool,
    #[serde(default)]
    pub is_speaking: bool,
}

impl User {
    pub fn new(id: Uuid, display_name: impl Into<String>, permission: Permission) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            color: 0,
            permission,
            cursor: None,
            selection: None,
            is_audio_enabled: false,
            is_video_enabled: false,
            is_speaking: false,
        }
    }

    /// Hex color for this user's cursor.
    pub fn color_hex(&self) -> &'static str {
        CURSOR_PALETTE[self.color as usize % CURSOR_PALETTE.len()]
    }
}

/// A terminal session exposed to other participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedTerminal {
    pub id: Uuid,
    /// Local terminal handle of the owning client.
    pub terminal_id: String,
    pub name: String,
    pub owner_id: Uuid,
    /// Empty means every participant may attach.
    #[serde(default)]
    pub allowed_users: Vec<Uuid>,
    pub is_read_only: bool,
}

/// A chat message. `is_system` marks synthesized notices such as call
/// start/end visibility lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub timestamp: u64,
    #[serde(default)]
    pub reply_to: Option<Uuid>,
    #[serde(default)]
    pub is_system: bool,
}

/// A capability token granting a permission level to whoever redeems it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InviteLink {
    pub id: Uuid,
    pub room_id: Uuid,
    pub permission: Permission,
    #[serde(default)]
    pub expires_at: Option<u64>,
    #[serde(default)]
    pub max_uses: Option<u32>,
    #[serde(default)]
    pub used_count: u32,
}

/// Kinds of document delta envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Insert,
    Delete,
    CursorMove,
    SelectionChange,
    FileOpen,
    FileClose,
}

/// A local edit intent relayed over the transport. The opaque `data` is
/// interpreted by the external document engine, never here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub user_id: Uuid,
    pub file_id: String,
    pub timestamp: u64,
    pub data: Value,
}

/// A shared collaboration room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub name: String,
    pub host_id: Uuid,
    pub created_at: u64,
    /// Roster snapshot at join time. The live roster is `Session::participants`.
    pub participants: Vec<User>,
    #[serde(default)]
    pub shared_files: Vec<String>,
    pub default_permission: Permission,
    #[serde(default)]
    pub shared_terminals: Vec<SharedTerminal>,
    #[serde(default)]
    pub chat_messages: Vec<ChatMessage>,
    #[serde(default)]
    pub invites: Vec<InviteLink>,
}

impl Room {
    /// Placeholder room for the join path, filled in by `room_state`.
    pub fn pending(id: Uuid) -> Self {
        Self {
            id,
            name: String::new(),
            host_id: Uuid::nil(),
            created_at: crate::protocol::epoch_ms(),
            participants: Vec::new(),
            shared_files: Vec::new(),
            default_permission: Permission::Editor,
            shared_terminals: Vec::new(),
            chat_messages: Vec::new(),
            invites: Vec::new(),
        }
    }
}

/// The local actor's complete collaboration state.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub connection_state: ConnectionState,
    pub current_user: Option<User>,
    pub current_room: Option<Room>,
    /// Live roster ordered by join time. Contains the local user exactly once.
    pub participants: Vec<User>,
    /// Operations awaiting the document engine, cleared on a short debounce.
    pub pending_operations: Vec<Operation>,
    pub following_user_id: Option<Uuid>,
    pub unread_chat_count: usize,
    /// Monotonic sender clock stamped onto cursor/selection updates.
    pub presence_clock: u64,
    /// Last failure surfaced to the UI, if any.
    pub last_error: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset everything back to initial values (disconnect / leave room).
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state == ConnectionState::Connected
    }

    pub fn local_user_id(&self) -> Option<Uuid> {
        self.current_user.as_ref().map(|u| u.id)
    }

    /// True iff the local user may edit shared documents.
    pub fn can_edit(&self) -> bool {
        matches!(
            self.current_user.as_ref().map(|u| u.permission),
            Some(Permission::Owner) | Some(Permission::Editor)
        )
    }

    /// True iff the local user is the room host or holds `owner`.
    pub fn is_host_or_owner(&self) -> bool {
        let Some(user) = &self.current_user else {
            return false;
        };
        if user.permission == Permission::Owner {
            return true;
        }
        self.current_room
            .as_ref()
            .is_some_and(|r| r.host_id == user.id)
    }

    pub fn participant(&self, id: Uuid) -> Option<&User> {
        self.participants.iter().find(|u| u.id == id)
    }

    pub fn participant_mut(&mut self, id: Uuid) -> Option<&mut User> {
        self.participants.iter_mut().find(|u| u.id == id)
    }

    /// Append a participant, assigning the next free palette color.
    /// Duplicate ids are dropped, which also keeps the local user from
    /// appearing twice when the server echoes our own join.
    pub fn add_participant(&mut self, mut user: User) -> Option<&User> {
        if self.participants.iter().any(|u| u.id == user.id) {
            return None;
        }
        user.color = next_color_index(&self.participants);
        self.participants.push(user);
        self.participants.last()
    }

    /// Remove a participant, clearing `following_user_id` if it pointed
    /// at them.
    pub fn remove_participant(&mut self, id: Uuid) -> Option<User> {
        if self.following_user_id == Some(id) {
            self.following_user_id = None;
        }
        let idx = self.participants.iter().position(|u| u.id == id)?;
        Some(self.participants.remove(idx))
    }

    /// Next value of the monotonic presence clock.
    pub fn next_presence_tick(&mut self) -> u64 {
        self.presence_clock += 1;
        self.presence_clock
    }

    /// Set the local user's cursor on both the user and their roster entry.
    pub fn set_local_cursor(&mut self, cursor: Cursor) {
        let Some(id) = self.local_user_id() else {
            return;
        };
        if let Some(user) = self.current_user.as_mut() {
            user.cursor = Some(cursor.clone());
        }
        if let Some(entry) = self.participant_mut(id) {
            entry.cursor = Some(cursor);
        }
    }

    /// Set the local user's selection on both the user and their roster entry.
    pub fn set_local_selection(&mut self, selection: Selection) {
        let Some(id) = self.local_user_id() else {
            return;
        };
        if let Some(user) = self.current_user.as_mut() {
            user.selection = Some(selection.clone());
        }
        if let Some(entry) = self.participant_mut(id) {
            entry.selection = Some(selection);
        }
    }

    /// Flip a local media flag on both the user and their roster entry,
    /// returning the new value.
    pub fn set_local_media(&mut self, audio: Option<bool>, video: Option<bool>) -> Option<()> {
        let id = self.local_user_id()?;
        let user = self.current_user.as_mut()?;
        if let Some(a) = audio {
            user.is_audio_enabled = a;
        }
        if let Some(v) = video {
            user.is_video_enabled = v;
        }
        let (a, v) = (user.is_audio_enabled, user.is_video_enabled);
        if let Some(entry) = self.participant_mut(id) {
            entry.is_audio_enabled = a;
            entry.is_video_enabled = v;
        }
        Some(())
    }
}
