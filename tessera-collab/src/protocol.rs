//! JSON envelope wire protocol for the collaboration transport.
//!
//! Every frame on the wire is a tagged envelope:
//!
//! ```text
//! { "type": "chat_message", "payload": { … }, "timestamp": 1756500000000 }
//! ```
//!
//! `type` selects the payload shape; `timestamp` is the sender's epoch-ms
//! clock and is informational only. Unknown types decode to
//! [`MessageType::Unknown`] so that newer servers never break older clients.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::session::{
    ChatMessage, Cursor, InviteLink, Operation, Permission, Room, Selection, SharedTerminal, User,
};

/// Every envelope type the router knows about, inbound and outbound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    // Bidirectional
    CursorUpdate,
    SelectionUpdate,
    TextOperation,
    FollowUser,
    CallStart,
    CallEnd,
    // Inbound only
    RoomState,
    UserJoined,
    UserLeft,
    PermissionUpdated,
    InviteCreated,
    TerminalShared,
    TerminalUnshared,
    TerminalOutput,
    ChatReceived,
    UserMediaState,
    SyncUpdate,
    Pong,
    Error,
    // Outbound only
    JoinRoom,
    LeaveRoom,
    UnfollowUser,
    Ping,
    UpdatePermission,
    CreateInvite,
    RevokeInvite,
    ShareTerminal,
    UnshareTerminal,
    TerminalInput,
    ChatMessage,
    AudioToggle,
    VideoToggle,
    /// Anything this build does not recognize. Ignored by the router.
    #[serde(other)]
    Unknown,
}

/// Top-level wire envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub payload: Value,
    pub timestamp: u64,
}

impl Envelope {
    /// Build an envelope stamped with the current epoch-ms time.
    pub fn new(kind: MessageType, payload: Value) -> Self {
        Self {
            kind,
            payload,
            timestamp: epoch_ms(),
        }
    }

    /// Serialize to the JSON text frame sent over the transport.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Deserialize a text frame.
    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(raw).map_err(|e| ProtocolError::Decode(e.to_string()))
    }

    /// Decode the payload into its typed shape.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| ProtocolError::Decode(e.to_string()))
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ───────────────────────────────────────────────────────────────────
// Typed payloads
// ───────────────────────────────────────────────────────────────────

/// `join_room` — sent after the transport opens, and replayed on reconnect.
///
/// `room` is absent on the invite-link path where only the server knows the
/// room; the authoritative snapshot arrives back as `room_state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRoomPayload {
    pub room: Option<Room>,
    pub user: User,
    pub session_token: Option<String>,
    pub invite_link_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveRoomPayload {
    pub room_id: Uuid,
    pub user_id: Uuid,
}

/// `room_state` — authoritative full snapshot, replaces local room state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomStatePayload {
    pub room: Room,
    pub participants: Vec<User>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserJoinedPayload {
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLeftPayload {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorUpdatePayload {
    pub user_id: Uuid,
    pub cursor: Cursor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionUpdatePayload {
    pub user_id: Uuid,
    pub selection: Selection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextOperationPayload {
    pub operation: Operation,
}

/// `follow_user` / `unfollow_user` — `target_id` is `None` on unfollow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowPayload {
    pub user_id: Uuid,
    pub target_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionUpdatePayload {
    pub user_id: Uuid,
    pub permission: Permission,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitePayload {
    pub invite: InviteLink,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeInvitePayload {
    pub invite_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalSharedPayload {
    pub terminal: SharedTerminal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalUnsharedPayload {
    pub terminal_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalInputPayload {
    pub terminal_id: Uuid,
    pub user_id: Uuid,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalOutputPayload {
    pub terminal_id: Uuid,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatPayload {
    pub message: ChatMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaStatePayload {
    pub user_id: Uuid,
    pub is_audio_enabled: bool,
    pub is_video_enabled: bool,
    pub is_speaking: bool,
}

/// Which media leg a call signal refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallPayload {
    pub user_id: Uuid,
    pub kind: CallKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaTogglePayload {
    pub user_id: Uuid,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncUpdatePayload {
    pub file_id: String,
    pub update: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// Protocol errors.
#[derive(Debug, Clone)]
pub enum ProtocolError {
    Encode(String),
    Decode(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encode(e) => write!(f, "Envelope encode error: {e}"),
            Self::Decode(e) => write!(f, "Envelope decode error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_roundtrip() {
        let env = Envelope::new(MessageType::Ping, json!({}));
        let raw = env.encode().unwrap();
        let back = Envelope::decode(&raw).unwrap();

        assert_eq!(back.kind, MessageType::Ping);
        assert_eq!(back.timestamp, env.timestamp);
    }

    #[test]
    fn test_type_tags_are_snake_case() {
        let cases = [
            (MessageType::RoomState, "room_state"),
            (MessageType::UserJoined, "user_joined"),
            (MessageType::UserLeft, "user_left"),
            (MessageType::CursorUpdate, "cursor_update"),
            (MessageType::SelectionUpdate, "selection_update"),
            (MessageType::TextOperation, "text_operation"),
            (MessageType::FollowUser, "follow_user"),
            (MessageType::PermissionUpdated, "permission_updated"),
            (MessageType::InviteCreated, "invite_created"),
            (MessageType::TerminalShared, "terminal_shared"),
            (MessageType::TerminalUnshared, "terminal_unshared"),
            (MessageType::TerminalOutput, "terminal_output"),
            (MessageType::ChatReceived, "chat_received"),
            (MessageType::UserMediaState, "user_media_state"),
            (MessageType::CallStart, "call_start"),
            (MessageType::CallEnd, "call_end"),
            (MessageType::SyncUpdate, "sync_update"),
            (MessageType::Pong, "pong"),
            (MessageType::Error, "error"),
            (MessageType::JoinRoom, "join_room"),
            (MessageType::LeaveRoom, "leave_room"),
            (MessageType::UnfollowUser, "unfollow_user"),
            (MessageType::Ping, "ping"),
            (MessageType::UpdatePermission, "update_permission"),
            (MessageType::CreateInvite, "create_invite"),
            (MessageType::RevokeInvite, "revoke_invite"),
            (MessageType::ShareTerminal, "share_terminal"),
            (MessageType::UnshareTerminal, "unshare_terminal"),
            (MessageType::TerminalInput, "terminal_input"),
            (MessageType::ChatMessage, "chat_message"),
            (MessageType::AudioToggle, "audio_toggle"),
            (MessageType::VideoToggle, "video_toggle"),
        ];
        for (kind, tag) in cases {
            assert_eq!(
                serde_json::to_string(&kind).unwrap(),
                format!("\"{tag}\""),
                "wrong tag for {kind:?}"
            );
        }
    }

    #[test]
    fn test_unknown_type_decodes_without_error() {
        let raw = r#"{"type":"totally_new_feature","payload":{},"timestamp":1}"#;
        let env = Envelope::decode(raw).unwrap();
        assert_eq!(env.kind, MessageType::Unknown);
    }

    #[test]
    fn test_malformed_frame_is_an_error() {
        assert!(Envelope::decode("{not json").is_err());
        assert!(Envelope::decode(r#"{"payload":{}}"#).is_err());
    }

    #[test]
    fn test_payload_as_typed() {
        let env = Envelope::new(
            MessageType::Error,
            json!({ "message": "room is full" }),
        );
        let p: ErrorPayload = env.payload_as().unwrap();
        assert_eq!(p.message, "room is full");
    }

    #[test]
    fn test_payload_as_wrong_shape() {
        let env = Envelope::new(MessageType::UserLeft, json!({ "nope": 1 }));
        assert!(env.payload_as::<UserLeftPayload>().is_err());
    }

    #[test]
    fn test_follow_payload_roundtrip() {
        let p = FollowPayload {
            user_id: Uuid::new_v4(),
            target_id: Some(Uuid::new_v4()),
        };
        let env = Envelope::new(MessageType::FollowUser, serde_json::to_value(&p).unwrap());
        let raw = env.encode().unwrap();
        let back: FollowPayload = Envelope::decode(&raw).unwrap().payload_as().unwrap();
        assert_eq!(back.user_id, p.user_id);
        assert_eq!(back.target_id, p.target_id);
    }

    #[test]
    fn test_epoch_ms_is_nonzero() {
        assert!(epoch_ms() > 1_600_000_000_000);
    }
}
