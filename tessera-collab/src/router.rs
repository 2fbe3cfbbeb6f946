//! Envelope routing: outbound serialization and the inbound dispatch table.
//!
//! Outbound frames transmit only while the transport is open; otherwise
//! they are silently dropped, not queued — callers that depend on
//! delivery must check connection state first. Inbound frames are matched
//! on their `type` tag; malformed JSON is logged and dropped, unknown
//! types are ignored.

use std::sync::{Arc, RwLock as StdRwLock};

use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message;

use crate::engine::CollabEvent;
use crate::protocol::{Envelope, MessageType};
use crate::session::Session;
use crate::{call, chat, document, permissions, presence, room, terminal};

/// Handle for transmitting envelopes. Cheap to clone; attached to the
/// live writer channel while a connection is up and detached otherwise.
#[derive(Clone, Default)]
pub struct Outbound {
    tx: Arc<StdRwLock<Option<mpsc::Sender<Message>>>>,
}

impl Outbound {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn attach(&self, tx: mpsc::Sender<Message>) {
        *self.tx.write().unwrap() = Some(tx);
    }

    pub(crate) fn detach(&self) {
        *self.tx.write().unwrap() = None;
    }

    /// Whether the transport is currently open for writing.
    pub fn is_open(&self) -> bool {
        self.tx.read().unwrap().is_some()
    }

    /// Serialize and transmit an envelope. Returns whether the frame was
    /// handed to the transport; `false` means it was dropped.
    pub fn send<T: Serialize>(&self, kind: MessageType, payload: T) -> bool {
        let guard = self.tx.read().unwrap();
        let Some(tx) = guard.as_ref() else {
            log::trace!("transport closed, dropping {kind:?} frame");
            return false;
        };
        let value = match serde_json::to_value(payload) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("failed to serialize {kind:?} payload: {e}");
                return false;
            }
        };
        match Envelope::new(kind, value).encode() {
            Ok(raw) => tx.try_send(Message::Text(raw.into())).is_ok(),
            Err(e) => {
                log::warn!("failed to encode {kind:?} envelope: {e}");
                false
            }
        }
    }
}

/// Decode and dispatch one inbound text frame.
///
/// Holds the session write lock for the duration of the state mutation,
/// then emits the resulting event after the lock is released.
pub(crate) async fn dispatch(
    session: &Arc<RwLock<Session>>,
    events: &mpsc::Sender<CollabEvent>,
    raw: &str,
) {
    let env = match Envelope::decode(raw) {
        Ok(env) => env,
        Err(e) => {
            log::warn!("dropping malformed frame: {e}");
            return;
        }
    };

    let event = {
        let mut s = session.write().await;
        apply(&mut s, &env)
    };
    if let Some(event) = event {
        let _ = events.send(event).await;
    }
}

/// The dispatch table. Returns the event to surface to the UI, if any.
fn apply(s: &mut Session, env: &Envelope) -> Option<CollabEvent> {
    macro_rules! payload {
        () => {
            match env.payload_as() {
                Ok(p) => p,
                Err(e) => {
                    log::warn!("bad {:?} payload: {e}", env.kind);
                    return None;
                }
            }
        };
    }

    match env.kind {
        MessageType::RoomState => room::apply_room_state(s, payload!()),
        MessageType::UserJoined => room::apply_user_joined(s, payload!()),
        MessageType::UserLeft => room::apply_user_left(s, payload!()),
        MessageType::CursorUpdate => presence::apply_cursor_update(s, payload!()),
        MessageType::SelectionUpdate => presence::apply_selection_update(s, payload!()),
        MessageType::FollowUser => presence::apply_follow(s, payload!()),
        MessageType::TextOperation => document::apply_text_op(s, payload!()),
        MessageType::PermissionUpdated => permissions::apply_permission_updated(s, payload!()),
        MessageType::InviteCreated => permissions::apply_invite_created(s, payload!()),
        MessageType::TerminalShared => terminal::apply_terminal_shared(s, payload!()),
        MessageType::TerminalUnshared => terminal::apply_terminal_unshared(s, payload!()),
        MessageType::TerminalOutput => {
            // Not stored in session state; re-emitted for the terminal UI.
            let p: crate::protocol::TerminalOutputPayload = payload!();
            Some(CollabEvent::TerminalOutput {
                terminal_id: p.terminal_id,
                data: p.data,
            })
        }
        MessageType::ChatReceived => chat::apply_chat_received(s, payload!()),
        MessageType::UserMediaState => call::apply_media_state(s, payload!()),
        MessageType::CallStart => call::apply_call_signal(s, payload!(), true),
        MessageType::CallEnd => call::apply_call_signal(s, payload!(), false),
        MessageType::SyncUpdate => {
            // Document updates flow through the CRDT engine's own channel,
            // not the operation queue.
            log::trace!("ignoring sync_update frame at session layer");
            None
        }
        MessageType::Pong => {
            log::trace!("pong");
            None
        }
        MessageType::Error => {
            let p: crate::protocol::ErrorPayload = payload!();
            log::warn!("server error: {}", p.message);
            s.last_error = Some(p.message.clone());
            Some(CollabEvent::ServerError(p.message))
        }
        MessageType::Unknown => None,
        // Outbound-only tags arriving inbound are a server bug; ignore.
        other => {
            log::debug!("ignoring unexpected inbound {other:?} frame");
            None
        }
    }
}
