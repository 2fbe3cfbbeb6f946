//! Shared terminal relay.
//!
//! Terminals themselves live outside this engine; we relay share
//! announcements, keystrokes, and output frames. Output is never stored
//! in session state, only re-emitted as an event for the terminal UI.

use uuid::Uuid;

use crate::engine::{CollabClient, CollabEvent};
use crate::protocol::{
    MessageType, TerminalInputPayload, TerminalSharedPayload, TerminalUnsharedPayload,
};
use crate::session::{Session, SharedTerminal};

impl CollabClient {
    /// Announce a local terminal to the room.
    ///
    /// Returns `None` when there is no active room. `read_only` terminals
    /// accept input from their owner only.
    pub async fn share_terminal(
        &self,
        terminal_id: impl Into<String>,
        name: impl Into<String>,
        read_only: bool,
    ) -> Option<SharedTerminal> {
        let terminal = {
            let mut s = self.session.write().await;
            let owner_id = s.local_user_id()?;
            let room = s.current_room.as_mut()?;
            let terminal = SharedTerminal {
                id: Uuid::new_v4(),
                terminal_id: terminal_id.into(),
                name: name.into(),
                owner_id,
                allowed_users: Vec::new(),
                is_read_only: read_only,
            };
            room.shared_terminals.push(terminal.clone());
            terminal
        };
        self.outbound.send(
            MessageType::ShareTerminal,
            TerminalSharedPayload {
                terminal: terminal.clone(),
            },
        );
        Some(terminal)
    }

    /// Withdraw a shared terminal. Silently refused unless the caller
    /// owns it or is host/owner.
    pub async fn unshare_terminal(&self, id: Uuid) {
        {
            let mut s = self.session.write().await;
            let me = s.local_user_id();
            let privileged = s.is_host_or_owner();
            let Some(room) = s.current_room.as_mut() else {
                return;
            };
            let Some(terminal) = room.shared_terminals.iter().find(|t| t.id == id) else {
                return;
            };
            if Some(terminal.owner_id) != me && !privileged {
                log::debug!("unshare refused: not terminal owner or host/owner");
                return;
            }
            room.shared_terminals.retain(|t| t.id != id);
        }
        self.outbound.send(
            MessageType::UnshareTerminal,
            TerminalUnsharedPayload { terminal_id: id },
        );
    }

    /// Relay keystrokes to a shared terminal.
    ///
    /// Rejected locally, before transmission, when the terminal is
    /// read-only and the caller is not its owner.
    pub async fn send_terminal_input(&self, terminal_id: Uuid, data: impl Into<String>) {
        let user_id = {
            let s = self.session.read().await;
            let Some(user_id) = s.local_user_id() else {
                return;
            };
            let Some(terminal) = s
                .current_room
                .as_ref()
                .and_then(|r| r.shared_terminals.iter().find(|t| t.id == terminal_id))
            else {
                return;
            };
            if terminal.is_read_only && terminal.owner_id != user_id {
                log::debug!("terminal input refused: read-only terminal");
                return;
            }
            user_id
        };
        self.outbound.send(
            MessageType::TerminalInput,
            TerminalInputPayload {
                terminal_id,
                user_id,
                data: data.into(),
            },
        );
    }

    /// Terminals currently shared in the room.
    pub async fn shared_terminals(&self) -> Vec<SharedTerminal> {
        self.session
            .read()
            .await
            .current_room
            .as_ref()
            .map(|r| r.shared_terminals.clone())
            .unwrap_or_default()
    }
}

pub(crate) fn apply_terminal_shared(
    s: &mut Session,
    p: TerminalSharedPayload,
) -> Option<CollabEvent> {
    let room = s.current_room.as_mut()?;
    if room.shared_terminals.iter().any(|t| t.id == p.terminal.id) {
        return None;
    }
    room.shared_terminals.push(p.terminal.clone());
    Some(CollabEvent::TerminalShared(p.terminal))
}

pub(crate) fn apply_terminal_unshared(
    s: &mut Session,
    p: TerminalUnsharedPayload,
) -> Option<CollabEvent> {
    let room = s.current_room.as_mut()?;
    room.shared_terminals.retain(|t| t.id != p.terminal_id);
    Some(CollabEvent::TerminalUnshared(p.terminal_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{LoopbackRegistry, NullDocumentEngine};
    use crate::session::{Permission, Room, User};
    use std::sync::Arc;

    fn client() -> CollabClient {
        CollabClient::new(
            Arc::new(LoopbackRegistry::new("ws://127.0.0.1:1")),
            Arc::new(NullDocumentEngine),
        )
    }

    async fn seed(c: &CollabClient, permission: Permission, host: bool) -> Uuid {
        let me = User::new(Uuid::new_v4(), "me", permission);
        let me_id = me.id;
        let mut room = Room::pending(Uuid::new_v4());
        room.host_id = if host { me_id } else { Uuid::new_v4() };
        let mut s = c.session.write().await;
        s.current_user = Some(me.clone());
        s.current_room = Some(room);
        s.participants = vec![me];
        me_id
    }

    #[tokio::test]
    async fn test_share_records_locally() {
        let c = client();
        let me_id = seed(&c, Permission::Editor, false).await;

        let t = c.share_terminal("pty-1", "build", false).await.unwrap();
        assert_eq!(t.owner_id, me_id);
        assert_eq!(c.shared_terminals().await.len(), 1);
    }

    #[tokio::test]
    async fn test_share_outside_room_refused() {
        let c = client();
        assert!(c.share_terminal("pty-1", "build", false).await.is_none());
    }

    #[tokio::test]
    async fn test_owner_unshares_own_terminal() {
        let c = client();
        seed(&c, Permission::Editor, false).await;
        let t = c.share_terminal("pty-1", "build", false).await.unwrap();

        c.unshare_terminal(t.id).await;
        assert!(c.shared_terminals().await.is_empty());
    }

    #[tokio::test]
    async fn test_peer_cannot_unshare_without_privilege() {
        let c = client();
        seed(&c, Permission::Editor, false).await;
        let t = c.share_terminal("pty-1", "build", false).await.unwrap();

        // Hand the terminal to another owner; we are neither its owner
        // nor host/owner of the room.
        {
            let mut s = c.session.write().await;
            s.current_room.as_mut().unwrap().shared_terminals[0].owner_id = Uuid::new_v4();
        }
        c.unshare_terminal(t.id).await;
        assert_eq!(c.shared_terminals().await.len(), 1);
    }

    #[tokio::test]
    async fn test_host_unshares_any_terminal() {
        let c = client();
        seed(&c, Permission::Editor, true).await;
        let t = c.share_terminal("pty-1", "build", false).await.unwrap();
        {
            let mut s = c.session.write().await;
            s.current_room.as_mut().unwrap().shared_terminals[0].owner_id = Uuid::new_v4();
        }
        c.unshare_terminal(t.id).await;
        assert!(c.shared_terminals().await.is_empty());
    }

    #[tokio::test]
    async fn test_read_only_input_gate() {
        use crate::protocol::Envelope;
        use tokio::sync::mpsc;
        use tokio_tungstenite::tungstenite::Message;

        let c = client();
        seed(&c, Permission::Editor, false).await;
        let t = c.share_terminal("pty-1", "build", true).await.unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        c.outbound.attach(tx);

        // Owner may type into their own read-only terminal.
        c.send_terminal_input(t.id, "ls\n").await;
        let frame = rx.try_recv().expect("owner input transmitted");
        let Message::Text(raw) = frame else {
            panic!("expected text frame");
        };
        let env = Envelope::decode(raw.as_str()).unwrap();
        assert_eq!(env.kind, MessageType::TerminalInput);

        // A non-owner's input is refused before transmission: no frame
        // reaches the transport.
        {
            let mut s = c.session.write().await;
            s.current_room.as_mut().unwrap().shared_terminals[0].owner_id = Uuid::new_v4();
        }
        c.send_terminal_input(t.id, "rm -rf /\n").await;
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_inbound_share_deduplicates() {
        let mut s = Session::new();
        s.current_room = Some(Room::pending(Uuid::new_v4()));
        let t = SharedTerminal {
            id: Uuid::new_v4(),
            terminal_id: "pty-9".into(),
            name: "logs".into(),
            owner_id: Uuid::new_v4(),
            allowed_users: Vec::new(),
            is_read_only: false,
        };

        assert!(apply_terminal_shared(&mut s, TerminalSharedPayload { terminal: t.clone() }).is_some());
        assert!(apply_terminal_shared(&mut s, TerminalSharedPayload { terminal: t.clone() }).is_none());
        assert_eq!(s.current_room.as_ref().unwrap().shared_terminals.len(), 1);

        apply_terminal_unshared(&mut s, TerminalUnsharedPayload { terminal_id: t.id });
        assert!(s.current_room.unwrap().shared_terminals.is_empty());
    }
}
