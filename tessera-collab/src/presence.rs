//! Cursor/selection presence: optimistic local mutation, broadcast, and
//! last-writer-wins application of remote updates.
//!
//! Presence frames carry no sequence numbers or vector clocks; a remote
//! update overwrites the named participant's field directly, so
//! out-of-order delivery can show a stale cursor until the next update
//! arrives.

use uuid::Uuid;

use crate::engine::{CollabClient, CollabEvent};
use crate::error::best_effort;
use crate::protocol::{
    CursorUpdatePayload, FollowPayload, MessageType, SelectionUpdatePayload,
};
use crate::session::{Cursor, Selection, Session};

impl CollabClient {
    /// Move the local cursor: mutate our own state immediately, broadcast,
    /// and mirror to the registry for durability. No-op without an active
    /// room.
    pub async fn update_cursor(&self, file_id: &str, line: u32, column: u32) {
        let Some((room_id, user_id, cursor)) = ({
            let mut s = self.session.write().await;
            match (&s.current_user, &s.current_room) {
                (Some(u), Some(r)) => {
                    let (user_id, room_id) = (u.id, r.id);
                    let cursor = Cursor {
                        file_id: file_id.to_string(),
                        line,
                        column,
                        timestamp: s.next_presence_tick(),
                    };
                    s.set_local_cursor(cursor.clone());
                    Some((room_id, user_id, cursor))
                }
                _ => None,
            }
        }) else {
            return;
        };

        self.outbound.send(
            MessageType::CursorUpdate,
            CursorUpdatePayload {
                user_id,
                cursor: cursor.clone(),
            },
        );

        // Durability mirror, fire-and-forget.
        let registry = self.registry.clone();
        tokio::spawn(async move {
            best_effort(
                "cursor mirror",
                registry.update_cursor(room_id, user_id, &cursor),
            )
            .await;
        });
    }

    /// Change the local selection. Same shape as [`Self::update_cursor`].
    pub async fn update_selection(
        &self,
        file_id: &str,
        start: (u32, u32),
        end: (u32, u32),
    ) {
        let Some((room_id, user_id, selection)) = ({
            let mut s = self.session.write().await;
            match (&s.current_user, &s.current_room) {
                (Some(u), Some(r)) => {
                    let (user_id, room_id) = (u.id, r.id);
                    let selection = Selection {
                        file_id: file_id.to_string(),
                        start_line: start.0,
                        start_column: start.1,
                        end_line: end.0,
                        end_column: end.1,
                        timestamp: s.next_presence_tick(),
                    };
                    s.set_local_selection(selection.clone());
                    Some((room_id, user_id, selection))
                }
                _ => None,
            }
        }) else {
            return;
        };

        self.outbound.send(
            MessageType::SelectionUpdate,
            SelectionUpdatePayload {
                user_id,
                selection: selection.clone(),
            },
        );

        let registry = self.registry.clone();
        tokio::spawn(async move {
            best_effort(
                "selection mirror",
                registry.update_selection(room_id, user_id, &selection),
            )
            .await;
        });
    }

    /// Broadcast the intent to follow another participant's viewport.
    /// The camera behavior itself lives in the UI layer, which observes
    /// `following_user_id`.
    pub async fn follow_user(&self, target_id: Uuid) {
        let user_id = {
            let mut s = self.session.write().await;
            let Some(id) = s.local_user_id() else {
                return;
            };
            s.following_user_id = Some(target_id);
            id
        };
        self.outbound.send(
            MessageType::FollowUser,
            FollowPayload {
                user_id,
                target_id: Some(target_id),
            },
        );
    }

    pub async fn unfollow_user(&self) {
        let user_id = {
            let mut s = self.session.write().await;
            let Some(id) = s.local_user_id() else {
                return;
            };
            s.following_user_id = None;
            id
        };
        self.outbound.send(
            MessageType::UnfollowUser,
            FollowPayload {
                user_id,
                target_id: None,
            },
        );
    }

    pub async fn following_user_id(&self) -> Option<Uuid> {
        self.session.read().await.following_user_id
    }
}

/// Remote cursor: unconditional overwrite of the named participant.
pub(crate) fn apply_cursor_update(s: &mut Session, p: CursorUpdatePayload) -> Option<CollabEvent> {
    if s.local_user_id() == Some(p.user_id) {
        return None; // our own echo; the optimistic update already landed
    }
    let user = s.participant_mut(p.user_id)?;
    user.cursor = Some(p.cursor);
    Some(CollabEvent::CursorMoved { user_id: p.user_id })
}

/// Remote selection: unconditional overwrite of the named participant.
pub(crate) fn apply_selection_update(
    s: &mut Session,
    p: SelectionUpdatePayload,
) -> Option<CollabEvent> {
    if s.local_user_id() == Some(p.user_id) {
        return None;
    }
    let user = s.participant_mut(p.user_id)?;
    user.selection = Some(p.selection);
    Some(CollabEvent::SelectionChanged { user_id: p.user_id })
}

/// A peer announced who they are following. Pure notification.
pub(crate) fn apply_follow(s: &mut Session, p: FollowPayload) -> Option<CollabEvent> {
    if s.local_user_id() == Some(p.user_id) {
        return None;
    }
    Some(CollabEvent::FollowChanged {
        user_id: p.user_id,
        target_id: p.target_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CollabClient;
    use crate::registry::{LoopbackRegistry, NullDocumentEngine};
    use crate::session::{Permission, Room, User};
    use std::sync::Arc;

    fn client() -> CollabClient {
        CollabClient::new(
            Arc::new(LoopbackRegistry::new("ws://127.0.0.1:1")),
            Arc::new(NullDocumentEngine),
        )
    }

    async fn seed(c: &CollabClient) -> Uuid {
        let me = User::new(Uuid::new_v4(), "me", Permission::Owner);
        let id = me.id;
        let mut s = c.session.write().await;
        s.current_room = Some(Room::pending(Uuid::new_v4()));
        s.current_user = Some(me.clone());
        s.participants = vec![me];
        id
    }

    #[tokio::test]
    async fn test_update_cursor_noop_without_room() {
        let c = client();
        c.update_cursor("main.rs", 1, 1).await;
        assert!(c.session().await.current_user.is_none());
        assert_eq!(c.session().await.presence_clock, 0);
    }

    #[tokio::test]
    async fn test_update_cursor_is_optimistic() {
        let c = client();
        let me = seed(&c).await;

        // Transport closed: the broadcast is dropped but our own cursor
        // still moves.
        c.update_cursor("main.rs", 10, 4).await;

        let s = c.session().await;
        let cursor = s.participant(me).unwrap().cursor.clone().unwrap();
        assert_eq!(cursor.line, 10);
        assert_eq!(cursor.column, 4);
        assert_eq!(s.current_user.unwrap().cursor.unwrap().timestamp, 1);
    }

    #[tokio::test]
    async fn test_update_selection_is_optimistic() {
        let c = client();
        let me = seed(&c).await;

        c.update_selection("lib.rs", (1, 0), (3, 12)).await;

        let s = c.session().await;
        let sel = s.participant(me).unwrap().selection.clone().unwrap();
        assert_eq!(sel.start_line, 1);
        assert_eq!(sel.end_column, 12);
    }

    #[tokio::test]
    async fn test_follow_then_unfollow() {
        let c = client();
        seed(&c).await;
        let target = Uuid::new_v4();

        c.follow_user(target).await;
        assert_eq!(c.following_user_id().await, Some(target));

        c.unfollow_user().await;
        assert_eq!(c.following_user_id().await, None);
    }

    #[test]
    fn test_remote_cursor_overwrites_unconditionally() {
        let mut s = Session::new();
        let peer = User::new(Uuid::new_v4(), "peer", Permission::Editor);
        let peer_id = peer.id;
        s.add_participant(peer);

        let newer = Cursor {
            file_id: "a.rs".into(),
            line: 5,
            column: 0,
            timestamp: 9,
        };
        let older = Cursor {
            file_id: "a.rs".into(),
            line: 1,
            column: 0,
            timestamp: 3,
        };

        apply_cursor_update(&mut s, CursorUpdatePayload { user_id: peer_id, cursor: newer });
        // Out-of-order delivery: the later-applied older update wins.
        apply_cursor_update(&mut s, CursorUpdatePayload { user_id: peer_id, cursor: older.clone() });

        assert_eq!(s.participant(peer_id).unwrap().cursor, Some(older));
    }

    #[test]
    fn test_remote_cursor_for_unknown_user_ignored() {
        let mut s = Session::new();
        let event = apply_cursor_update(
            &mut s,
            CursorUpdatePayload {
                user_id: Uuid::new_v4(),
                cursor: Cursor {
                    file_id: "a.rs".into(),
                    line: 0,
                    column: 0,
                    timestamp: 1,
                },
            },
        );
        assert!(event.is_none());
    }

    #[test]
    fn test_own_presence_echo_ignored() {
        let mut s = Session::new();
        let me = User::new(Uuid::new_v4(), "me", Permission::Owner);
        let me_id = me.id;
        s.current_user = Some(me.clone());
        s.add_participant(me);

        let event = apply_cursor_update(
            &mut s,
            CursorUpdatePayload {
                user_id: me_id,
                cursor: Cursor {
                    file_id: "b.rs".into(),
                    line: 99,
                    column: 0,
                    timestamp: 50,
                },
            },
        );
        assert!(event.is_none());
        assert!(s.participant(me_id).unwrap().cursor.is_none());
    }
}
