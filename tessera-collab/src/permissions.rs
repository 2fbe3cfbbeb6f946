//! Role assignment, edit-capability checks, and invite links.
//!
//! Guarded operations refuse silently when the caller is neither room
//! host nor owner — capability checks never leak across the UI boundary
//! as errors.

use std::time::Duration;

use uuid::Uuid;

use crate::engine::{CollabClient, CollabEvent};
use crate::protocol::{
    epoch_ms, InvitePayload, MessageType, PermissionUpdatePayload, RevokeInvitePayload,
};
use crate::session::{InviteLink, Permission, Session};

impl CollabClient {
    /// True iff the local user may edit shared documents.
    pub async fn can_edit(&self) -> bool {
        self.session.read().await.can_edit()
    }

    /// Change a participant's permission. Optimistically applied locally
    /// and broadcast; silently refused unless the caller is the room host
    /// or an owner.
    pub async fn update_user_permission(&self, user_id: Uuid, permission: Permission) {
        {
            let mut s = self.session.write().await;
            if !s.is_host_or_owner() {
                log::debug!("permission change refused: caller is not host/owner");
                return;
            }
            if let Some(target) = s.participant_mut(user_id) {
                target.permission = permission;
            }
            if s.local_user_id() == Some(user_id) {
                if let Some(me) = s.current_user.as_mut() {
                    me.permission = permission;
                }
            }
        }
        self.outbound.send(
            MessageType::UpdatePermission,
            PermissionUpdatePayload {
                user_id,
                permission,
            },
        );
    }

    /// Issue an invite link through the registry.
    ///
    /// Returns `None` when refused (not host/owner, or no active room).
    /// When the registry call fails, a syntactically valid but
    /// unregistered link is fabricated instead of surfacing the error —
    /// redeeming such a link will never resolve.
    pub async fn create_invite_link(
        &self,
        permission: Permission,
        expires_in: Option<Duration>,
        max_uses: Option<u32>,
    ) -> Option<InviteLink> {
        let room_id = {
            let s = self.session.read().await;
            if !s.is_host_or_owner() {
                log::debug!("invite creation refused: caller is not host/owner");
                return None;
            }
            s.current_room.as_ref()?.id
        };

        let link = match self
            .registry
            .create_invite(room_id, permission, expires_in, max_uses)
            .await
        {
            Ok(link) => link,
            Err(e) => {
                log::warn!("registry invite failed, issuing unregistered link: {e}");
                InviteLink {
                    id: Uuid::new_v4(),
                    room_id,
                    permission,
                    expires_at: expires_in.map(|d| epoch_ms() + d.as_millis() as u64),
                    max_uses,
                    used_count: 0,
                }
            }
        };

        {
            let mut s = self.session.write().await;
            if let Some(room) = s.current_room.as_mut() {
                room.invites.push(link.clone());
            }
        }
        self.outbound.send(
            MessageType::CreateInvite,
            InvitePayload {
                invite: link.clone(),
            },
        );
        Some(link)
    }

    /// Revoke an invite link: removed locally and broadcast regardless of
    /// server acknowledgment. Silently refused unless host/owner.
    pub async fn revoke_invite_link(&self, invite_id: Uuid) {
        {
            let mut s = self.session.write().await;
            if !s.is_host_or_owner() {
                log::debug!("invite revocation refused: caller is not host/owner");
                return;
            }
            if let Some(room) = s.current_room.as_mut() {
                room.invites.retain(|i| i.id != invite_id);
            }
        }
        self.outbound
            .send(MessageType::RevokeInvite, RevokeInvitePayload { invite_id });
    }
}

pub(crate) fn apply_permission_updated(
    s: &mut Session,
    p: PermissionUpdatePayload,
) -> Option<CollabEvent> {
    if let Some(target) = s.participant_mut(p.user_id) {
        target.permission = p.permission;
    }
    if s.local_user_id() == Some(p.user_id) {
        if let Some(me) = s.current_user.as_mut() {
            me.permission = p.permission;
        }
    }
    Some(CollabEvent::PermissionChanged {
        user_id: p.user_id,
        permission: p.permission,
    })
}

pub(crate) fn apply_invite_created(s: &mut Session, p: InvitePayload) -> Option<CollabEvent> {
    let room = s.current_room.as_mut()?;
    if !room.invites.iter().any(|i| i.id == p.invite.id) {
        room.invites.push(p.invite.clone());
    }
    Some(CollabEvent::InviteCreated(p.invite))
}
