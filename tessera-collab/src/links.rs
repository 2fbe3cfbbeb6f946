//! Share-link formatting and parsing.
//!
//! Links come in two shapes, under any scheme:
//!
//! ```text
//! tessera://collab/{room_id}
//! tessera://collab/invite/{room_id}/{invite_id}?permission=editor
//! tessera://collab/invite/{invite_id}
//! ```
//!
//! Parsing is scheme-agnostic: a custom app scheme and a plain https
//! URL with `/collab/...` path segments both resolve.

use uuid::Uuid;

use crate::engine::CollabClient;
use crate::error::CollabError;
use crate::session::Permission;

/// A parsed share link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareLink {
    /// Direct room link; redeemer joins with the room's default permission.
    Room { room_id: Uuid },
    /// Invite link. `room_id` is absent in the short form, and the
    /// permission hint is advisory only; the server assigns the real one.
    Invite {
        room_id: Option<Uuid>,
        invite_id: Uuid,
        permission: Option<Permission>,
    },
}

impl ShareLink {
    /// Parse any supported link shape.
    ///
    /// Accepts `{anything}://collab/...` as well as URLs where `collab`
    /// appears as a later path segment (`https://host/collab/...`).
    pub fn parse(input: &str) -> Result<Self, CollabError> {
        let input = input.trim();
        let rest = input
            .split_once("://")
            .map(|(_, r)| r)
            .ok_or_else(|| CollabError::InvalidLink(format!("missing scheme: {input}")))?;

        let (path, query) = match rest.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (rest, None),
        };

        let mut segments = path.split('/').filter(|s| !s.is_empty());
        // Skip everything up to and including the `collab` segment.
        if !segments.any(|s| s == "collab") {
            return Err(CollabError::InvalidLink(format!(
                "no collab path segment: {input}"
            )));
        }
        let segments: Vec<&str> = segments.collect();

        match segments.as_slice() {
            [room] => Ok(Self::Room {
                room_id: parse_uuid(room)?,
            }),
            ["invite", invite] => Ok(Self::Invite {
                room_id: None,
                invite_id: parse_uuid(invite)?,
                permission: permission_hint(query),
            }),
            ["invite", room, invite] => Ok(Self::Invite {
                room_id: Some(parse_uuid(room)?),
                invite_id: parse_uuid(invite)?,
                permission: permission_hint(query),
            }),
            _ => Err(CollabError::InvalidLink(format!(
                "unrecognized link shape: {input}"
            ))),
        }
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, CollabError> {
    Uuid::parse_str(s).map_err(|_| CollabError::InvalidLink(format!("bad id segment: {s}")))
}

fn permission_hint(query: Option<&str>) -> Option<Permission> {
    let query = query?;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("permission="))
        .and_then(Permission::parse)
}

/// Format a direct room link.
pub fn room_link(scheme: &str, room_id: Uuid) -> String {
    format!("{scheme}://collab/{room_id}")
}

/// Format a full invite link with its permission hint.
pub fn invite_link(scheme: &str, room_id: Uuid, invite_id: Uuid, permission: Permission) -> String {
    format!("{scheme}://collab/invite/{room_id}/{invite_id}?permission={permission}")
}

impl CollabClient {
    /// Direct link to the active room, or `None` outside a room.
    pub async fn generate_room_link(&self) -> Option<String> {
        let room_id = self.session.read().await.current_room.as_ref()?.id;
        Some(room_link(&self.config.link_scheme, room_id))
    }

    /// Mint an invite at the given permission level and format it as a
    /// shareable link. `None` when invite creation is refused.
    pub async fn generate_share_link(&self, permission: Permission) -> Option<String> {
        let link = self.create_invite_link(permission, None, None).await?;
        Some(invite_link(
            &self.config.link_scheme,
            link.room_id,
            link.id,
            link.permission,
        ))
    }

    /// Parse a pasted share link.
    pub fn parse_share_link(&self, input: &str) -> Result<ShareLink, CollabError> {
        ShareLink::parse(input)
    }
}
