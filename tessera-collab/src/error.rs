//! Error taxonomy and the best-effort call wrapper.
//!
//! Transport and service failures propagate to the caller; permission
//! violations are silently refused at the call site; mirror calls whose
//! realtime path is already authoritative go through [`best_effort`],
//! which logs and never propagates.

use std::future::Future;

use crate::protocol::ProtocolError;
use crate::registry::ServiceError;

/// Failures surfaced by the collaboration engine.
#[derive(Debug, Clone)]
pub enum CollabError {
    /// Transport connect/handshake failure.
    Transport(String),
    /// Session-registry or document-engine failure.
    Service(String),
    /// Wire encode/decode failure.
    Protocol(ProtocolError),
    /// Operation requires an open transport.
    NotConnected,
    /// Operation requires an active room.
    NotInRoom,
    /// Share link could not be parsed.
    InvalidLink(String),
}

impl std::fmt::Display for CollabError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "Transport error: {e}"),
            Self::Service(e) => write!(f, "Service error: {e}"),
            Self::Protocol(e) => write!(f, "{e}"),
            Self::NotConnected => write!(f, "Not connected to a collaboration server"),
            Self::NotInRoom => write!(f, "No active collaboration room"),
            Self::InvalidLink(raw) => write!(f, "Invalid share link: {raw}"),
        }
    }
}

impl std::error::Error for CollabError {}

impl From<ProtocolError> for CollabError {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

impl From<ServiceError> for CollabError {
    fn from(e: ServiceError) -> Self {
        Self::Service(e.to_string())
    }
}

/// Run a redundancy-only call, logging failure and never propagating it.
///
/// The realtime broadcast path is authoritative for everything routed
/// through here; a failed mirror loses nothing but durability.
pub async fn best_effort<T, E>(what: &str, fut: impl Future<Output = Result<T, E>>)
where
    E: std::fmt::Display,
{
    if let Err(e) = fut.await {
        log::debug!("best-effort {what} failed: {e}");
    }
}
