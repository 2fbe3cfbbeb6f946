//! # tessera-collab — Client-side real-time collaboration engine
//!
//! Session lifecycle, room membership, presence, and relay plumbing for
//! multiplayer editing. CRDT merge correctness, terminal emulation, and
//! media codecs all live outside this crate, behind traits and the wire.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   intents    ┌──────────────┐   JSON frames   ┌────────────┐
//! │ UI / editor  │ ───────────► │ CollabClient │ ◄─────────────► │ Collab     │
//! │ (external)   │ ◄─────────── │  room/chat/  │    WebSocket    │ server     │
//! └──────────────┘   events     │  presence/…  │                 └────────────┘
//!                               └──────┬───────┘
//!                                      │ opaque async calls
//!                        ┌─────────────┴─────────────┐
//!                        ▼                           ▼
//!                ┌───────────────┐          ┌────────────────┐
//!                │ SessionRegistry│         │ DocumentEngine │
//!                │ (rooms/invites)│         │ (CRDT merge)   │
//!                └───────────────┘          └────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] — JSON envelope wire protocol
//! - [`session`] — shared session state and the data model
//! - [`connection`] — transport lifecycle, heartbeat, reconnect
//! - [`router`] — outbound serialization and inbound dispatch
//! - [`engine`] — the [`CollabClient`] facade and its event stream
//! - [`room`] — room create/join/leave and roster handling
//! - [`presence`] — cursor/selection broadcast and follow mode
//! - [`permissions`] — roles, capability checks, invites
//! - [`links`] — share-link formatting and parsing
//! - [`document`] — bridge to the external CRDT engine
//! - [`terminal`] — shared terminal relay
//! - [`chat`] — room chat and unread tracking
//! - [`call`] — call signaling and media state

pub mod call;
pub mod chat;
pub mod connection;
pub mod document;
pub mod engine;
pub mod error;
pub mod links;
pub mod permissions;
pub mod presence;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod router;
pub mod session;
pub mod terminal;

// Re-exports for convenience
pub use connection::EngineConfig;
pub use engine::{CollabClient, CollabEvent};
pub use error::CollabError;
pub use links::ShareLink;
pub use protocol::{CallKind, Envelope, MessageType, ProtocolError};
pub use registry::{
    DocumentEngine, LoopbackRegistry, NullDocumentEngine, RoomGrant, ServiceError, SessionRegistry,
};
pub use router::Outbound;
pub use session::{
    ChatMessage, ConnectionState, Cursor, InviteLink, Operation, OperationKind, Permission, Room,
    Selection, Session, SharedTerminal, User,
};
