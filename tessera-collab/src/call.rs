//! Call signaling and media state.
//!
//! No media negotiation happens here; capture and transport of audio and
//! video are external capabilities. This layer flips flags, broadcasts
//! the signal, and drops a system chat line so the room sees the call.

use uuid::Uuid;

use crate::engine::{CollabClient, CollabEvent};
use crate::protocol::{
    epoch_ms, CallKind, CallPayload, MediaStatePayload, MediaTogglePayload, MessageType,
};
use crate::session::{ChatMessage, Session};

impl CollabClient {
    pub async fn start_audio_call(&self) {
        self.signal_call(CallKind::Audio, true).await;
    }

    pub async fn stop_audio_call(&self) {
        self.signal_call(CallKind::Audio, false).await;
    }

    pub async fn start_video_call(&self) {
        self.signal_call(CallKind::Video, true).await;
    }

    pub async fn stop_video_call(&self) {
        self.signal_call(CallKind::Video, false).await;
    }

    /// Mute or unmute. Pure state plus broadcast; the media stack reads
    /// the flag, we never touch the capture device.
    pub async fn toggle_audio(&self) -> bool {
        let (user_id, enabled) = {
            let mut s = self.session.write().await;
            let Some(user) = s.current_user.as_ref() else {
                return false;
            };
            let (id, enabled) = (user.id, !user.is_audio_enabled);
            let _ = s.set_local_media(Some(enabled), None);
            (id, enabled)
        };
        self.outbound.send(
            MessageType::AudioToggle,
            MediaTogglePayload { user_id, enabled },
        );
        enabled
    }

    pub async fn toggle_video(&self) -> bool {
        let (user_id, enabled) = {
            let mut s = self.session.write().await;
            let Some(user) = s.current_user.as_ref() else {
                return false;
            };
            let (id, enabled) = (user.id, !user.is_video_enabled);
            let _ = s.set_local_media(None, Some(enabled));
            (id, enabled)
        };
        self.outbound.send(
            MessageType::VideoToggle,
            MediaTogglePayload { user_id, enabled },
        );
        enabled
    }

    async fn signal_call(&self, kind: CallKind, started: bool) {
        let user_id = {
            let mut s = self.session.write().await;
            let Some(user) = s.current_user.as_ref() else {
                return;
            };
            if s.current_room.is_none() {
                return;
            }
            let (user_id, name) = (user.id, user.display_name.clone());
            let _ = match kind {
                CallKind::Audio => s.set_local_media(Some(started), None),
                CallKind::Video => s.set_local_media(None, Some(started)),
            };
            let note = call_note(&name, kind, started);
            if let Some(room) = s.current_room.as_mut() {
                room.chat_messages.push(note);
            }
            user_id
        };

        let tag = if started {
            MessageType::CallStart
        } else {
            MessageType::CallEnd
        };
        self.outbound.send(tag, CallPayload { user_id, kind });
    }
}

fn call_note(name: &str, kind: CallKind, started: bool) -> ChatMessage {
    let verb = if started { "started" } else { "ended" };
    let leg = match kind {
        CallKind::Audio => "an audio call",
        CallKind::Video => "a video call",
    };
    ChatMessage {
        id: Uuid::new_v4(),
        user_id: Uuid::nil(),
        content: format!("{name} {verb} {leg}"),
        timestamp: epoch_ms(),
        reply_to: None,
        is_system: true,
    }
}

pub(crate) fn apply_media_state(s: &mut Session, p: MediaStatePayload) -> Option<CollabEvent> {
    let user = s.participant_mut(p.user_id)?;
    user.is_audio_enabled = p.is_audio_enabled;
    user.is_video_enabled = p.is_video_enabled;
    user.is_speaking = p.is_speaking;
    Some(CollabEvent::MediaStateChanged { user_id: p.user_id })
}

pub(crate) fn apply_call_signal(
    s: &mut Session,
    p: CallPayload,
    started: bool,
) -> Option<CollabEvent> {
    if s.local_user_id() == Some(p.user_id) {
        // Our own signal already produced the state change and chat note.
        return None;
    }
    let name = s
        .participant(p.user_id)
        .map(|u| u.display_name.clone())
        .unwrap_or_else(|| "Someone".into());
    if let Some(user) = s.participant_mut(p.user_id) {
        match p.kind {
            CallKind::Audio => user.is_audio_enabled = started,
            CallKind::Video => user.is_video_enabled = started,
        }
    }
    if let Some(room) = s.current_room.as_mut() {
        room.chat_messages.push(call_note(&name, p.kind, started));
    }
    Some(if started {
        CollabEvent::CallStarted {
            user_id: p.user_id,
            kind: p.kind,
        }
    } else {
        CollabEvent::CallEnded {
            user_id: p.user_id,
            kind: p.kind,
        }
    })
}
