//! Bridge between local edit intents and the external CRDT engine.
//!
//! Merge correctness lives entirely behind the [`DocumentEngine`] trait;
//! this layer wraps local edits in [`Operation`] envelopes, broadcasts
//! them, and keeps a short-lived pending queue that is cleared on a
//! debounce timer rather than explicit acknowledgment.

use serde_json::Value;
use uuid::Uuid;

use crate::engine::{CollabClient, CollabEvent};
use crate::error::CollabError;
use crate::protocol::{MessageType, TextOperationPayload};
use crate::session::{Operation, OperationKind, Session};

impl CollabClient {
    /// Seed a new shared document in the external engine.
    pub async fn init_document(&self, file_id: &str, content: &str) -> Result<(), CollabError> {
        self.documents
            .init_document(file_id, content)
            .await
            .map_err(|e| CollabError::Service(e.to_string()))
    }

    /// Exchange a binary CRDT update, returning the engine's reconciled
    /// update for the caller to merge.
    pub async fn sync_document(
        &self,
        file_id: &str,
        update: &[u8],
    ) -> Result<Vec<u8>, CollabError> {
        self.documents
            .sync_document(file_id, update)
            .await
            .map_err(|e| CollabError::Service(e.to_string()))
    }

    /// Broadcast a local edit intent.
    ///
    /// The operation is queued in `pending_operations` and broadcast over
    /// the transport; the merge itself happens in the external engine.
    /// The queue is drained after a fixed debounce, not on acknowledgment,
    /// so it only ever reflects very recent activity.
    pub async fn apply_text_operation(
        &self,
        kind: OperationKind,
        file_id: impl Into<String>,
        data: Value,
    ) {
        let op = {
            let mut s = self.session.write().await;
            let Some(user_id) = s.local_user_id() else {
                return;
            };
            if s.current_room.is_none() || !s.can_edit() {
                log::debug!("text operation dropped: no room or read-only");
                return;
            }
            let op = Operation {
                id: Uuid::new_v4(),
                kind,
                user_id,
                file_id: file_id.into(),
                timestamp: s.next_presence_tick(),
                data,
            };
            s.pending_operations.push(op.clone());
            op
        };

        self.outbound.send(
            MessageType::TextOperation,
            TextOperationPayload {
                operation: op.clone(),
            },
        );

        let session = self.session.clone();
        let debounce = self.config.pending_op_debounce;
        let op_id = op.id;
        tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            session
                .write()
                .await
                .pending_operations
                .retain(|o| o.id != op_id);
        });
    }

    /// Operations still inside their debounce window.
    pub async fn pending_operation_count(&self) -> usize {
        self.session.read().await.pending_operations.len()
    }
}

pub(crate) fn apply_text_op(s: &mut Session, p: TextOperationPayload) -> Option<CollabEvent> {
    // Our own broadcast comes back from the relay; the local queue entry
    // is already authoritative.
    if s.local_user_id() == Some(p.operation.user_id) {
        return None;
    }
    Some(CollabEvent::RemoteOperation(p.operation))
}
