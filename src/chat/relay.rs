use std::sync::Arc;

use tracing::{debug, warn};

use super::{events::{Indicator, ServerEvent}, Hub};
use crate::{db::{Message, MessageKind}, store::Store, ChatResult, ConnId, MessageId, RoomId, UserId};

/// The per-room event bus.
///
/// Messages are persisted before they are broadcast, under the room lock, so
/// every connection sees the same ids in the same order as the stored history.
#[derive(Clone)]
pub struct EventRelay {
    store: Store,
    hub: Arc<Hub>,
}

impl EventRelay {
    pub fn new(store: Store, hub: Arc<Hub>) -> EventRelay {
        EventRelay { store, hub }
    }

    pub async fn send_message(
        &self,
        room_id: RoomId,
        sender_id: UserId,
        sender: &str,
        kind: MessageKind,
        content: &str,
    ) -> ChatResult<Message> {
        let _room = self.hub.lock_room(room_id).await;
        // nothing goes out if this fails
        let message = self.store.append_message(room_id, sender_id, sender, kind, content).await?;
        debug!(room_id, message_id = message.id, kind = kind.as_str(), "message stored");

        self.hub.broadcast(room_id, &ServerEvent::from_message(message.clone()), None);
        Ok(message)
    }

    /// Typing and recording indicators go to everyone in the room but `origin`.
    pub fn indicate(&self, room_id: RoomId, origin: ConnId, user: &str, indicator: Indicator) -> usize {
        self.hub.broadcast(room_id, &indicator.event(user.to_owned()), Some(origin))
    }

    /// Removes the message, then tells every connection in the room (the
    /// deleting one included) to drop it.
    pub async fn delete_message(&self, room_id: RoomId, target_id: MessageId) -> ChatResult<()> {
        let _room = self.hub.lock_room(room_id).await;
        if !self.store.delete_message(room_id, target_id).await? {
            debug!(room_id, target_id, "delete of unknown message");
        }

        self.hub.broadcast(room_id, &ServerEvent::DeleteMessage { target_id }, None);
        Ok(())
    }

    /// Resolves display names for the live users of a room and broadcasts them.
    /// An empty room gets no broadcast.
    pub async fn announce_presence(&self, room_id: RoomId, live: &[UserId]) -> ChatResult<()> {
        let Some(event) = self.presence_event(live).await? else {
            return Ok(());
        };
        self.hub.broadcast(room_id, &event, None);
        Ok(())
    }

    pub(crate) async fn presence_event(&self, live: &[UserId]) -> ChatResult<Option<ServerEvent>> {
        if live.is_empty() {
            return Ok(None);
        }

        let names = self.store.usernames_of(live).await?;
        let users = live
            .iter()
            .map(|user_id| match names.get(user_id) {
                Some(name) => name.clone(),
                None => {
                    warn!(user_id, "present user has no account");
                    format!("user {user_id}")
                }
            })
            .collect();

        Ok(Some(ServerEvent::UpdateUsers { users }))
    }
}
