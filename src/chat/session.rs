use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{
    events::{ClientEvent, Indicator, ServerEvent},
    presence::ROOM_CAPACITY,
    registry::{ConnHandle, Departure},
    relay::EventRelay,
    Hub,
};
use crate::{
    auth::Tokens,
    db::{MessageKind, Room},
    store::Store,
    ChatError, ChatResult, ConnId, RoomId, UserId,
};

/// Lifecycle of one connection, from handshake to teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    Authenticating,
    Failed,
    Authenticated,
    RoomResolved,
    Joined,
    Active,
    Disconnecting,
    Terminated,
}

/// A connection that made it into its room.
#[derive(Debug)]
pub struct Session {
    pub conn: ConnHandle,
    pub user_id: UserId,
    pub username: String,
    pub room_id: RoomId,
    phase: Phase,
}

impl Session {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn conn_id(&self) -> ConnId {
        self.conn.id
    }

    fn advance(&mut self, next: Phase) {
        debug!(conn_id = %self.conn.id, user_id = self.user_id, from = ?self.phase, to = ?next, "session phase");
        self.phase = next;
    }
}

/// Drives connections through their lifecycle against the shared [`Hub`].
pub struct SessionCoordinator {
    store: Store,
    hub: Arc<Hub>,
    relay: EventRelay,
    tokens: Tokens,
}

impl SessionCoordinator {
    pub fn new(store: Store, tokens: Tokens) -> SessionCoordinator {
        let hub = Arc::new(Hub::new());
        let relay = EventRelay::new(store.clone(), hub.clone());
        SessionCoordinator { store, hub, relay, tokens }
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    pub fn tokens(&self) -> &Tokens {
        &self.tokens
    }

    /// Checks a handshake token. Nothing is registered until [`Self::open`].
    pub fn authenticate(&self, token: Option<&str>) -> ChatResult<UserId> {
        debug!(from = ?Phase::Connecting, to = ?Phase::Authenticating, "session phase");
        let verified = token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ChatError::AuthFailure("no token".to_owned()))
            .and_then(|token| self.tokens.verify(token));

        match verified {
            Ok(user_id) => {
                debug!(user_id, from = ?Phase::Authenticating, to = ?Phase::Authenticated, "session phase");
                Ok(user_id)
            }
            Err(err) => {
                debug!(from = ?Phase::Authenticating, to = ?Phase::Failed, error = %err, "session phase");
                Err(err)
            }
        }
    }

    /// Every account gets a room at signup, so a miss here is a data fault.
    pub async fn resolve_room(&self, user_id: UserId) -> ChatResult<Room> {
        self.store
            .find_room_by_user(user_id)
            .await?
            .ok_or(ChatError::NoRoomAssigned(user_id))
    }

    /// Handshake through to an active session.
    pub async fn connect(&self, token: Option<&str>, tx: mpsc::UnboundedSender<ServerEvent>) -> ChatResult<Session> {
        let user_id = self.authenticate(token)?;
        self.open(user_id, tx).await
    }

    /// Joins an authenticated user's new connection to their room.
    ///
    /// The history replay is queued on the new connection before it becomes
    /// visible to broadcasts, and both happen under the room lock, so the
    /// connection sees each message exactly once: either in the replay or live.
    pub async fn open(&self, user_id: UserId, tx: mpsc::UnboundedSender<ServerEvent>) -> ChatResult<Session> {
        let room = match self.resolve_room(user_id).await {
            Ok(room) => room,
            Err(err) => {
                if let ChatError::NoRoomAssigned(_) = err {
                    warn!(user_id, "authenticated user has no room, closing connection");
                }
                return Err(err);
            }
        };
        let room_id = room.room_id;

        let _room = self.hub.lock_room(room_id).await;

        // store reads first: a failure here must leave no trace in the hub
        let history = self.store.list_messages(room_id).await?;
        let username = self
            .store
            .usernames_of(&[user_id])
            .await?
            .remove(&user_id)
            .unwrap_or_else(|| format!("user {user_id}"));
        let mut live = self.hub.presence.members(room_id);
        if !live.contains(&user_id) {
            live.push(user_id);
            live.sort_unstable();
        }
        if live.len() > ROOM_CAPACITY {
            warn!(user_id, room_id, live = ?live, "room presence at capacity, refusing join");
            return Err(ChatError::RoomFull);
        }
        let presence = self.relay.presence_event(&live).await?;

        let mut session = Session {
            conn: ConnHandle::new(user_id, tx),
            user_id,
            username,
            room_id,
            phase: Phase::RoomResolved,
        };

        session.conn.send(ServerEvent::JoinedRoom { room_id, messages: history });
        let devices = self.hub.connections.register(session.conn.clone()).len();
        let joined = self.hub.presence.join(room_id, user_id);
        debug_assert_eq!(joined, live);
        session.advance(Phase::Joined);

        if let Some(presence) = presence {
            self.hub.broadcast(room_id, &presence, None);
        }
        session.advance(Phase::Active);

        info!(user_id, room_id, conn_id = %session.conn.id, devices, "connection joined room");
        Ok(session)
    }

    /// Reports an error on the connection instead of closing it.
    pub async fn dispatch(&self, session: &Session, event: ClientEvent) {
        if let Err(err) = self.handle(session, event).await {
            warn!(user_id = session.user_id, conn_id = %session.conn.id, error = %err, "request rejected");
            let message = match err {
                ChatError::StoreUnavailable(_) => "temporarily unavailable, try again".to_owned(),
                other => other.to_string(),
            };
            session.conn.send(ServerEvent::Error { message });
        }
    }

    pub async fn handle(&self, session: &Session, event: ClientEvent) -> ChatResult<()> {
        if session.phase != Phase::Active {
            return Err(ChatError::BadRequest("connection is not active"));
        }

        let room_id = session.room_id;
        let indicator = match event {
            ClientEvent::ChatMessage { text } => {
                if text.trim().is_empty() {
                    return Err(ChatError::BadRequest("empty message"));
                }
                self.relay.send_message(room_id, session.user_id, &session.username, MessageKind::Text, &text).await?;
                return Ok(());
            }
            ClientEvent::VoiceMessage { payload } => {
                if payload.is_empty() {
                    return Err(ChatError::BadRequest("empty voice message"));
                }
                self.relay.send_message(room_id, session.user_id, &session.username, MessageKind::Voice, &payload).await?;
                return Ok(());
            }
            ClientEvent::DeleteMessage { target_id } => {
                return self.relay.delete_message(room_id, target_id).await;
            }
            ClientEvent::CheckRoom => {
                let status = self.check_room(session).await?;
                session.conn.send(status);
                return Ok(());
            }
            ClientEvent::Typing => Indicator::Typing,
            ClientEvent::StopTyping => Indicator::StopTyping,
            ClientEvent::StartRecording => Indicator::StartRecording,
            ClientEvent::StopRecording => Indicator::StopRecording,
        };

        self.relay.indicate(room_id, session.conn.id, &session.username, indicator);
        Ok(())
    }

    /// `filled` comes from live presence; the code only from durable state, and
    /// only for the room owner while slot B is empty.
    pub async fn check_room(&self, session: &Session) -> ChatResult<ServerEvent> {
        let room = self.resolve_room(session.user_id).await?;
        let filled = self.hub.presence.is_full(room.room_id);
        let code = if room.user_a == session.user_id && !room.is_paired() {
            room.code
        } else {
            None
        };
        Ok(ServerEvent::RoomStatus { filled, code })
    }

    /// Tears the connection down. Safe to call more than once.
    pub async fn close(&self, session: &mut Session) {
        if matches!(session.phase, Phase::Disconnecting | Phase::Terminated) {
            return;
        }
        session.advance(Phase::Disconnecting);

        let room_id = session.room_id;
        let _room = self.hub.lock_room(room_id).await;
        match self.hub.connections.unregister(session.user_id, session.conn.id) {
            Departure::NotRegistered => {}
            Departure::StillOnline(devices) => {
                debug!(user_id = session.user_id, room_id, devices, "device left, user still online");
            }
            Departure::WentOffline => {
                let live = self.hub.presence.leave(room_id, session.user_id);
                info!(user_id = session.user_id, room_id, "user went offline");
                if let Err(err) = self.relay.announce_presence(room_id, &live).await {
                    warn!(room_id, error = %err, "could not announce presence");
                }
            }
        }
        session.advance(Phase::Terminated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        store: Store,
        coordinator: SessionCoordinator,
        alice: UserId,
        bob: UserId,
        room: Room,
    }

    async fn fixture() -> Fixture {
        let store = Store::open_in_memory().await.unwrap();
        let alice = store.create_user("alice", "h").await.unwrap().unwrap();
        let bob = store.create_user("bob", "h").await.unwrap().unwrap();
        let room = store.create_room(alice, "4821").await.unwrap().unwrap();
        let coordinator = SessionCoordinator::new(
            store.clone(),
            Tokens::new(b"secret", time::Duration::hours(1)),
        );
        Fixture { store, coordinator, alice, bob, room }
    }

    async fn open(f: &Fixture, user_id: UserId) -> (Session, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = f.coordinator.open(user_id, tx).await.unwrap();
        (session, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn users(names: &[&str]) -> ServerEvent {
        ServerEvent::UpdateUsers { users: names.iter().map(|n| n.to_string()).collect() }
    }

    #[tokio::test]
    async fn bad_tokens_touch_nothing() {
        let f = fixture().await;
        for token in [None, Some(""), Some("garbage")] {
            let (tx, _rx) = mpsc::unbounded_channel();
            let result = f.coordinator.connect(token, tx).await;
            assert!(matches!(result, Err(ChatError::AuthFailure(_))));
        }
        assert_eq!(f.coordinator.hub().connections.online_users(), 0);
    }

    #[tokio::test]
    async fn missing_room_is_fatal() {
        let f = fixture().await;
        let token = f.coordinator.tokens().issue(f.bob).unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();

        let result = f.coordinator.connect(Some(&token), tx).await;
        assert!(matches!(result, Err(ChatError::NoRoomAssigned(id)) if id == f.bob));
        assert_eq!(f.coordinator.hub().connections.online_users(), 0);
    }

    #[tokio::test]
    async fn store_outage_on_join_leaves_no_trace() {
        let f = fixture().await;
        f.store.pool().close().await;

        let (tx, _rx) = mpsc::unbounded_channel();
        let result = f.coordinator.open(f.alice, tx).await;
        assert!(matches!(result, Err(ChatError::StoreUnavailable(_))));
        assert_eq!(f.coordinator.hub().connections.online_users(), 0);
        assert!(f.coordinator.hub().presence.members(f.room.room_id).is_empty());
    }

    #[tokio::test]
    async fn full_presence_refuses_a_third_user() {
        let f = fixture().await;
        f.store.fill_slot_b(f.room.room_id, f.bob).await.unwrap().unwrap();
        // stale entry for someone who is not a member
        f.coordinator.hub().presence.join(f.room.room_id, f.alice);
        f.coordinator.hub().presence.join(f.room.room_id, 999);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = f.coordinator.open(f.bob, tx).await;
        assert!(matches!(result, Err(ChatError::RoomFull)));
        assert!(drain(&mut rx).is_empty());
        assert_eq!(f.coordinator.hub().connections.online_users(), 0);
        assert_eq!(f.coordinator.hub().presence.members(f.room.room_id), [f.alice, 999]);
    }

    #[tokio::test]
    async fn join_replays_history_then_announces() {
        let f = fixture().await;
        f.store.append_message(f.room.room_id, f.alice, "alice", MessageKind::Text, "earlier").await.unwrap();

        let token = f.coordinator.tokens().issue(f.alice).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = f.coordinator.connect(Some(&token), tx).await.unwrap();
        assert_eq!(session.phase(), Phase::Active);
        assert_eq!(session.username, "alice");

        let events = drain(&mut rx);
        match events.as_slice() {
            [ServerEvent::JoinedRoom { room_id, messages }, presence] => {
                assert_eq!(*room_id, f.room.room_id);
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].content, "earlier");
                assert_eq!(*presence, users(&["alice"]));
            }
            other => panic!("unexpected events {other:?}"),
        }
    }

    #[tokio::test]
    async fn second_device_keeps_user_listed_once() {
        let f = fixture().await;
        f.store.fill_slot_b(f.room.room_id, f.bob).await.unwrap().unwrap();

        let (mut tab1, _rx1) = open(&f, f.alice).await;
        let (mut tab2, _rx2) = open(&f, f.alice).await;
        let (_bob, mut rx_b) = open(&f, f.bob).await;
        assert_eq!(drain(&mut rx_b).last(), Some(&users(&["alice", "bob"])));

        f.coordinator.close(&mut tab1).await;
        assert!(drain(&mut rx_b).is_empty());
        assert_eq!(f.coordinator.hub().presence.members(f.room.room_id), [f.alice, f.bob]);

        f.coordinator.close(&mut tab2).await;
        assert_eq!(drain(&mut rx_b), [users(&["bob"])]);
        assert_eq!(tab2.phase(), Phase::Terminated);
    }

    #[tokio::test]
    async fn duplicate_close_is_a_no_op() {
        let f = fixture().await;
        f.store.fill_slot_b(f.room.room_id, f.bob).await.unwrap().unwrap();
        let (mut alice, _rx_a) = open(&f, f.alice).await;
        let (_bob, mut rx_b) = open(&f, f.bob).await;
        drain(&mut rx_b);

        f.coordinator.close(&mut alice).await;
        f.coordinator.close(&mut alice).await;
        assert_eq!(drain(&mut rx_b), [users(&["bob"])]);

        // a stale handle for an already removed connection changes nothing either
        assert_eq!(
            f.coordinator.hub().connections.unregister(f.alice, alice.conn_id()),
            Departure::NotRegistered
        );
    }

    #[tokio::test]
    async fn indicators_are_not_echoed() {
        let f = fixture().await;
        f.store.fill_slot_b(f.room.room_id, f.bob).await.unwrap().unwrap();
        let (alice, mut rx_a) = open(&f, f.alice).await;
        let (_bob, mut rx_b) = open(&f, f.bob).await;
        drain(&mut rx_a);
        drain(&mut rx_b);

        f.coordinator.handle(&alice, ClientEvent::StartRecording).await.unwrap();
        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(drain(&mut rx_b), [ServerEvent::StartRecording { user: "alice".into() }]);
    }

    #[tokio::test]
    async fn rejected_requests_keep_the_connection() {
        let f = fixture().await;
        let (alice, mut rx) = open(&f, f.alice).await;
        drain(&mut rx);

        f.coordinator.dispatch(&alice, ClientEvent::ChatMessage { text: "   ".into() }).await;
        assert_eq!(drain(&mut rx), [ServerEvent::Error { message: "empty message".into() }]);

        f.coordinator.dispatch(&alice, ClientEvent::ChatMessage { text: "still here".into() }).await;
        assert!(matches!(drain(&mut rx).as_slice(), [ServerEvent::ChatMessage { text, .. }] if text == "still here"));
    }

    #[tokio::test]
    async fn closed_sessions_refuse_events() {
        let f = fixture().await;
        let (mut alice, _rx) = open(&f, f.alice).await;
        f.coordinator.close(&mut alice).await;
        assert!(matches!(
            f.coordinator.handle(&alice, ClientEvent::Typing).await,
            Err(ChatError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn check_room_reports_live_fill_and_owner_code() {
        let f = fixture().await;
        let (alice, mut rx_a) = open(&f, f.alice).await;
        drain(&mut rx_a);

        f.coordinator.dispatch(&alice, ClientEvent::CheckRoom).await;
        assert_eq!(
            drain(&mut rx_a),
            [ServerEvent::RoomStatus { filled: false, code: Some("4821".into()) }]
        );

        // durably paired, but bob is not connected yet
        f.store.fill_slot_b(f.room.room_id, f.bob).await.unwrap().unwrap();
        assert_eq!(
            f.coordinator.check_room(&alice).await.unwrap(),
            ServerEvent::RoomStatus { filled: false, code: None }
        );

        let (bob, _rx_b) = open(&f, f.bob).await;
        assert_eq!(
            f.coordinator.check_room(&bob).await.unwrap(),
            ServerEvent::RoomStatus { filled: true, code: None }
        );
    }
}
