use std::collections::{BTreeSet, HashMap};

use parking_lot::Mutex;

use crate::{RoomId, UserId};

/// A room holds at most this many distinct users.
pub const ROOM_CAPACITY: usize = 2;

/// Which users currently hold at least one live connection in each room.
///
/// This is a liveness cache, not membership: the store decides who belongs to
/// a room, this only says who is connected right now.
#[derive(Debug, Default)]
pub struct RoomPresence {
    rooms: Mutex<HashMap<RoomId, BTreeSet<UserId>>>,
}

impl RoomPresence {
    pub fn join(&self, room_id: RoomId, user_id: UserId) -> Vec<UserId> {
        let mut rooms = self.rooms.lock();
        let live = rooms.entry(room_id).or_default();
        live.insert(user_id);
        debug_assert!(live.len() <= ROOM_CAPACITY, "room {room_id} over capacity");
        live.iter().copied().collect()
    }

    pub fn leave(&self, room_id: RoomId, user_id: UserId) -> Vec<UserId> {
        let mut rooms = self.rooms.lock();
        let Some(live) = rooms.get_mut(&room_id) else {
            return Vec::new();
        };
        live.remove(&user_id);

        let remaining = live.iter().copied().collect::<Vec<_>>();
        if remaining.is_empty() {
            rooms.remove(&room_id);
        }
        remaining
    }

    pub fn members(&self, room_id: RoomId) -> Vec<UserId> {
        self.rooms
            .lock()
            .get(&room_id)
            .map(|live| live.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_full(&self, room_id: RoomId) -> bool {
        self.rooms
            .lock()
            .get(&room_id)
            .is_some_and(|live| live.len() >= ROOM_CAPACITY)
    }
}
