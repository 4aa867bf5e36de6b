//! Live chat core: who is connected, where they belong, and how events reach them.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `registry` | user → live connection handles (multi-device) |
//! | `presence` | room → users holding at least one live connection |
//! | `pairing` | assigns every new account to exactly one room |
//! | `relay` | persists and fans out room events |
//! | `session` | per-connection lifecycle from handshake to teardown |
//! | `events` | wire events in both directions |

pub mod events;
pub mod pairing;
pub mod presence;
pub mod registry;
pub mod relay;
pub mod session;

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;

use crate::{ConnId, RoomId};

pub use events::{ClientEvent, Indicator, ServerEvent};
pub use pairing::PairingEngine;
pub use presence::RoomPresence;
pub use registry::{ConnHandle, ConnectionRegistry, Departure};
pub use relay::EventRelay;
pub use session::{Phase, Session, SessionCoordinator};

/// Process-wide live state, shared by every connection.
///
/// The maps are guarded by short critical sections. Multi-step sequences
/// touching a room (join, leave, persist-then-broadcast) additionally hold
/// that room's lock, which serialises them per room without blocking others.
#[derive(Debug, Default)]
pub struct Hub {
    pub connections: ConnectionRegistry,
    pub presence: RoomPresence,
    room_locks: Mutex<HashMap<RoomId, Arc<tokio::sync::Mutex<()>>>>,
}

impl Hub {
    pub fn new() -> Hub {
        Hub::default()
    }

    pub async fn lock_room(&self, room_id: RoomId) -> OwnedMutexGuard<()> {
        let lock = self.room_locks.lock().entry(room_id).or_default().clone();
        lock.lock_owned().await
    }

    /// Every live connection of every user present in the room.
    pub fn room_connections(&self, room_id: RoomId) -> Vec<ConnHandle> {
        self.presence
            .members(room_id)
            .into_iter()
            .flat_map(|user_id| self.connections.connections_of(user_id))
            .collect()
    }

    /// Queues `event` on every connection in the room except `except`.
    /// Returns how many connections it was queued on.
    pub fn broadcast(&self, room_id: RoomId, event: &ServerEvent, except: Option<ConnId>) -> usize {
        let mut delivered = 0;
        for conn in self.room_connections(room_id) {
            if Some(conn.id) == except {
                continue;
            }
            if conn.send(event.clone()) {
                delivered += 1;
            }
        }
        tracing::trace!(room_id, event = event.name(), delivered, "broadcast");
        delivered
    }
}
