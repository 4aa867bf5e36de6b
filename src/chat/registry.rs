use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::events::ServerEvent;
use crate::{ConnId, UserId};

/// One live transport session: the sending half of its outbound queue.
#[derive(Debug, Clone)]
pub struct ConnHandle {
    pub id: ConnId,
    pub user_id: UserId,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

impl ConnHandle {
    pub fn new(user_id: UserId, tx: mpsc::UnboundedSender<ServerEvent>) -> ConnHandle {
        ConnHandle { id: Uuid::now_v7(), user_id, tx }
    }

    /// Queues an event; `false` once the connection's writer is gone.
    pub fn send(&self, event: ServerEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// The connection was not registered (already removed).
    NotRegistered,
    /// Removed; the user still has this many live connections.
    StillOnline(usize),
    /// Removed the user's last connection.
    WentOffline,
}

/// Live connections per user, across every device and tab.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    users: Mutex<HashMap<UserId, HashMap<ConnId, ConnHandle>>>,
}

impl ConnectionRegistry {
    /// Adds `conn` to its user's set and returns the set afterwards.
    pub fn register(&self, conn: ConnHandle) -> Vec<ConnHandle> {
        let mut users = self.users.lock();
        let conns = users.entry(conn.user_id).or_default();
        conns.insert(conn.id, conn);
        conns.values().cloned().collect()
    }

    pub fn unregister(&self, user_id: UserId, conn_id: ConnId) -> Departure {
        let mut users = self.users.lock();
        let Some(conns) = users.get_mut(&user_id) else {
            return Departure::NotRegistered;
        };
        if conns.remove(&conn_id).is_none() {
            return Departure::NotRegistered;
        }

        if conns.is_empty() {
            users.remove(&user_id);
            Departure::WentOffline
        } else {
            Departure::StillOnline(conns.len())
        }
    }

    pub fn connections_of(&self, user_id: UserId) -> Vec<ConnHandle> {
        self.users
            .lock()
            .get(&user_id)
            .map(|conns| conns.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn online_users(&self) -> usize {
        self.users.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(user_id: UserId) -> (ConnHandle, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnHandle::new(user_id, tx), rx)
    }

    #[test]
    fn register_returns_whole_set() {
        let registry = ConnectionRegistry::default();
        let (tab1, _rx1) = conn(1);
        let (tab2, _rx2) = conn(1);

        assert_eq!(registry.register(tab1).len(), 1);
        assert_eq!(registry.register(tab2).len(), 2);
        assert_eq!(registry.connections_of(1).len(), 2);
        assert!(registry.connections_of(2).is_empty());
    }

    #[test]
    fn last_unregister_drops_entry() {
        let registry = ConnectionRegistry::default();
        let (tab1, _rx1) = conn(1);
        let (tab2, _rx2) = conn(1);
        registry.register(tab1.clone());
        registry.register(tab2.clone());

        assert_eq!(registry.unregister(1, tab1.id), Departure::StillOnline(1));
        assert_eq!(registry.online_users(), 1);
        assert_eq!(registry.unregister(1, tab2.id), Departure::WentOffline);
        assert_eq!(registry.online_users(), 0);
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = ConnectionRegistry::default();
        let (tab, _rx) = conn(1);
        registry.register(tab.clone());

        assert_eq!(registry.unregister(1, tab.id), Departure::WentOffline);
        assert_eq!(registry.unregister(1, tab.id), Departure::NotRegistered);
        assert_eq!(registry.unregister(42, tab.id), Departure::NotRegistered);
    }

    #[test]
    fn send_fails_after_receiver_drops() {
        let (tab, rx) = conn(1);
        assert!(tab.send(ServerEvent::UpdateUsers { users: vec![] }));
        drop(rx);
        assert!(!tab.send(ServerEvent::UpdateUsers { users: vec![] }));
    }
}
