//! Requester and worker membership
//!
//! Each role has its own `ConnectionRegistry`. Membership is an ordered map
//! so lookups are O(1) while iteration follows connect order; removals use
//! `shift_remove` so the order of the survivors is preserved.

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::OutboundMessage;
use crate::types::{ConnectionId, Role};

use super::Connection;

// ─────────────────────────────────────────────────────────────────
// Connection Registry
// ─────────────────────────────────────────────────────────────────

/// Thread-safe membership of one role
pub struct ConnectionRegistry {
    members: RwLock<IndexMap<ConnectionId, Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            members: RwLock::new(IndexMap::new()),
        }
    }

    /// Remove a connection, returning it if it was present
    pub fn remove(&self, id: &ConnectionId) -> Option<Connection> {
        self.members.write().shift_remove(id)
    }

    /// Get a copy of a member
    pub fn get(&self, id: &ConnectionId) -> Option<Connection> {
        self.members.read().get(id).cloned()
    }

    /// Point-in-time copy of all members in connect order
    pub fn snapshot(&self) -> Vec<Connection> {
        self.members.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }

    /// Mutate a member in place under the write lock
    pub fn update<R>(&self, id: &ConnectionId, f: impl FnOnce(&mut Connection) -> R) -> Option<R> {
        self.members.write().get_mut(id).map(f)
    }
}

// ─────────────────────────────────────────────────────────────────
// Registries
// ─────────────────────────────────────────────────────────────────

/// Both role registries, shared by every hub component
pub struct Registries {
    requesters: ConnectionRegistry,
    workers: ConnectionRegistry,
}

impl Registries {
    pub fn new() -> Self {
        Self {
            requesters: ConnectionRegistry::new(),
            workers: ConnectionRegistry::new(),
        }
    }

    /// Registry for one role
    pub fn of(&self, role: Role) -> &ConnectionRegistry {
        match role {
            Role::Requester => &self.requesters,
            Role::Worker => &self.workers,
        }
    }

    /// Register a connection under its role
    ///
    /// Fails if the id is already present in either registry.
    pub fn register(&self, conn: Connection) -> Result<()> {
        self.admit(conn, None)
    }

    /// Register a connection unless `limit` peers are already connected
    pub fn register_within(&self, conn: Connection, limit: usize) -> Result<()> {
        self.admit(conn, Some(limit))
    }

    // Both write locks are held for the whole check-and-insert, always
    // requesters first.
    fn admit(&self, conn: Connection, limit: Option<usize>) -> Result<()> {
        let mut requesters = self.requesters.members.write();
        let mut workers = self.workers.members.write();

        if requesters.contains_key(&conn.id) || workers.contains_key(&conn.id) {
            return Err(Error::DuplicateConnection {
                id: conn.id.to_string(),
            });
        }
        if let Some(limit) = limit {
            if requesters.len() + workers.len() >= limit {
                return Err(Error::ConnectionLimit { limit });
            }
        }

        let (id, role) = (conn.id.clone(), conn.role);
        match role {
            Role::Requester => requesters.insert(id.clone(), conn),
            Role::Worker => workers.insert(id.clone(), conn),
        };
        drop((requesters, workers));

        debug!(conn_id = %id, role = %role, "Registered connection");
        Ok(())
    }

    /// Remove a connection; no-op if absent
    pub fn unregister(&self, id: &ConnectionId, role: Role) -> Option<Connection> {
        let removed = self.of(role).remove(id);
        if removed.is_some() {
            debug!(conn_id = %id, role = %role, "Unregistered connection");
        }
        removed
    }

    pub fn lookup(&self, id: &ConnectionId, role: Role) -> Option<Connection> {
        self.of(role).get(id)
    }

    pub fn snapshot(&self, role: Role) -> Vec<Connection> {
        self.of(role).snapshot()
    }

    pub fn count(&self, role: Role) -> usize {
        self.of(role).len()
    }

    /// Connected peers across both roles
    pub fn total(&self) -> usize {
        self.requesters.len() + self.workers.len()
    }

    /// Send to one member of `role`; a miss is a silent drop
    pub fn send(&self, id: &ConnectionId, role: Role, msg: OutboundMessage) -> bool {
        match self.lookup(id, role) {
            Some(conn) => conn.send(msg),
            None => {
                debug!(conn_id = %id, role = %role, msg_type = msg.type_name(), "Routing miss, dropping message");
                false
            }
        }
    }

    /// Send to every member of `role`; returns how many accepted it
    ///
    /// Iterates a snapshot, so no lock is held while sending.
    pub fn broadcast(&self, role: Role, msg: &OutboundMessage) -> usize {
        self.snapshot(role)
            .iter()
            .filter(|conn| conn.send(msg.clone()))
            .count()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Outbox;
    use crate::types::SysInfo;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tokio::sync::mpsc;

    fn make_conn(id: &str, role: Role) -> (Connection, mpsc::Receiver<OutboundMessage>) {
        let (outbox, rx) = Outbox::channel(8);
        (Connection::new(id.into(), role, SysInfo::default(), outbox), rx)
    }

    fn ids(conns: &[Connection]) -> Vec<&str> {
        conns.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_register_then_lookup() {
        let registries = Registries::new();
        let (conn, _rx) = make_conn("w1", Role::Worker);

        registries.register(conn).unwrap();

        assert!(registries.lookup(&"w1".into(), Role::Worker).is_some());
        assert!(registries.lookup(&"w1".into(), Role::Requester).is_none());
        assert_eq!(registries.count(Role::Worker), 1);
        assert_eq!(registries.count(Role::Requester), 0);
    }

    #[test]
    fn test_unregister_then_lookup() {
        let registries = Registries::new();
        let (conn, _rx) = make_conn("r1", Role::Requester);
        registries.register(conn).unwrap();

        assert!(registries.unregister(&"r1".into(), Role::Requester).is_some());
        assert!(registries.lookup(&"r1".into(), Role::Requester).is_none());
        assert_eq!(registries.count(Role::Requester), 0);

        // Second removal is a no-op
        assert!(registries.unregister(&"r1".into(), Role::Requester).is_none());
    }

    #[test]
    fn test_snapshot_keeps_insertion_order_after_removal() {
        let registries = Registries::new();
        let mut _rxs = Vec::new();
        for id in ["a", "b", "c", "d"] {
            let (conn, rx) = make_conn(id, Role::Worker);
            registries.register(conn).unwrap();
            _rxs.push(rx);
        }

        registries.unregister(&"b".into(), Role::Worker);

        assert_eq!(ids(&registries.snapshot(Role::Worker)), vec!["a", "c", "d"]);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let registries = Registries::new();
        let (conn, _rx) = make_conn("w1", Role::Worker);
        registries.register(conn).unwrap();

        let snapshot = registries.snapshot(Role::Worker);
        registries.unregister(&"w1".into(), Role::Worker);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registries.count(Role::Worker), 0);
    }

    #[test]
    fn test_duplicate_id_rejected_in_same_role() {
        let registries = Registries::new();
        let (first, _rx1) = make_conn("x", Role::Worker);
        let (second, _rx2) = make_conn("x", Role::Worker);

        registries.register(first).unwrap();
        let err = registries.register(second).unwrap_err();

        assert_eq!(err.code(), crate::error::ErrorCode::DuplicateConnection);
        assert_eq!(registries.count(Role::Worker), 1);
    }

    #[test]
    fn test_duplicate_id_rejected_across_roles() {
        let registries = Registries::new();
        let (worker, _rx1) = make_conn("x", Role::Worker);
        let (requester, _rx2) = make_conn("x", Role::Requester);

        registries.register(worker).unwrap();
        assert!(registries.register(requester).is_err());
        assert_eq!(registries.count(Role::Requester), 0);
        assert_eq!(registries.total(), 1);
    }

    #[test]
    fn test_update_in_place() {
        let registries = Registries::new();
        let (conn, _rx) = make_conn("w1", Role::Worker);
        registries.register(conn).unwrap();
        let registry = registries.of(Role::Worker);

        let updated = registry.update(&"w1".into(), |c| {
            c.rtt = crate::registry::RttState::Sampled { rtt_ms: 12 };
        });

        assert!(updated.is_some());
        assert_eq!(registry.get(&"w1".into()).unwrap().rtt.rtt_ms(), Some(12));
        assert!(registry.update(&"missing".into(), |_| ()).is_none());
    }

    #[test]
    fn test_send_and_broadcast() {
        let registries = Registries::new();
        let (r1, mut rx1) = make_conn("r1", Role::Requester);
        let (r2, mut rx2) = make_conn("r2", Role::Requester);
        let (w1, mut wrx) = make_conn("w1", Role::Worker);
        registries.register(r1).unwrap();
        registries.register(r2).unwrap();
        registries.register(w1).unwrap();

        let msg = OutboundMessage::WorkerLeft { id: "w0".into() };
        assert_eq!(registries.broadcast(Role::Requester, &msg), 2);
        assert_eq!(rx1.try_recv().unwrap(), msg);
        assert_eq!(rx2.try_recv().unwrap(), msg);
        assert!(wrx.try_recv().is_err());

        assert!(registries.send(&"w1".into(), Role::Worker, OutboundMessage::RttSampleRequest));
        assert!(!registries.send(&"w9".into(), Role::Worker, OutboundMessage::RttSampleRequest));
        assert_eq!(wrx.try_recv().unwrap(), OutboundMessage::RttSampleRequest);
    }

    #[test]
    fn test_register_within_limit() {
        let registries = Registries::new();
        let (r1, _rx1) = make_conn("r1", Role::Requester);
        let (w1, _rx2) = make_conn("w1", Role::Worker);
        let (w2, _rx3) = make_conn("w2", Role::Worker);

        registries.register_within(r1, 2).unwrap();
        registries.register_within(w1, 2).unwrap();
        let err = registries.register_within(w2, 2).unwrap_err();

        assert_eq!(err.code(), crate::error::ErrorCode::ConnectionLimit);
        assert_eq!(registries.total(), 2);
    }

    #[test]
    fn test_concurrent_same_id_lands_in_one_registry() {
        for _ in 0..200 {
            let registries = Arc::new(Registries::new());
            let barrier = Arc::new(Barrier::new(2));

            let handles: Vec<_> = [Role::Requester, Role::Worker]
                .into_iter()
                .map(|role| {
                    let registries = Arc::clone(&registries);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        let (conn, _rx) = make_conn("shared", role);
                        barrier.wait();
                        registries.register(conn).is_ok()
                    })
                })
                .collect();

            let admitted = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|ok| *ok)
                .count();

            assert_eq!(admitted, 1);
            assert_eq!(registries.total(), 1);
        }
    }

    #[test]
    fn test_concurrent_registration_respects_limit() {
        let registries = Arc::new(Registries::new());
        let barrier = Arc::new(Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let registries = Arc::clone(&registries);
                let barrier = Arc::clone(&barrier);
                let role = if i % 2 == 0 { Role::Requester } else { Role::Worker };
                thread::spawn(move || {
                    let (conn, _rx) = make_conn(&format!("c{}", i), role);
                    barrier.wait();
                    registries.register_within(conn, 4).is_ok()
                })
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(admitted, 4);
        assert_eq!(registries.total(), 4);
    }
}
