//! Worker pool topology notifications

use std::sync::Arc;

use tracing::debug;

use crate::protocol::{ClusterStatus, OutboundMessage};
use crate::registry::{Connection, Registries};
use crate::types::{PeerInfo, Role};

pub struct TopologyBroadcaster {
    registries: Arc<Registries>,
    min_pool_size: usize,
}

impl TopologyBroadcaster {
    pub fn new(registries: Arc<Registries>, min_pool_size: usize) -> Self {
        Self {
            registries,
            min_pool_size,
        }
    }

    pub fn min_pool_size(&self) -> usize {
        self.min_pool_size
    }

    /// Announce a registered worker; returns whether it was sent the listing
    pub fn on_worker_join(&self, worker: &Connection) -> bool {
        self.registries
            .broadcast(Role::Requester, &OutboundMessage::WorkerJoined(worker.info()));

        let pool_size = self.registries.count(Role::Worker);
        if pool_size < self.min_pool_size {
            debug!(
                conn_id = %worker.id,
                pool_size,
                min_pool_size = self.min_pool_size,
                "Pool below listing threshold"
            );
            return false;
        }

        worker.send(OutboundMessage::WorkerListing {
            workers: self.list_workers(),
        })
    }

    /// Announce a departed worker
    pub fn on_worker_leave(&self, worker: &Connection) {
        self.registries.broadcast(
            Role::Requester,
            &OutboundMessage::WorkerLeft {
                id: worker.id.clone(),
            },
        );
    }

    /// Current workers in connect order
    pub fn list_workers(&self) -> Vec<PeerInfo> {
        self.registries
            .snapshot(Role::Worker)
            .iter()
            .map(Connection::info)
            .collect()
    }

    pub fn cluster_status(&self, running_job_count: usize) -> ClusterStatus {
        ClusterStatus {
            requester_count: self.registries.count(Role::Requester),
            worker_count: self.registries.count(Role::Worker),
            running_job_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Outbox;
    use crate::types::SysInfo;
    use tokio::sync::mpsc;

    fn register(
        registries: &Registries,
        id: &str,
        role: Role,
    ) -> (Connection, mpsc::Receiver<OutboundMessage>) {
        let (outbox, rx) = Outbox::channel(8);
        let conn = Connection::new(id.into(), role, SysInfo::with_public_ip("198.51.100.1"), outbox);
        registries.register(conn.clone()).unwrap();
        (conn, rx)
    }

    #[test]
    fn test_join_notifies_requesters_only() {
        let registries = Arc::new(Registries::new());
        let topology = TopologyBroadcaster::new(Arc::clone(&registries), 2);
        let (_r1, mut rrx) = register(&registries, "r1", Role::Requester);
        let (w1, mut wrx) = register(&registries, "w1", Role::Worker);

        assert!(!topology.on_worker_join(&w1));

        match rrx.try_recv().unwrap() {
            OutboundMessage::WorkerJoined(info) => {
                assert_eq!(info.id, w1.id);
                assert_eq!(info.sys_info.public_ip.as_deref(), Some("198.51.100.1"));
            }
            other => panic!("unexpected {}", other.type_name()),
        }
        assert!(wrx.try_recv().is_err());
    }

    #[test]
    fn test_listing_sent_once_pool_reaches_threshold() {
        let registries = Arc::new(Registries::new());
        let topology = TopologyBroadcaster::new(Arc::clone(&registries), 2);
        let (w1, mut w1rx) = register(&registries, "w1", Role::Worker);
        assert!(!topology.on_worker_join(&w1));

        let (w2, mut w2rx) = register(&registries, "w2", Role::Worker);
        assert!(topology.on_worker_join(&w2));

        match w2rx.try_recv().unwrap() {
            OutboundMessage::WorkerListing { workers } => {
                let ids: Vec<_> = workers.iter().map(|w| w.id.as_str()).collect();
                assert_eq!(ids, vec!["w1", "w2"]);
            }
            other => panic!("unexpected {}", other.type_name()),
        }
        assert!(w1rx.try_recv().is_err());
    }

    #[test]
    fn test_leave_notifies_requesters() {
        let registries = Arc::new(Registries::new());
        let topology = TopologyBroadcaster::new(Arc::clone(&registries), 2);
        let (_r1, mut rrx) = register(&registries, "r1", Role::Requester);
        let (w1, _wrx) = register(&registries, "w1", Role::Worker);

        registries.unregister(&w1.id, Role::Worker);
        topology.on_worker_leave(&w1);

        assert_eq!(
            rrx.try_recv().unwrap(),
            OutboundMessage::WorkerLeft { id: "w1".into() }
        );
    }

    #[test]
    fn test_departed_worker_left_out_of_listing() {
        let registries = Arc::new(Registries::new());
        let topology = TopologyBroadcaster::new(Arc::clone(&registries), 2);
        let (w1, _w1rx) = register(&registries, "w1", Role::Worker);
        let (_w2, _w2rx) = register(&registries, "w2", Role::Worker);

        registries.unregister(&w1.id, Role::Worker);
        topology.on_worker_leave(&w1);

        let ids: Vec<_> = topology
            .list_workers()
            .iter()
            .map(|w| w.id.as_str().to_string())
            .collect();
        assert_eq!(ids, vec!["w2"]);
    }

    #[test]
    fn test_cluster_status_counts() {
        let registries = Arc::new(Registries::new());
        let topology = TopologyBroadcaster::new(Arc::clone(&registries), 2);
        let _a = register(&registries, "r1", Role::Requester);
        let _b = register(&registries, "w1", Role::Worker);
        let _c = register(&registries, "w2", Role::Worker);

        assert_eq!(
            topology.cluster_status(1),
            ClusterStatus {
                requester_count: 1,
                worker_count: 2,
                running_job_count: 1,
            }
        );
    }
}
