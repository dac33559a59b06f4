//! The rendezvous hub
//!
//! `Hub` ties the registries, RTT tracker, job router and topology
//! broadcaster together. The transport calls `connect` once per accepted
//! peer, `handle_text`/`handle_bytes` for every inbound frame and
//! `disconnect` when the peer goes away.

mod router;
mod rtt;
mod topology;

pub use router::{DispatchReport, JobRouter, RunningJob};
pub use rtt::RttTracker;
pub use topology::TopologyBroadcaster;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::HubConfig;
use crate::error::Result;
use crate::geo::{GeoLookup, NoGeoLookup, StaticGeoLookup};
use crate::protocol::{InboundEnvelope, InboundMessage, OutboundMessage};
use crate::registry::{Connection, Outbox, Registries};
use crate::types::{ConnectionId, Handshake, Role};

/// Identity of an accepted connection, held by its receive loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: ConnectionId,
    pub role: Role,
}

pub struct Hub {
    registries: Arc<Registries>,
    rtt: RttTracker,
    router: JobRouter,
    topology: TopologyBroadcaster,
    geo: Arc<dyn GeoLookup>,
    max_connections: usize,
}

impl Hub {
    pub fn new(min_pool_size: usize, max_connections: usize) -> Self {
        let registries = Arc::new(Registries::new());
        Self {
            rtt: RttTracker::new(Arc::clone(&registries)),
            router: JobRouter::new(Arc::clone(&registries)),
            topology: TopologyBroadcaster::new(Arc::clone(&registries), min_pool_size),
            registries,
            geo: Arc::new(NoGeoLookup),
            max_connections,
        }
    }

    /// Build a hub from loaded configuration
    pub fn from_config(config: &HubConfig) -> Self {
        let hub = Self::new(config.topology.min_pool_size, config.server.max_connections);
        let lookup = StaticGeoLookup::new(&config.geo.entries);
        if lookup.is_empty() {
            return hub;
        }

        debug!(entries = lookup.len(), "Loaded static geo table");
        hub.with_geo_lookup(Arc::new(lookup))
    }

    pub fn with_geo_lookup(mut self, geo: Arc<dyn GeoLookup>) -> Self {
        self.geo = geo;
        self
    }

    pub fn registries(&self) -> &Arc<Registries> {
        &self.registries
    }

    pub fn router(&self) -> &JobRouter {
        &self.router
    }

    pub fn topology(&self) -> &TopologyBroadcaster {
        &self.topology
    }

    pub fn connection_count(&self) -> usize {
        self.registries.total()
    }

    pub fn at_capacity(&self) -> bool {
        self.connection_count() >= self.max_connections
    }

    // ─────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────

    /// Admit a peer under a freshly generated id
    pub fn connect(
        &self,
        handshake: Handshake,
        outbox: Outbox,
        remote_addr: Option<SocketAddr>,
    ) -> Result<Session> {
        self.connect_as(ConnectionId::generate(), handshake, outbox, remote_addr)
    }

    /// Admit a peer under a transport-assigned id
    ///
    /// Registers the connection (refused once `max_connections` peers are
    /// connected), starts its RTT sample and, for workers,
    /// announces it to the requesters.
    pub fn connect_as(
        &self,
        id: ConnectionId,
        handshake: Handshake,
        outbox: Outbox,
        remote_addr: Option<SocketAddr>,
    ) -> Result<Session> {
        let Handshake { role, mut sys_info } = handshake;
        sys_info.geo = sys_info
            .public_ip
            .as_deref()
            .and_then(|ip| self.geo.lookup(ip));

        let conn = Connection::new(id.clone(), role, sys_info, outbox).with_remote_addr(remote_addr);
        self.registries
            .register_within(conn.clone(), self.max_connections)?;

        info!(
            conn_id = %id,
            role = %role,
            remote_addr = ?remote_addr,
            public_ip = conn.sys_info.public_ip.as_deref().unwrap_or("-"),
            "Peer connected"
        );

        self.rtt.begin(&id, role);
        if role == Role::Worker {
            self.topology.on_worker_join(&conn);
        }

        Ok(Session { id, role })
    }

    /// Tear down a session; repeated calls are no-ops
    pub fn disconnect(&self, session: &Session) {
        let Some(conn) = self.registries.unregister(&session.id, session.role) else {
            return;
        };

        match conn.role {
            Role::Worker => self.topology.on_worker_leave(&conn),
            Role::Requester => {
                self.router.forget_requester(&conn.id);
            }
        }

        info!(conn_id = %conn.id, role = %conn.role, "Peer disconnected");
    }

    // ─────────────────────────────────────────────────────────────
    // Inbound messages
    // ─────────────────────────────────────────────────────────────

    /// Decode and handle a text frame
    pub fn handle_text(&self, session: &Session, text: &str) -> Result<()> {
        let envelope = InboundEnvelope::from_json(text)?;
        self.handle(session, envelope.payload)
    }

    /// Decode and handle a binary frame
    pub fn handle_bytes(&self, session: &Session, bytes: &[u8]) -> Result<()> {
        let envelope = InboundEnvelope::from_json_bytes(bytes)?;
        self.handle(session, envelope.payload)
    }

    /// Route one decoded message from `session`
    pub fn handle(&self, session: &Session, msg: InboundMessage) -> Result<()> {
        debug!(conn_id = %session.id, msg_type = msg.type_name(), "Inbound message");

        match msg {
            InboundMessage::JobDispatchRequest(req) => {
                self.router.dispatch(&session.id, req.fragments);
            }
            InboundMessage::JobResult(res) => {
                self.router
                    .handle_result(&session.id, res.requester_id, res.payload);
            }
            InboundMessage::JobError(err) => {
                self.router
                    .handle_error(&session.id, err.requester_id, err.error);
            }
            InboundMessage::ScheduleData(data) => {
                self.router
                    .relay_schedule(&session.id, session.role, &data.packet)?;
            }
            InboundMessage::WorkerListingRequest => {
                let workers = self.topology.list_workers();
                self.reply(session, OutboundMessage::WorkerListing { workers });
            }
            InboundMessage::StatusRequest => {
                let status = self
                    .topology
                    .cluster_status(self.router.running_job_count());
                self.reply(session, OutboundMessage::ClusterStatus(status));
            }
            InboundMessage::RttResponse => {
                self.rtt.complete(&session.id, session.role);
            }
            InboundMessage::ConnectionIdRequest => {
                self.reply(
                    session,
                    OutboundMessage::ConnectionId {
                        id: session.id.clone(),
                    },
                );
            }
        }
        Ok(())
    }

    fn reply(&self, session: &Session, msg: OutboundMessage) {
        self.registries.send(&session.id, session.role, msg);
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
