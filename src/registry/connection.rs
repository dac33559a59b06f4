//! Connected peer record

use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::protocol::OutboundMessage;
use crate::types::{ConnectionId, PeerInfo, Role, SysInfo};

use super::Outbox;

/// RTT sampling progress for one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RttState {
    /// No sample started yet
    Idle,
    /// Sample request sent, waiting for the response
    Sampling { begun_at: Instant },
    /// Terminal; later responses are ignored
    Sampled { rtt_ms: u64 },
}

impl RttState {
    pub fn rtt_ms(&self) -> Option<u64> {
        match self {
            RttState::Sampled { rtt_ms } => Some(*rtt_ms),
            _ => None,
        }
    }
}

/// One live peer, owned by its registry entry
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub role: Role,
    pub sys_info: SysInfo,
    pub remote_addr: Option<SocketAddr>,
    pub connected_at: DateTime<Utc>,
    pub rtt: RttState,
    outbox: Outbox,
}

impl Connection {
    pub fn new(id: ConnectionId, role: Role, sys_info: SysInfo, outbox: Outbox) -> Self {
        Self {
            id,
            role,
            sys_info,
            remote_addr: None,
            connected_at: Utc::now(),
            rtt: RttState::Idle,
            outbox,
        }
    }

    pub fn with_remote_addr(mut self, addr: Option<SocketAddr>) -> Self {
        self.remote_addr = addr;
        self
    }

    /// Fire-and-forget send to this peer
    pub fn send(&self, msg: OutboundMessage) -> bool {
        self.outbox.send(&self.id, msg)
    }

    /// Public descriptor used in listings and join notifications
    pub fn info(&self) -> PeerInfo {
        PeerInfo {
            id: self.id.clone(),
            sys_info: self.sys_info.clone(),
            rtt_ms: self.rtt.rtt_ms(),
        }
    }
}
