//! Peer identity and descriptors

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoInfo;

// ─────────────────────────────────────────────────────────────────
// Connection Id
// ─────────────────────────────────────────────────────────────────

/// Opaque identifier of one live connection
///
/// Assigned by the transport when the connection is accepted and stable
/// until it closes. Peers quote it back as a correlation key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─────────────────────────────────────────────────────────────────
// Role
// ─────────────────────────────────────────────────────────────────

/// Which population a peer belongs to; fixed at connect time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Submits jobs and receives results
    Requester,
    /// Sandbox executing job fragments
    Worker,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Requester => "requester",
            Role::Worker => "worker",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "requester" | "client" => Ok(Role::Requester),
            "worker" | "sandbox" => Ok(Role::Worker),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// System Info
// ─────────────────────────────────────────────────────────────────

/// Peer-supplied system descriptor
///
/// `publicIP` is the only attribute the hub interprets; everything else
/// the peer sends is kept verbatim and echoed in listings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SysInfo {
    #[serde(rename = "publicIP", default, skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,

    /// Location resolved by the hub from `publicIP`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<GeoInfo>,

    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl SysInfo {
    pub fn with_public_ip(ip: impl Into<String>) -> Self {
        Self {
            public_ip: Some(ip.into()),
            ..Default::default()
        }
    }
}

/// Public view of a connected peer, as listed to other peers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub id: ConnectionId,

    pub sys_info: SysInfo,

    /// Sampled round-trip time, once known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtt_ms: Option<u64>,
}

/// Metadata the transport extracts from a connection's opening handshake
#[derive(Debug, Clone, PartialEq)]
pub struct Handshake {
    pub role: Role,
    pub sys_info: SysInfo,
}
