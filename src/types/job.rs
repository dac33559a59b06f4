//! Job fragment definitions

use serde::{Deserialize, Serialize};

use super::ConnectionId;

/// One worker-targeted unit of a job
///
/// The requester decides which worker runs which fragment; the hub only
/// forwards the payload, which it never inspects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    /// Target worker connection
    pub worker_id: ConnectionId,

    /// Opaque job code / input for the worker
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Fragment {
    pub fn new(worker_id: impl Into<ConnectionId>, payload: serde_json::Value) -> Self {
        Self {
            worker_id: worker_id.into(),
            payload,
        }
    }
}
