//! Protocol message definitions
//!
//! Every frame on the wire is a JSON object carrying envelope metadata and
//! a `type` discriminator. Inbound frames are decoded exactly once, here,
//! into strongly typed variants; anything that does not decode fails that
//! single frame.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{ConnectionId, Fragment, PeerInfo};

use super::{ProtocolVersion, PROTOCOL_VERSION};

// ─────────────────────────────────────────────────────────────────
// Message Envelope
// ─────────────────────────────────────────────────────────────────

/// Wrapper for all protocol messages with metadata
///
/// Peers may omit `message_id`, `timestamp` and `version` on inbound
/// frames. Payload fields share the object with these keys, so no payload
/// may use them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope<M> {
    /// Unique message ID
    #[serde(default = "Uuid::new_v4")]
    pub message_id: Uuid,

    /// Message timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Protocol version
    #[serde(default)]
    pub version: ProtocolVersion,

    /// The actual message payload
    #[serde(flatten)]
    pub payload: M,
}

impl<M> MessageEnvelope<M> {
    /// Create a new message envelope
    pub fn new(payload: M) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            version: ProtocolVersion::default(),
            payload,
        }
    }
}

impl<M: Serialize> MessageEnvelope<M> {
    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl<M: for<'de> Deserialize<'de>> MessageEnvelope<M> {
    /// Deserialize from a JSON text frame
    pub fn from_json(json: &str) -> Result<Self> {
        Self::checked(serde_json::from_str(json)?)
    }

    /// Deserialize from a JSON binary frame
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        Self::checked(serde_json::from_slice(bytes)?)
    }

    fn checked(envelope: Self) -> Result<Self> {
        if !PROTOCOL_VERSION.accepts(&envelope.version) {
            return Err(Error::ProtocolVersion {
                expected: PROTOCOL_VERSION.to_string(),
                actual: envelope.version.to_string(),
            });
        }
        Ok(envelope)
    }
}

// ─────────────────────────────────────────────────────────────────
// Inbound (peer → hub)
// ─────────────────────────────────────────────────────────────────

/// Messages peers send to the hub
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InboundMessage {
    /// Requester submits a job; the sender is the originating requester
    JobDispatchRequest(JobDispatchRequest),

    /// Worker returns a fragment result
    JobResult(JobResultMessage),

    /// Worker reports a fragment failure
    JobError(JobErrorMessage),

    /// Worker schedule data to be echoed back
    ScheduleData(ScheduleDataMessage),

    /// Ask for the current worker listing
    WorkerListingRequest,

    /// Ask for cluster counters
    StatusRequest,

    /// Reply to an RTT sample request
    RttResponse,

    /// Ask for the sender's own connection id
    ConnectionIdRequest,
}

impl InboundMessage {
    pub fn type_name(&self) -> &'static str {
        match self {
            InboundMessage::JobDispatchRequest(_) => "JOB_DISPATCH_REQUEST",
            InboundMessage::JobResult(_) => "JOB_RESULT",
            InboundMessage::JobError(_) => "JOB_ERROR",
            InboundMessage::ScheduleData(_) => "SCHEDULE_DATA",
            InboundMessage::WorkerListingRequest => "WORKER_LISTING_REQUEST",
            InboundMessage::StatusRequest => "STATUS_REQUEST",
            InboundMessage::RttResponse => "RTT_RESPONSE",
            InboundMessage::ConnectionIdRequest => "CONNECTION_ID_REQUEST",
        }
    }
}

/// Job submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDispatchRequest {
    pub fragments: Vec<Fragment>,
}

/// Fragment result from a worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResultMessage {
    /// Requester the result belongs to
    pub requester_id: ConnectionId,

    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Fragment failure from a worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobErrorMessage {
    /// Requester the failure belongs to
    pub requester_id: ConnectionId,

    #[serde(default)]
    pub error: serde_json::Value,
}

/// Schedule data packet, itself a JSON document encoded as a string
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleDataMessage {
    pub packet: String,
}

// ─────────────────────────────────────────────────────────────────
// Outbound (hub → peer)
// ─────────────────────────────────────────────────────────────────

/// Messages the hub sends to peers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundMessage {
    /// Start of an RTT sample; the peer should answer with RTT_RESPONSE
    RttSampleRequest,

    /// A peer's sampled RTT
    RttBroadcast { id: ConnectionId, rtt_ms: u64 },

    /// A worker joined the pool
    WorkerJoined(PeerInfo),

    /// A worker left the pool
    WorkerLeft { id: ConnectionId },

    /// Current worker pool
    WorkerListing { workers: Vec<PeerInfo> },

    /// Fragment for a worker to execute
    JobExecutionRequest {
        requester_id: ConnectionId,
        worker_id: ConnectionId,
        payload: serde_json::Value,
    },

    /// Fragment result relayed to the requester
    JobExecutionResponse {
        requester_id: ConnectionId,
        worker_id: ConnectionId,
        payload: serde_json::Value,
    },

    /// Fragment failure relayed to the requester
    JobExecutionError {
        requester_id: ConnectionId,
        worker_id: ConnectionId,
        error: serde_json::Value,
    },

    /// Cluster counters
    ClusterStatus(ClusterStatus),

    /// Re-encoded schedule data echoed to its sender
    ScheduleDataEcho { packet: String },

    /// The receiver's own connection id
    ConnectionId { id: ConnectionId },
}

impl OutboundMessage {
    pub fn type_name(&self) -> &'static str {
        match self {
            OutboundMessage::RttSampleRequest => "RTT_SAMPLE_REQUEST",
            OutboundMessage::RttBroadcast { .. } => "RTT_BROADCAST",
            OutboundMessage::WorkerJoined(_) => "WORKER_JOINED",
            OutboundMessage::WorkerLeft { .. } => "WORKER_LEFT",
            OutboundMessage::WorkerListing { .. } => "WORKER_LISTING",
            OutboundMessage::JobExecutionRequest { .. } => "JOB_EXECUTION_REQUEST",
            OutboundMessage::JobExecutionResponse { .. } => "JOB_EXECUTION_RESPONSE",
            OutboundMessage::JobExecutionError { .. } => "JOB_EXECUTION_ERROR",
            OutboundMessage::ClusterStatus(_) => "CLUSTER_STATUS",
            OutboundMessage::ScheduleDataEcho { .. } => "SCHEDULE_DATA_ECHO",
            OutboundMessage::ConnectionId { .. } => "CONNECTION_ID",
        }
    }
}

/// Point-in-time cluster counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStatus {
    pub requester_count: usize,
    pub worker_count: usize,
    pub running_job_count: usize,
}

/// Envelope type for frames received from peers
pub type InboundEnvelope = MessageEnvelope<InboundMessage>;

/// Envelope type for frames sent to peers
pub type OutboundEnvelope = MessageEnvelope<OutboundMessage>;

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
