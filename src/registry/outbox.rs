//! Per-connection outbound queue

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::protocol::OutboundMessage;
use crate::types::ConnectionId;

/// Sending half of a connection's bounded outbound queue
///
/// Sends never block: a full queue drops the message, a closed queue means
/// the connection is going away and is likewise a drop.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::Sender<OutboundMessage>,
}

impl Outbox {
    /// Create an outbox and the receiver its writer task drains
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Enqueue a message for `to`; returns whether it was accepted
    pub fn send(&self, to: &ConnectionId, msg: OutboundMessage) -> bool {
        match self.tx.try_send(msg) {
            Ok(()) => true,
            Err(TrySendError::Full(msg)) => {
                warn!(conn_id = %to, msg_type = msg.type_name(), "Outbound queue full, dropping message");
                false
            }
            Err(TrySendError::Closed(msg)) => {
                debug!(conn_id = %to, msg_type = msg.type_name(), "Outbound queue closed, dropping message");
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
