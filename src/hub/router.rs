//! Job dispatch routing
//!
//! Fans a requester's fragments out to the named workers and relays each
//! worker's result or failure back to the requester quoted in it. The
//! running-job table is bookkeeping only; correlation always uses the ids
//! embedded in the messages.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::protocol::OutboundMessage;
use crate::registry::Registries;
use crate::types::{ConnectionId, Fragment, Role};

/// A requester's most recent job
#[derive(Debug, Clone, PartialEq)]
pub struct RunningJob {
    pub requester_id: ConnectionId,
    pub fragments: Vec<Fragment>,
}

/// Outcome of fanning out one job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub dropped: usize,
}

pub struct JobRouter {
    registries: Arc<Registries>,
    jobs: Mutex<HashMap<ConnectionId, RunningJob>>,
}

impl JobRouter {
    pub fn new(registries: Arc<Registries>) -> Self {
        Self {
            registries,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Record the job and send each fragment to its worker
    ///
    /// Fragments naming an unknown worker are dropped; the rest still go out.
    pub fn dispatch(&self, requester_id: &ConnectionId, fragments: Vec<Fragment>) -> DispatchReport {
        let mut report = DispatchReport::default();

        for fragment in &fragments {
            let msg = OutboundMessage::JobExecutionRequest {
                requester_id: requester_id.clone(),
                worker_id: fragment.worker_id.clone(),
                payload: fragment.payload.clone(),
            };
            if self.registries.send(&fragment.worker_id, Role::Worker, msg) {
                report.delivered += 1;
            } else {
                report.dropped += 1;
            }
        }

        self.jobs.lock().insert(
            requester_id.clone(),
            RunningJob {
                requester_id: requester_id.clone(),
                fragments,
            },
        );

        info!(
            requester = %requester_id,
            delivered = report.delivered,
            dropped = report.dropped,
            "Job dispatched"
        );
        report
    }

    /// Relay a worker's fragment result to its requester
    pub fn handle_result(
        &self,
        worker_id: &ConnectionId,
        requester_id: ConnectionId,
        payload: serde_json::Value,
    ) -> bool {
        let msg = OutboundMessage::JobExecutionResponse {
            requester_id: requester_id.clone(),
            worker_id: worker_id.clone(),
            payload,
        };
        self.registries.send(&requester_id, Role::Requester, msg)
    }

    /// Relay a worker's fragment failure to its requester
    pub fn handle_error(
        &self,
        worker_id: &ConnectionId,
        requester_id: ConnectionId,
        error: serde_json::Value,
    ) -> bool {
        let msg = OutboundMessage::JobExecutionError {
            requester_id: requester_id.clone(),
            worker_id: worker_id.clone(),
            error,
        };
        self.registries.send(&requester_id, Role::Requester, msg)
    }

    /// Decode a schedule packet and echo its canonical encoding to the sender
    pub fn relay_schedule(&self, sender_id: &ConnectionId, role: Role, packet: &str) -> Result<()> {
        let decoded: serde_json::Value = serde_json::from_str(packet)
            .map_err(|e| Error::malformed(format!("schedule packet is not JSON: {}", e)))?;
        let packet = serde_json::to_string(&decoded)?;

        self.registries
            .send(sender_id, role, OutboundMessage::ScheduleDataEcho { packet });
        Ok(())
    }

    pub fn running_job_count(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn running_job(&self, requester_id: &ConnectionId) -> Option<RunningJob> {
        self.jobs.lock().get(requester_id).cloned()
    }

    /// Drop the job entry of a departed requester
    pub fn forget_requester(&self, requester_id: &ConnectionId) -> Option<RunningJob> {
        let removed = self.jobs.lock().remove(requester_id);
        if removed.is_some() {
            debug!(requester = %requester_id, "Purged running job");
        }
        removed
    }
}
