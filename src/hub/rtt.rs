//! Round-trip time sampling
//!
//! One sample per connection: `Idle -> Sampling -> Sampled`. The result is
//! stored on the connection and broadcast to every requester.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::protocol::OutboundMessage;
use crate::registry::{Registries, RttState};
use crate::types::{ConnectionId, Role};

pub struct RttTracker {
    registries: Arc<Registries>,
}

impl RttTracker {
    pub fn new(registries: Arc<Registries>) -> Self {
        Self { registries }
    }

    /// Start sampling a freshly registered connection
    ///
    /// Returns false if the connection is unknown or already past `Idle`.
    pub fn begin(&self, id: &ConnectionId, role: Role) -> bool {
        let started = self
            .registries
            .of(role)
            .update(id, |conn| match conn.rtt {
                RttState::Idle => {
                    conn.rtt = RttState::Sampling {
                        begun_at: Instant::now(),
                    };
                    true
                }
                _ => false,
            })
            .unwrap_or(false);

        if started {
            self.registries
                .send(id, role, OutboundMessage::RttSampleRequest);
        }
        started
    }

    /// Finish the sample for `id` and broadcast it to all requesters
    ///
    /// A response that arrives while not sampling is ignored.
    pub fn complete(&self, id: &ConnectionId, role: Role) -> Option<u64> {
        let rtt_ms = self
            .registries
            .of(role)
            .update(id, |conn| match conn.rtt {
                RttState::Sampling { begun_at } => {
                    let rtt_ms = begun_at.elapsed().as_millis() as u64;
                    conn.rtt = RttState::Sampled { rtt_ms };
                    Some(rtt_ms)
                }
                _ => None,
            })
            .flatten();

        match rtt_ms {
            Some(rtt_ms) => {
                info!(conn_id = %id, role = %role, rtt_ms, "RTT sampled");
                self.registries.broadcast(
                    Role::Requester,
                    &OutboundMessage::RttBroadcast {
                        id: id.clone(),
                        rtt_ms,
                    },
                );
            }
            None => debug!(conn_id = %id, "Ignoring RTT response outside sampling"),
        }
        rtt_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Connection, Outbox};
    use crate::types::SysInfo;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn register(
        registries: &Registries,
        id: &str,
        role: Role,
    ) -> mpsc::Receiver<OutboundMessage> {
        let (outbox, rx) = Outbox::channel(8);
        registries
            .register(Connection::new(id.into(), role, SysInfo::default(), outbox))
            .unwrap();
        rx
    }

    #[tokio::test(start_paused = true)]
    async fn test_sample_measures_elapsed_time() {
        let registries = Arc::new(Registries::new());
        let mut wrx = register(&registries, "w1", Role::Worker);
        let mut rrx = register(&registries, "r1", Role::Requester);
        let tracker = RttTracker::new(Arc::clone(&registries));

        assert!(tracker.begin(&"w1".into(), Role::Worker));
        assert_eq!(wrx.try_recv().unwrap(), OutboundMessage::RttSampleRequest);

        tokio::time::advance(Duration::from_millis(40)).await;

        assert_eq!(tracker.complete(&"w1".into(), Role::Worker), Some(40));
        assert_eq!(
            rrx.try_recv().unwrap(),
            OutboundMessage::RttBroadcast {
                id: "w1".into(),
                rtt_ms: 40
            }
        );

        let conn = registries.lookup(&"w1".into(), Role::Worker).unwrap();
        assert_eq!(conn.rtt, RttState::Sampled { rtt_ms: 40 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_response_is_ignored() {
        let registries = Arc::new(Registries::new());
        let _wrx = register(&registries, "w1", Role::Worker);
        let mut rrx = register(&registries, "r1", Role::Requester);
        let tracker = RttTracker::new(Arc::clone(&registries));

        tracker.begin(&"w1".into(), Role::Worker);
        tokio::time::advance(Duration::from_millis(5)).await;
        assert_eq!(tracker.complete(&"w1".into(), Role::Worker), Some(5));
        assert!(rrx.try_recv().is_ok());

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(tracker.complete(&"w1".into(), Role::Worker), None);
        assert!(rrx.try_recv().is_err());

        let conn = registries.lookup(&"w1".into(), Role::Worker).unwrap();
        assert_eq!(conn.rtt.rtt_ms(), Some(5));
    }

    #[tokio::test]
    async fn test_response_before_sampling_is_ignored() {
        let registries = Arc::new(Registries::new());
        let _rrx = register(&registries, "r1", Role::Requester);
        let tracker = RttTracker::new(Arc::clone(&registries));

        assert_eq!(tracker.complete(&"r1".into(), Role::Requester), None);
        assert_eq!(tracker.complete(&"ghost".into(), Role::Requester), None);
        assert!(!tracker.begin(&"ghost".into(), Role::Worker));
    }

    #[tokio::test(start_paused = true)]
    async fn test_requester_rtt_reaches_requesters() {
        let registries = Arc::new(Registries::new());
        let mut r1 = register(&registries, "r1", Role::Requester);
        let mut r2 = register(&registries, "r2", Role::Requester);
        let tracker = RttTracker::new(Arc::clone(&registries));

        tracker.begin(&"r2".into(), Role::Requester);
        assert_eq!(r2.try_recv().unwrap(), OutboundMessage::RttSampleRequest);

        tokio::time::advance(Duration::from_millis(7)).await;
        tracker.complete(&"r2".into(), Role::Requester);

        let expected = OutboundMessage::RttBroadcast {
            id: "r2".into(),
            rtt_ms: 7,
        };
        assert_eq!(r1.try_recv().unwrap(), expected);
        assert_eq!(r2.try_recv().unwrap(), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_requester_misses_earlier_broadcast() {
        let registries = Arc::new(Registries::new());
        let _wrx = register(&registries, "w1", Role::Worker);
        let mut r1 = register(&registries, "r1", Role::Requester);
        let tracker = RttTracker::new(Arc::clone(&registries));

        tracker.begin(&"w1".into(), Role::Worker);
        tokio::time::advance(Duration::from_millis(9)).await;
        tracker.complete(&"w1".into(), Role::Worker);

        let mut r2 = register(&registries, "r2", Role::Requester);

        assert!(matches!(r1.try_recv(), Ok(OutboundMessage::RttBroadcast { .. })));
        assert!(r2.try_recv().is_err());
    }
}
