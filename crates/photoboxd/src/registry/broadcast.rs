//! Event fan-out to every registered session.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, error, warn};

use photobox_core::SessionId;
use photobox_protocol::Event;

use super::{Frame, SessionRegistry};

/// How long a single session may block a broadcast before it is evicted.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of one broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sessions the event was queued for
    pub delivered: usize,

    /// Sessions removed because delivery failed
    pub evicted: Vec<SessionId>,
}

/// Delivers events to every session in the registry.
///
/// Each broadcast serializes the event once, sends to all sessions of one
/// snapshot concurrently, then removes the sessions that failed. A closed
/// or stalled session never holds up delivery to the others.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<SessionRegistry>,
    send_timeout: Duration,
}

impl Broadcaster {
    /// Creates a broadcaster over `registry` with the default send timeout.
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            registry,
            send_timeout: SEND_TIMEOUT,
        }
    }

    /// Overrides the per-session send timeout.
    #[must_use]
    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// Broadcasts `event` to every registered session.
    pub async fn broadcast(&self, event: &Event) -> BroadcastReport {
        let sessions = self.registry.snapshot().await;
        if sessions.is_empty() {
            debug!(event = event.name(), "No sessions, dropping event");
            return BroadcastReport::default();
        }

        let frame: Frame = match serde_json::to_string(event) {
            Ok(json) => Frame::from(json),
            Err(e) => {
                error!(event = event.name(), error = %e, "Failed to serialize event");
                return BroadcastReport::default();
            }
        };

        let sends = sessions
            .iter()
            .map(|session| session.send(frame.clone(), self.send_timeout));
        let results = join_all(sends).await;

        let mut report = BroadcastReport::default();
        for (session, result) in sessions.iter().zip(results) {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(
                        session_id = %session.id(),
                        event = event.name(),
                        error = %e,
                        "Failed to deliver event, evicting session"
                    );
                    report.evicted.push(session.id().clone());
                }
            }
        }

        // Snapshot is released; now clean up without racing the fan-out.
        for session_id in &report.evicted {
            if let Some(session) = self.registry.remove(session_id).await {
                session.close();
            }
        }

        debug!(
            event = event.name(),
            delivered = report.delivered,
            evicted = report.evicted.len(),
            "Broadcast complete"
        );
        report
    }
}
