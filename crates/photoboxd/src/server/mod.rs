//! WebSocket hub for photo station clients.
//!
//! The hub:
//! - Listens on TCP and upgrades each connection to WebSocket
//! - Spawns a ConnectionHandler for each client
//! - Funnels action outcomes and hardware signals into one event queue
//! - Broadcasts every event to all sessions from a single task
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │       Hub       │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐ dispatch ┌──────────────────┐
//! │ConnectionHandler│─────────▶│ ActionDispatcher │──▶ DeviceOperations
//! │  (per session)  │          └────────┬─────────┘
//! └─────────────────┘                   │ Event
//!                                       ▼
//! ┌─────────────────┐  Event   ┌──────────────────┐   ┌─────────────────┐
//! │ Interrupt poller│─────────▶│   event queue    │──▶│   Broadcaster   │──▶ all sessions
//! └─────────────────┘          └──────────────────┘   └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the crate's panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Server errors are logged and allow continued operation

mod connection;
mod dispatch;

pub use connection::{ConnectionError, ConnectionHandler};
pub use dispatch::ActionDispatcher;

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use photobox_protocol::Event;

use crate::config::DEFAULT_PORT;
use crate::device::DeviceOperations;
use crate::interrupt::{
    spawn_interrupt_poller, InterruptBridge, InterruptProducer, DEFAULT_POLL_INTERVAL,
};
use crate::registry::{Broadcaster, SessionRegistry, SEND_TIMEOUT};

/// Default listen address (all interfaces, port 6789)
pub const DEFAULT_LISTEN: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT);

/// Capacity of the hub event queue
const EVENT_BUFFER: usize = 100;

/// The photo station hub.
///
/// Owns the listener, the session registry and the interrupt bridge.
pub struct Hub {
    /// Bound TCP listener
    listener: TcpListener,

    /// Currently connected sessions
    registry: Arc<SessionRegistry>,

    /// Shared action dispatcher (holds the camera lock)
    dispatcher: Arc<ActionDispatcher>,

    /// Consumer side of the hardware interrupt queue
    bridge: InterruptBridge,

    /// Interval between interrupt queue drains
    poll_interval: Duration,

    /// Per-session broadcast send timeout
    send_timeout: Duration,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter for generating session IDs
    connection_counter: AtomicU64,
}

impl Hub {
    /// Binds the hub to `addr`.
    ///
    /// # Arguments
    ///
    /// * `addr` - Address to listen on; port 0 picks a free port
    /// * `devices` - Device operations backing the actions
    /// * `cancel_token` - Token for graceful shutdown
    pub async fn bind(
        addr: SocketAddr,
        devices: DeviceOperations,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        Ok(Self {
            listener,
            registry: Arc::new(SessionRegistry::new()),
            dispatcher: Arc::new(ActionDispatcher::new(Arc::new(devices))),
            bridge: InterruptBridge::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            send_timeout: SEND_TIMEOUT,
            cancel_token,
            connection_counter: AtomicU64::new(0),
        })
    }

    /// Overrides the interrupt poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Overrides the per-session broadcast send timeout.
    #[must_use]
    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// Returns the address the hub is listening on.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(ServerError::LocalAddr)
    }

    /// Returns a producer for hardware signals.
    ///
    /// Safe to hand to interrupt callbacks on other threads.
    pub fn interrupts(&self) -> InterruptProducer {
        self.bridge.producer()
    }

    /// Returns the session registry.
    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Runs the hub.
    ///
    /// Accepts connections until the cancellation token is triggered.
    /// This method does not return until shutdown.
    pub async fn run(self) -> Result<(), ServerError> {
        let Self {
            listener,
            registry,
            dispatcher,
            bridge,
            poll_interval,
            send_timeout,
            cancel_token,
            connection_counter,
        } = self;

        if let Ok(addr) = listener.local_addr() {
            info!(addr = %addr, "Hub listening");
        }

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let broadcaster =
            Broadcaster::new(Arc::clone(&registry)).with_send_timeout(send_timeout);
        let dispatch_task = spawn_event_dispatcher(broadcaster, events_rx, cancel_token.clone());
        let poller = spawn_interrupt_poller(
            bridge,
            events_tx.clone(),
            poll_interval,
            cancel_token.clone(),
        );

        // Accept connections until cancelled
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    info!("Hub shutdown requested");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let conn_num = connection_counter.fetch_add(1, Ordering::Relaxed);
                            let handler = ConnectionHandler::new(
                                stream,
                                peer,
                                conn_num,
                                Arc::clone(&registry),
                                Arc::clone(&dispatcher),
                                events_tx.clone(),
                            );
                            tokio::spawn(async move {
                                if let Err(e) = handler.run().await {
                                    debug!(peer = %peer, error = %e, "Connection ended with error");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            // Continue accepting other connections
                        }
                    }
                }
            }
        }

        // Cleanup
        for session in registry.snapshot().await {
            session.close();
        }
        drop(events_tx);
        for task in [dispatch_task, poller] {
            if let Err(e) = task.await {
                error!(error = %e, "Hub task failed");
            }
        }
        info!("Hub cleanup complete");
        Ok(())
    }
}

/// Spawns the single task that broadcasts queued events in order.
fn spawn_event_dispatcher(
    broadcaster: Broadcaster,
    mut events: mpsc::Receiver<Event>,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    debug!("Event dispatcher shutting down");
                    break;
                }

                event = events.recv() => match event {
                    Some(event) => {
                        broadcaster.broadcast(&event).await;
                    }
                    None => {
                        debug!("Event queue closed");
                        break;
                    }
                },
            }
        }
    })
}

/// Errors that can occur in hub operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read local address: {0}")]
    LocalAddr(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_listen() {
        assert_eq!(DEFAULT_LISTEN.port(), 6789);
        assert!(DEFAULT_LISTEN.ip().is_unspecified());
    }

    #[test]
    fn test_server_error_display() {
        let err = ServerError::Bind {
            addr: DEFAULT_LISTEN,
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(err.to_string().contains("0.0.0.0:6789"));
        assert!(err.to_string().contains("in use"));
    }
}
