//! Handle to one connected client session.
//!
//! A `SessionHandle` is what the registry stores and the broadcaster writes
//! to. It owns no socket: frames go into a bounded queue drained by the
//! session's writer task, so a handle is cheap to clone into a snapshot.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio_tungstenite::tungstenite::Utf8Bytes;
use tokio_util::sync::CancellationToken;

use photobox_core::SessionId;

/// Per-session outbound queue depth.
pub const OUTBOUND_BUFFER: usize = 32;

/// A serialized event, shared between every session of one broadcast.
///
/// Clones share one buffer, and the writer hands it to the socket as is.
pub type Frame = Utf8Bytes;

/// Handle to a connected client.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    peer: Option<SocketAddr>,
    connected_at: DateTime<Utc>,
    outbound: mpsc::Sender<Frame>,
    close: CancellationToken,
}

impl SessionHandle {
    /// Creates a handle around an existing outbound queue.
    pub fn new(id: SessionId, peer: Option<SocketAddr>, outbound: mpsc::Sender<Frame>) -> Self {
        Self {
            id,
            peer,
            connected_at: Utc::now(),
            outbound,
            close: CancellationToken::new(),
        }
    }

    /// Creates a handle together with the receiving end of its queue.
    pub fn channel(id: SessionId, peer: Option<SocketAddr>) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        (Self::new(id, peer, tx), rx)
    }

    /// Returns the session ID.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Returns the remote address, if known.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Returns when the session connected.
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Queues a frame for delivery, waiting at most `limit` for room.
    pub async fn send(&self, frame: Frame, limit: Duration) -> Result<(), DeliveryError> {
        self.outbound
            .send_timeout(frame, limit)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => DeliveryError::Timeout,
                SendTimeoutError::Closed(_) => DeliveryError::Closed,
            })
    }

    /// Asks the connection owning this session to shut down.
    pub fn close(&self) {
        self.close.cancel();
    }

    /// Returns true once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.close.is_cancelled()
    }

    /// Token cancelled when the session is closed.
    pub fn close_token(&self) -> CancellationToken {
        self.close.clone()
    }
}

/// Why a frame could not be handed to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("session queue closed")]
    Closed,

    #[error("session queue full (peer too slow)")]
    Timeout,
}
