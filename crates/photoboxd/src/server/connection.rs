//! Connection handler for individual WebSocket clients.
//!
//! Each client connection gets its own `ConnectionHandler` that:
//! - Completes the WebSocket handshake and registers the session
//! - Runs a writer task draining the session's outbound queue
//! - Decodes action requests and dispatches them one at a time
//! - Deregisters the session when the socket or the hub closes it
//!
//! # Panic-Free Guarantees
//!
//! This module follows the crate's panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Connection errors are logged and result in graceful disconnect

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{accept_async_with_config, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use photobox_core::SessionId;
use photobox_protocol::{decode_action, Event};

use super::dispatch::ActionDispatcher;
use crate::registry::{Frame, RegistryError, SessionHandle, SessionRegistry};

/// Largest text frame accepted as an action (print payloads carry a full image)
const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Largest frame or message the socket reads before dropping the connection.
///
/// Anything between `MAX_MESSAGE_SIZE` and this is read, logged and ignored.
const TRANSPORT_LIMIT: usize = 4 * MAX_MESSAGE_SIZE;

/// Upper bound for writing one frame to the socket
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound for the closing handshake once the session is closed
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Connection handler for a single client.
pub struct ConnectionHandler {
    stream: TcpStream,
    peer: SocketAddr,
    session_id: SessionId,
    registry: Arc<SessionRegistry>,
    dispatcher: Arc<ActionDispatcher>,
    events: mpsc::Sender<Event>,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - Accepted TCP stream, before the WebSocket handshake
    /// * `peer` - Remote address, for logging
    /// * `connection_number` - Unique number used to name the session
    /// * `registry` - Registry the session joins while open
    /// * `dispatcher` - Runs the session's actions
    /// * `events` - Hub event queue feeding the broadcaster
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        connection_number: u64,
        registry: Arc<SessionRegistry>,
        dispatcher: Arc<ActionDispatcher>,
        events: mpsc::Sender<Event>,
    ) -> Self {
        Self {
            stream,
            peer,
            session_id: SessionId::from_connection(connection_number),
            registry,
            dispatcher,
            events,
        }
    }

    /// Runs the connection until the client leaves or the hub closes it.
    ///
    /// The session is in the registry exactly while this runs past the
    /// handshake.
    pub async fn run(self) -> Result<(), ConnectionError> {
        let ws = accept_async_with_config(self.stream, Some(socket_config()))
            .await
            .map_err(ConnectionError::Handshake)?;

        let (session, outbound) = SessionHandle::channel(self.session_id.clone(), Some(self.peer));
        self.registry.add(session.clone()).await?;
        info!(session_id = %self.session_id, peer = %self.peer, "Client connected");

        let (sink, mut incoming) = ws.split();
        let close = session.close_token();
        let writer = tokio::spawn(write_frames(
            sink,
            outbound,
            close.clone(),
            self.session_id.clone(),
        ));

        let result = loop {
            let message = tokio::select! {
                _ = close.cancelled() => {
                    debug!(session_id = %self.session_id, "Session closed by hub");
                    break Ok(());
                }
                message = incoming.next() => message,
            };

            match message {
                None => break Ok(()),
                Some(Err(e)) => break Err(ConnectionError::Read(e)),
                Some(Ok(Message::Text(text))) => {
                    handle_text(
                        &self.session_id,
                        text.as_str(),
                        &self.dispatcher,
                        &self.events,
                    )
                    .await;
                }
                Some(Ok(Message::Binary(data))) => {
                    warn!(
                        session_id = %self.session_id,
                        bytes = data.len(),
                        "Ignoring binary frame"
                    );
                }
                Some(Ok(Message::Close(_))) => break Ok(()),
                // Ping/pong replies are handled by tungstenite.
                Some(Ok(_)) => {}
            }
        };

        if self.registry.remove(&self.session_id).await.is_some() {
            debug!(session_id = %self.session_id, "Session deregistered");
        }
        session.close();
        if let Err(e) = writer.await {
            warn!(session_id = %self.session_id, error = %e, "Writer task failed");
        }

        let connected_for = Utc::now() - session.connected_at();
        info!(
            session_id = %self.session_id,
            peer = ?session.peer(),
            connected_secs = connected_for.num_seconds(),
            "Client disconnected"
        );
        result
    }
}

fn socket_config() -> WebSocketConfig {
    WebSocketConfig::default()
        .max_message_size(Some(TRANSPORT_LIMIT))
        .max_frame_size(Some(TRANSPORT_LIMIT))
}

/// Decodes one text frame and dispatches the action it carries.
///
/// Malformed requests are logged and ignored; the session stays open.
async fn handle_text(
    session_id: &SessionId,
    text: &str,
    dispatcher: &ActionDispatcher,
    events: &mpsc::Sender<Event>,
) {
    if text.len() > MAX_MESSAGE_SIZE {
        warn!(
            session_id = %session_id,
            bytes = text.len(),
            max = MAX_MESSAGE_SIZE,
            "Ignoring oversized message"
        );
        return;
    }

    let action = match decode_action(text) {
        Ok(action) => action,
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "Ignoring malformed message");
            return;
        }
    };

    if let Some(event) = dispatcher.dispatch(session_id, action).await {
        if events.send(event).await.is_err() {
            debug!(session_id = %session_id, "Event queue closed, dropping event");
        }
    }
}

/// Drains the session's outbound queue onto the socket.
///
/// A write failure or timeout cancels `close`, which ends the read loop.
/// A write still pending when the session is closed is abandoned.
async fn write_frames(
    mut sink: WsSink,
    mut outbound: mpsc::Receiver<Frame>,
    close: CancellationToken,
    session_id: SessionId,
) {
    loop {
        let frame = tokio::select! {
            _ = close.cancelled() => break,
            frame = outbound.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        let sent = tokio::select! {
            _ = close.cancelled() => break,
            sent = timeout(WRITE_TIMEOUT, sink.send(Message::Text(frame))) => sent,
        };

        match sent {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(session_id = %session_id, error = %e, "Write failed, closing session");
                close.cancel();
                break;
            }
            Err(_) => {
                warn!(session_id = %session_id, "Write timed out, closing session");
                close.cancel();
                break;
            }
        }
    }

    match timeout(CLOSE_TIMEOUT, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            debug!(session_id = %session_id, error = %e, "Failed to close socket cleanly");
        }
        Err(_) => debug!(session_id = %session_id, "Peer not reading, dropping socket"),
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("WebSocket handshake failed: {0}")]
    Handshake(#[source] tungstenite::Error),

    #[error("Read error: {0}")]
    Read(#[source] tungstenite::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_display() {
        let err = ConnectionError::Registry(RegistryError::AlreadyRegistered(
            SessionId::from_connection(3),
        ));
        assert!(err.to_string().contains("client-3"));
    }

    #[test]
    fn test_limits() {
        assert_eq!(MAX_MESSAGE_SIZE, 16_777_216);
        assert!(WRITE_TIMEOUT >= Duration::from_secs(1));
        assert!(CLOSE_TIMEOUT <= WRITE_TIMEOUT);
    }

    #[test]
    fn test_socket_reads_past_action_limit() {
        let config = socket_config();
        assert_eq!(config.max_frame_size, Some(TRANSPORT_LIMIT));
        assert_eq!(config.max_message_size, Some(TRANSPORT_LIMIT));
        assert!(TRANSPORT_LIMIT > MAX_MESSAGE_SIZE);
    }
}
