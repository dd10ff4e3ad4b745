//! Serves one client connection from handshake to teardown.
//!
//! The session owns both halves of the transport. The read half stays on the
//! session's own task and handles control frames; the write half moves to a
//! dedicated sender task that drains the connection's bounded outbound queue,
//! so publishers only ever push onto a queue and never wait on a socket.

use crate::auth::{TokenVerifier, UserId};
use crate::connection::Connection;
use crate::error::{Error, ErrorKind};
use crate::lifecycle::{CloseReason, ConnectionState, Lifecycle};
use crate::message::{ClientMessage, ServerMessage};
use crate::Manager;
use axum::extract::ws::{Message, Utf8Bytes};
use futures::{Sink, SinkExt, Stream, StreamExt};
use log::*;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant, Interval};

/// Tunables for every session served by a `SessionContext`.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Frames a connection may have queued before it is treated as a slow consumer.
    pub outbound_queue_capacity: usize,
    /// Upper bound on a single transport write.
    pub send_timeout: Duration,
    /// Interval between server Ping frames; `None` disables them.
    pub heartbeat_interval: Option<Duration>,
    /// Largest channel list accepted in one subscribe/unsubscribe frame.
    pub max_channels_per_message: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: 64,
            send_timeout: Duration::from_secs(10),
            heartbeat_interval: Some(Duration::from_secs(30)),
            max_channels_per_message: 64,
        }
    }
}

/// Everything a session needs, shared by all sessions of a server.
#[derive(Clone)]
pub struct SessionContext {
    manager: Arc<Manager>,
    verifier: Arc<dyn TokenVerifier>,
    settings: SessionSettings,
}

impl SessionContext {
    pub fn new(
        manager: Arc<Manager>,
        verifier: Arc<dyn TokenVerifier>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            manager,
            verifier,
            settings,
        }
    }

    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Run one connection whose transport handshake has already been accepted.
    /// Returns once the connection is closed and removed from the hub.
    pub async fn run<W, R, E>(
        &self,
        mut ws_tx: W,
        mut ws_rx: R,
        credential: Option<String>,
    ) -> CloseReason
    where
        W: Sink<Message> + Unpin + Send + 'static,
        W::Error: Display,
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        let mut lifecycle = Lifecycle::new();
        lifecycle.advance(ConnectionState::Authenticating);

        let user_id = match self.authenticate(credential.as_deref()) {
            Ok(user_id) => user_id,
            Err(reason) => {
                lifecycle.advance(ConnectionState::Closing);
                send_close(&mut ws_tx, reason, self.settings.send_timeout).await;
                lifecycle.advance(ConnectionState::Closed);
                return reason;
            }
        };

        let (tx, rx) = mpsc::channel(self.settings.outbound_queue_capacity);
        let connection = match self.manager.register_connection(user_id, tx) {
            Ok(connection) => connection,
            Err(e) => {
                error!("Failed to register connection: {e}");
                let reason = CloseReason::RegistryExhausted;
                lifecycle.advance(ConnectionState::Closing);
                send_close(&mut ws_tx, reason, self.settings.send_timeout).await;
                lifecycle.advance(ConnectionState::Closed);
                return reason;
            }
        };
        lifecycle.advance(ConnectionState::Active);

        let sender = tokio::spawn(forward_outbound(
            ws_tx,
            rx,
            Arc::clone(&connection),
            Arc::clone(&self.manager),
            self.settings.clone(),
        ));

        let reason = self.serve(&mut ws_rx, &connection).await;

        lifecycle.advance(ConnectionState::Closing);
        self.manager.disconnect(&connection.id(), reason);
        if let Err(e) = sender.await {
            warn!("Sender task for connection {} failed: {e}", connection.id());
        }
        lifecycle.advance(ConnectionState::Closed);

        connection.close_reason().unwrap_or(reason)
    }

    fn authenticate(&self, credential: Option<&str>) -> Result<UserId, CloseReason> {
        let Some(credential) = credential.filter(|c| !c.is_empty()) else {
            warn!("Rejecting connection without a token");
            return Err(CloseReason::MissingCredential);
        };

        self.verifier.verify(credential).map_err(|e| {
            warn!("WebSocket authentication failed: {e}");
            match e.kind() {
                ErrorKind::Auth(kind) => CloseReason::from(kind),
                _ => CloseReason::InvalidCredential,
            }
        })
    }

    /// Read loop. Ends on client close, transport error, or teardown requested
    /// elsewhere (a failed delivery, server shutdown).
    async fn serve<R, E>(&self, ws_rx: &mut R, connection: &Connection) -> CloseReason
    where
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        loop {
            tokio::select! {
                biased;

                reason = connection.closed() => return reason,

                frame = ws_rx.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.handle_text(connection, text.as_str()),
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => self.handle_text(connection, text),
                        Err(_) => self.reply(
                            connection,
                            ServerMessage::error("Binary frames must contain UTF-8 JSON"),
                        ),
                    },
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => return CloseReason::ClientClosed,
                    Some(Err(e)) => {
                        debug!("WebSocket error for connection {}: {e}", connection.id());
                        return CloseReason::TransportError;
                    }
                },
            }
        }
    }

    fn handle_text(&self, connection: &Connection, text: &str) {
        let message = match ClientMessage::parse(text, self.settings.max_channels_per_message) {
            Ok(message) => message,
            Err(e) => return self.reply_error(connection, e),
        };

        let reply = match message {
            ClientMessage::Subscribe { channels } => {
                if self.manager.subscribe(&connection.id(), &channels).is_none() {
                    return;
                }
                ServerMessage::subscribed(channels)
            }
            ClientMessage::Unsubscribe { channels } => {
                if self.manager.unsubscribe(&connection.id(), &channels).is_none() {
                    return;
                }
                ServerMessage::unsubscribed(channels)
            }
        };
        self.reply(connection, reply);
    }

    fn reply_error(&self, connection: &Connection, error: Error) {
        debug!("Rejected frame from connection {}: {error}", connection.id());
        self.reply(connection, ServerMessage::error(error.to_string()));
    }

    /// Acknowledgements share the outbound queue with published events, so a
    /// client sees them in the order they were produced.
    fn reply(&self, connection: &Connection, message: ServerMessage) {
        let frame = match message.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to serialize reply: {e}");
                return;
            }
        };

        if let Err(e) = connection.deliver(frame) {
            warn!(
                "Failed to queue reply for connection {}: {e}. Connection will be closed.",
                connection.id()
            );
            self.manager
                .disconnect(&connection.id(), CloseReason::for_delivery_error(&e));
        }
    }
}

/// Sender task: drains the outbound queue onto the transport and sends
/// heartbeat pings until the connection is closed. Frames still queued at that
/// point are discarded.
async fn forward_outbound<W>(
    mut ws_tx: W,
    mut rx: mpsc::Receiver<Utf8Bytes>,
    connection: Arc<Connection>,
    manager: Arc<Manager>,
    settings: SessionSettings,
) where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    let mut heartbeat = settings
        .heartbeat_interval
        .map(|period| interval_at(Instant::now() + period, period));

    loop {
        let outcome = tokio::select! {
            biased;

            reason = connection.closed() => {
                send_close(&mut ws_tx, reason, settings.send_timeout).await;
                break;
            }

            frame = rx.recv() => match frame {
                Some(frame) => timeout(settings.send_timeout, ws_tx.send(Message::Text(frame))).await,
                None => break,
            },

            _ = tick(&mut heartbeat) => {
                timeout(settings.send_timeout, ws_tx.send(Message::Ping(Default::default()))).await
            }
        };

        let reason = match outcome {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => {
                debug!("Write to connection {} failed: {e}", connection.id());
                CloseReason::TransportError
            }
            Err(_) => {
                warn!(
                    "Write to connection {} timed out after {:?}",
                    connection.id(),
                    settings.send_timeout
                );
                CloseReason::SlowConsumer
            }
        };
        manager.disconnect(&connection.id(), reason);
    }
}

async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn send_close<W>(ws_tx: &mut W, reason: CloseReason, send_timeout: Duration)
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    // No frame of our own: flush the transport so a close reply already queued
    // for the peer still goes out.
    let Some(frame) = reason.close_frame() else {
        if let Ok(Err(e)) = timeout(send_timeout, ws_tx.close()).await {
            debug!("Failed to close transport ({}): {e}", reason.description());
        }
        return;
    };

    match timeout(send_timeout, ws_tx.send(Message::Close(Some(frame)))).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("Failed to send close frame ({}): {e}", reason.description()),
        Err(_) => debug!("Timed out sending close frame ({})", reason.description()),
    }
}
