//! Per-connection state machine and close reasons.
//!
//! ```text
//! Connecting -> Authenticating -> Active -> Closing -> Closed
//!                      |                       ^
//!                      +-----------------------+  (credential rejected)
//! ```

use crate::error::{AuthErrorKind, DeliveryErrorKind, Error, ErrorKind};
use axum::extract::ws::CloseFrame;
use log::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport handshake in progress.
    Connecting,
    /// Handshake accepted, credential not yet verified.
    Authenticating,
    /// Registered; serving control frames and receiving published events.
    Active,
    /// Being removed from the registry and channel index.
    Closing,
    /// Terminal.
    Closed,
}

impl ConnectionState {
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Connecting, Authenticating)
                | (Authenticating, Active)
                | (Authenticating, Closing)
                | (Active, Closing)
                | (Closing, Closed)
        )
    }
}

/// Tracks one connection through its states, refusing illegal transitions.
#[derive(Debug)]
pub struct Lifecycle {
    state: ConnectionState,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Connecting,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Move to `next`. Returns `false` and leaves the state untouched if the
    /// transition is not part of the state machine.
    pub fn advance(&mut self, next: ConnectionState) -> bool {
        if self.state.can_transition_to(next) {
            trace!("Connection state {:?} -> {:?}", self.state, next);
            self.state = next;
            true
        } else {
            warn!(
                "Ignoring illegal connection state transition {:?} -> {:?}",
                self.state, next
            );
            false
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a connection left the `Active` state (or never reached it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    MissingCredential,
    InvalidCredential,
    MissingSubject,
    RegistryExhausted,
    ClientClosed,
    TransportError,
    SlowConsumer,
    ServerShutdown,
}

pub const CLOSE_UNAUTHORIZED: u16 = 4001;
pub const CLOSE_SLOW_CONSUMER: u16 = 4008;
pub const CLOSE_GOING_AWAY: u16 = 1001;
pub const CLOSE_TRY_AGAIN_LATER: u16 = 1013;

impl CloseReason {
    /// Close code sent to the client, if the hub sends a close frame at all.
    /// Client-initiated and transport-level closes get none: the peer is gone.
    pub fn code(&self) -> Option<u16> {
        match self {
            CloseReason::MissingCredential
            | CloseReason::InvalidCredential
            | CloseReason::MissingSubject => Some(CLOSE_UNAUTHORIZED),
            CloseReason::SlowConsumer => Some(CLOSE_SLOW_CONSUMER),
            CloseReason::RegistryExhausted => Some(CLOSE_TRY_AGAIN_LATER),
            CloseReason::ServerShutdown => Some(CLOSE_GOING_AWAY),
            CloseReason::ClientClosed | CloseReason::TransportError => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CloseReason::MissingCredential => "Missing token",
            CloseReason::InvalidCredential => "Invalid token",
            CloseReason::MissingSubject => "Invalid token: missing user ID",
            CloseReason::RegistryExhausted => "Server at connection capacity",
            CloseReason::ClientClosed => "Client closed connection",
            CloseReason::TransportError => "Transport error",
            CloseReason::SlowConsumer => "Slow consumer",
            CloseReason::ServerShutdown => "Server shutting down",
        }
    }

    pub fn close_frame(&self) -> Option<CloseFrame> {
        self.code().map(|code| CloseFrame {
            code,
            reason: self.description().into(),
        })
    }
}

impl From<&AuthErrorKind> for CloseReason {
    fn from(kind: &AuthErrorKind) -> Self {
        match kind {
            AuthErrorKind::MissingCredential => CloseReason::MissingCredential,
            AuthErrorKind::InvalidCredential => CloseReason::InvalidCredential,
            AuthErrorKind::MissingSubject => CloseReason::MissingSubject,
        }
    }
}

impl CloseReason {
    /// Teardown reason for a frame that could not be queued: a full queue marks a
    /// slow consumer, anything else a transport that is already gone.
    pub(crate) fn for_delivery_error(error: &Error) -> Self {
        match error.kind() {
            ErrorKind::Delivery(DeliveryErrorKind::QueueFull) => CloseReason::SlowConsumer,
            _ => CloseReason::TransportError,
        }
    }
}
