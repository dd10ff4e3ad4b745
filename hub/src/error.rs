//! Error types for the `hub` crate.
//!
//! Follows the same pattern as the other crates in the workspace: a root `Error`
//! struct holding an `error_kind` tree and an optional `source` for chaining.
//! Every kind is scoped to a single connection or a single publish call.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for the hub.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Auth(AuthErrorKind),
    Registry(RegistryErrorKind),
    Protocol(ProtocolErrorKind),
    Delivery(DeliveryErrorKind),
}

/// Errors raised while admitting a connection. Fatal to the connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthErrorKind {
    MissingCredential,
    InvalidCredential,
    MissingSubject,
}

/// Errors from the connection registry. Fatal to the caller attempting to register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryErrorKind {
    IdSpaceExhausted,
}

/// Errors from parsing inbound control frames. Reported to the sender, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolErrorKind {
    Malformed,
    UnknownEvent(String),
}

/// Errors from pushing a frame onto a connection's outbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryErrorKind {
    QueueFull,
    Closed,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Auth(kind) => write!(f, "Authentication error: {kind:?}"),
            ErrorKind::Registry(kind) => write!(f, "Registry error: {kind:?}"),
            ErrorKind::Protocol(ProtocolErrorKind::UnknownEvent(event)) => {
                write!(f, "Unknown event: {event}")
            }
            ErrorKind::Protocol(ProtocolErrorKind::Malformed) => match &self.source {
                Some(source) => write!(f, "Malformed message: {source}"),
                None => write!(f, "Malformed message"),
            },
            ErrorKind::Delivery(kind) => write!(f, "Delivery error: {kind:?}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Protocol(ProtocolErrorKind::Malformed),
        }
    }
}

/// Helper function to create authentication errors.
pub fn auth_error(kind: AuthErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Auth(kind),
    }
}

/// Helper function to create malformed-frame errors.
pub fn malformed(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Protocol(ProtocolErrorKind::Malformed),
    }
}
