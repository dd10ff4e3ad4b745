//! Wire format of the hub.
//!
//! Client to hub:
//! `{"event": "subscribe" | "unsubscribe", "channels": [string, ...]}`
//!
//! Hub to client: acknowledgements, error frames and one data frame per publish,
//! see [`ServerMessage`].

use crate::error::{malformed, Error, ErrorKind, ProtocolErrorKind};
use axum::extract::ws::Utf8Bytes;
use serde::Serialize;
use serde_json::{Map, Value};

/// Inbound control frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Subscribe { channels: Vec<String> },
    Unsubscribe { channels: Vec<String> },
}

impl ClientMessage {
    /// Parse a text frame. `channels` defaults to an empty list; duplicates are
    /// collapsed keeping first-seen order.
    pub fn parse(text: &str, max_channels: usize) -> Result<Self, Error> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(object) = value else {
            return Err(malformed("expected a JSON object"));
        };

        let event = match object.get("event") {
            Some(Value::String(event)) => event.as_str(),
            None | Some(Value::Null) => return Err(unknown_event("None".to_string())),
            Some(other) => return Err(unknown_event(other.to_string())),
        };

        match event {
            "subscribe" => Ok(ClientMessage::Subscribe {
                channels: parse_channels(&object, max_channels)?,
            }),
            "unsubscribe" => Ok(ClientMessage::Unsubscribe {
                channels: parse_channels(&object, max_channels)?,
            }),
            other => Err(unknown_event(other.to_string())),
        }
    }
}

fn unknown_event(event: String) -> Error {
    Error {
        source: None,
        error_kind: ErrorKind::Protocol(ProtocolErrorKind::UnknownEvent(event)),
    }
}

fn parse_channels(object: &Map<String, Value>, max_channels: usize) -> Result<Vec<String>, Error> {
    let entries = match object.get("channels") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(entries)) => entries,
        Some(_) => return Err(malformed("channels must be a list of strings")),
    };

    if entries.len() > max_channels {
        return Err(malformed(&format!(
            "at most {max_channels} channels per message"
        )));
    }

    let mut channels: Vec<String> = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry {
            Value::String(name) => {
                if !channels.contains(name) {
                    channels.push(name.clone());
                }
            }
            _ => return Err(malformed("channels must be strings")),
        }
    }
    Ok(channels)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AckEvent {
    Subscribed,
    Unsubscribed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Outbound frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Ack {
        event: AckEvent,
        channels: Vec<String>,
        status: Status,
    },
    Error {
        event: &'static str,
        message: String,
        status: Status,
    },
    Event {
        event: String,
        data: Value,
    },
}

impl ServerMessage {
    pub fn subscribed(channels: Vec<String>) -> Self {
        ServerMessage::Ack {
            event: AckEvent::Subscribed,
            channels,
            status: Status::Success,
        }
    }

    pub fn unsubscribed(channels: Vec<String>) -> Self {
        ServerMessage::Ack {
            event: AckEvent::Unsubscribed,
            channels,
            status: Status::Success,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            event: "error",
            message: message.into(),
            status: Status::Error,
        }
    }

    /// Data frame: the event name is the channel the payload was published on.
    pub fn event(channel: &str, data: Value) -> Self {
        ServerMessage::Event {
            event: channel.to_string(),
            data,
        }
    }

    pub fn to_frame(&self) -> Result<Utf8Bytes, Error> {
        Ok(serde_json::to_string(self)?.into())
    }
}
