//! Outbound events written to the browser.
//!
//! Contract:
//! - A session emits 0..n `Text` events followed by exactly one terminal event,
//!   `Done` or `Error`.
//! - After a terminal event, no further events are emitted and the connection closes.
//!
//! Each event is framed as a single server-sent event: `data: <json>\n\n`.

use serde::ser::{Serialize, SerializeMap, Serializer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    /// Partial assistant text.
    Text(String),
    /// Upstream finished normally.
    Done,
    /// Session failed; carries the client-facing message only.
    Error(String),
}

impl OutboundEvent {
    /// Returns true if this event terminates the session (`Done` or `Error`).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error(_))
    }

    /// Convenience accessor for `Text` contents.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// The complete SSE frame for this event.
    pub fn to_sse_frame(&self) -> String {
        // Serializing a one-entry map of a string or bool cannot fail.
        let json = serde_json::to_string(self).unwrap_or_default();
        format!("data: {json}\n\n")
    }
}

impl Serialize for OutboundEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Self::Text(text) => map.serialize_entry("text", text)?,
            Self::Done => map.serialize_entry("done", &true)?,
            Self::Error(msg) => map.serialize_entry("error", msg)?,
        }
        map.end()
    }
}

/// Boxed stream of outbound events, as produced by a relay session.
pub type BoxEventStream = futures::stream::BoxStream<'static, OutboundEvent>;
