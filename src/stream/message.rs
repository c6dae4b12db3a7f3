//! Field packets and stream messages
//!
//! A [`StreamMessage`] is the parsed form of one raw chunk received from a
//! server-sent event stream, stamped with the moment it arrived.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal payload some OpenAI-compatible servers send after the last token.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Name of a field within an event-stream line
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    /// `data:` payload line
    Data,
    /// `event:` type line
    Event,
    /// `id:` line
    Id,
    /// `retry:` reconnection delay line
    Retry,
    /// Line starting with `:`
    Comment,
    /// Any other field name, kept verbatim (trimmed, case preserved)
    Other(String),
}

impl FieldName {
    /// Map a raw field name onto a canonical token.
    ///
    /// `data`, `event`, `id` and `retry` match case-insensitively. Comments are
    /// never produced here; they are recognised from the line prefix.
    pub fn from_raw(name: &str) -> Self {
        if name.eq_ignore_ascii_case("data") {
            FieldName::Data
        } else if name.eq_ignore_ascii_case("event") {
            FieldName::Event
        } else if name.eq_ignore_ascii_case("id") {
            FieldName::Id
        } else if name.eq_ignore_ascii_case("retry") {
            FieldName::Retry
        } else {
            FieldName::Other(name.to_string())
        }
    }

    /// Display form of the name
    pub fn as_str(&self) -> &str {
        match self {
            FieldName::Data => "data",
            FieldName::Event => "event",
            FieldName::Id => "id",
            FieldName::Retry => "retry",
            FieldName::Comment => "comment",
            FieldName::Other(name) => name,
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `name: value` line of an event stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPacket {
    /// Field name
    pub name: FieldName,
    /// Field value. `None` when the line had no colon at all.
    pub value: Option<String>,
}

impl FieldPacket {
    /// Create a new packet
    pub fn new(name: FieldName, value: Option<String>) -> Self {
        Self { name, value }
    }

    /// Whether this packet carries the `[DONE]` terminal marker
    pub fn is_done_marker(&self) -> bool {
        self.value.as_deref() == Some(DONE_SENTINEL)
    }
}

/// Ordered packets parsed from one raw chunk plus its receive timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamMessage {
    /// Monotonic receive timestamp (nanoseconds)
    pub perf_ns: i64,
    /// Packets in line order
    pub packets: Vec<FieldPacket>,
}

impl StreamMessage {
    /// Create a message from already-parsed packets
    pub fn new(perf_ns: i64, packets: Vec<FieldPacket>) -> Self {
        Self { perf_ns, packets }
    }

    /// Values of all `data:` packets, in order
    pub fn data(&self) -> impl Iterator<Item = &str> {
        self.packets
            .iter()
            .filter(|p| p.name == FieldName::Data)
            .filter_map(|p| p.value.as_deref())
    }

    /// Value of the last packet, if any
    pub fn last_value(&self) -> Option<&str> {
        self.packets.last().and_then(|p| p.value.as_deref())
    }

    /// Whether the final packet of this message is the `[DONE]` marker.
    ///
    /// This is the single place the terminal sentinel is recognised.
    pub fn ends_with_done_marker(&self) -> bool {
        self.packets
            .last()
            .map(FieldPacket::is_done_marker)
            .unwrap_or(false)
    }

    /// Whether the message carried no packets
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}
