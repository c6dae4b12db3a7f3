//! Event-stream line parser
//!
//! Turns one raw chunk of a server-sent event stream into a [`StreamMessage`].
//!
//! Lines are split on `\n` only. A `\r` left over from CRLF framing stays at
//! the end of the line and is removed by trimming, but a bare `\r` line
//! separator is not recognised and its lines stay joined.

use super::message::{FieldName, FieldPacket, StreamMessage};

/// Parse a raw chunk received at `perf_ns` into field packets.
///
/// One packet is produced per non-blank line, in order. Repeated `data:`
/// lines are kept as separate packets.
pub fn parse(raw_text: &str, perf_ns: i64) -> StreamMessage {
    let packets = raw_text
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect();

    StreamMessage::new(perf_ns, packets)
}

/// Parse a single non-blank line
fn parse_line(line: &str) -> FieldPacket {
    if let Some(comment) = line.trim_start().strip_prefix(':') {
        return FieldPacket::new(FieldName::Comment, Some(comment.trim().to_string()));
    }

    match line.split_once(':') {
        Some((name, value)) => FieldPacket::new(
            FieldName::from_raw(name.trim()),
            Some(value.trim().to_string()),
        ),
        None => FieldPacket::new(FieldName::from_raw(line.trim()), None),
    }
}
