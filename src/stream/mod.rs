//! Server-sent event stream parsing
//!
//! Each chunk read from a streaming response is parsed independently into a
//! [`StreamMessage`]: an ordered list of [`FieldPacket`]s plus the monotonic
//! timestamp at which the chunk was received.

mod message;
mod parser;

pub use message::{FieldName, FieldPacket, StreamMessage, DONE_SENTINEL};
pub use parser::parse;
