//! Integration tests for event-stream parsing and request timing
//!
//! Parse raw chunks the way a streaming transport receives them and check
//! the derived request timings.

use perf_lens::records::RequestRecord;
use perf_lens::stream::{self, FieldName, FieldPacket};

#[test]
fn test_parse_is_deterministic_and_fresh() {
    let raw = "event: message\ndata: {\"text\":\"hi\"}\n\n";
    let first = stream::parse(raw, 100);
    let second = stream::parse(raw, 100);

    assert_eq!(first, second);
    assert_ne!(first.packets.as_ptr(), second.packets.as_ptr());
}

#[test]
fn test_comment_lines() {
    let message = stream::parse(":\n: keep-alive\n", 1);
    assert_eq!(
        message.packets,
        vec![
            FieldPacket::new(FieldName::Comment, Some(String::new())),
            FieldPacket::new(FieldName::Comment, Some("keep-alive".to_string())),
        ]
    );
}

#[test]
fn test_value_keeps_later_colons() {
    let message = stream::parse("data: a:b:c", 1);
    assert_eq!(message.data().collect::<Vec<_>>(), vec!["a:b:c"]);
}

#[test]
fn test_openai_style_stream() {
    let chunks = [
        (120, "data: {\"choices\":[{\"text\":\"Hel\"}]}\n\n"),
        (150, "data: {\"choices\":[{\"text\":\"lo\"}]}\n\n"),
        (190, "data: [DONE]\n\n"),
    ];

    let mut record = RequestRecord::new(serde_json::Value::Null, 100);
    record.set_first_byte(110);
    for (ts, raw) in chunks {
        record.push_response(stream::parse(raw, ts));
    }
    record.complete(200, Some(200));

    assert!(record.is_valid());
    assert_eq!(record.time_to_first_response(), Some(20));
    assert_eq!(record.time_to_second_response(), Some(30));
    assert_eq!(record.time_to_last_response(), Some(100));
    // the trailing [DONE] message is not a token
    assert_eq!(record.inter_token_latency(), Some(30.0));
    assert_eq!(record.token_latency(0), Some(10));
}

#[test]
fn test_single_response_has_no_second_token_timing() {
    let mut record = RequestRecord::new(serde_json::Value::Null, 100);
    record.push_response(stream::parse("data: only", 140));

    assert!(record.is_valid());
    assert_eq!(record.time_to_first_response(), Some(40));
    assert_eq!(record.time_to_second_response(), None);
    assert_eq!(record.inter_token_latency(), None);
}
