//! Codec Tests
//!
//! These tests verify:
//! - Every frame type encodes to its RESP form
//! - Incremental decoding waits for complete frames
//! - Pipelined requests decode one at a time
//! - Inline requests and binary-safe bulk strings
//! - Stream helpers used by the client

use std::io::{BufReader, Cursor};

use bytes::BytesMut;
use zerokv::error::KvError;
use zerokv::protocol::{
    decode_frame, encode_frame, read_frame, write_frame, Frame, MAX_BULK_LENGTH, MAX_NESTING_DEPTH,
};

// =============================================================================
// Helper Functions
// =============================================================================

fn decode_all(bytes: &[u8]) -> Vec<Frame> {
    let mut buf = BytesMut::from(bytes);
    let mut frames = Vec::new();
    while let Some(frame) = decode_frame(&mut buf).unwrap() {
        frames.push(frame);
    }
    frames
}

// =============================================================================
// Encoding Tests
// =============================================================================

#[test]
fn test_encode_replies() {
    assert_eq!(encode_frame(&Frame::ok()), b"+OK\r\n");
    assert_eq!(encode_frame(&Frame::error("Key not found")), b"-Key not found\r\n");
    assert_eq!(encode_frame(&Frame::Integer(-7)), b":-7\r\n");
    assert_eq!(encode_frame(&Frame::bulk("hello")), b"$5\r\nhello\r\n");
    assert_eq!(encode_frame(&Frame::bulk("")), b"$0\r\n\r\n");
    assert_eq!(encode_frame(&Frame::Null), b"$-1\r\n");
}

#[test]
fn test_encode_nested_array() {
    let frame = Frame::Array(vec![
        Frame::bulk("k"),
        Frame::Array(vec![Frame::Integer(3), Frame::Integer(1700000000)]),
    ]);

    assert_eq!(
        encode_frame(&frame),
        b"*2\r\n$1\r\nk\r\n*2\r\n:3\r\n:1700000000\r\n".to_vec()
    );
}

#[test]
fn test_error_frame_from_kv_error() {
    let frame = Frame::from(KvError::key_not_found());
    assert_eq!(frame, Frame::Error("Key not found".to_string()));
    assert!(frame.is_error());

    let frame = Frame::from(&KvError::QuotaExceeded);
    assert_eq!(frame, Frame::Error("No space left on this namespace".to_string()));
}

// =============================================================================
// Decoding Tests
// =============================================================================

#[test]
fn test_decode_command_array() {
    let frames = decode_all(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$5\r\nvalue\r\n");
    assert_eq!(frames, vec![Frame::command(&["SET", "k", "value"])]);
}

#[test]
fn test_decode_byte_by_byte() {
    let request = encode_frame(&Frame::command(&["GET", "some key"]));
    let mut buf = BytesMut::new();

    for (i, byte) in request.iter().enumerate() {
        buf.extend_from_slice(&[*byte]);
        let decoded = decode_frame(&mut buf).unwrap();
        if i + 1 < request.len() {
            assert!(decoded.is_none());
        } else {
            assert_eq!(decoded, Some(Frame::command(&["GET", "some key"])));
        }
    }
}

#[test]
fn test_decode_pipelined_requests() {
    let mut bytes = Vec::new();
    bytes.extend(encode_frame(&Frame::command(&["PING"])));
    bytes.extend(encode_frame(&Frame::command(&["GET", "a"])));
    bytes.extend(encode_frame(&Frame::command(&["DEL", "b"])));

    let frames = decode_all(&bytes);

    assert_eq!(
        frames,
        vec![
            Frame::command(&["PING"]),
            Frame::command(&["GET", "a"]),
            Frame::command(&["DEL", "b"]),
        ]
    );
}

#[test]
fn test_decode_binary_bulk() {
    let value: Vec<u8> = vec![0, b'\r', b'\n', 255, b'$', b'*'];
    let request = encode_frame(&Frame::command(&[b"SET".to_vec(), b"bin".to_vec(), value.clone()]));

    let frames = decode_all(&request);

    assert_eq!(frames, vec![Frame::command(&[b"SET".to_vec(), b"bin".to_vec(), value])]);
}

#[test]
fn test_decode_inline_request() {
    let frames = decode_all(b"SET  key   value\r\nPING\n");

    assert_eq!(
        frames,
        vec![Frame::command(&["SET", "key", "value"]), Frame::command(&["PING"])]
    );
}

#[test]
fn test_decode_replies() {
    let frames = decode_all(b"+OK\r\n-ERR bad\r\n:42\r\n$-1\r\n*0\r\n");

    assert_eq!(
        frames,
        vec![
            Frame::ok(),
            Frame::error("ERR bad"),
            Frame::Integer(42),
            Frame::Null,
            Frame::Array(vec![]),
        ]
    );
}

#[test]
fn test_decode_rejects_bad_lengths() {
    let mut buf = BytesMut::from(&b"$abc\r\n"[..]);
    assert!(matches!(decode_frame(&mut buf), Err(KvError::Protocol(_))));

    let oversized = format!("${}\r\n", MAX_BULK_LENGTH + 1);
    let mut buf = BytesMut::from(oversized.as_bytes());
    assert!(matches!(decode_frame(&mut buf), Err(KvError::Protocol(_))));
}

#[test]
fn test_decode_rejects_unterminated_bulk() {
    let mut buf = BytesMut::from(&b"$3\r\nabcXY"[..]);
    assert!(matches!(decode_frame(&mut buf), Err(KvError::Protocol(_))));
}

fn nested(levels: usize) -> Vec<u8> {
    let mut wire = b"*1\r\n".repeat(levels);
    wire.extend_from_slice(b"$1\r\nx\r\n");
    wire
}

#[test]
fn test_decode_accepts_nesting_up_to_limit() {
    let mut buf = BytesMut::from(&nested(MAX_NESTING_DEPTH)[..]);

    let mut frame = decode_frame(&mut buf).unwrap().unwrap();
    for _ in 0..MAX_NESTING_DEPTH {
        frame = match frame {
            Frame::Array(mut items) => items.remove(0),
            other => panic!("expected array, got {:?}", other),
        };
    }
    assert_eq!(frame, Frame::bulk("x"));
}

#[test]
fn test_decode_rejects_deep_nesting() {
    let mut buf = BytesMut::from(&nested(MAX_NESTING_DEPTH + 1)[..]);
    assert!(matches!(decode_frame(&mut buf), Err(KvError::Protocol(_))));

    // a flood of array headers fails fast instead of recursing
    let mut buf = BytesMut::from(&b"*1\r\n".repeat(200_000)[..]);
    assert!(matches!(decode_frame(&mut buf), Err(KvError::Protocol(_))));
}

// =============================================================================
// Stream Helper Tests
// =============================================================================

#[test]
fn test_write_then_read_frame() {
    let reply = Frame::Array(vec![
        Frame::Array(vec![
            Frame::Integer(1),
            Frame::Integer(0),
            Frame::bulk("v1"),
        ]),
        Frame::Null,
    ]);

    let mut wire = Vec::new();
    write_frame(&mut wire, &reply).unwrap();
    write_frame(&mut wire, &Frame::ok()).unwrap();

    let mut reader = BufReader::new(Cursor::new(wire));
    assert_eq!(read_frame(&mut reader).unwrap(), reply);
    assert_eq!(read_frame(&mut reader).unwrap(), Frame::ok());
}

#[test]
fn test_read_frame_rejects_deep_nesting() {
    let mut reader = BufReader::new(Cursor::new(b"*1\r\n".repeat(200_000)));
    assert!(matches!(read_frame(&mut reader), Err(KvError::Protocol(_))));
}

#[test]
fn test_read_frame_on_closed_stream() {
    let mut reader = BufReader::new(Cursor::new(Vec::new()));
    assert!(matches!(read_frame(&mut reader), Err(KvError::Network(_))));
}
