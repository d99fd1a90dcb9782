//! RESP codec
//!
//! Encoding and decoding of RESP frames.
//!
//! ## Wire Format
//!
//! ```text
//! +OK\r\n                       simple string
//! -Key not found\r\n            error
//! :42\r\n                       integer
//! $5\r\nhello\r\n               bulk string ($-1 = null)
//! *2\r\n$3\r\nGET\r\n$1\r\nk\r\n  array
//! ```
//!
//! Requests are arrays of bulk strings. A line that does not start with a
//! type byte is an inline request (`PING`, `GET key`), split on whitespace.

use std::io::{BufRead, Write};

use bytes::{Buf, BytesMut};

use crate::error::{KvError, Result};

use super::Frame;

/// Largest bulk string accepted (512 MB)
pub const MAX_BULK_LENGTH: i64 = 512 * 1024 * 1024;

/// Largest array accepted
pub const MAX_ARRAY_LENGTH: i64 = 1024 * 1024;

/// Longest inline request line
pub const MAX_INLINE_LENGTH: usize = 64 * 1024;

/// Deepest array nesting accepted (replies nest at most three levels)
pub const MAX_NESTING_DEPTH: usize = 8;

// =============================================================================
// Encoding
// =============================================================================

/// Encode a frame to bytes
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_into(frame, &mut buf);
    buf
}

fn encode_into(frame: &Frame, buf: &mut Vec<u8>) {
    match frame {
        Frame::Simple(text) => {
            buf.push(b'+');
            buf.extend_from_slice(text.as_bytes());
        }
        Frame::Error(message) => {
            buf.push(b'-');
            buf.extend_from_slice(message.as_bytes());
        }
        Frame::Integer(n) => {
            buf.push(b':');
            buf.extend_from_slice(n.to_string().as_bytes());
        }
        Frame::Bulk(bytes) => {
            buf.push(b'$');
            buf.extend_from_slice(bytes.len().to_string().as_bytes());
            buf.extend_from_slice(b"\r\n");
            buf.extend_from_slice(bytes);
        }
        Frame::Null => buf.extend_from_slice(b"$-1"),
        Frame::Array(items) => {
            buf.push(b'*');
            buf.extend_from_slice(items.len().to_string().as_bytes());
            buf.extend_from_slice(b"\r\n");
            for item in items {
                encode_into(item, buf);
            }
            return;
        }
    }
    buf.extend_from_slice(b"\r\n");
}

// =============================================================================
// Incremental decoding (server side)
// =============================================================================

/// Decode one frame from the front of `buf`.
///
/// Returns `Ok(None)` when `buf` does not hold a complete frame yet; the
/// buffer is left untouched then. A decoded frame is removed from `buf`.
pub fn decode_frame(buf: &mut BytesMut) -> Result<Option<Frame>> {
    loop {
        if buf.is_empty() {
            return Ok(None);
        }

        if !is_type_byte(buf[0]) {
            let (args, used) = match parse_inline(&buf[..])? {
                Some(parsed) => parsed,
                None => return Ok(None),
            };
            buf.advance(used);
            if args.is_empty() {
                // blank line between requests
                continue;
            }
            return Ok(Some(Frame::Array(args)));
        }

        return match parse_at(&buf[..], 0, 0)? {
            Some((frame, used)) => {
                buf.advance(used);
                Ok(Some(frame))
            }
            None => Ok(None),
        };
    }
}

fn is_type_byte(byte: u8) -> bool {
    matches!(byte, b'+' | b'-' | b':' | b'$' | b'*')
}

/// Line starting at `start`, without its terminator, and the offset after it
fn line_at(buf: &[u8], start: usize) -> Option<(&[u8], usize)> {
    let newline = buf.get(start..)?.iter().position(|&b| b == b'\n')? + start;
    let mut line = &buf[start..newline];
    if let Some(stripped) = line.strip_suffix(b"\r") {
        line = stripped;
    }
    Some((line, newline + 1))
}

fn parse_int(line: &[u8]) -> Result<i64> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            KvError::Protocol(format!(
                "invalid integer: {:?}",
                String::from_utf8_lossy(line)
            ))
        })
}

fn check_length(len: i64, max: i64, what: &str) -> Result<usize> {
    if len > max {
        return Err(KvError::Protocol(format!(
            "{} too large: {} (max {})",
            what, len, max
        )));
    }
    Ok(len as usize)
}

fn check_depth(depth: usize) -> Result<()> {
    if depth >= MAX_NESTING_DEPTH {
        return Err(KvError::Protocol(format!(
            "arrays nested too deeply (max {})",
            MAX_NESTING_DEPTH
        )));
    }
    Ok(())
}

fn parse_at(buf: &[u8], pos: usize, depth: usize) -> Result<Option<(Frame, usize)>> {
    let kind = match buf.get(pos) {
        Some(&kind) => kind,
        None => return Ok(None),
    };
    let (line, next) = match line_at(buf, pos + 1) {
        Some(found) => found,
        None => return Ok(None),
    };

    match kind {
        b'+' => Ok(Some((Frame::Simple(String::from_utf8_lossy(line).into_owned()), next))),
        b'-' => Ok(Some((Frame::Error(String::from_utf8_lossy(line).into_owned()), next))),
        b':' => Ok(Some((Frame::Integer(parse_int(line)?), next))),
        b'$' => {
            let len = parse_int(line)?;
            if len < 0 {
                return Ok(Some((Frame::Null, next)));
            }
            let len = check_length(len, MAX_BULK_LENGTH, "bulk string")?;

            let end = next + len;
            if buf.len() < end + 2 {
                return Ok(None);
            }
            if &buf[end..end + 2] != b"\r\n" {
                return Err(KvError::Protocol("bulk string not terminated by CRLF".to_string()));
            }
            Ok(Some((Frame::Bulk(buf[next..end].to_vec()), end + 2)))
        }
        b'*' => {
            let len = parse_int(line)?;
            if len < 0 {
                return Ok(Some((Frame::Null, next)));
            }
            let len = check_length(len, MAX_ARRAY_LENGTH, "array")?;
            check_depth(depth)?;

            let mut items = Vec::with_capacity(len.min(64));
            let mut pos = next;
            for _ in 0..len {
                match parse_at(buf, pos, depth + 1)? {
                    Some((item, after)) => {
                        items.push(item);
                        pos = after;
                    }
                    None => return Ok(None),
                }
            }
            Ok(Some((Frame::Array(items), pos)))
        }
        other => Err(KvError::Protocol(format!("unknown frame type: 0x{:02x}", other))),
    }
}

fn parse_inline(buf: &[u8]) -> Result<Option<(Vec<Frame>, usize)>> {
    let (line, used) = match line_at(buf, 0) {
        Some(found) => found,
        None if buf.len() > MAX_INLINE_LENGTH => {
            return Err(KvError::Protocol("inline request too long".to_string()))
        }
        None => return Ok(None),
    };

    let args = line
        .split(|b| b.is_ascii_whitespace())
        .filter(|arg| !arg.is_empty())
        .map(|arg| Frame::Bulk(arg.to_vec()))
        .collect();

    Ok(Some((args, used)))
}

// =============================================================================
// Stream-based I/O helpers (client side)
// =============================================================================

/// Read a complete frame from a stream
///
/// Blocks until a complete frame is received or an error occurs
pub fn read_frame<R: BufRead>(reader: &mut R) -> Result<Frame> {
    read_nested(reader, 0)
}

fn read_nested<R: BufRead>(reader: &mut R, depth: usize) -> Result<Frame> {
    let mut line = Vec::new();
    if reader.read_until(b'\n', &mut line)? == 0 {
        return Err(KvError::Network("connection closed by peer".to_string()));
    }
    while matches!(line.last(), Some(b'\n') | Some(b'\r')) {
        line.pop();
    }

    let (&kind, rest) = line
        .split_first()
        .ok_or_else(|| KvError::Protocol("empty frame".to_string()))?;

    match kind {
        b'+' => Ok(Frame::Simple(String::from_utf8_lossy(rest).into_owned())),
        b'-' => Ok(Frame::Error(String::from_utf8_lossy(rest).into_owned())),
        b':' => Ok(Frame::Integer(parse_int(rest)?)),
        b'$' => {
            let len = parse_int(rest)?;
            if len < 0 {
                return Ok(Frame::Null);
            }
            let len = check_length(len, MAX_BULK_LENGTH, "bulk string")?;

            let mut payload = vec![0u8; len + 2];
            reader.read_exact(&mut payload)?;
            payload.truncate(len);
            Ok(Frame::Bulk(payload))
        }
        b'*' => {
            let len = parse_int(rest)?;
            if len < 0 {
                return Ok(Frame::Null);
            }
            let len = check_length(len, MAX_ARRAY_LENGTH, "array")?;
            check_depth(depth)?;

            let mut items = Vec::with_capacity(len.min(64));
            for _ in 0..len {
                items.push(read_nested(reader, depth + 1)?);
            }
            Ok(Frame::Array(items))
        }
        other => Err(KvError::Protocol(format!("unknown frame type: 0x{:02x}", other))),
    }
}

/// Write a frame to a stream
pub fn write_frame<W: Write>(writer: &mut W, frame: &Frame) -> Result<()> {
    writer.write_all(&encode_frame(frame))?;
    writer.flush()?;
    Ok(())
}
