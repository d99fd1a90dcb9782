//! RESP frame definitions
//!
//! Represents both requests (arrays of bulk strings) and replies.

use crate::error::KvError;

/// One RESP value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// `+text`
    Simple(String),

    /// `-message`
    Error(String),

    /// `:n`
    Integer(i64),

    /// `$len` + bytes
    Bulk(Vec<u8>),

    /// `$-1`
    Null,

    /// `*n` + frames
    Array(Vec<Frame>),
}

impl Frame {
    /// `+OK`
    pub fn ok() -> Self {
        Frame::Simple("OK".to_string())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Frame::Error(message.into())
    }

    pub fn bulk(bytes: impl Into<Vec<u8>>) -> Self {
        Frame::Bulk(bytes.into())
    }

    /// Request frame: an array of bulk strings
    pub fn command<A: AsRef<[u8]>>(args: &[A]) -> Self {
        Frame::Array(args.iter().map(|a| Frame::Bulk(a.as_ref().to_vec())).collect())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Frame::Error(_))
    }

    /// Payload of a bulk or simple string
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Frame::Bulk(bytes) => Some(bytes),
            Frame::Simple(text) => Some(text.as_bytes()),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Frame::Integer(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<&KvError> for Frame {
    fn from(error: &KvError) -> Self {
        Frame::Error(error.to_string())
    }
}

impl From<KvError> for Frame {
    fn from(error: KvError) -> Self {
        Frame::from(&error)
    }
}
