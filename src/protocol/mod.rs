//! Protocol Module
//!
//! Defines the wire protocol for client-server communication: RESP, so
//! that existing Redis clients can talk to the server.
//!
//! ### Request Format
//! ```text
//! *<argc>\r\n  $<len>\r\n<name>\r\n  $<len>\r\n<arg>\r\n ...
//! ```
//! or an inline line: `GET key\r\n`
//!
//! ### Replies
//! - `+OK` / `+PONG`            simple strings
//! - `-<message>`               errors (the `KvError` text)
//! - `:<n>`                     integers (`EXISTS`, `DBSIZE`, `KEYTIME`)
//! - `$<len>` / `$-1`           values, resolved keys, null for missing or
//!                              unchanged
//! - `*<n>`                     arrays (`SCAN`, `HISTORY`, `NSLIST`)

mod codec;
mod command;
mod frame;

pub use codec::{
    decode_frame, encode_frame, read_frame, write_frame, MAX_ARRAY_LENGTH, MAX_BULK_LENGTH,
    MAX_INLINE_LENGTH, MAX_NESTING_DEPTH,
};
pub use command::{Command, NsSetting};
pub use frame::Frame;
