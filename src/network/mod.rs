//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor thread (non-blocking listener, polled)
//! - One thread per connection, capped by `max_connections`
//! - Commands routed through Engine with a per-connection Session

mod connection;
mod server;

pub use connection::Connection;
pub use server::{Server, ShutdownHandle};
