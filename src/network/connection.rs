//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{self, BufWriter, Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;

use crate::engine::Engine;
use crate::error::{KvError, Result};
use crate::protocol::{decode_frame, encode_frame, Command, Frame};
use crate::session::Session;

/// How often a blocked read wakes up to look at the shutdown flag
const READ_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Bytes requested from the socket per read
const READ_CHUNK_SIZE: usize = 16 * 1024;

/// Errors that mean the peer went away
fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    )
}

fn is_timeout(e: &io::Error) -> bool {
    // Windows reports TimedOut where Unix reports WouldBlock
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (unbuffered; frames are assembled in `buffer`)
    reader: TcpStream,

    /// TCP stream writer (buffered, flushed once per batch of replies)
    writer: BufWriter<TcpStream>,

    /// Bytes received but not decoded yet
    buffer: BytesMut,

    /// Reference to the storage engine
    engine: Arc<Engine>,

    /// Selected namespace and rights
    session: Session,

    /// Set by the server on shutdown
    shutdown: Arc<AtomicBool>,

    /// Close the connection after this much silence (None = never)
    idle_limit: Option<Duration>,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O and a fresh session in the default namespace
    pub fn new(stream: TcpStream, engine: Arc<Engine>, shutdown: Arc<AtomicBool>) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(READ_POLL_INTERVAL))?;

        let session = engine.session()?;
        let read_stream = stream.try_clone()?;

        Ok(Self {
            reader: read_stream,
            writer: BufWriter::new(stream),
            buffer: BytesMut::with_capacity(READ_CHUNK_SIZE),
            engine,
            session,
            shutdown,
            idle_limit: None,
            peer_addr,
        })
    }

    /// Configure connection timeouts (0 = none)
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        self.idle_limit = (read_ms > 0).then(|| Duration::from_millis(read_ms));
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Decodes every complete frame in the buffer, replies to each, then
    /// flushes and reads more. Pipelined requests are answered in order.
    /// Returns when the client disconnects, goes idle, or the server stops.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        let mut chunk = vec![0u8; READ_CHUNK_SIZE];
        let mut idle = Duration::ZERO;

        loop {
            // Step 1: answer everything already buffered
            loop {
                match decode_frame(&mut self.buffer) {
                    Ok(Some(frame)) => {
                        let reply = self.dispatch(frame);
                        if let Err(e) = self.writer.write_all(&encode_frame(&reply)) {
                            return self.write_failed(e);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        // the stream is out of sync; nothing after this can be trusted
                        tracing::warn!("Protocol error from {}: {}", self.peer_addr, e);
                        let _ = self.writer.write_all(&encode_frame(&Frame::from(&e)));
                        let _ = self.writer.flush();
                        return Err(e);
                    }
                }
            }

            if let Err(e) = self.writer.flush() {
                return self.write_failed(e);
            }

            // Step 2: read more
            match self.reader.read(&mut chunk) {
                Ok(0) => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Ok(n) => {
                    idle = Duration::ZERO;
                    self.buffer.extend_from_slice(&chunk[..n]);
                }
                Err(e) if is_timeout(&e) => {
                    if self.shutdown.load(Ordering::SeqCst) {
                        tracing::debug!("Closing {}: server shutting down", self.peer_addr);
                        return Ok(());
                    }
                    idle += READ_POLL_INTERVAL;
                    if matches!(self.idle_limit, Some(limit) if idle >= limit) {
                        tracing::debug!("Read timeout for client {}", self.peer_addr);
                        return Ok(());
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if is_disconnect(&e) => {
                    tracing::debug!("Connection reset by client {}", self.peer_addr);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    return Err(KvError::Io(e));
                }
            }
        }
    }

    /// Parse and execute one request, always producing a reply
    fn dispatch(&mut self, frame: Frame) -> Frame {
        let command = match Command::parse(frame) {
            Ok(command) => command,
            Err(e) => return Frame::from(&e),
        };
        let name = command.name();

        match self.engine.execute(&mut self.session, command) {
            Ok(reply) => reply,
            Err(e) => {
                if !e.is_rejection() {
                    tracing::warn!("{} from {} failed: {}", name, self.peer_addr, e);
                }
                Frame::from(&e)
            }
        }
    }

    /// A client that disconnected before its reply was sent is not an error
    fn write_failed(&self, e: io::Error) -> Result<()> {
        if is_disconnect(&e) {
            tracing::debug!(
                "Client {} disconnected before response could be sent: {}",
                self.peer_addr,
                e
            );
            return Ok(());
        }
        tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
        Err(KvError::Io(e))
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}
