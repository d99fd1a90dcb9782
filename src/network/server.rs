//! TCP Server
//!
//! Accepts connections and runs each on its own thread.

use std::io::{self, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::sync::WaitGroup;

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{KvError, Result};

use super::Connection;

/// How often the accept loop looks at the shutdown flag
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Stops a running server from another thread
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Releases a connection slot when the connection thread ends
struct SlotGuard(Arc<AtomicUsize>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// TCP server for zerokv
pub struct Server {
    config: Config,
    engine: Arc<Engine>,
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,
    /// Connections currently being served
    active: Arc<AtomicUsize>,
}

impl Server {
    /// Bind the listen address from `config`
    pub fn bind(config: Config, engine: Arc<Engine>) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr).map_err(|e| {
            KvError::Network(format!("cannot listen on {}: {}", config.listen_addr, e))
        })?;
        listener.set_nonblocking(true)?;

        Ok(Self {
            config,
            engine,
            listener,
            shutdown: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
        }
    }

    /// Number of connections currently being served
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Start the server (blocking)
    ///
    /// Returns after a shutdown was requested and every connection thread
    /// has finished.
    pub fn run(&self) -> Result<()> {
        let wait_group = WaitGroup::new();
        tracing::info!("Listening on {}", self.local_addr()?);

        while !self.shutdown.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = self.accept(stream, peer, wait_group.clone()) {
                        tracing::warn!("Failed to set up connection from {}: {}", peer, e);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        tracing::info!(
            "Shutting down, waiting for {} connections",
            self.active_connections()
        );
        wait_group.wait();
        tracing::info!("Server stopped");

        Ok(())
    }

    fn accept(&self, mut stream: TcpStream, peer: SocketAddr, wait_group: WaitGroup) -> Result<()> {
        stream.set_nonblocking(false)?;

        if self.active.load(Ordering::SeqCst) >= self.config.max_connections {
            tracing::warn!("Rejecting {}: too many connections", peer);
            let _ = stream.write_all(b"-Too many connections\r\n");
            return Ok(());
        }

        let mut connection = Connection::new(stream, Arc::clone(&self.engine), Arc::clone(&self.shutdown))?;
        connection.set_timeouts(self.config.read_timeout_ms, self.config.write_timeout_ms)?;

        self.active.fetch_add(1, Ordering::SeqCst);
        let slot = SlotGuard(Arc::clone(&self.active));

        thread::Builder::new()
            .name(format!("conn-{}", peer))
            .spawn(move || {
                let _slot = slot;
                if let Err(e) = connection.handle() {
                    tracing::debug!("Connection {} ended with error: {}", connection.peer_addr(), e);
                }
                drop(wait_group);
            })?;

        Ok(())
    }
}
