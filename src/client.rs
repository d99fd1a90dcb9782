//! Blocking RESP client
//!
//! Used by the CLI, the sync tool and the integration tests.

use std::collections::BTreeMap;
use std::io::{BufReader, BufWriter, Write};
use std::net::TcpStream;

use crate::error::{KvError, Result};
use crate::protocol::{encode_frame, read_frame, Frame};

/// One step of a `SCAN` walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanItem {
    pub key: Vec<u8>,
    pub size: u64,
    pub timestamp: i64,
}

/// Connection to a zerokv server
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    addr: String,
}

impl Client {
    /// Connect to `addr` (`host:port`)
    pub fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .map_err(|e| KvError::Network(format!("cannot connect to {}: {}", addr, e)))?;
        stream.set_nodelay(true)?;

        Ok(Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
            addr: addr.to_string(),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    // =========================================================================
    // Raw commands
    // =========================================================================

    /// Send one command and wait for its reply
    pub fn command<A: AsRef<[u8]>>(&mut self, args: &[A]) -> Result<Frame> {
        self.send(args)?;
        self.receive()
    }

    /// Queue a command without waiting (pipelining); replies come back in
    /// order through [`Client::receive`]
    pub fn send<A: AsRef<[u8]>>(&mut self, args: &[A]) -> Result<()> {
        self.writer.write_all(&encode_frame(&Frame::command(args)))?;
        Ok(())
    }

    /// Flush queued commands and read the next reply
    pub fn receive(&mut self) -> Result<Frame> {
        self.writer.flush()?;
        read_frame(&mut self.reader)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    pub fn ping(&mut self) -> Result<()> {
        match self.command(&["PING"])? {
            Frame::Simple(pong) if pong == "PONG" => Ok(()),
            other => Err(unexpected("PING", other)),
        }
    }

    /// Store a value; returns the resolved key, or `None` when the server
    /// already held the same content
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.command(&[b"SET".as_slice(), key, value])? {
            Frame::Bulk(key) => Ok(Some(key)),
            Frame::Null => Ok(None),
            other => Err(unexpected("SET", other)),
        }
    }

    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.command(&[b"GET".as_slice(), key])? {
            Frame::Bulk(value) => Ok(Some(value)),
            Frame::Null => Ok(None),
            other => Err(unexpected("GET", other)),
        }
    }

    pub fn del(&mut self, key: &[u8]) -> Result<()> {
        self.expect_ok("DEL", &[b"DEL".as_slice(), key])
    }

    pub fn select(&mut self, namespace: &str, password: Option<&str>) -> Result<()> {
        match password {
            Some(password) => self.expect_ok("SELECT", &["SELECT", namespace, password]),
            None => self.expect_ok("SELECT", &["SELECT", namespace]),
        }
    }

    pub fn auth(&mut self, password: &str) -> Result<()> {
        self.expect_ok("AUTH", &["AUTH", password])
    }

    /// Key following `cursor`; `None` once the walk is complete
    pub fn scan(&mut self, cursor: Option<&[u8]>) -> Result<Option<ScanItem>> {
        let reply = match cursor {
            Some(cursor) => self.command(&[b"SCAN".as_slice(), cursor])?,
            None => self.command(&["SCAN"])?,
        };

        match reply {
            Frame::Error(message) if message == "No more data" => Ok(None),
            Frame::Array(items) => parse_scan_item(items).map(Some),
            other => Err(unexpected("SCAN", other)),
        }
    }

    /// `NSINFO` as a field → value map
    pub fn nsinfo(&mut self, namespace: &str) -> Result<BTreeMap<String, String>> {
        match self.command(&["NSINFO", namespace])? {
            Frame::Bulk(text) => Ok(parse_info(&String::from_utf8_lossy(&text))),
            other => Err(unexpected("NSINFO", other)),
        }
    }

    fn expect_ok<A: AsRef<[u8]>>(&mut self, name: &str, args: &[A]) -> Result<()> {
        match self.command(args)? {
            Frame::Simple(ok) if ok == "OK" => Ok(()),
            other => Err(unexpected(name, other)),
        }
    }
}

fn unexpected(command: &str, reply: Frame) -> KvError {
    match reply {
        Frame::Error(message) => KvError::Network(format!("{} failed: {}", command, message)),
        other => KvError::Protocol(format!("unexpected {} reply: {:?}", command, other)),
    }
}

fn parse_scan_item(items: Vec<Frame>) -> Result<ScanItem> {
    let mut items = items.into_iter();
    match (items.next(), items.next()) {
        (Some(Frame::Bulk(key)), Some(Frame::Array(meta))) => {
            let size = meta.first().and_then(Frame::as_integer);
            let timestamp = meta.get(1).and_then(Frame::as_integer);
            match (size, timestamp) {
                (Some(size), Some(timestamp)) => Ok(ScanItem {
                    key,
                    size: size as u64,
                    timestamp,
                }),
                _ => Err(KvError::Protocol("malformed SCAN entry".to_string())),
            }
        }
        _ => Err(KvError::Protocol("malformed SCAN reply".to_string())),
    }
}

/// Parse `field: value` lines (comment lines start with `#`)
pub fn parse_info(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| line.split_once(':'))
        .map(|(field, value)| (field.trim().to_string(), value.trim().to_string()))
        .collect()
}
