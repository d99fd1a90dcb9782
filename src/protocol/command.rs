//! Command definitions
//!
//! Represents commands from clients, parsed from RESP request frames.

use crate::error::{KvError, Result};

use super::Frame;

/// Setting changed by `NSSET`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NsSetting {
    /// Quota in bytes (`0` = unlimited)
    MaxSize(Option<u64>),

    /// Namespace password (`*` clears it)
    Password(Option<String>),

    Public(bool),

    /// Locked namespaces reject writes
    Lock(bool),
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Health check
    Ping,

    /// Store a value (`timestamp` is admin only)
    Set {
        key: Vec<u8>,
        value: Vec<u8>,
        timestamp: Option<i64>,
    },

    Get { key: Vec<u8> },
    Del { key: Vec<u8> },
    Exists { key: Vec<u8> },

    /// Verify the stored value against its CRC
    Check { key: Vec<u8> },

    KeyTime { key: Vec<u8> },
    History { key: Vec<u8> },

    /// Next key after `cursor` (first key without one)
    Scan { cursor: Option<Vec<u8>> },

    DbSize,
    Info,

    NsNew { name: String },
    NsList,
    NsInfo { name: String },
    NsSet { name: String, setting: NsSetting },

    Select { name: String, password: Option<String> },
    Auth { password: String },
}

impl Command {
    /// Parse a request frame (array of bulk strings)
    pub fn parse(frame: Frame) -> Result<Self> {
        let items = match frame {
            Frame::Array(items) => items,
            other => {
                return Err(KvError::Protocol(format!(
                    "expected a command array, got {:?}",
                    other
                )))
            }
        };

        let mut args = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Frame::Bulk(bytes) => args.push(bytes),
                Frame::Simple(text) => args.push(text.into_bytes()),
                Frame::Integer(n) => args.push(n.to_string().into_bytes()),
                other => {
                    return Err(KvError::Protocol(format!(
                        "unexpected argument type: {:?}",
                        other
                    )))
                }
            }
        }

        Self::from_args(args)
    }

    /// Build a command from its arguments (name first)
    pub fn from_args(args: Vec<Vec<u8>>) -> Result<Self> {
        let mut args = args.into_iter();
        let name = match args.next() {
            Some(name) => String::from_utf8_lossy(&name).to_ascii_uppercase(),
            None => return Err(KvError::Protocol("empty command".to_string())),
        };
        let argc = args.len();

        let arity = |min: usize, max: usize| -> Result<()> {
            if argc < min || argc > max {
                return Err(KvError::Protocol(format!(
                    "wrong number of arguments for '{}'",
                    name.to_ascii_lowercase()
                )));
            }
            Ok(())
        };
        // presence of required arguments is checked by `arity` first
        let mut next = || args.next().unwrap_or_default();

        let command = match name.as_str() {
            "PING" => {
                arity(0, 0)?;
                Command::Ping
            }
            "SET" => {
                arity(2, 3)?;
                let key = next();
                let value = next();
                let timestamp = match optional(argc, 3, next()) {
                    Some(raw) => Some(parse_number::<i64>(&raw, "timestamp")?),
                    None => None,
                };
                Command::Set { key, value, timestamp }
            }
            "GET" => {
                arity(1, 1)?;
                Command::Get { key: next() }
            }
            "DEL" => {
                arity(1, 1)?;
                Command::Del { key: next() }
            }
            "EXISTS" => {
                arity(1, 1)?;
                Command::Exists { key: next() }
            }
            "CHECK" => {
                arity(1, 1)?;
                Command::Check { key: next() }
            }
            "KEYTIME" => {
                arity(1, 1)?;
                Command::KeyTime { key: next() }
            }
            "HISTORY" => {
                arity(1, 1)?;
                Command::History { key: next() }
            }
            "SCAN" => {
                arity(0, 1)?;
                Command::Scan {
                    cursor: optional(argc, 1, next()),
                }
            }
            "DBSIZE" => {
                arity(0, 0)?;
                Command::DbSize
            }
            "INFO" => {
                arity(0, 0)?;
                Command::Info
            }
            "NSNEW" => {
                arity(1, 1)?;
                Command::NsNew { name: text(next())? }
            }
            "NSLIST" => {
                arity(0, 0)?;
                Command::NsList
            }
            "NSINFO" => {
                arity(1, 1)?;
                Command::NsInfo { name: text(next())? }
            }
            "NSSET" => {
                arity(3, 3)?;
                let name = text(next())?;
                let property = text(next())?.to_ascii_lowercase();
                let value = text(next())?;
                Command::NsSet {
                    name,
                    setting: parse_setting(&property, &value)?,
                }
            }
            "SELECT" => {
                arity(1, 2)?;
                let name = text(next())?;
                let password = optional(argc, 2, next()).map(text).transpose()?;
                Command::Select { name, password }
            }
            "AUTH" => {
                arity(1, 1)?;
                Command::Auth { password: text(next())? }
            }
            other => {
                return Err(KvError::Protocol(format!(
                    "unknown command '{}'",
                    other.to_ascii_lowercase()
                )))
            }
        };

        Ok(command)
    }

    /// Command name, for logging
    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping => "PING",
            Command::Set { .. } => "SET",
            Command::Get { .. } => "GET",
            Command::Del { .. } => "DEL",
            Command::Exists { .. } => "EXISTS",
            Command::Check { .. } => "CHECK",
            Command::KeyTime { .. } => "KEYTIME",
            Command::History { .. } => "HISTORY",
            Command::Scan { .. } => "SCAN",
            Command::DbSize => "DBSIZE",
            Command::Info => "INFO",
            Command::NsNew { .. } => "NSNEW",
            Command::NsList => "NSLIST",
            Command::NsInfo { .. } => "NSINFO",
            Command::NsSet { .. } => "NSSET",
            Command::Select { .. } => "SELECT",
            Command::Auth { .. } => "AUTH",
        }
    }

    /// True for commands that modify a namespace
    pub fn is_write(&self) -> bool {
        matches!(self, Command::Set { .. } | Command::Del { .. })
    }
}

/// Optional argument at 1-based `position`, present when `argc` reaches it
fn optional(argc: usize, position: usize, arg: Vec<u8>) -> Option<Vec<u8>> {
    if argc >= position {
        Some(arg)
    } else {
        None
    }
}

fn text(arg: Vec<u8>) -> Result<String> {
    String::from_utf8(arg).map_err(|_| KvError::InvalidArgument("Invalid argument, UTF-8 expected".to_string()))
}

fn parse_number<T: std::str::FromStr>(arg: &[u8], what: &str) -> Result<T> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| KvError::InvalidArgument(format!("Invalid {}", what)))
}

fn parse_flag(value: &str) -> Result<bool> {
    match value {
        "1" => Ok(true),
        "0" => Ok(false),
        _ => Err(KvError::InvalidArgument("Invalid value, expected 0 or 1".to_string())),
    }
}

fn parse_setting(property: &str, value: &str) -> Result<NsSetting> {
    match property {
        "maxsize" => {
            let size: u64 = parse_number(value.as_bytes(), "size")?;
            Ok(NsSetting::MaxSize(if size == 0 { None } else { Some(size) }))
        }
        "password" => Ok(NsSetting::Password(if value == "*" {
            None
        } else {
            Some(value.to_string())
        })),
        "public" => Ok(NsSetting::Public(parse_flag(value)?)),
        "lock" => Ok(NsSetting::Lock(parse_flag(value)?)),
        other => Err(KvError::InvalidArgument(format!(
            "Unknown namespace property '{}'",
            other
        ))),
    }
}
