//! Links from a bus connection to the simulation backend.
//!
//! A link carries one [`BusRequest`] and returns one [`BusReply`]. The
//! backend is picked from the connection string:
//!
//! - `tcp://host:port` - newline-delimited JSON over TCP, one request line
//!   answered by one reply line.
//! - `loopback://name` - in-process bus that queues written bytes per target
//!   and hands them back on read.

use super::BusError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info};

const TCP_SCHEME: &str = "tcp://";
const LOOPBACK_SCHEME: &str = "loopback://";
const TCP_CONNECT_TIMEOUT_MS: u64 = 2000;
/// Generous upper bound; requests carry their own, shorter timeouts.
const TCP_IO_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    Base,
    I2c,
    Can,
    Spi,
    Uart,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Register `source` as a node on the bus.
    Attach,
    Write {
        #[serde(with = "serde_bytes")]
        data: Vec<u8>,
    },
    Read {
        len: usize,
    },
    Transact {
        #[serde(with = "serde_bytes")]
        data: Vec<u8>,
        read_len: usize,
        timeout_ms: Option<u64>,
    },
    /// Number of bytes waiting on a UART port.
    Available,
    SelectChip {
        line: u32,
    },
    UnselectChip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusRequest {
    pub bus: String,
    pub protocol: Protocol,
    pub source: String,
    pub target: String,
    pub operation: Operation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyStatus {
    Success,
    Error,
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusReply {
    pub status: ReplyStatus,
    #[serde(with = "serde_bytes", default)]
    pub data: Vec<u8>,
    #[serde(default)]
    pub message: Option<String>,
}

impl BusReply {
    pub fn success(data: Vec<u8>) -> Self {
        Self {
            status: ReplyStatus::Success,
            data,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Error,
            data: Vec::new(),
            message: Some(message.into()),
        }
    }
}

/// Request/reply channel to the bus backend.
pub trait BusLink: Send {
    fn exchange(&mut self, request: &BusRequest) -> Result<BusReply, BusError>;
}

/// Open the link named by a backend connection string.
pub fn open_link(connection_string: &str) -> Result<Box<dyn BusLink>, BusError> {
    if let Some(addr) = connection_string.strip_prefix(TCP_SCHEME) {
        Ok(Box::new(TcpLink::connect(addr)?))
    } else if let Some(name) = connection_string.strip_prefix(LOOPBACK_SCHEME) {
        Ok(Box::new(LoopbackLink::new(name)))
    } else {
        Err(BusError::UnsupportedConnectionString(
            connection_string.to_string(),
        ))
    }
}

/// JSON-lines link to a TCP bus backend.
#[derive(Debug)]
pub struct TcpLink {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    addr: String,
}

impl TcpLink {
    pub fn connect(addr: &str) -> Result<Self, BusError> {
        debug!("Connecting to bus backend at {}", addr);
        let socket_addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| BusError::UnsupportedConnectionString(format!("{TCP_SCHEME}{addr}")))?;
        let stream =
            TcpStream::connect_timeout(&socket_addr, Duration::from_millis(TCP_CONNECT_TIMEOUT_MS))?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(Duration::from_millis(TCP_IO_TIMEOUT_MS)))?;
        stream.set_write_timeout(Some(Duration::from_millis(TCP_IO_TIMEOUT_MS)))?;
        let writer = stream.try_clone()?;
        info!("Connected to bus backend at {}", addr);

        Ok(Self {
            reader: BufReader::new(stream),
            writer,
            addr: addr.to_string(),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl BusLink for TcpLink {
    fn exchange(&mut self, request: &BusRequest) -> Result<BusReply, BusError> {
        let mut line = serde_json::to_string(request)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()?;

        let mut reply = String::new();
        if self.reader.read_line(&mut reply)? == 0 {
            return Err(BusError::runtime(format!(
                "Bus backend at {} closed the connection",
                self.addr
            )));
        }
        Ok(serde_json::from_str(reply.trim())?)
    }
}

/// In-process bus: bytes written to a target queue up until read back.
#[derive(Debug, Default)]
pub struct LoopbackLink {
    name: String,
    queues: HashMap<String, VecDeque<u8>>,
    attached: Vec<String>,
}

impl LoopbackLink {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attached(&self) -> &[String] {
        &self.attached
    }

    fn drain(&mut self, target: &str, len: usize) -> Vec<u8> {
        let queue = self.queues.entry(target.to_string()).or_default();
        let take = len.min(queue.len());
        queue.drain(..take).collect()
    }
}

impl BusLink for LoopbackLink {
    fn exchange(&mut self, request: &BusRequest) -> Result<BusReply, BusError> {
        let reply = match &request.operation {
            Operation::Attach => {
                self.attached.push(request.source.clone());
                BusReply::success(Vec::new())
            }
            Operation::Write { data } => {
                self.queues
                    .entry(request.target.clone())
                    .or_default()
                    .extend(data.iter().copied());
                BusReply::success(Vec::new())
            }
            Operation::Read { len } => BusReply::success(self.drain(&request.target, *len)),
            Operation::Transact { data, read_len, .. } => {
                self.queues
                    .entry(request.target.clone())
                    .or_default()
                    .extend(data.iter().copied());
                BusReply::success(self.drain(&request.target, *read_len))
            }
            Operation::Available => {
                let available = self.queues.get(&request.target).map_or(0, VecDeque::len);
                BusReply::success((available as u32).to_be_bytes().to_vec())
            }
            Operation::SelectChip { .. } | Operation::UnselectChip => BusReply::success(Vec::new()),
        };
        Ok(reply)
    }
}
