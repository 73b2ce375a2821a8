//! Replica-side replication link.
//!
//! [`MasterLink`] owns the socket to the primary and a single append-only
//! parse buffer that survives the whole lifetime of the link. The handshake
//! frames, the one raw snapshot payload, and the subsequent propagation
//! stream are all framed out of that same buffer, so no byte is ever read
//! by two parsers or lost between phases.

use bytes::{Buf, BytesMut};
use regex::Regex;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::resp::{parse_frame, parse_raw_payload, RespError, RespValue};

#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("connection closed by primary")]
    ConnectionClosed,
    #[error("framing error on primary link: {0}")]
    Resp(#[from] RespError),
    #[error("unexpected reply from primary: {0}")]
    UnexpectedReply(String),
    #[error("invalid FULLRESYNC header: {0}")]
    InvalidFullResync(String),
}

/// The snapshot and starting offset handed over by a successful handshake.
pub struct FullResync {
    pub repl_id: String,
    pub offset: u64,
    pub snapshot: Vec<u8>,
}

pub struct MasterLink {
    stream: TcpStream,
    buffer: BytesMut,
}

impl MasterLink {
    pub async fn connect(address: &str) -> std::io::Result<Self> {
        let stream = TcpStream::connect(address).await?;

        Ok(Self {
            stream,
            buffer: BytesMut::with_capacity(4096),
        })
    }

    pub async fn send(&mut self, frame: &RespValue) -> Result<(), HandshakeError> {
        self.stream.write_all(frame.encode().as_bytes()).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Reads one frame, returning it with its consumed wire length.
    pub async fn read_frame(&mut self) -> Result<(RespValue, usize), HandshakeError> {
        loop {
            if let Some((frame, consumed)) = parse_frame(&self.buffer)? {
                self.buffer.advance(consumed);
                return Ok((frame, consumed));
            }

            self.fill().await?;
        }
    }

    /// Reads the single raw `$<n>\r\n<bytes>` payload of a full resync.
    pub async fn read_raw_payload(&mut self) -> Result<Vec<u8>, HandshakeError> {
        loop {
            if let Some((payload, consumed)) = parse_raw_payload(&self.buffer)? {
                self.buffer.advance(consumed);
                return Ok(payload);
            }

            self.fill().await?;
        }
    }

    /// Runs the handshake sequence:
    /// `PING` → `REPLCONF listening-port` → `REPLCONF capa psync2` →
    /// `PSYNC ? -1` → `FULLRESYNC` header → raw snapshot payload.
    pub async fn handshake(&mut self, listening_port: u16) -> Result<FullResync, HandshakeError> {
        self.expect_simple(RespValue::command(["PING"]), "PONG").await?;
        let port_argument = listening_port.to_string();
        self.expect_simple(
            RespValue::command(["REPLCONF", "listening-port", port_argument.as_str()]),
            "OK",
        )
        .await?;
        self.expect_simple(RespValue::command(["REPLCONF", "capa", "psync2"]), "OK")
            .await?;

        self.send(&RespValue::command(["PSYNC", "?", "-1"])).await?;
        let (reply, _) = self.read_frame().await?;

        let RespValue::SimpleString(header) = reply else {
            return Err(HandshakeError::InvalidFullResync(format!("{:?}", reply)));
        };
        let (repl_id, offset) = parse_fullresync(&header)
            .ok_or_else(|| HandshakeError::InvalidFullResync(header.clone()))?;

        let snapshot = self.read_raw_payload().await?;

        Ok(FullResync {
            repl_id,
            offset,
            snapshot,
        })
    }

    async fn expect_simple(
        &mut self,
        command: RespValue,
        expected: &str,
    ) -> Result<(), HandshakeError> {
        self.send(&command).await?;
        let (reply, _) = self.read_frame().await?;

        if reply != RespValue::SimpleString(expected.to_string()) {
            return Err(HandshakeError::UnexpectedReply(format!("{:?}", reply)));
        }

        Ok(())
    }

    async fn fill(&mut self) -> Result<(), HandshakeError> {
        let read = self.stream.read_buf(&mut self.buffer).await?;
        if read == 0 {
            return Err(HandshakeError::ConnectionClosed);
        }
        Ok(())
    }
}

/// Parses `FULLRESYNC <40-char replid> <offset>`.
fn parse_fullresync(header: &str) -> Option<(String, u64)> {
    let re = Regex::new(r"^FULLRESYNC ([a-zA-Z0-9]{40}) (\d+)$").unwrap();
    let captures = re.captures(header)?;

    let repl_id = captures.get(1)?.as_str().to_string();
    let offset = captures.get(2)?.as_str().parse::<u64>().ok()?;

    Some((repl_id, offset))
}
