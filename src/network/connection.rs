//! Connection Handler
//!
//! Handles individual client connections.
//!
//! ## Session Loop
//! ```text
//! AWAITING_REQUEST -> DECODING -> DISPATCHING -> ENCODING_REPLY -+
//!        ^                                                       |
//!        +-------------------------------------------------------+
//! ```
//! Any state may end in CLOSED: peer disconnect, a corrupt frame, or an
//! I/O failure. Command errors never close the session; they become
//! error replies.

use std::io::{self, BufReader, BufWriter};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::Engine;
use crate::error::{DbError, Result};
use crate::protocol::{decode, write_value, Limits, Value};

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Shared request dispatcher
    engine: Arc<Engine>,

    /// Bounds for decoding client frames
    limits: Limits,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O on cloned handles of the same socket
    pub fn new(stream: TcpStream, engine: Arc<Engine>, limits: Limits) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            engine,
            limits,
            peer_addr,
        })
    }

    /// Configure connection timeouts (0 leaves a direction unbounded)
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        if read_ms > 0 {
            self.reader
                .get_ref()
                .set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }

        Ok(())
    }

    /// Run the session until the client disconnects (blocking)
    ///
    /// Returns `Ok(())` on a clean close and the error that ended the session
    /// otherwise.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        loop {
            let request = match decode(&mut self.reader, &self.limits) {
                Ok(request) => request,
                Err(DbError::Disconnect) => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Err(DbError::Io(ref e)) if is_peer_gone(e) => {
                    tracing::debug!("Client {} went away mid-frame: {}", self.peer_addr, e);
                    return Ok(());
                }
                Err(DbError::Io(ref e)) if is_timeout(e) => {
                    tracing::debug!("Read timeout for client {}", self.peer_addr);
                    return Ok(());
                }
                Err(e) if e.is_command_error() => {
                    // The bad frame was skipped; answer it and keep going
                    tracing::debug!("Bad request from {}: {}", self.peer_addr, e);
                    if self.reply_or_close(&Value::error(e.to_string()))? {
                        return Ok(());
                    }
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    // Best effort: the stream is already out of sync
                    let _ = self.send_reply(&Value::error(e.to_string()));
                    return Err(e);
                }
            };

            tracing::trace!("Received request from {}: {:?}", self.peer_addr, request);

            let reply = match self.execute(&request) {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!("Fatal error serving {}: {}", self.peer_addr, e);
                    return Err(e);
                }
            };

            if self.reply_or_close(&reply)? {
                return Ok(());
            }
        }
    }

    /// Dispatch a request, turning command errors into error replies
    fn execute(&self, request: &Value) -> Result<Value> {
        match self.engine.execute(request) {
            Ok(reply) => Ok(reply),
            Err(e) if e.is_command_error() => Ok(Value::Error(e.to_string())),
            Err(e) => Err(e),
        }
    }

    /// Send a reply; `Ok(true)` means the peer is gone and the session should end
    fn reply_or_close(&mut self, reply: &Value) -> Result<bool> {
        match self.send_reply(reply) {
            Ok(()) => Ok(false),
            Err(DbError::Io(ref e)) if is_peer_gone(e) => {
                tracing::debug!(
                    "Client {} disconnected before response could be sent: {}",
                    self.peer_addr,
                    e
                );
                Ok(true)
            }
            Err(e) => {
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                Err(e)
            }
        }
    }

    /// Encode and flush a reply
    ///
    /// A value that cannot be encoded is answered with an error reply instead.
    fn send_reply(&mut self, reply: &Value) -> Result<()> {
        match write_value(&mut self.writer, reply) {
            Err(e) if e.is_command_error() => {
                write_value(&mut self.writer, &Value::error(e.to_string()))
            }
            other => other,
        }
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

fn is_peer_gone(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    )
}

// Windows reports TimedOut where Unix reports WouldBlock
fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}
