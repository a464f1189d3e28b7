//! Protocol codec
//!
//! Recursive encoding and decoding of [`Value`]s for the wire protocol.
//!
//! ## Wire Format
//!
//! ```text
//! +<text>\r\n                      simple string
//! -<message>\r\n                   error
//! :<n>\r\n                         integer
//! $<len>\r\n<bytes>\r\n            bulk string ($-1\r\n is null)
//! *<count>\r\n<value>...           array
//! %<count>\r\n<key><value>...      map
//! ```
//!
//! Requests and replies share the same format. A request is by convention an
//! array of bulk strings: `*2\r\n$3\r\nGET\r\n$1\r\nk\r\n`.

use std::io::{BufRead, Read, Write};

use bytes::{BufMut, Bytes, BytesMut};

use super::value::{unique_pairs, Value};
use crate::error::{DbError, Result};

/// Line terminator for every header and line-oriented body
pub const CRLF: &[u8] = b"\r\n";

pub const TAG_SIMPLE: u8 = b'+';
pub const TAG_ERROR: u8 = b'-';
pub const TAG_INTEGER: u8 = b':';
pub const TAG_BULK: u8 = b'$';
pub const TAG_ARRAY: u8 = b'*';
pub const TAG_MAP: u8 = b'%';

/// Bounds enforced while decoding untrusted input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Longest line (simple string, error, integer or header), excluding CRLF
    pub max_line_len: usize,

    /// Largest bulk string body in bytes
    pub max_bulk_len: usize,

    /// Largest declared array length or map pair count
    pub max_elements: usize,

    /// Deepest nesting of arrays and maps
    pub max_depth: usize,

    /// Byte budget for one whole frame
    ///
    /// Every wire byte is charged, plus a fixed in-memory cost per decoded
    /// value, so a frame of many tiny elements is bounded as well.
    pub max_frame_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_line_len: 64 * 1024,
            max_bulk_len: 64 * 1024 * 1024, // 64 MB
            max_elements: 1024 * 1024,
            max_depth: 32,
            max_frame_len: 128 * 1024 * 1024, // 128 MB
        }
    }
}

/// Frame budget charged for every decoded value on top of its wire bytes
const VALUE_COST: usize = std::mem::size_of::<Value>();

/// Initial buffer for a bulk body; it grows only as bytes arrive
const BULK_CHUNK: usize = 64 * 1024;

// =============================================================================
// Decoding
// =============================================================================

/// Decode one frame from a stream
///
/// Returns [`DbError::Disconnect`] when the stream ends before a tag byte.
/// An unknown tag at the top level is a [`DbError::Command`]: the rest of the
/// line is discarded so the caller can keep reading. Any other framing
/// problem is a [`DbError::Protocol`].
pub fn decode<R: BufRead>(reader: &mut R, limits: &Limits) -> Result<Value> {
    let tag = match read_tag(reader)? {
        Some(tag) => tag,
        None => return Err(DbError::Disconnect),
    };

    if !is_known_tag(tag) {
        if tag != b'\n' {
            skip_line(reader, limits)?;
        }
        return Err(DbError::command(format!(
            "bad request: unknown type tag 0x{:02x}",
            tag
        )));
    }

    let mut frame = FrameDecoder::new(reader, limits);
    frame.charge(1)?;
    frame.decode_tagged(tag, 0)
}

/// Decode one frame using the default limits
pub fn read_value<R: BufRead>(reader: &mut R) -> Result<Value> {
    decode(reader, &Limits::default())
}

/// Decode a single frame held entirely in memory
pub fn from_bytes(mut bytes: &[u8]) -> Result<Value> {
    read_value(&mut bytes)
}

fn is_known_tag(tag: u8) -> bool {
    matches!(
        tag,
        TAG_SIMPLE | TAG_ERROR | TAG_INTEGER | TAG_BULK | TAG_ARRAY | TAG_MAP
    )
}

/// Read one byte; `None` on a clean end of stream
fn read_tag<R: Read>(reader: &mut R) -> Result<Option<u8>> {
    let mut tag = [0u8; 1];
    loop {
        match reader.read(&mut tag) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(tag[0])),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Discard input up to and including the next LF
fn skip_line<R: BufRead>(reader: &mut R, limits: &Limits) -> Result<()> {
    let limit = (limits.max_line_len + CRLF.len()) as u64;
    let mut discarded = Vec::new();
    reader.by_ref().take(limit).read_until(b'\n', &mut discarded)?;
    Ok(())
}

/// Decoding state for one frame: the stream, its limits and the budget left
struct FrameDecoder<'a, R> {
    reader: &'a mut R,
    limits: &'a Limits,
    remaining: usize,
}

impl<'a, R: BufRead> FrameDecoder<'a, R> {
    fn new(reader: &'a mut R, limits: &'a Limits) -> Self {
        Self {
            reader,
            limits,
            remaining: limits.max_frame_len,
        }
    }

    /// Deduct `cost` bytes from the frame budget
    fn charge(&mut self, cost: usize) -> Result<()> {
        match self.remaining.checked_sub(cost) {
            Some(left) => {
                self.remaining = left;
                Ok(())
            }
            None => Err(DbError::protocol(format!(
                "frame exceeds {} bytes",
                self.limits.max_frame_len
            ))),
        }
    }

    fn decode_tagged(&mut self, tag: u8, depth: usize) -> Result<Value> {
        self.charge(VALUE_COST)?;
        match tag {
            TAG_SIMPLE => Ok(Value::Simple(self.read_text()?)),
            TAG_ERROR => Ok(Value::Error(self.read_text()?)),
            TAG_INTEGER => Ok(Value::Integer(self.read_integer()?)),
            TAG_BULK => self.decode_bulk(),
            TAG_ARRAY => self.decode_array(depth),
            TAG_MAP => self.decode_map(depth),
            _ => Err(DbError::protocol(format!(
                "unknown type tag 0x{:02x} inside aggregate",
                tag
            ))),
        }
    }

    /// Decode an element of an array or map
    fn decode_nested(&mut self, depth: usize) -> Result<Value> {
        if depth > self.limits.max_depth {
            return Err(DbError::protocol(format!(
                "nesting exceeds maximum depth of {}",
                self.limits.max_depth
            )));
        }

        let mut tag = [0u8; 1];
        self.reader.read_exact(&mut tag)?;
        self.charge(1)?;
        self.decode_tagged(tag[0], depth)
    }

    fn decode_bulk(&mut self) -> Result<Value> {
        let len = self.read_integer()?;
        if len == -1 {
            return Ok(Value::Bulk(None));
        }

        let len = usize::try_from(len)
            .map_err(|_| DbError::protocol(format!("invalid bulk string length {}", len)))?;
        if len > self.limits.max_bulk_len {
            return Err(DbError::protocol(format!(
                "bulk string too large: {} bytes (max {})",
                len, self.limits.max_bulk_len
            )));
        }

        // Body plus its trailing CRLF
        let wire_len = len + CRLF.len();
        self.charge(wire_len)?;

        let mut body = Vec::with_capacity(wire_len.min(BULK_CHUNK));
        self.reader
            .by_ref()
            .take(wire_len as u64)
            .read_to_end(&mut body)?;
        if body.len() < wire_len {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        if !body.ends_with(CRLF) {
            return Err(DbError::protocol("bulk string not terminated by CRLF"));
        }
        body.truncate(len);

        Ok(Value::Bulk(Some(Bytes::from(body))))
    }

    fn decode_array(&mut self, depth: usize) -> Result<Value> {
        let count = self.read_count("array")?;

        // Capacity is capped so a large declared count cannot allocate ahead of the data
        let mut items = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            items.push(self.decode_nested(depth + 1)?);
        }

        Ok(Value::Array(items))
    }

    fn decode_map(&mut self, depth: usize) -> Result<Value> {
        let count = self.read_count("map")?;

        let mut pairs = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let key = self.decode_nested(depth + 1)?;
            let value = self.decode_nested(depth + 1)?;
            pairs.push((key, value));
        }

        // A repeated key replaces the earlier value
        Ok(Value::map(pairs))
    }

    fn read_count(&mut self, kind: &str) -> Result<usize> {
        let count = self.read_integer()?;
        let count = usize::try_from(count)
            .map_err(|_| DbError::protocol(format!("invalid {} length {}", kind, count)))?;

        if count > self.limits.max_elements {
            return Err(DbError::protocol(format!(
                "{} too large: {} elements (max {})",
                kind, count, self.limits.max_elements
            )));
        }

        Ok(count)
    }

    fn read_integer(&mut self) -> Result<i64> {
        let line = self.read_line()?;
        let text = String::from_utf8(line)
            .map_err(|_| DbError::protocol("integer line is not valid UTF-8"))?;
        text.parse::<i64>()
            .map_err(|_| DbError::protocol(format!("invalid integer '{}'", text)))
    }

    /// Read the body of a simple string or error line
    ///
    /// CR and LF cannot be encoded in these types, so they are refused here too.
    fn read_text(&mut self) -> Result<String> {
        let line = self.read_line()?;
        if line.contains(&b'\r') {
            return Err(DbError::protocol("line contains a bare CR"));
        }
        String::from_utf8(line).map_err(|_| DbError::protocol("line is not valid UTF-8"))
    }

    /// Read a CRLF-terminated line, without the terminator
    fn read_line(&mut self) -> Result<Vec<u8>> {
        let limit = (self.limits.max_line_len + CRLF.len()) as u64;
        let mut line = Vec::new();
        let read = self
            .reader
            .by_ref()
            .take(limit)
            .read_until(b'\n', &mut line)?;

        if !line.ends_with(b"\n") {
            if read as u64 == limit {
                return Err(DbError::protocol(format!(
                    "line exceeds {} bytes",
                    self.limits.max_line_len
                )));
            }
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        if !line.ends_with(CRLF) {
            return Err(DbError::protocol("line not terminated by CRLF"));
        }
        self.charge(line.len())?;
        line.truncate(line.len() - CRLF.len());

        Ok(line)
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Append the frame for `value` to `buf`
///
/// On error `buf` is left as it was before the call.
pub fn encode(buf: &mut BytesMut, value: &Value) -> Result<()> {
    let start = buf.len();
    encode_into(buf, value).map_err(|e| {
        buf.truncate(start);
        e
    })
}

/// Encode a value into a standalone buffer
pub fn to_bytes(value: &Value) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    encode(&mut buf, value)?;
    Ok(buf.freeze())
}

/// Write a value to a stream
///
/// The whole frame is encoded in memory first, so a reply is never observed
/// partially written because of an encoding failure.
pub fn write_value<W: Write>(writer: &mut W, value: &Value) -> Result<()> {
    let bytes = to_bytes(value)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

fn encode_into(buf: &mut BytesMut, value: &Value) -> Result<()> {
    match value {
        Value::Simple(text) => put_line(buf, TAG_SIMPLE, text)?,
        Value::Error(message) => put_line(buf, TAG_ERROR, message)?,
        Value::Integer(n) => {
            buf.put_u8(TAG_INTEGER);
            buf.put_slice(n.to_string().as_bytes());
            buf.put_slice(CRLF);
        }
        Value::Bulk(None) => buf.put_slice(b"$-1\r\n"),
        Value::Bulk(Some(data)) => {
            put_header(buf, TAG_BULK, data.len());
            buf.put_slice(data);
            buf.put_slice(CRLF);
        }
        Value::Array(items) => {
            put_header(buf, TAG_ARRAY, items.len());
            for item in items {
                encode_into(buf, item)?;
            }
        }
        Value::Map(pairs) => {
            // Repeated keys are written once, with their last value
            let pairs = unique_pairs(pairs);
            put_header(buf, TAG_MAP, pairs.len());
            for (key, value) in pairs {
                encode_into(buf, key)?;
                encode_into(buf, value)?;
            }
        }
    }
    Ok(())
}

fn put_header(buf: &mut BytesMut, tag: u8, len: usize) {
    buf.put_u8(tag);
    buf.put_slice(len.to_string().as_bytes());
    buf.put_slice(CRLF);
}

fn put_line(buf: &mut BytesMut, tag: u8, text: &str) -> Result<()> {
    if text.contains(['\r', '\n']) {
        return Err(DbError::command(format!(
            "cannot encode {} containing CR or LF",
            if tag == TAG_ERROR { "error" } else { "simple string" }
        )));
    }
    buf.put_u8(tag);
    buf.put_slice(text.as_bytes());
    buf.put_slice(CRLF);
    Ok(())
}
