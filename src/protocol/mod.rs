//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Type Tags
//! - `+`: simple string - Body: line
//! - `-`: error         - Body: line carrying the message
//! - `:`: integer       - Body: decimal line
//! - `$`: bulk string   - Body: len line, `len` bytes, CRLF (`$-1` is null)
//! - `*`: array         - Body: count line, `count` values
//! - `%`: map           - Body: count line, `count` key/value pairs
//!
//! Every line ends with CRLF. Requests are conventionally arrays of bulk
//! strings (`["SET", "key", "value"]`); replies use whichever tag suits the
//! result.

mod value;
mod codec;

pub use value::Value;
pub use codec::{
    decode, encode, from_bytes, read_value, to_bytes, write_value, Limits, CRLF, TAG_ARRAY,
    TAG_BULK, TAG_ERROR, TAG_INTEGER, TAG_MAP, TAG_SIMPLE,
};
