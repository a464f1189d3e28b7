//! Client
//!
//! Blocking client speaking the same wire protocol as the server.

use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};

use crate::error::{DbError, Result};
use crate::protocol::{read_value, write_value, Value};

/// A connection to a SimpleDB server
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    /// Connect to a server
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        })
    }

    /// Send one command and wait for its reply
    ///
    /// An error reply is returned as [`DbError::Server`].
    pub fn execute(&mut self, args: Vec<Value>) -> Result<Value> {
        write_value(&mut self.writer, &Value::Array(args))?;

        match read_value(&mut self.reader) {
            Ok(Value::Error(message)) => Err(DbError::Server(message)),
            Ok(reply) => Ok(reply),
            Err(DbError::Disconnect) => Err(std::io::Error::from(
                std::io::ErrorKind::UnexpectedEof,
            )
            .into()),
            Err(e) => Err(e),
        }
    }

    pub fn get(&mut self, key: &str) -> Result<Value> {
        self.execute(vec!["GET".into(), key.into()])
    }

    /// Returns the server's `1`
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<i64> {
        let reply = self.execute(vec!["SET".into(), key.into(), value.into()])?;
        expect_integer(reply)
    }

    /// Returns whether the key existed
    pub fn delete(&mut self, key: &str) -> Result<bool> {
        let reply = self.execute(vec!["DEL".into(), key.into()])?;
        Ok(expect_integer(reply)? == 1)
    }

    /// Returns the number of keys removed
    pub fn flush(&mut self) -> Result<i64> {
        let reply = self.execute(vec!["FLUSH".into()])?;
        expect_integer(reply)
    }

    pub fn mget(&mut self, keys: &[&str]) -> Result<Vec<Value>> {
        let mut args: Vec<Value> = Vec::with_capacity(keys.len() + 1);
        args.push("MGET".into());
        args.extend(keys.iter().map(|&key| Value::from(key)));

        match self.execute(args)? {
            Value::Array(values) => Ok(values),
            other => Err(unexpected_reply("array", &other)),
        }
    }

    /// Returns the number of pairs set
    pub fn mset(&mut self, pairs: Vec<(String, Value)>) -> Result<i64> {
        let mut args: Vec<Value> = Vec::with_capacity(pairs.len() * 2 + 1);
        args.push("MSET".into());
        for (key, value) in pairs {
            args.push(key.into());
            args.push(value);
        }

        let reply = self.execute(args)?;
        expect_integer(reply)
    }
}

fn expect_integer(reply: Value) -> Result<i64> {
    match reply {
        Value::Integer(n) => Ok(n),
        other => Err(unexpected_reply("integer", &other)),
    }
}

fn unexpected_reply(expected: &str, reply: &Value) -> DbError {
    DbError::protocol(format!(
        "expected {} reply, got {}",
        expected,
        reply.type_name()
    ))
}
