//! Command Table
//!
//! Fixed mapping from command name to handler.
//!
//! ## Commands
//! - `GET key`              - stored value, error if absent
//! - `SET key value`        - `1`
//! - `DEL key`              - `1` if removed, `0` if absent
//! - `FLUSH`                - number of keys removed
//! - `MGET key [key ...]`   - array of values, error if any key is absent
//! - `MSET key value [...]` - number of pairs set
//!
//! `MGET` and `MSET` also accept their arguments wrapped in a single array.

use std::collections::HashMap;

use bytes::Bytes;

use crate::error::{DbError, Result};
use crate::protocol::Value;
use crate::store::Store;

/// A command handler: store handle and positional arguments in, reply out
pub type Handler = fn(&Store, &[Value]) -> Result<Value>;

/// Lookup table from upper-case command name to handler
pub struct CommandTable {
    handlers: HashMap<&'static str, Handler>,
}

impl CommandTable {
    /// Build the table with every supported command
    pub fn new() -> Self {
        let handlers: HashMap<&'static str, Handler> = HashMap::from([
            ("GET", get as Handler),
            ("SET", set as Handler),
            ("DEL", delete as Handler),
            ("FLUSH", flush as Handler),
            ("MGET", mget as Handler),
            ("MSET", mset as Handler),
        ]);

        Self { handlers }
    }

    /// Find a handler, ignoring the case of `name`
    pub fn lookup(&self, name: &str) -> Option<Handler> {
        self.handlers.get(name.to_ascii_uppercase().as_str()).copied()
    }

    /// Run a command against the store
    pub fn dispatch(&self, store: &Store, name: &str, args: &[Value]) -> Result<Value> {
        let handler = self
            .lookup(name)
            .ok_or_else(|| DbError::command(format!("unknown command '{}'", name)))?;
        handler(store, args)
    }

    /// Supported command names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Handlers
// =============================================================================

fn get(store: &Store, args: &[Value]) -> Result<Value> {
    check_arity("GET", args, 1)?;
    let key = key_of(&args[0])?;
    store.get(&key)
}

fn set(store: &Store, args: &[Value]) -> Result<Value> {
    check_arity("SET", args, 2)?;
    let key = key_of(&args[0])?;
    store.set(key, args[1].clone());
    Ok(Value::Integer(1))
}

fn delete(store: &Store, args: &[Value]) -> Result<Value> {
    check_arity("DEL", args, 1)?;
    let key = key_of(&args[0])?;
    Ok(Value::Integer(store.delete(&key) as i64))
}

fn flush(store: &Store, args: &[Value]) -> Result<Value> {
    check_arity("FLUSH", args, 0)?;
    Ok(Value::Integer(store.flush() as i64))
}

fn mget(store: &Store, args: &[Value]) -> Result<Value> {
    let keys = spread(args)
        .iter()
        .map(key_of)
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::Array(store.get_many(&keys)?))
}

fn mset(store: &Store, args: &[Value]) -> Result<Value> {
    let args = spread(args);
    if args.len() % 2 != 0 {
        return Err(DbError::command(format!(
            "wrong number of arguments for 'MSET': expected key/value pairs, got {} arguments",
            args.len()
        )));
    }

    // Every key is checked before anything is written
    let pairs = args
        .chunks_exact(2)
        .map(|pair| Ok((key_of(&pair[0])?, pair[1].clone())))
        .collect::<Result<Vec<_>>>()?;

    Ok(Value::Integer(store.set_many(pairs) as i64))
}

// =============================================================================
// Argument helpers
// =============================================================================

fn check_arity(name: &str, args: &[Value], expected: usize) -> Result<()> {
    if args.len() != expected {
        return Err(DbError::command(format!(
            "wrong number of arguments for '{}': expected {}, got {}",
            name,
            expected,
            args.len()
        )));
    }
    Ok(())
}

/// Keys are non-null strings
fn key_of(value: &Value) -> Result<Bytes> {
    match value {
        Value::Bulk(Some(bytes)) => Ok(bytes.clone()),
        Value::Simple(text) => Ok(Bytes::copy_from_slice(text.as_bytes())),
        other => Err(DbError::command(format!(
            "key must be a string, got {}",
            other.type_name()
        ))),
    }
}

/// Unwrap a lone array argument into the argument list
fn spread(args: &[Value]) -> &[Value] {
    match args {
        [Value::Array(items)] => items.as_slice(),
        _ => args,
    }
}
