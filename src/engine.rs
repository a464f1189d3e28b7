//! Engine Module
//!
//! Turns decoded requests into store operations.
//!
//! ## Responsibilities
//! - Normalize a request value into a command name and arguments
//! - Resolve the command against the command table
//! - Run the handler against the shared store

use std::sync::Arc;

use crate::commands::CommandTable;
use crate::error::{DbError, Result};
use crate::protocol::Value;
use crate::store::Store;

/// The request dispatcher
///
/// ## Concurrency Model
///
/// The engine itself is immutable; all shared mutable state lives in the
/// [`Store`], whose operations each hold its lock for the whole command.
/// One `Arc<Engine>` is shared by every connection.
pub struct Engine {
    /// Shared key-value mapping
    store: Arc<Store>,

    /// Command name to handler lookup
    commands: CommandTable,
}

impl Engine {
    /// Create an engine over a fresh, empty store
    pub fn new() -> Self {
        Self::with_store(Arc::new(Store::new()))
    }

    /// Create an engine over an existing store
    pub fn with_store(store: Arc<Store>) -> Self {
        Self {
            store,
            commands: CommandTable::new(),
        }
    }

    /// Execute one request
    ///
    /// A request is either an array whose first element is the command name,
    /// or a lone string naming a command without arguments.
    pub fn execute(&self, request: &Value) -> Result<Value> {
        match request {
            Value::Array(items) => {
                let (name, args) = items
                    .split_first()
                    .ok_or_else(|| DbError::command("missing command"))?;
                let name = command_name(name)?;
                self.commands.dispatch(&self.store, name, args)
            }
            Value::Simple(_) | Value::Bulk(Some(_)) => {
                let name = command_name(request)?;
                self.commands.dispatch(&self.store, name, &[])
            }
            other => Err(DbError::command(format!(
                "request must be an array or a string, got {}",
                other.type_name()
            ))),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the shared store
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Get the command table
    pub fn commands(&self) -> &CommandTable {
        &self.commands
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

fn command_name(value: &Value) -> Result<&str> {
    match value {
        Value::Simple(_) | Value::Bulk(Some(_)) => value
            .as_str()
            .ok_or_else(|| DbError::command("command name is not valid UTF-8")),
        other => Err(DbError::command(format!(
            "command name must be a string, got {}",
            other.type_name()
        ))),
    }
}
