//! Configuration for SimpleDB
//!
//! Centralized configuration with sensible defaults.

use crate::error::{DbError, Result};
use crate::protocol::Limits;

/// Main configuration for a SimpleDB server
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client sessions (worker pool size)
    pub max_connections: usize,

    /// Connection read timeout (milliseconds, 0 disables)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 disables)
    pub write_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Protocol Configuration
    // -------------------------------------------------------------------------
    /// Bounds applied while decoding client frames
    pub limits: Limits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:31337".to_string(),
            max_connections: 64,
            read_timeout_ms: 0,
            write_timeout_ms: 5000,
            limits: Limits::default(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.is_empty() {
            return Err(DbError::Config("listen address is empty".to_string()));
        }
        if self.max_connections == 0 {
            return Err(DbError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }

        let limits = &self.limits;
        if limits.max_line_len == 0
            || limits.max_bulk_len == 0
            || limits.max_elements == 0
            || limits.max_depth == 0
            || limits.max_frame_len == 0
        {
            return Err(DbError::Config(format!(
                "protocol limits must be non-zero: {:?}",
                limits
            )));
        }

        if limits.max_bulk_len > limits.max_frame_len {
            return Err(DbError::Config(format!(
                "max_bulk_len ({}) exceeds max_frame_len ({})",
                limits.max_bulk_len, limits.max_frame_len
            )));
        }

        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the codec limits
    pub fn limits(mut self, limits: Limits) -> Self {
        self.config.limits = limits;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
