//! # SimpleDB
//!
//! A volatile, in-memory key-value store with:
//! - A recursive, type-tagged wire protocol (strings, integers, errors,
//!   arrays, maps, null)
//! - Per-command atomicity over a single shared store
//! - A bounded pool of connection workers
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 TCP Listener + Worker Pool                   │
//! │                  (one session per worker)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │               Connection Session (codec)                     │
//! │           decode → dispatch → encode → repeat                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │              Engine + Command Table                          │
//! │     GET / SET / DEL / FLUSH / MGET / MSET                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!                       ▼
//!                ┌─────────────┐
//!                │    Store    │
//!                │  (RwLock)   │
//!                └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod store;
pub mod commands;
pub mod engine;
pub mod network;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{DbError, Result};
pub use config::Config;
pub use engine::Engine;
pub use protocol::Value;
pub use store::Store;
pub use client::Client;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of SimpleDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
