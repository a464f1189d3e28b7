//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor thread
//! - Fixed worker thread pool, one session per worker
//! - Requests routed through Engine

mod server;
mod connection;
mod pool;

pub use server::Server;
pub use connection::Connection;
pub use pool::WorkerPool;
