//! TCP Server
//!
//! Accepts connections and dispatches them to worker threads.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::connection::Connection;
use super::pool::WorkerPool;
use crate::config::Config;
use crate::engine::Engine;
use crate::error::Result;

/// Pause after a failed accept so a persistent error does not spin
const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);

/// TCP server for SimpleDB
///
/// One worker runs one session at a time. When every worker is busy the
/// accept loop waits for one to free up; pending clients queue in the
/// listen backlog.
pub struct Server {
    config: Config,
    engine: Arc<Engine>,
    listener: TcpListener,
    shutdown: AtomicBool,
}

impl Server {
    /// Bind the listen address from `config`
    pub fn bind(config: Config, engine: Arc<Engine>) -> Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(&config.listen_addr)?;
        tracing::info!(
            "Listening on {} ({} workers)",
            listener.local_addr()?,
            config.max_connections
        );

        Ok(Self {
            config,
            engine,
            listener,
            shutdown: AtomicBool::new(false),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Start the server (blocking)
    ///
    /// Returns once [`Server::shutdown`] has been called and every in-flight
    /// session has finished.
    pub fn run(&self) -> Result<()> {
        let engine = Arc::clone(&self.engine);
        let config = self.config.clone();
        let pool = WorkerPool::new(self.config.max_connections, move |stream: TcpStream| {
            serve_connection(stream, &engine, &config)
        })?;

        for stream in self.listener.incoming() {
            if self.is_shutdown() {
                break;
            }

            match stream {
                Ok(stream) => pool.execute(stream)?,
                Err(e) => {
                    tracing::warn!("Failed to accept connection: {}", e);
                    thread::sleep(ACCEPT_BACKOFF);
                }
            }
        }

        tracing::info!("Listener stopped, waiting for {} workers", pool.size());
        drop(pool);

        Ok(())
    }

    /// Signal the server to shutdown gracefully
    ///
    /// Wakes the accept loop with a throwaway connection to ourselves.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);

        if let Ok(addr) = self.listener.local_addr() {
            let _ = TcpStream::connect(wake_addr(addr));
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Get the shared engine
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }
}

/// Run one client session to completion on a worker thread
fn serve_connection(stream: TcpStream, engine: &Arc<Engine>, config: &Config) {
    let mut connection = match Connection::new(stream, Arc::clone(engine), config.limits) {
        Ok(connection) => connection,
        Err(e) => {
            tracing::warn!("Failed to set up connection: {}", e);
            return;
        }
    };

    if let Err(e) = connection.set_timeouts(config.read_timeout_ms, config.write_timeout_ms) {
        tracing::warn!("Failed to configure {}: {}", connection.peer_addr(), e);
        return;
    }

    if let Err(e) = connection.handle() {
        tracing::debug!("Session with {} closed: {}", connection.peer_addr(), e);
    }
}

/// A wildcard bind address is not connectable everywhere; use loopback
fn wake_addr(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), addr.port())
        }
        _ => addr,
    }
}
