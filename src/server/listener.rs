//! MJPEG server listener
//!
//! Handles the TCP accept loop and spawns connection handlers.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};

use crate::error::Result;
use crate::registry::{ChannelRegistry, RegistryConfig};
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::server::handler::{AllowAll, ConnectionInfo, StreamHandler};
use crate::stats::ServerStats;

/// MJPEG broadcast server
///
/// Accepts producer (`POST /stream[/{channel}]`) and viewer
/// (`GET /video[/{channel}]`) connections and routes frames between
/// them through a shared [`ChannelRegistry`]. The local (in-process)
/// producer variant skips HTTP entirely and calls
/// [`ChannelRegistry::ingest`] on the handle returned by
/// [`registry`](MjpegServer::registry).
pub struct MjpegServer<H: StreamHandler = AllowAll> {
    config: ServerConfig,
    handler: Arc<H>,
    registry: Arc<ChannelRegistry>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    started_at: Instant,
    total_connections: AtomicU64,
    active_connections: Arc<AtomicU64>,
}

impl MjpegServer<AllowAll> {
    /// Create a new server that accepts every producer and viewer
    pub fn new(config: ServerConfig) -> Self {
        Self::with_handler(config, AllowAll)
    }
}

impl<H: StreamHandler> MjpegServer<H> {
    /// Create a new server with the given authorization handler
    pub fn with_handler(config: ServerConfig, handler: H) -> Self {
        Self::with_registry_config(config, handler, RegistryConfig::default())
    }

    /// Create a new server with custom registry configuration
    pub fn with_registry_config(
        config: ServerConfig,
        handler: H,
        registry_config: RegistryConfig,
    ) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            config,
            handler: Arc::new(handler),
            registry: Arc::new(ChannelRegistry::with_config(registry_config)),
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
            shutdown_tx,
            shutdown_rx,
            started_at: Instant::now(),
            total_connections: AtomicU64::new(0),
            active_connections: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Get a reference to the channel registry
    ///
    /// Clone the `Arc` into a capture pipeline for in-process ingest.
    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Snapshot of server-wide statistics
    pub async fn stats(&self) -> ServerStats {
        ServerStats {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            active_channels: self.registry.channel_count().await,
            uptime: self.started_at.elapsed(),
        }
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down. Failing to
    /// bind the listening socket is fatal and returned immediately.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already-bound listener until `shutdown` resolves
    ///
    /// When this returns, every open viewer connection has been told to
    /// close; no connection task outlives the server.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(addr = %listener.local_addr()?, "MJPEG server listening");

        // Background cleanup of idle channels
        let cleanup_handle = self.registry.spawn_cleanup_task();

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        };

        cleanup_handle.abort();
        // Terminates every connection task, viewers included
        let _ = self.shutdown_tx.send(true);

        result
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit; the permit moves into the task so the
        // slot is held for the whole connection lifetime
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match Arc::clone(sem).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(session_id, peer = %peer_addr, "New connection");

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::debug!(session_id, error = %e, "Failed to set TCP_NODELAY");
            }
        }

        let info = ConnectionInfo {
            session_id,
            peer_addr,
        };
        let config = self.config.clone();
        let handler = Arc::clone(&self.handler);
        let registry = Arc::clone(&self.registry);
        let shutdown = self.shutdown_rx.clone();
        let active = Arc::clone(&self.active_connections);

        tokio::spawn(async move {
            let _permit = permit;
            let connection = Connection::new(info, socket, config, handler, registry, shutdown);

            if let Err(e) = connection.run().await {
                tracing::debug!(session_id, error = %e, "Connection error");
            }

            active.fetch_sub(1, Ordering::Relaxed);
        });
    }
}
