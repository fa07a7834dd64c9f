//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Disconnect an ingest connection that sends nothing for this long
    pub idle_timeout: Duration,

    /// Per-write timeout on viewer sockets
    ///
    /// A viewer that cannot take a whole frame within this window is
    /// dropped; it never delays the producer or other viewers.
    pub viewer_write_timeout: Duration,

    /// Maximum accepted frame size in bytes
    pub max_frame_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().unwrap(),
            max_connections: 0, // Unlimited
            tcp_nodelay: true,  // Important for low latency
            idle_timeout: Duration::from_secs(60),
            viewer_write_timeout: Duration::from_secs(10),
            max_frame_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the ingest idle timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the per-viewer write timeout
    pub fn viewer_write_timeout(mut self, timeout: Duration) -> Self {
        self.viewer_write_timeout = timeout;
        self
    }

    /// Set the maximum accepted frame size
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.max_connections, 0);
        assert!(config.tcp_nodelay);
        assert_eq!(config.idle_timeout, Duration::from_secs(60));
        assert_eq!(config.viewer_write_timeout, Duration::from_secs(10));
        assert_eq!(config.max_frame_size, 10 * 1024 * 1024);
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 9090);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:8081".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .max_connections(50)
            .idle_timeout(Duration::from_secs(5))
            .viewer_write_timeout(Duration::from_secs(2))
            .max_frame_size(1024);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.idle_timeout, Duration::from_secs(5));
        assert_eq!(config.viewer_write_timeout, Duration::from_secs(2));
        assert_eq!(config.max_frame_size, 1024);
    }
}
