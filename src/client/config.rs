//! Upload client configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::registry::ChannelId;

/// Configuration for the frame upload client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay server address
    pub server_addr: SocketAddr,

    /// Channel to publish to
    pub channel: ChannelId,

    /// TCP connect timeout
    pub connect_timeout: Duration,

    /// Timeout for one frame upload (write + response)
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Create a new config for the given relay and channel
    pub fn new(server_addr: SocketAddr, channel: ChannelId) -> Self {
        Self {
            server_addr,
            channel,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-frame request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Request target for this channel
    pub(crate) fn path(&self) -> String {
        format!("/stream/{}", self.channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_and_path() {
        let addr: SocketAddr = "10.0.0.1:8080".parse().unwrap();
        let config = ClientConfig::new(addr, ChannelId::new("cam-1"))
            .connect_timeout(Duration::from_secs(1))
            .request_timeout(Duration::from_secs(2));

        assert_eq!(config.server_addr, addr);
        assert_eq!(config.path(), "/stream/cam-1");
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert_eq!(config.request_timeout, Duration::from_secs(2));
    }
}
