//! Statistics for connections and the server

use std::time::Duration;

/// Per-connection statistics
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Total bytes read from the peer (request heads + frame bodies)
    pub bytes_received: u64,
    /// Total bytes written to the peer (responses + multipart parts)
    pub bytes_sent: u64,
    /// Frames ingested over this connection
    pub frames_ingested: u64,
    /// Frames delivered to this connection's viewer
    pub frames_delivered: u64,
}

impl SessionStats {
    /// Create a new stats tracker
    pub fn new() -> Self {
        Self::default()
    }
}

/// Server-wide statistics snapshot
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    /// Total connections ever accepted
    pub total_connections: u64,
    /// Currently open connections
    pub active_connections: u64,
    /// Channels currently in the registry
    pub active_channels: usize,
    /// Time since the server was created
    pub uptime: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_stats_new() {
        let stats = SessionStats::new();
        assert_eq!(stats.bytes_received, 0);
        assert_eq!(stats.bytes_sent, 0);
        assert_eq!(stats.frames_ingested, 0);
        assert_eq!(stats.frames_delivered, 0);
    }
}
