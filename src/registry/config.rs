//! Registry configuration

use std::time::Duration;

/// Configuration for the channel registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Capacity of the per-channel broadcast ring
    ///
    /// A viewer that falls more than this many frames behind skips
    /// ahead to the newest frame (latest-frame-wins), so a small value
    /// is intentional.
    pub broadcast_capacity: usize,

    /// Remove a channel after this long without ingest and with no viewers
    pub idle_channel_timeout: Duration,

    /// How often the cleanup task scans for idle channels
    pub cleanup_interval: Duration,

    /// Maximum number of channels (0 = unlimited)
    pub max_channels: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 8,
            idle_channel_timeout: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(30),
            max_channels: 0, // Unlimited
        }
    }
}

impl RegistryConfig {
    /// Set the broadcast ring capacity (minimum 1)
    pub fn broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity.max(1);
        self
    }

    /// Set the idle channel timeout
    pub fn idle_channel_timeout(mut self, timeout: Duration) -> Self {
        self.idle_channel_timeout = timeout;
        self
    }

    /// Set the cleanup scan interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Set the channel limit (0 = unlimited)
    pub fn max_channels(mut self, max: usize) -> Self {
        self.max_channels = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();

        assert_eq!(config.broadcast_capacity, 8);
        assert_eq!(config.idle_channel_timeout, Duration::from_secs(300));
        assert_eq!(config.cleanup_interval, Duration::from_secs(30));
        assert_eq!(config.max_channels, 0);
    }

    #[test]
    fn test_builder_chaining() {
        let config = RegistryConfig::default()
            .broadcast_capacity(2)
            .idle_channel_timeout(Duration::from_secs(10))
            .cleanup_interval(Duration::from_secs(1))
            .max_channels(16);

        assert_eq!(config.broadcast_capacity, 2);
        assert_eq!(config.idle_channel_timeout, Duration::from_secs(10));
        assert_eq!(config.cleanup_interval, Duration::from_secs(1));
        assert_eq!(config.max_channels, 16);
    }

    #[test]
    fn test_capacity_floor() {
        // A zero-capacity broadcast channel would panic at construction
        let config = RegistryConfig::default().broadcast_capacity(0);

        assert_eq!(config.broadcast_capacity, 1);
    }
}
