//! Registry error types

use super::frame::ChannelId;

/// Error type for registry operations
#[derive(Debug, Clone)]
pub enum RegistryError {
    /// Ingest of a zero-length frame (rejected, no state change)
    EmptyFrame(ChannelId),
    /// Channel limit reached (`max_channels` in the registry config)
    TooManyChannels(usize),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::EmptyFrame(id) => {
                write!(f, "empty frame rejected on channel {}", id)
            }
            RegistryError::TooManyChannels(limit) => {
                write!(f, "channel limit reached ({})", limit)
            }
        }
    }
}

impl std::error::Error for RegistryError {}
