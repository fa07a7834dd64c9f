//! Channel and frame types for stream routing
//!
//! This module defines the key types for identifying channels and the
//! frames that are broadcast to viewers.

use bytes::Bytes;

/// Unique identifier for a stream channel
///
/// A channel scopes one latest-frame slot and one viewer set. In the
/// relay deployment the token is supplied by the producer as a path
/// segment (typically a UUID); single-stream deployments use
/// [`ChannelId::single`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelId(String);

impl ChannelId {
    /// Create a new channel id from an opaque token
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The implicit channel used when no id is given (`/stream`, `/video`)
    pub fn single() -> Self {
        Self("default".to_string())
    }

    /// Get the token as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for ChannelId {
    fn from(token: String) -> Self {
        Self(token)
    }
}

/// One complete JPEG image, broadcast to viewers as-is
///
/// Cheap to clone: the payload is reference-counted `Bytes`, so fan-out
/// to many viewers shares a single allocation. Frames are never mutated
/// once created.
#[derive(Debug, Clone)]
pub struct Frame {
    /// JPEG-encoded image data
    pub data: Bytes,
    /// Per-channel sequence number, assigned at ingest
    pub seq: u64,
}

impl Frame {
    /// Create a frame with the given sequence number
    pub fn new(data: Bytes, seq: u64) -> Self {
        Self { data, seq }
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
