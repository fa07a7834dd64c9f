//! Application hooks for connection and stream authorization
//!
//! The server itself accepts everything; deployments that need stream
//! keys, allow-lists or connection policy implement [`StreamHandler`]
//! and pass it to [`MjpegServer::with_handler`].
//!
//! [`MjpegServer::with_handler`]: crate::server::MjpegServer::with_handler

use std::future::Future;
use std::net::SocketAddr;

use crate::registry::ChannelId;

/// Information about an accepted connection
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Unique session ID
    pub session_id: u64,
    /// Remote peer address
    pub peer_addr: SocketAddr,
}

/// Outcome of an authorization hook
#[derive(Debug, Clone)]
pub enum Access {
    /// Let the request through
    Allow,
    /// Reject with a reason (logged and answered with 403)
    Deny(String),
}

/// Server callbacks
///
/// Methods return futures so implementations can consult external state;
/// impls can simply write `async fn`. All defaults allow everything.
pub trait StreamHandler: Send + Sync + 'static {
    /// Called when a connection is accepted; return false to drop it
    fn on_connection(&self, info: &ConnectionInfo) -> impl Future<Output = bool> + Send {
        let _ = info;
        async { true }
    }

    /// Called before a frame body is read on the ingest endpoint
    fn on_ingest(
        &self,
        channel: &ChannelId,
        info: &ConnectionInfo,
    ) -> impl Future<Output = Access> + Send {
        let _ = (channel, info);
        async { Access::Allow }
    }

    /// Called before a viewer is subscribed on the view endpoint
    fn on_view(
        &self,
        channel: &ChannelId,
        info: &ConnectionInfo,
    ) -> impl Future<Output = Access> + Send {
        let _ = (channel, info);
        async { Access::Allow }
    }
}

/// Handler that allows every connection, producer and viewer
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl StreamHandler for AllowAll {}
