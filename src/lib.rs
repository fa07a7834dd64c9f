//! MJPEG broadcast server and relay library
//!
//! Streams JPEG frames from producers to any number of HTTP viewers
//! using `multipart/x-mixed-replace`, the format browsers render as a
//! live image without any client-side code.
//!
//! Two deployment shapes share the same core:
//!
//! - **Local server**: the producer runs [`MjpegServer`] itself and
//!   ingests frames in-process through [`ChannelRegistry::ingest`].
//!   Viewers on the same network connect directly.
//! - **Relay**: a standalone [`MjpegServer`] runs on a public host;
//!   producers push frames to it with [`FrameUploader`] over plain
//!   HTTP POSTs, one per frame.
//!
//! Frames are live-only. Each channel keeps exactly one stored frame
//! (the most recent), replayed to viewers on connect so they see a
//! picture immediately; slow viewers skip ahead instead of buffering.
//!
//! # Example
//!
//! ```no_run
//! use mjpeg_rs::{ChannelId, MjpegServer, ServerConfig};
//! use bytes::Bytes;
//!
//! #[tokio::main]
//! async fn main() -> mjpeg_rs::Result<()> {
//!     let server = MjpegServer::new(ServerConfig::default());
//!     let registry = server.registry().clone();
//!
//!     // Producer task: ingest frames in-process
//!     tokio::spawn(async move {
//!         let jpeg = Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xD9]);
//!         let _ = registry.ingest(&ChannelId::single(), jpeg).await;
//!     });
//!
//!     // Viewers: open http://<host>:8080/video in a browser
//!     server.run().await
//! }
//! ```

pub mod client;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod stats;

pub use client::{ClientConfig, FrameUploader, UploadEvent};
pub use error::{Error, Result};
pub use registry::{ChannelId, ChannelRegistry, Frame, RegistryConfig, RegistryError, Subscription};
pub use server::{Access, AllowAll, ConnectionInfo, MjpegServer, ServerConfig, StreamHandler};
pub use stats::{ServerStats, SessionStats};
