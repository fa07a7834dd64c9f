//! HTTP server: ingest and view endpoints
//!
//! [`MjpegServer`] accepts raw JPEG frames from producers over
//! `POST /stream[/{channel}]` and fans them out to viewers over
//! `GET /video[/{channel}]` as a `multipart/x-mixed-replace` stream.

pub mod config;
pub mod connection;
pub mod handler;
pub mod listener;

pub use config::ServerConfig;
pub use handler::{Access, AllowAll, ConnectionInfo, StreamHandler};
pub use listener::MjpegServer;
