//! Frame upload client
//!
//! Used by producers that cannot (or should not) run their own server:
//! frames are pushed to a remote relay over plain HTTP POSTs and fanned
//! out from there.

pub mod config;
pub mod uploader;

pub use config::ClientConfig;
pub use uploader::{FrameUploader, UploadEvent};
