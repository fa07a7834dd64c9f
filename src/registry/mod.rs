//! Channel registry for frame fan-out
//!
//! The registry maps channel ids to their state and routes frames from
//! the producer to viewers. It uses `tokio::sync::broadcast` for
//! zero-copy fan-out to multiple viewers.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<ChannelRegistry>
//!                   ┌──────────────────────────┐
//!                   │ channels: HashMap<Id,    │
//!                   │   ChannelEntry {         │
//!                   │     latest: Option<Frame>│
//!                   │     tx: broadcast::Tx,   │
//!                   │   }                      │
//!                   │ >                        │
//!                   └────────────┬─────────────┘
//!                                │
//!        ┌───────────────────────┼───────────────────────┐
//!        │                       │                       │
//!        ▼                       ▼                       ▼
//!   [Producer]               [Viewer]                [Viewer]
//!   ingest()                 sub.recv()              sub.recv()
//!        │                       │                       │
//!        └──► latest slot + broadcast ──► MJPEG part ──► TCP
//! ```
//!
//! # Latest-frame-wins
//!
//! Each channel holds at most one stored frame. Ingest replaces it and
//! broadcasts it in one step, under the channel's write lock; a viewer
//! connecting mid-ingest therefore sees each frame exactly once, either
//! as the connect-time replay or as a live delivery. Viewers that fall
//! behind skip ahead instead of buffering.
//!
//! # Zero-copy
//!
//! `bytes::Bytes` is reference counted, so every viewer of a frame
//! shares the same JPEG allocation; only the small `Frame` struct is
//! cloned per viewer.

pub mod config;
pub mod entry;
pub mod error;
pub mod frame;
pub mod store;

pub use config::RegistryConfig;
pub use entry::ChannelStats;
pub use error::RegistryError;
pub use frame::{ChannelId, Frame};
pub use store::{ChannelRegistry, Subscription};
