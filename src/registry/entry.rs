//! Per-channel state stored in the registry

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::broadcast;

use super::config::RegistryConfig;
use super::frame::Frame;

/// State for a single channel: the latest-frame slot plus the fan-out sender
///
/// The latest-frame slot holds at most one frame (last-write-wins, no
/// history). [`ingest`](ChannelEntry::ingest) replaces the slot and
/// broadcasts while the caller holds the entry's write lock, which is
/// what keeps connect-time replay and live delivery mutually exclusive
/// per frame.
pub struct ChannelEntry {
    /// Most recent frame, replayed to connecting viewers
    latest: Option<Frame>,

    /// Broadcast sender for fan-out to viewers
    pub(super) tx: broadcast::Sender<Frame>,

    /// Number of active viewers; shared with subscription drop guards
    pub(super) subscribers: Arc<AtomicU32>,

    /// Sequence number for the next ingested frame
    next_seq: u64,

    /// Total frames ingested on this channel
    frames_ingested: u64,

    /// Total payload bytes ingested on this channel
    bytes_ingested: u64,

    /// When the channel was created
    pub(super) created_at: Instant,

    /// When a frame last arrived (None before the first ingest)
    pub(super) last_ingest_at: Option<Instant>,
}

impl ChannelEntry {
    /// Create a new channel entry
    pub(super) fn new(config: &RegistryConfig) -> Self {
        let (tx, _) = broadcast::channel(config.broadcast_capacity);

        Self {
            latest: None,
            tx,
            subscribers: Arc::new(AtomicU32::new(0)),
            next_seq: 0,
            frames_ingested: 0,
            bytes_ingested: 0,
            created_at: Instant::now(),
            last_ingest_at: None,
        }
    }

    /// Store a new frame in the latest slot and broadcast it
    ///
    /// Returns the sequenced frame. `send` failing only means there are
    /// currently no viewers, which is not an error.
    pub(super) fn ingest(&mut self, data: Bytes) -> Frame {
        let frame = Frame::new(data, self.next_seq);
        self.next_seq += 1;
        self.frames_ingested += 1;
        self.bytes_ingested += frame.len() as u64;
        self.last_ingest_at = Some(Instant::now());

        self.latest = Some(frame.clone());
        let _ = self.tx.send(frame.clone());

        frame
    }

    /// The current frame, if any
    pub(super) fn latest(&self) -> Option<&Frame> {
        self.latest.as_ref()
    }

    /// Subscribe to this channel's broadcast
    pub(super) fn subscribe(&self) -> broadcast::Receiver<Frame> {
        self.tx.subscribe()
    }

    /// Get the number of viewers
    pub fn subscriber_count(&self) -> u32 {
        self.subscribers.load(Ordering::Relaxed)
    }

    /// How long the channel has been without ingest
    pub(super) fn idle_for(&self, now: Instant) -> std::time::Duration {
        now.duration_since(self.last_ingest_at.unwrap_or(self.created_at))
    }

    /// Snapshot of this channel's state
    pub(super) fn stats(&self) -> ChannelStats {
        ChannelStats {
            subscribers: self.subscriber_count(),
            has_frame: self.latest.is_some(),
            frames_ingested: self.frames_ingested,
            bytes_ingested: self.bytes_ingested,
        }
    }
}

/// Statistics for a channel
#[derive(Debug, Clone)]
pub struct ChannelStats {
    /// Number of connected viewers
    pub subscribers: u32,
    /// Whether a frame is currently stored
    pub has_frame: bool,
    /// Total frames ingested
    pub frames_ingested: u64,
    /// Total payload bytes ingested
    pub bytes_ingested: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_replaces_latest() {
        let mut entry = ChannelEntry::new(&RegistryConfig::default());
        assert!(entry.latest().is_none());

        let a = entry.ingest(Bytes::from_static(b"aaaa"));
        let b = entry.ingest(Bytes::from_static(b"bb"));

        assert_eq!(a.seq, 0);
        assert_eq!(b.seq, 1);
        // Last write wins; no history
        assert_eq!(entry.latest().unwrap().seq, 1);
        assert_eq!(entry.latest().unwrap().len(), 2);

        let stats = entry.stats();
        assert_eq!(stats.frames_ingested, 2);
        assert_eq!(stats.bytes_ingested, 6);
        assert!(stats.has_frame);
    }
}
