//! Channel registry implementation
//!
//! The central registry that manages all channels and routes frames
//! from the producer to viewers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::{broadcast, RwLock};

use super::config::RegistryConfig;
use super::entry::{ChannelEntry, ChannelStats};
use super::error::RegistryError;
use super::frame::{ChannelId, Frame};

/// Central registry mapping channel ids to their latest-frame slot and viewer set
///
/// Thread-safe via `RwLock`. Channels are created on first use — by the
/// first ingest or by the first viewer, whichever comes first — and are
/// never shared across ids.
pub struct ChannelRegistry {
    /// Map of channel id to channel entry
    channels: RwLock<HashMap<ChannelId, Arc<RwLock<ChannelEntry>>>>,

    /// Configuration
    config: RegistryConfig,
}

impl ChannelRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Ingest a frame: store it as the channel's latest and broadcast it
    ///
    /// The store and the broadcast happen under the channel entry's
    /// write lock, so a concurrently connecting viewer either replays
    /// this frame or receives it live — never both, never neither.
    ///
    /// Empty payloads are rejected without any state change.
    pub async fn ingest(&self, id: &ChannelId, data: Bytes) -> Result<Frame, RegistryError> {
        if data.is_empty() {
            return Err(RegistryError::EmptyFrame(id.clone()));
        }

        let entry_arc = self.get_or_create(id).await?;
        let mut entry = entry_arc.write().await;
        let frame = entry.ingest(data);

        tracing::trace!(
            channel = %id,
            seq = frame.seq,
            len = frame.len(),
            viewers = entry.subscriber_count(),
            "Frame ingested"
        );

        Ok(frame)
    }

    /// Subscribe a viewer to a channel
    ///
    /// Creates the channel if it does not exist yet (a viewer may
    /// connect before the producer). The returned [`Subscription`]
    /// carries the latest frame for connect-time replay, captured
    /// atomically with respect to ingest.
    pub async fn subscribe(&self, id: &ChannelId) -> Result<Subscription, RegistryError> {
        let entry_arc = self.get_or_create(id).await?;
        let entry = entry_arc.read().await;

        let rx = entry.subscribe();
        let replay = entry.latest().cloned();
        entry.subscribers.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            channel = %id,
            viewers = entry.subscriber_count(),
            replay = replay.is_some(),
            "Viewer subscribed"
        );

        Ok(Subscription {
            channel: id.clone(),
            rx,
            replay,
            subscribers: Arc::clone(&entry.subscribers),
            detached: false,
        })
    }

    /// Get the latest frame of a channel without subscribing
    pub async fn latest_frame(&self, id: &ChannelId) -> Option<Frame> {
        let channels = self.channels.read().await;
        let entry_arc = channels.get(id)?;
        let entry = entry_arc.read().await;
        entry.latest().cloned()
    }

    /// Get statistics for a channel
    pub async fn channel_stats(&self, id: &ChannelId) -> Option<ChannelStats> {
        let channels = self.channels.read().await;
        let entry_arc = channels.get(id)?;
        let entry = entry_arc.read().await;
        Some(entry.stats())
    }

    /// Get the number of channels
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Run cleanup once
    ///
    /// Removes channels that have no viewers and have not seen a frame
    /// for longer than `idle_channel_timeout`.
    pub async fn cleanup(&self) {
        let mut channels = self.channels.write().await;
        let now = Instant::now();

        let ids_to_remove: Vec<ChannelId> = channels
            .iter()
            .filter_map(|(id, entry_arc)| {
                // Skip entries currently locked by ingest or subscribe
                if let Ok(entry) = entry_arc.try_read() {
                    let idle = entry.subscriber_count() == 0
                        && entry.idle_for(now) > self.config.idle_channel_timeout;
                    if idle {
                        return Some(id.clone());
                    }
                }
                None
            })
            .collect();

        for id in ids_to_remove {
            channels.remove(&id);
            tracing::info!(channel = %id, "Idle channel removed by cleanup");
        }
    }

    /// Spawn the background cleanup task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        let interval = registry.config.cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.cleanup().await;
            }
        })
    }

    /// Look up a channel, creating it if missing
    async fn get_or_create(
        &self,
        id: &ChannelId,
    ) -> Result<Arc<RwLock<ChannelEntry>>, RegistryError> {
        {
            let channels = self.channels.read().await;
            if let Some(entry_arc) = channels.get(id) {
                return Ok(Arc::clone(entry_arc));
            }
        }

        let mut channels = self.channels.write().await;
        // Re-check: another task may have created the channel meanwhile
        if let Some(entry_arc) = channels.get(id) {
            return Ok(Arc::clone(entry_arc));
        }

        if self.config.max_channels > 0 && channels.len() >= self.config.max_channels {
            tracing::warn!(
                channel = %id,
                limit = self.config.max_channels,
                "Channel rejected: limit reached"
            );
            return Err(RegistryError::TooManyChannels(self.config.max_channels));
        }

        let entry_arc = Arc::new(RwLock::new(ChannelEntry::new(&self.config)));
        channels.insert(id.clone(), Arc::clone(&entry_arc));

        tracing::info!(channel = %id, channels = channels.len(), "Channel created");

        Ok(entry_arc)
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A viewer's membership in a channel
///
/// Owns the broadcast receiver and the connect-time replay frame.
/// Dropping the subscription (or calling [`unsubscribe`]) removes the
/// viewer exactly once, however many teardown paths run.
///
/// [`unsubscribe`]: Subscription::unsubscribe
pub struct Subscription {
    channel: ChannelId,
    rx: broadcast::Receiver<Frame>,
    replay: Option<Frame>,
    subscribers: Arc<AtomicU32>,
    detached: bool,
}

impl Subscription {
    /// The channel this subscription belongs to
    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// Take the replay frame (the channel's latest at connect time)
    pub fn take_replay(&mut self) -> Option<Frame> {
        self.replay.take()
    }

    /// Receive the next frame
    ///
    /// A viewer that falls behind the broadcast ring skips the missed
    /// frames and resumes at the newest one (latest-frame-wins). Returns
    /// `None` once the channel is gone.
    pub async fn recv(&mut self) -> Option<Frame> {
        loop {
            match self.rx.recv().await {
                Ok(frame) => return Some(frame),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::trace!(
                        channel = %self.channel,
                        skipped,
                        "Slow viewer skipped frames"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Remove the viewer from the channel; idempotent
    pub fn unsubscribe(&mut self) {
        if self.detached {
            return;
        }
        self.detached = true;

        let remaining = self.subscribers.fetch_sub(1, Ordering::Relaxed) - 1;
        tracing::debug!(
            channel = %self.channel,
            viewers = remaining,
            "Viewer unsubscribed"
        );
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::assert_ok;

    use super::*;

    fn jpeg(len: usize) -> Bytes {
        // SOI marker + filler + EOI marker, enough to look like a payload
        let mut data = vec![0xAB; len];
        data[0] = 0xFF;
        data[1] = 0xD8;
        data[len - 2] = 0xFF;
        data[len - 1] = 0xD9;
        Bytes::from(data)
    }

    #[tokio::test]
    async fn test_replay_on_connect() {
        let registry = ChannelRegistry::new();
        let id = ChannelId::new("cam-1");

        assert_ok!(registry.ingest(&id, jpeg(500)).await);

        let mut sub = registry.subscribe(&id).await.unwrap();
        let replay = sub.take_replay().expect("latest frame replayed");
        assert_eq!(replay.len(), 500);
        assert_eq!(replay.seq, 0);
    }

    #[tokio::test]
    async fn test_no_replay_when_empty() {
        let registry = ChannelRegistry::new();
        let id = ChannelId::new("cam-1");

        let mut sub = registry.subscribe(&id).await.unwrap();
        assert!(sub.take_replay().is_none());

        // First ingest arrives live instead
        assert_ok!(registry.ingest(&id, jpeg(100)).await);
        let frame = sub.recv().await.unwrap();
        assert_eq!(frame.seq, 0);
        assert_eq!(frame.len(), 100);
    }

    #[tokio::test]
    async fn test_fan_out_ordering() {
        let registry = ChannelRegistry::new();
        let id = ChannelId::new("cam-1");

        let mut v1 = registry.subscribe(&id).await.unwrap();
        let mut v2 = registry.subscribe(&id).await.unwrap();

        registry.ingest(&id, jpeg(500)).await.unwrap();
        registry.ingest(&id, jpeg(700)).await.unwrap();

        for viewer in [&mut v1, &mut v2] {
            let f1 = viewer.recv().await.unwrap();
            let f2 = viewer.recv().await.unwrap();
            assert_eq!(f1.seq, 0);
            assert_eq!(f1.len(), 500);
            assert_eq!(f2.seq, 1);
            assert_eq!(f2.len(), 700);
        }
    }

    #[tokio::test]
    async fn test_late_joiner_replays_latest_only() {
        let registry = ChannelRegistry::new();
        let id = ChannelId::new("cam-1");

        registry.ingest(&id, jpeg(500)).await.unwrap();
        registry.ingest(&id, jpeg(700)).await.unwrap();

        // The late joiner gets B (the latest), not A
        let mut sub = registry.subscribe(&id).await.unwrap();
        let replay = sub.take_replay().unwrap();
        assert_eq!(replay.seq, 1);
        assert_eq!(replay.len(), 700);
    }

    #[tokio::test]
    async fn test_empty_frame_rejected_without_state_change() {
        let registry = ChannelRegistry::new();
        let id = ChannelId::new("cam-1");

        let result = registry.ingest(&id, Bytes::new()).await;
        assert!(matches!(result, Err(RegistryError::EmptyFrame(_))));

        // Nothing was stored, not even the channel
        assert_eq!(registry.channel_count().await, 0);
        assert!(registry.latest_frame(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let registry = ChannelRegistry::new();
        let id = ChannelId::new("cam-1");

        let mut v1 = registry.subscribe(&id).await.unwrap();
        let _v2 = registry.subscribe(&id).await.unwrap();
        assert_eq!(registry.channel_stats(&id).await.unwrap().subscribers, 2);

        v1.unsubscribe();
        v1.unsubscribe();
        drop(v1);

        // Removed exactly once despite three teardown calls
        assert_eq!(registry.channel_stats(&id).await.unwrap().subscribers, 1);
    }

    #[tokio::test]
    async fn test_slow_viewer_skips_to_newest() {
        let config = RegistryConfig::default().broadcast_capacity(2);
        let registry = ChannelRegistry::with_config(config);
        let id = ChannelId::new("cam-1");

        let mut sub = registry.subscribe(&id).await.unwrap();

        // Overflow the ring without the viewer draining it
        for _ in 0..6 {
            registry.ingest(&id, jpeg(64)).await.unwrap();
        }

        // The viewer resumes at a newer frame, in order, without error
        let frame = sub.recv().await.unwrap();
        assert!(frame.seq >= 4);
        let next = sub.recv().await.unwrap();
        assert_eq!(next.seq, frame.seq + 1);
    }

    #[tokio::test]
    async fn test_channels_are_independent() {
        let registry = ChannelRegistry::new();
        let cam1 = ChannelId::new("cam-1");
        let cam2 = ChannelId::new("cam-2");

        let mut sub2 = registry.subscribe(&cam2).await.unwrap();
        registry.ingest(&cam1, jpeg(500)).await.unwrap();

        // cam-2's viewer sees neither a replay nor a live frame from cam-1
        assert!(sub2.take_replay().is_none());
        assert!(registry.latest_frame(&cam2).await.is_none());
        assert_eq!(registry.channel_stats(&cam1).await.unwrap().subscribers, 0);
        assert_eq!(registry.channel_count().await, 2);
    }

    #[tokio::test]
    async fn test_channel_limit() {
        let config = RegistryConfig::default().max_channels(1);
        let registry = ChannelRegistry::with_config(config);

        registry
            .ingest(&ChannelId::new("cam-1"), jpeg(64))
            .await
            .unwrap();

        let result = registry.ingest(&ChannelId::new("cam-2"), jpeg(64)).await;
        assert!(matches!(result, Err(RegistryError::TooManyChannels(1))));

        // Existing channels keep working at the limit
        assert_ok!(registry.ingest(&ChannelId::new("cam-1"), jpeg(64)).await);
    }

    #[tokio::test]
    async fn test_cleanup_removes_idle_channels() {
        let config = RegistryConfig::default().idle_channel_timeout(std::time::Duration::ZERO);
        let registry = ChannelRegistry::with_config(config);
        let idle = ChannelId::new("idle");
        let watched = ChannelId::new("watched");

        registry.ingest(&idle, jpeg(64)).await.unwrap();
        registry.ingest(&watched, jpeg(64)).await.unwrap();
        let _sub = registry.subscribe(&watched).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        registry.cleanup().await;

        // Only the channel with no viewers is collected
        assert_eq!(registry.channel_count().await, 1);
        assert!(registry.channel_stats(&watched).await.is_some());
        assert!(registry.channel_stats(&idle).await.is_none());
    }
}
