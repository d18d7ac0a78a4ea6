use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use nanoid::nanoid;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;

use gridcast_core::models::SourceId;

use crate::credential::{JoinCredential, JoinGrant};
use crate::error::MediaError;
use crate::frame::{AudioFrame, MediaFrameEvent, VideoFrame};
use crate::transport::MediaTransport;

/// How often to log per-subscriber drop warnings (every N drops).
const DROP_LOG_INTERVAL: u64 = 100;

/// Credentials outlive logins a little; four hours matches the control
/// surface's token TTL.
const DEFAULT_GRANT_TTL_HOURS: i64 = 4;

const DEFAULT_SUBSCRIBER_CAPACITY: usize = 64;

struct SubscriberSlot {
    sender: mpsc::Sender<MediaFrameEvent>,
    drop_count: Arc<AtomicU64>,
}

/// Per-source state: the single publisher slot and the subscriber table.
struct SourceChannel {
    id: SourceId,
    /// Publication ID currently owning this source, if any.
    publisher: Mutex<Option<u64>>,
    live: AtomicBool,
    subscribers: Mutex<HashMap<u64, SubscriberSlot>>,
}

impl SourceChannel {
    fn new(id: SourceId) -> Self {
        Self {
            id,
            publisher: Mutex::new(None),
            live: AtomicBool::new(false),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    fn claim_publisher(&self, publication_id: u64) -> Result<(), MediaError> {
        let mut publisher = self.publisher.lock();
        if publisher.is_some() {
            return Err(MediaError::SourceBusy(self.id.to_string()));
        }
        *publisher = Some(publication_id);
        self.live.store(true, Ordering::Release);
        Ok(())
    }

    fn release_publisher(&self, publication_id: u64) {
        {
            let mut publisher = self.publisher.lock();
            if *publisher != Some(publication_id) {
                return;
            }
            *publisher = None;
        }
        self.live.store(false, Ordering::Release);
        self.fan_out(MediaFrameEvent::PublisherClosed);
        tracing::debug!(source = %self.id, "publisher released source");
    }

    fn add_subscriber(
        &self,
        id: u64,
        capacity: usize,
    ) -> (mpsc::Receiver<MediaFrameEvent>, Arc<AtomicU64>) {
        let (sender, receiver) = mpsc::channel(capacity);
        let drop_count = Arc::new(AtomicU64::new(0));
        self.subscribers.lock().insert(
            id,
            SubscriberSlot {
                sender,
                drop_count: Arc::clone(&drop_count),
            },
        );
        (receiver, drop_count)
    }

    fn remove_subscriber(&self, id: u64) {
        self.subscribers.lock().remove(&id);
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Snapshot senders and drop counters under the lock, then fan out
    /// lock-free. Full queues drop the frame for that subscriber only;
    /// closed subscribers are pruned in a second lock acquisition.
    fn fan_out(&self, event: MediaFrameEvent) {
        let snapshot: Vec<(u64, mpsc::Sender<MediaFrameEvent>, Arc<AtomicU64>)> = {
            let guard = self.subscribers.lock();
            guard
                .iter()
                .map(|(id, slot)| (*id, slot.sender.clone(), Arc::clone(&slot.drop_count)))
                .collect()
        };

        if snapshot.is_empty() {
            return;
        }

        let mut closed_ids = Vec::new();
        for (id, sender, drop_count) in &snapshot {
            match sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    let prev = drop_count.fetch_add(1, Ordering::Relaxed);
                    if (prev + 1) % DROP_LOG_INTERVAL == 0 {
                        tracing::warn!(
                            source = %self.id,
                            subscriber = id,
                            dropped = prev + 1,
                            "subscriber dropping frames due to backpressure"
                        );
                    }
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    closed_ids.push(*id);
                }
            }
        }

        if !closed_ids.is_empty() {
            let mut guard = self.subscribers.lock();
            for id in closed_ids {
                guard.remove(&id);
                tracing::debug!(source = %self.id, subscriber = id, "removed closed subscriber");
            }
        }
    }
}

/// A claimed source. Frames pushed here fan out to every subscriber of the
/// source. Dropping the publication releases the source and tells
/// subscribers the publisher went away.
pub struct Publication {
    channel: Arc<SourceChannel>,
    publication_id: u64,
    identity: String,
}

impl Publication {
    #[must_use]
    pub fn source_id(&self) -> &SourceId {
        &self.channel.id
    }

    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.channel.subscriber_count()
    }

    pub fn send_video(&self, frame: VideoFrame) -> Result<(), MediaError> {
        self.channel.fan_out(MediaFrameEvent::Video(frame));
        Ok(())
    }

    pub fn send_audio(&self, frame: AudioFrame) -> Result<(), MediaError> {
        self.channel.fan_out(MediaFrameEvent::Audio(frame));
        Ok(())
    }
}

impl Drop for Publication {
    fn drop(&mut self) {
        self.channel.release_publisher(self.publication_id);
    }
}

/// One subscriber's bounded frame queue on a source.
///
/// Outlives publishers: after [`MediaFrameEvent::PublisherClosed`] the queue
/// stays open and frames resume if the source is claimed again.
pub struct Subscription {
    channel: Arc<SourceChannel>,
    subscriber_id: u64,
    receiver: mpsc::Receiver<MediaFrameEvent>,
    drop_count: Arc<AtomicU64>,
}

impl Subscription {
    #[must_use]
    pub fn source_id(&self) -> &SourceId {
        &self.channel.id
    }

    /// Frames dropped for this subscriber because its queue was full.
    #[must_use]
    pub fn dropped_frames(&self) -> u64 {
        self.drop_count.load(Ordering::Relaxed)
    }

    pub async fn recv(&mut self) -> Option<MediaFrameEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<MediaFrameEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.channel.remove_subscriber(self.subscriber_id);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HubStats {
    pub grants: usize,
    pub sources: usize,
    pub live_sources: usize,
    pub subscribers: usize,
}

/// In-process media hub.
///
/// Sources spring into existence on first use and stick around; they are
/// names, not resources. All state is process-local, so a restart drops all
/// grants, publishers and subscribers together.
pub struct MediaHub {
    grants: DashMap<String, JoinGrant>,
    sources: DashMap<SourceId, Arc<SourceChannel>>,
    subscriber_capacity: usize,
    grant_ttl: Duration,
    next_id: AtomicU64,
}

impl Default for MediaHub {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

impl MediaHub {
    #[must_use]
    pub fn new(subscriber_capacity: usize) -> Self {
        Self {
            grants: DashMap::new(),
            sources: DashMap::new(),
            subscriber_capacity: subscriber_capacity.max(1),
            grant_ttl: Duration::hours(DEFAULT_GRANT_TTL_HOURS),
            next_id: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn with_grant_ttl(mut self, ttl: Duration) -> Self {
        self.grant_ttl = ttl;
        self
    }

    fn channel(&self, source: &SourceId) -> Arc<SourceChannel> {
        self.sources
            .entry(source.clone())
            .or_insert_with(|| Arc::new(SourceChannel::new(source.clone())))
            .clone()
    }

    fn resolve_grant(&self, credential: &JoinCredential) -> Result<JoinGrant, MediaError> {
        let grant = self
            .grants
            .get(&credential.token)
            .ok_or(MediaError::Unauthorized)?;

        if grant.issued_at + self.grant_ttl <= Utc::now() {
            drop(grant);
            self.grants.remove(&credential.token);
            return Err(MediaError::Unauthorized);
        }

        Ok(grant.clone())
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    #[must_use]
    pub fn stats(&self) -> HubStats {
        let mut live_sources = 0;
        let mut subscribers = 0;
        for entry in self.sources.iter() {
            if entry.value().live.load(Ordering::Acquire) {
                live_sources += 1;
            }
            subscribers += entry.value().subscriber_count();
        }
        HubStats {
            grants: self.grants.len(),
            sources: self.sources.len(),
            live_sources,
            subscribers,
        }
    }
}

#[async_trait]
impl MediaTransport for MediaHub {
    async fn issue_join_credential(
        &self,
        target: &SourceId,
        identity: &str,
        can_publish: bool,
        can_subscribe: bool,
    ) -> Result<JoinCredential, MediaError> {
        // Issuance is the hub's only periodic touchpoint, so expired grants
        // get swept here.
        let now = Utc::now();
        let ttl = self.grant_ttl;
        self.grants.retain(|_, grant| grant.issued_at + ttl > now);

        let token = nanoid!(32);
        self.grants.insert(
            token.clone(),
            JoinGrant {
                target: target.clone(),
                identity: identity.to_string(),
                can_publish,
                can_subscribe,
                issued_at: now,
            },
        );

        tracing::debug!(
            target = %target,
            identity = identity,
            can_publish,
            can_subscribe,
            "join credential issued"
        );
        Ok(JoinCredential::new(token))
    }

    async fn publish(&self, credential: &JoinCredential) -> Result<Publication, MediaError> {
        let grant = self.resolve_grant(credential)?;
        if !grant.can_publish {
            return Err(MediaError::Forbidden(format!(
                "credential for {} does not allow publishing",
                grant.target
            )));
        }

        let channel = self.channel(&grant.target);
        let publication_id = self.next_id();
        channel.claim_publisher(publication_id)?;

        tracing::info!(source = %grant.target, identity = %grant.identity, "publisher connected");
        Ok(Publication {
            channel,
            publication_id,
            identity: grant.identity,
        })
    }

    async fn subscribe(&self, credential: &JoinCredential) -> Result<Subscription, MediaError> {
        let grant = self.resolve_grant(credential)?;
        if !grant.can_subscribe {
            return Err(MediaError::Forbidden(format!(
                "credential for {} does not allow subscribing",
                grant.target
            )));
        }

        let channel = self.channel(&grant.target);
        let subscriber_id = self.next_id();
        let (receiver, drop_count) =
            channel.add_subscriber(subscriber_id, self.subscriber_capacity);

        tracing::debug!(source = %grant.target, identity = %grant.identity, "subscriber attached");
        Ok(Subscription {
            channel,
            subscriber_id,
            receiver,
            drop_count,
        })
    }

    fn source_live(&self, source: &SourceId) -> bool {
        self.sources
            .get(source)
            .map(|channel| channel.live.load(Ordering::Acquire))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    async fn publish_credential(hub: &MediaHub, source: &str) -> JoinCredential {
        hub.issue_join_credential(&SourceId::from(source), "test-publisher", true, false)
            .await
            .unwrap()
    }

    async fn subscribe_credential(hub: &MediaHub, source: &str) -> JoinCredential {
        hub.issue_join_credential(&SourceId::from(source), "test-subscriber", false, true)
            .await
            .unwrap()
    }

    fn video() -> VideoFrame {
        VideoFrame::new(2, 2, Bytes::from(vec![255u8; 16]))
    }

    #[tokio::test]
    async fn test_publish_subscribe_roundtrip() {
        let hub = MediaHub::default();
        let publication = hub
            .publish(&publish_credential(&hub, "gate-north").await)
            .await
            .unwrap();
        let mut subscription = hub
            .subscribe(&subscribe_credential(&hub, "gate-north").await)
            .await
            .unwrap();

        publication.send_video(video()).unwrap();
        publication
            .send_audio(AudioFrame::silence(48000, 2, 960))
            .unwrap();

        match subscription.recv().await {
            Some(MediaFrameEvent::Video(frame)) => assert_eq!(frame.data.len(), 16),
            other => panic!("expected video, got {other:?}"),
        }
        match subscription.recv().await {
            Some(MediaFrameEvent::Audio(chunk)) => assert_eq!(chunk.samples.len(), 960),
            other => panic!("expected audio, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_credential_rejected() {
        let hub = MediaHub::default();
        let bogus = JoinCredential::new("no-such-token");
        assert!(matches!(
            hub.publish(&bogus).await,
            Err(MediaError::Unauthorized)
        ));
        assert!(matches!(
            hub.subscribe(&bogus).await,
            Err(MediaError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_capabilities_enforced() {
        let hub = MediaHub::default();

        let sub_only = subscribe_credential(&hub, "gate-north").await;
        assert!(matches!(
            hub.publish(&sub_only).await,
            Err(MediaError::Forbidden(_))
        ));

        let pub_only = publish_credential(&hub, "gate-north").await;
        assert!(matches!(
            hub.subscribe(&pub_only).await,
            Err(MediaError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_source_admits_single_publisher() {
        let hub = MediaHub::default();
        let first = hub
            .publish(&publish_credential(&hub, "gate-north").await)
            .await
            .unwrap();

        let second = hub.publish(&publish_credential(&hub, "gate-north").await).await;
        assert!(matches!(second, Err(MediaError::SourceBusy(_))));

        // Releasing the slot lets the next publisher in.
        drop(first);
        assert!(!hub.source_live(&SourceId::from("gate-north")));
        let _third = hub
            .publish(&publish_credential(&hub, "gate-north").await)
            .await
            .unwrap();
        assert!(hub.source_live(&SourceId::from("gate-north")));
    }

    #[tokio::test]
    async fn test_subscription_survives_publisher_restart() {
        let hub = MediaHub::default();
        let mut subscription = hub
            .subscribe(&subscribe_credential(&hub, "gate-north").await)
            .await
            .unwrap();

        let publication = hub
            .publish(&publish_credential(&hub, "gate-north").await)
            .await
            .unwrap();
        publication.send_video(video()).unwrap();
        drop(publication);

        assert!(matches!(
            subscription.recv().await,
            Some(MediaFrameEvent::Video(_))
        ));
        assert!(matches!(
            subscription.recv().await,
            Some(MediaFrameEvent::PublisherClosed)
        ));

        // Same subscription sees the next publisher's frames.
        let publication = hub
            .publish(&publish_credential(&hub, "gate-north").await)
            .await
            .unwrap();
        publication.send_video(video()).unwrap();
        assert!(matches!(
            subscription.recv().await,
            Some(MediaFrameEvent::Video(_))
        ));
    }

    #[tokio::test]
    async fn test_slow_subscriber_drops_frames() {
        let hub = MediaHub::new(1);
        let publication = hub
            .publish(&publish_credential(&hub, "gate-north").await)
            .await
            .unwrap();
        let mut subscription = hub
            .subscribe(&subscribe_credential(&hub, "gate-north").await)
            .await
            .unwrap();

        for _ in 0..3 {
            publication.send_video(video()).unwrap();
        }

        // Queue held one frame; the rest were dropped, publisher never blocked.
        assert!(matches!(
            subscription.recv().await,
            Some(MediaFrameEvent::Video(_))
        ));
        assert_eq!(subscription.dropped_frames(), 2);
        assert!(subscription.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_dropped_subscription_detaches() {
        let hub = MediaHub::default();
        let publication = hub
            .publish(&publish_credential(&hub, "gate-north").await)
            .await
            .unwrap();
        let subscription = hub
            .subscribe(&subscribe_credential(&hub, "gate-north").await)
            .await
            .unwrap();
        assert_eq!(publication.subscriber_count(), 1);

        drop(subscription);
        assert_eq!(publication.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_grant_rejected() {
        let hub = MediaHub::default().with_grant_ttl(Duration::seconds(-1));
        let credential = publish_credential(&hub, "gate-north").await;
        assert!(matches!(
            hub.publish(&credential).await,
            Err(MediaError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_stats_reflect_activity() {
        let hub = MediaHub::default();
        let publication = hub
            .publish(&publish_credential(&hub, "gate-north").await)
            .await
            .unwrap();
        let _subscription = hub
            .subscribe(&subscribe_credential(&hub, "plaza").await)
            .await
            .unwrap();

        let stats = hub.stats();
        assert_eq!(stats.sources, 2);
        assert_eq!(stats.live_sources, 1);
        assert_eq!(stats.subscribers, 1);
        assert_eq!(stats.grants, 2);

        drop(publication);
        assert_eq!(hub.stats().live_sources, 0);
    }
}
