//! Per-source ingest for the compositor.
//!
//! A [`SourceHandle`] owns one subscription on the media transport and keeps
//! two cells the redraw loop reads without blocking: the latest video frame
//! and a single-chunk audio tap. A background pump task moves frames from the
//! subscription into the cells and blanks them when the publisher leaves.

use std::sync::Arc;

use gridcast_core::models::SourceId;
use gridcast_core::Result;
use gridcast_media::{MediaFrameEvent, MediaTransport, Subscription, VideoFrame};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::mixer::AudioTap;

/// A live view of one source, shared by every slot that selected it.
pub struct SourceHandle {
    source_id: SourceId,
    latest_video: Arc<RwLock<Option<Arc<VideoFrame>>>>,
    audio_tap: AudioTap,
    cancel: CancellationToken,
}

impl SourceHandle {
    /// Subscribe to `source_id` and start pumping its frames.
    ///
    /// The subscription outlives publisher churn: when the current publisher
    /// leaves, the cells are blanked and the pump keeps waiting for the next
    /// one.
    pub async fn acquire(
        transport: &dyn MediaTransport,
        source_id: SourceId,
        identity: &str,
    ) -> Result<Arc<Self>> {
        let credential = transport
            .issue_join_credential(&source_id, identity, false, true)
            .await?;
        let subscription = transport.subscribe(&credential).await?;
        debug!(source = %source_id, "compositor subscribed to source");
        Ok(Self::start(source_id, subscription))
    }

    fn start(source_id: SourceId, mut subscription: Subscription) -> Arc<Self> {
        let handle = Arc::new(Self {
            source_id,
            latest_video: Arc::new(RwLock::new(None)),
            audio_tap: AudioTap::new(),
            cancel: CancellationToken::new(),
        });

        let latest_video = handle.latest_video.clone();
        let audio_tap = handle.audio_tap.clone();
        let cancel = handle.cancel.clone();
        let source = handle.source_id.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = subscription.recv() => match event {
                        Some(MediaFrameEvent::Video(frame)) => {
                            *latest_video.write() = Some(Arc::new(frame));
                        }
                        Some(MediaFrameEvent::Audio(chunk)) => {
                            audio_tap.push(chunk);
                        }
                        Some(MediaFrameEvent::PublisherClosed) => {
                            debug!(source = %source, "publisher left, blanking slot");
                            *latest_video.write() = None;
                            audio_tap.clear();
                        }
                        None => break,
                    },
                }
            }
            debug!(source = %source, "source pump stopped");
        });

        handle
    }

    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    /// Latest video frame, if the publisher has produced one.
    #[must_use]
    pub fn latest_video(&self) -> Option<Arc<VideoFrame>> {
        self.latest_video.read().clone()
    }

    /// The audio mailbox this handle fills. Attach it to the mixer to hear
    /// the source.
    #[must_use]
    pub fn audio_tap(&self) -> AudioTap {
        self.audio_tap.clone()
    }
}

impl Drop for SourceHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
