//! The per-session render loop.
//!
//! A [`Compositor`] claims the session's composite source on the media
//! transport, subscribes to every selected source, and runs one tick loop
//! that paints the grid, mixes audio, and publishes both. Selection changes
//! swap the slot map in place; the publication is claimed once at start and
//! held until stop, so viewers never see an unpublish while reconfiguring.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gridcast_core::config::CompositorConfig;
use gridcast_core::models::{
    validate_selection, CompositionSession, SelectionEntry, SessionId, SourceId,
};
use gridcast_core::{Error, Result};
use gridcast_media::{MediaTransport, Publication};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::canvas::Canvas;
use crate::layout::{layout_rects, Rect};
use crate::mixer::{AudioMixer, AudioTap};
use crate::source::SourceHandle;

/// Identity the compositor presents when requesting transport credentials.
const COMPOSITOR_IDENTITY: &str = "compositor";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositorState {
    Stopped,
    Starting,
    Running,
    Reconfiguring,
}

impl CompositorState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CompositorState::Stopped => "stopped",
            CompositorState::Starting => "starting",
            CompositorState::Running => "running",
            CompositorState::Reconfiguring => "reconfiguring",
        }
    }
}

/// One grid slot: the selection entry that configured it and the handle to
/// its source, if the subscription could be opened.
struct SlotBinding {
    entry: SelectionEntry,
    handle: Option<Arc<SourceHandle>>,
}

/// Immutable snapshot of the current grid. The tick loop clones the `Arc`
/// once per tick; reconfigure builds a new map and swaps it in.
struct SlotMap {
    slots: Vec<SlotBinding>,
    rects: Vec<Rect>,
}

impl SlotMap {
    fn empty() -> Self {
        Self {
            slots: Vec::new(),
            rects: Vec::new(),
        }
    }
}

/// Point-in-time counters and per-slot liveness, for operators.
#[derive(Debug, Clone, Serialize)]
pub struct CompositorStats {
    pub session_id: SessionId,
    pub composite_source_id: SourceId,
    pub state: CompositorState,
    pub ticks: u64,
    pub draw_failures: u64,
    pub slots: Vec<SlotStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotStats {
    pub source_id: SourceId,
    pub include_video: bool,
    pub include_audio: bool,
    /// Whether the compositor holds a subscription for this slot.
    pub bound: bool,
    /// Whether a publisher currently owns the source.
    pub live: bool,
    /// Whether the slot has a frame to paint right now.
    pub has_frame: bool,
}

pub struct Compositor {
    session_id: SessionId,
    composite_source_id: SourceId,
    config: CompositorConfig,
    transport: Arc<dyn MediaTransport>,

    /// Serializes start, reconfigure and stop against each other. The tick
    /// loop never takes it.
    control: Mutex<()>,
    state: Arc<RwLock<CompositorState>>,
    slot_map: Arc<RwLock<Arc<SlotMap>>>,
    mixer: Arc<AudioMixer>,
    ticks: Arc<AtomicU64>,
    draw_failures: Arc<AtomicU64>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Compositor {
    /// Claim the composite source and start rendering `session`.
    ///
    /// Source subscriptions that cannot be opened degrade to blank slots;
    /// failing to claim the composite source fails the whole start.
    pub async fn start(
        transport: Arc<dyn MediaTransport>,
        config: &CompositorConfig,
        session: &CompositionSession,
    ) -> Result<Arc<Self>> {
        validate_selection(&session.selection)?;

        let compositor = Arc::new(Self {
            session_id: session.id.clone(),
            composite_source_id: session.composite_source_id.clone(),
            config: config.clone(),
            transport,
            control: Mutex::new(()),
            state: Arc::new(RwLock::new(CompositorState::Starting)),
            slot_map: Arc::new(RwLock::new(Arc::new(SlotMap::empty()))),
            mixer: Arc::new(AudioMixer::new(
                config.audio_sample_rate,
                config.audio_channels as u16,
            )),
            ticks: Arc::new(AtomicU64::new(0)),
            draw_failures: Arc::new(AtomicU64::new(0)),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        });

        let _guard = compositor.control.lock().await;

        let map = compositor
            .build_slot_map(&session.selection, &SlotMap::empty())
            .await;
        compositor.rewire_audio(&map);
        *compositor.slot_map.write() = Arc::new(map);

        let credential = compositor
            .transport
            .issue_join_credential(
                &compositor.composite_source_id,
                COMPOSITOR_IDENTITY,
                true,
                false,
            )
            .await?;
        let publication = compositor.transport.publish(&credential).await?;

        let task = tokio::spawn(render_loop(
            compositor.config.clone(),
            compositor.slot_map.clone(),
            compositor.mixer.clone(),
            compositor.state.clone(),
            compositor.ticks.clone(),
            compositor.draw_failures.clone(),
            publication,
            compositor.cancel.clone(),
        ));
        *compositor.task.lock().await = Some(task);
        *compositor.state.write() = CompositorState::Running;
        info!(
            session = %compositor.session_id,
            composite = %compositor.composite_source_id,
            slots = session.selection.len(),
            "compositor started"
        );

        drop(_guard);
        Ok(compositor)
    }

    /// Swap the grid to a new selection without touching the publication.
    pub async fn reconfigure(&self, selection: &[SelectionEntry]) -> Result<()> {
        let _guard = self.control.lock().await;
        if *self.state.read() != CompositorState::Running {
            return Err(Error::InvalidState(format!(
                "compositor is {}, cannot reconfigure",
                self.state.read().as_str()
            )));
        }
        validate_selection(selection)?;

        *self.state.write() = CompositorState::Reconfiguring;
        let current = self.slot_map.read().clone();
        let next = self.build_slot_map(selection, &current).await;
        self.rewire_audio(&next);
        *self.slot_map.write() = Arc::new(next);
        *self.state.write() = CompositorState::Running;
        info!(session = %self.session_id, slots = selection.len(), "compositor reconfigured");
        Ok(())
    }

    /// Stop rendering and release every transport resource.
    ///
    /// Safe to call from any state, any number of times.
    pub async fn stop(&self) {
        let _guard = self.control.lock().await;
        self.cancel.cancel();
        if let Some(task) = self.task.lock().await.take() {
            if task.await.is_err() {
                warn!(session = %self.session_id, "render task panicked");
            }
        }
        *self.slot_map.write() = Arc::new(SlotMap::empty());
        self.mixer.detach_all();
        *self.state.write() = CompositorState::Stopped;
        info!(session = %self.session_id, "compositor stopped");
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn composite_source_id(&self) -> &SourceId {
        &self.composite_source_id
    }

    #[must_use]
    pub fn state(&self) -> CompositorState {
        *self.state.read()
    }

    #[must_use]
    pub fn stats(&self) -> CompositorStats {
        let map = self.slot_map.read().clone();
        let slots = map
            .slots
            .iter()
            .map(|binding| {
                let source_id = binding.entry.source_id.clone();
                SlotStats {
                    live: self.transport.source_live(&source_id),
                    bound: binding.handle.is_some(),
                    has_frame: binding
                        .handle
                        .as_ref()
                        .is_some_and(|handle| handle.latest_video().is_some()),
                    include_video: binding.entry.include_video,
                    include_audio: binding.entry.include_audio,
                    source_id,
                }
            })
            .collect();
        CompositorStats {
            session_id: self.session_id.clone(),
            composite_source_id: self.composite_source_id.clone(),
            state: self.state(),
            ticks: self.ticks.load(Ordering::Relaxed),
            draw_failures: self.draw_failures.load(Ordering::Relaxed),
            slots,
        }
    }

    /// Bind every selection entry to a source handle, reusing handles from
    /// `previous` so a kept source is never resubscribed. Slots whose
    /// subscription fails stay unbound and render blank.
    async fn build_slot_map(&self, selection: &[SelectionEntry], previous: &SlotMap) -> SlotMap {
        let mut known: HashMap<SourceId, Arc<SourceHandle>> = previous
            .slots
            .iter()
            .filter_map(|binding| {
                let handle = binding.handle.clone()?;
                Some((binding.entry.source_id.clone(), handle))
            })
            .collect();

        let mut slots = Vec::with_capacity(selection.len());
        for entry in selection {
            let handle = match known.get(&entry.source_id) {
                Some(handle) => Some(handle.clone()),
                None => {
                    match SourceHandle::acquire(
                        self.transport.as_ref(),
                        entry.source_id.clone(),
                        COMPOSITOR_IDENTITY,
                    )
                    .await
                    {
                        Ok(handle) => {
                            known.insert(entry.source_id.clone(), handle.clone());
                            Some(handle)
                        }
                        Err(err) => {
                            warn!(
                                source = %entry.source_id,
                                error = %err,
                                "source unavailable, slot stays blank"
                            );
                            None
                        }
                    }
                }
            };
            slots.push(SlotBinding {
                entry: entry.clone(),
                handle,
            });
        }

        let rects = layout_rects(
            slots.len(),
            self.config.canvas_width,
            self.config.canvas_height,
        );
        SlotMap { slots, rects }
    }

    /// Point the mixer at the taps of every audio-carrying slot. One atomic
    /// swap; a source kept across reconfigure never goes silent.
    fn rewire_audio(&self, map: &SlotMap) {
        let mut taps: HashMap<SourceId, AudioTap> = HashMap::new();
        for binding in &map.slots {
            if !binding.entry.include_audio {
                continue;
            }
            if let Some(handle) = &binding.handle {
                taps.entry(handle.source_id().clone())
                    .or_insert_with(|| handle.audio_tap());
            }
        }
        self.mixer.replace(taps);
    }
}

#[allow(clippy::too_many_arguments)]
async fn render_loop(
    config: CompositorConfig,
    slot_map: Arc<RwLock<Arc<SlotMap>>>,
    mixer: Arc<AudioMixer>,
    state: Arc<RwLock<CompositorState>>,
    ticks: Arc<AtomicU64>,
    draw_failures: Arc<AtomicU64>,
    publication: Publication,
    cancel: CancellationToken,
) {
    let tick_rate = config.tick_rate_hz.max(1);
    let mut interval =
        tokio::time::interval(Duration::from_micros(1_000_000 / u64::from(tick_rate)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut canvas = Canvas::new(config.canvas_width, config.canvas_height);
    let samples_per_tick =
        (config.audio_sample_rate * config.audio_channels / tick_rate) as usize;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let map = slot_map.read().clone();
        canvas.clear();
        for (index, binding) in map.slots.iter().enumerate() {
            if !binding.entry.include_video {
                continue;
            }
            let Some(handle) = &binding.handle else {
                continue;
            };
            let Some(frame) = handle.latest_video() else {
                continue;
            };
            let Some(rect) = map.rects.get(index).copied() else {
                continue;
            };
            if let Err(err) = canvas.draw(&frame, rect) {
                draw_failures.fetch_add(1, Ordering::Relaxed);
                debug!(slot = index, error = %err, "slot draw failed, keeping last canvas content");
            }
        }

        let video = canvas.capture();
        let audio = mixer.mix(samples_per_tick);
        if let Err(err) = publication
            .send_video(video)
            .and_then(|()| publication.send_audio(audio))
        {
            warn!(error = %err, "composite publication lost, stopping render loop");
            *state.write() = CompositorState::Stopped;
            break;
        }
        ticks.fetch_add(1, Ordering::Relaxed);
    }
    // Dropping the publication here releases the composite source.
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gridcast_core::models::composite_source_id;
    use gridcast_media::MediaHub;

    fn session_with(selection: Vec<SelectionEntry>) -> CompositionSession {
        let id = SessionId::new();
        CompositionSession {
            composite_source_id: composite_source_id(&id),
            id,
            selection,
            created_at: Utc::now(),
            active: true,
        }
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(CompositorState::Running.as_str(), "running");
        assert_eq!(
            serde_json::to_string(&CompositorState::Reconfiguring).unwrap(),
            "\"reconfiguring\""
        );
    }

    #[tokio::test]
    async fn test_start_rejects_empty_selection() {
        let hub: Arc<dyn MediaTransport> = Arc::new(MediaHub::new(8));
        let session = session_with(Vec::new());

        let result = Compositor::start(hub, &CompositorConfig::default(), &session).await;
        assert!(matches!(result, Err(Error::InvalidSelection(_))));
    }

    #[tokio::test]
    async fn test_reconfigure_requires_running() {
        let hub: Arc<dyn MediaTransport> = Arc::new(MediaHub::new(8));
        let session = session_with(vec![SelectionEntry::new("cam-a")]);

        let compositor = Compositor::start(hub, &CompositorConfig::default(), &session)
            .await
            .unwrap();
        compositor.stop().await;

        let result = compositor
            .reconfigure(&[SelectionEntry::new("cam-b")])
            .await;
        assert!(matches!(result, Err(Error::InvalidState(_))));
    }
}
