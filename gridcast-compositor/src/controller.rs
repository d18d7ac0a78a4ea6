//! Ties the session registry to the running compositor.
//!
//! The registry is the source of truth: every control operation persists
//! first and only then touches the runtime. After a crash the whole live
//! state is rebuilt from the registry by [`BroadcastController::resume`].

use std::sync::Arc;

use gridcast_core::config::CompositorConfig;
use gridcast_core::models::{CompositionSession, SelectionEntry, SessionId, UpdateSessionRequest};
use gridcast_core::service::SessionRegistry;
use gridcast_core::Result;
use gridcast_media::MediaTransport;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::compositor::{Compositor, CompositorStats};

pub struct BroadcastController {
    registry: Arc<SessionRegistry>,
    transport: Arc<dyn MediaTransport>,
    compositor_config: CompositorConfig,

    /// The compositor of the most recently created active session, if any.
    /// The lock also serializes control operations end to end, so persisted
    /// state and runtime state cannot interleave.
    live: Mutex<Option<Arc<Compositor>>>,
}

impl BroadcastController {
    pub fn new(
        registry: Arc<SessionRegistry>,
        transport: Arc<dyn MediaTransport>,
        compositor_config: CompositorConfig,
    ) -> Self {
        Self {
            registry,
            transport,
            compositor_config,
            live: Mutex::new(None),
        }
    }

    /// Create a session and start compositing it. Any previous live
    /// compositor is superseded and stopped.
    ///
    /// A start failure after the session is persisted surfaces the error but
    /// keeps the session active; `resume` can pick it up later.
    pub async fn create_broadcast(
        &self,
        selection: Vec<SelectionEntry>,
    ) -> Result<CompositionSession> {
        let mut live = self.live.lock().await;
        let session = self.registry.create(selection).await?;

        if let Some(previous) = live.take() {
            info!(session = %previous.session_id(), "superseding live compositor");
            previous.stop().await;
        }

        let compositor =
            Compositor::start(self.transport.clone(), &self.compositor_config, &session).await?;
        *live = Some(compositor);
        Ok(session)
    }

    /// Apply a selection or activity change, then bring the runtime in line
    /// with the persisted record.
    pub async fn update_broadcast(
        &self,
        id: &SessionId,
        update: UpdateSessionRequest,
    ) -> Result<CompositionSession> {
        let mut live = self.live.lock().await;
        let selection_changed = update.selection.is_some();
        let updated = self.registry.update(id, update).await?;

        if let Some(compositor) = live.as_ref().filter(|c| c.session_id() == id).cloned() {
            if !updated.active {
                compositor.stop().await;
                *live = None;
            } else if selection_changed {
                compositor.reconfigure(&updated.selection).await?;
            }
        }
        Ok(updated)
    }

    /// Stop a session: persist it inactive, then stop its compositor if it
    /// was the live one.
    pub async fn stop_broadcast(&self, id: &SessionId) -> Result<CompositionSession> {
        let mut live = self.live.lock().await;
        let session = self.registry.stop(id).await?;

        if let Some(compositor) = live.as_ref().filter(|c| c.session_id() == id).cloned() {
            compositor.stop().await;
            *live = None;
        }
        Ok(session)
    }

    /// Start compositing the persisted active session, if there is one.
    /// Called once at boot to rebuild the runtime from the registry.
    pub async fn resume(&self) -> Result<Option<SessionId>> {
        let mut live = self.live.lock().await;
        if let Some(existing) = live.as_ref() {
            return Ok(Some(existing.session_id().clone()));
        }
        let Some(session) = self.registry.get_active().await else {
            return Ok(None);
        };

        info!(session = %session.id, "resuming persisted session");
        let compositor =
            Compositor::start(self.transport.clone(), &self.compositor_config, &session).await?;
        *live = Some(compositor);
        Ok(Some(session.id))
    }

    /// Stop whatever is live without touching persisted state. Used on
    /// shutdown so the active session survives for the next boot.
    pub async fn shutdown(&self) {
        let mut live = self.live.lock().await;
        if let Some(compositor) = live.take() {
            info!(session = %compositor.session_id(), "stopping live compositor for shutdown");
            compositor.stop().await;
        }
    }

    pub async fn live_session_id(&self) -> Option<SessionId> {
        let live = self.live.lock().await;
        live.as_ref().map(|c| c.session_id().clone())
    }

    pub async fn active_stats(&self) -> Option<CompositorStats> {
        let live = self.live.lock().await;
        live.as_ref().map(|c| c.stats())
    }
}

impl Drop for BroadcastController {
    fn drop(&mut self) {
        if let Ok(live) = self.live.try_lock() {
            if live.is_some() {
                warn!("controller dropped with a live compositor; call shutdown first");
            }
        }
    }
}
