use std::sync::Arc;

use tokio::sync::Mutex;

use crate::models::{
    validate_selection, CompositionSession, SessionId, UpdateSessionRequest,
};
use crate::models::selection::SelectionEntry;
use crate::store::SessionStore;
use crate::{Error, Result};

/// Registry of composition sessions.
///
/// The registry owns the authoritative in-memory copy of the session list
/// and funnels every mutation through one lock, so read-modify-write cycles
/// never interleave. Each mutation builds the next list, persists it, and
/// only then commits it to memory and acknowledges the caller; a failed
/// persist leaves the registry exactly as it was.
pub struct SessionRegistry {
    store: Arc<dyn SessionStore>,
    sessions: Mutex<Vec<CompositionSession>>,
}

impl SessionRegistry {
    /// Load the persisted session list and wrap it.
    pub async fn load(store: Arc<dyn SessionStore>) -> Result<Self> {
        let sessions = store.read_all().await?;
        tracing::info!(count = sessions.len(), "session registry loaded");
        Ok(Self {
            store,
            sessions: Mutex::new(sessions),
        })
    }

    /// Create a new session and make it the single active one.
    ///
    /// Every previously active session is deactivated in the same write, so
    /// the document never records two active broadcasts.
    pub async fn create(&self, selection: Vec<SelectionEntry>) -> Result<CompositionSession> {
        validate_selection(&selection)?;

        let mut sessions = self.sessions.lock().await;
        let mut next = sessions.clone();
        for session in &mut next {
            session.active = false;
        }
        let created = CompositionSession::new(selection);
        next.push(created.clone());

        self.store.write_all(&next).await?;
        *sessions = next;

        tracing::info!(session_id = %created.id, "session created");
        Ok(created)
    }

    /// Update a session's selection and/or active flag.
    ///
    /// Deliberately permissive about `active: true`: only `create` enforces
    /// the single-active invariant, re-activating an old record by hand is
    /// an operator escape hatch.
    pub async fn update(
        &self,
        id: &SessionId,
        update: UpdateSessionRequest,
    ) -> Result<CompositionSession> {
        if let Some(selection) = &update.selection {
            validate_selection(selection)?;
        }

        let mut sessions = self.sessions.lock().await;
        let mut next = sessions.clone();
        let session = next
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| Error::NotFound(format!("session {id}")))?;

        if let Some(selection) = update.selection {
            session.selection = selection;
        }
        if let Some(active) = update.active {
            session.active = active;
        }
        let updated = session.clone();

        self.store.write_all(&next).await?;
        *sessions = next;

        tracing::info!(session_id = %updated.id, active = updated.active, "session updated");
        Ok(updated)
    }

    /// Mark a session inactive. Idempotent: stopping a stopped session is a
    /// successful no-op.
    pub async fn stop(&self, id: &SessionId) -> Result<CompositionSession> {
        let mut sessions = self.sessions.lock().await;
        let mut next = sessions.clone();
        let session = next
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| Error::NotFound(format!("session {id}")))?;

        if !session.active {
            return Ok(session.clone());
        }

        session.active = false;
        let stopped = session.clone();

        self.store.write_all(&next).await?;
        *sessions = next;

        tracing::info!(session_id = %stopped.id, "session stopped");
        Ok(stopped)
    }

    /// The most recently created active session, if any.
    pub async fn get_active(&self) -> Option<CompositionSession> {
        let sessions = self.sessions.lock().await;
        sessions.iter().rev().find(|s| s.active).cloned()
    }

    pub async fn get(&self, id: &SessionId) -> Result<CompositionSession> {
        let sessions = self.sessions.lock().await;
        sessions
            .iter()
            .find(|s| &s.id == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("session {id}")))
    }

    pub async fn list(&self) -> Vec<CompositionSession> {
        self.sessions.lock().await.clone()
    }
}
