use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{SessionId, SourceId};
use super::selection::SelectionEntry;

/// A composition session: the persisted record of one broadcast.
///
/// The record is the durable source of truth; whether a compositor is
/// currently running for it is runtime state owned by the broadcast
/// controller. `active` marks which record the runtime should be serving.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionSession {
    pub id: SessionId,

    /// Source under which the composite program feed is published. Viewers
    /// subscribe to this, never to the contributing sources directly.
    pub composite_source_id: SourceId,

    pub selection: Vec<SelectionEntry>,

    pub created_at: DateTime<Utc>,

    pub active: bool,
}

impl CompositionSession {
    pub fn new(selection: Vec<SelectionEntry>) -> Self {
        let id = SessionId::new();
        let composite_source_id = composite_source_id(&id);
        Self {
            id,
            composite_source_id,
            selection,
            created_at: Utc::now(),
            active: true,
        }
    }
}

/// Derive the program-feed source name from a session ID.
///
/// Only a prefix of the ID goes into the name to keep it readable in media
/// dashboards; the full ID stays on the record.
pub fn composite_source_id(id: &SessionId) -> SourceId {
    let prefix: String = id.as_str().chars().take(8).collect();
    SourceId::from_string(format!("composite-{prefix}"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub selection: Vec<SelectionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSessionRequest {
    pub selection: Option<Vec<SelectionEntry>>,
    pub active: Option<bool>,
}
