use serde::{Deserialize, Serialize};

use super::id::SourceId;
use crate::Error;

/// Fewest sources a broadcast may composite.
pub const MIN_SELECTION_LEN: usize = 1;
/// Most sources a broadcast may composite (layout policies stop at a 3x2 grid).
pub const MAX_SELECTION_LEN: usize = 6;

/// One slot of a broadcast selection: which source feeds it and which of its
/// tracks participate in the composite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionEntry {
    pub source_id: SourceId,

    /// Draw this source's video into its layout slot.
    #[serde(default = "default_true")]
    pub include_video: bool,

    /// Feed this source's audio into the program mix.
    #[serde(default = "default_true")]
    pub include_audio: bool,
}

impl SelectionEntry {
    pub fn new(source_id: impl Into<SourceId>) -> Self {
        Self {
            source_id: source_id.into(),
            include_video: true,
            include_audio: true,
        }
    }

    #[must_use]
    pub fn video_only(mut self) -> Self {
        self.include_audio = false;
        self
    }

    #[must_use]
    pub fn audio_only(mut self) -> Self {
        self.include_video = false;
        self
    }
}

/// Check a selection against the slot-count bounds.
///
/// Duplicate source IDs are allowed: each occurrence gets its own slot, which
/// operators use to pin one camera in two positions. Everything else about an
/// entry (unknown source, offline source) is a runtime condition, not a
/// validation failure.
pub fn validate_selection(selection: &[SelectionEntry]) -> Result<(), Error> {
    if selection.len() < MIN_SELECTION_LEN || selection.len() > MAX_SELECTION_LEN {
        return Err(Error::InvalidSelection(format!(
            "selection must name between {} and {} sources, got {}",
            MIN_SELECTION_LEN,
            MAX_SELECTION_LEN,
            selection.len()
        )));
    }
    Ok(())
}

fn default_true() -> bool {
    true
}
