pub mod id;
pub mod identity;
pub mod selection;
pub mod session;

pub use id::{generate_id, SessionId, SourceId};
pub use identity::{Identity, Role};
pub use selection::{
    validate_selection, SelectionEntry, MAX_SELECTION_LEN, MIN_SELECTION_LEN,
};
pub use session::{
    composite_source_id, CompositionSession, CreateSessionRequest, UpdateSessionRequest,
};
