// Gridcast API Library
//
// HTTP control surface for broadcast sessions, auth, and media credentials

pub mod http;
pub mod observability;

// Re-export commonly used types
pub use http::{create_router, AppError, AppResult, AppState};
