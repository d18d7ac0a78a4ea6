pub mod auth;
pub mod registry;

pub use auth::{hash_password, verify_password, AuthGate, AuthService, IssuedToken, TokenSession};
pub use registry::SessionRegistry;
