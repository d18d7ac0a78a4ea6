use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gridcast_core::models::SourceId;

/// An opaque token a client presents to the media transport.
///
/// Issued against one target source with fixed capabilities; what the bearer
/// may do was decided at issue time, the transport only enforces it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinCredential {
    pub token: String,
}

impl JoinCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

/// What a credential entitles its bearer to. Lives in the hub's grant table,
/// keyed by token.
#[derive(Debug, Clone)]
pub struct JoinGrant {
    /// The one source this grant is scoped to.
    pub target: SourceId,

    /// Display identity for logs and stats, not an authorization input.
    pub identity: String,

    pub can_publish: bool,
    pub can_subscribe: bool,

    pub issued_at: DateTime<Utc>,
}
