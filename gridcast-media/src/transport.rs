use async_trait::async_trait;

use gridcast_core::models::SourceId;

use crate::credential::JoinCredential;
use crate::error::MediaError;
use crate::hub::{Publication, Subscription};

/// The media transport seam.
///
/// Everything above this trait (compositor, API) is indifferent to how media
/// actually moves; the in-process [`crate::MediaHub`] is the shipped
/// implementation. Credentials are issued by whoever holds the transport and
/// already carry their target and capabilities; `publish` and `subscribe`
/// only check them.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Mint a credential for `target` with the given capabilities.
    async fn issue_join_credential(
        &self,
        target: &SourceId,
        identity: &str,
        can_publish: bool,
        can_subscribe: bool,
    ) -> Result<JoinCredential, MediaError>;

    /// Claim the credential's target source for publishing.
    ///
    /// A source has at most one publisher; a second claim fails with
    /// [`MediaError::SourceBusy`] until the first [`Publication`] is dropped.
    async fn publish(&self, credential: &JoinCredential) -> Result<Publication, MediaError>;

    /// Open a bounded frame queue on the credential's target source.
    async fn subscribe(&self, credential: &JoinCredential) -> Result<Subscription, MediaError>;

    /// Whether someone is publishing `source` right now.
    fn source_live(&self, source: &SourceId) -> bool;
}
