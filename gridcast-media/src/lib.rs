//! In-process media transport for gridcast.
//!
//! Publishers hand raw video and audio frames to a hub; subscribers receive
//! them over bounded channels. The hub enforces credential capabilities and
//! single ownership of each source, and never lets one slow subscriber stall
//! a publisher.
//!
//! ## Architecture
//!
//! - **`MediaTransport`**: the seam the rest of the system talks through
//! - **`MediaHub`**: the in-process implementation
//! - **`Publication`**: a claimed source; frames pushed here fan out
//! - **`Subscription`**: one subscriber's bounded frame queue
//!
//! Frames carry [`bytes::Bytes`] payloads, so fanning a video frame out to N
//! subscribers clones a reference count, not pixel data.

mod credential;
mod error;
mod frame;
mod hub;
mod transport;

pub use credential::{JoinCredential, JoinGrant};
pub use error::MediaError;
pub use frame::{now_timestamp_ms, AudioFrame, MediaFrameEvent, VideoFrame};
pub use hub::{HubStats, MediaHub, Publication, Subscription};
pub use transport::MediaTransport;
