//! Composite program rendering for gridcast.
//!
//! One [`Compositor`] runs per active session. It subscribes to the selected
//! sources, paints them into a grid at a fixed tick rate, mixes their audio,
//! and publishes the result back to the media transport under the session's
//! composite source id. Viewers subscribe to that single source and never
//! learn which cameras feed it.
//!
//! ## Architecture
//!
//! - **`layout`**: grid policies for 1 to 6 slots
//! - **`Canvas`** / **`AudioMixer`**: the per-tick paint and mix primitives
//! - **`SourceHandle`**: one subscription per selected source, pumped into
//!   lock-free-read cells
//! - **`Compositor`**: the tick loop and its slot map
//! - **`BroadcastController`**: persist-first orchestration between the
//!   session registry and the live compositor

mod canvas;
mod compositor;
mod controller;
mod layout;
mod mixer;
mod source;

pub use canvas::Canvas;
pub use compositor::{Compositor, CompositorState, CompositorStats, SlotStats};
pub use controller::BroadcastController;
pub use layout::{layout_rects, Rect};
pub use mixer::{AudioMixer, AudioTap};
pub use source::SourceHandle;
