//! Ember Runtime - Frame loop infrastructure
//!
//! Provides the building blocks a host loop needs to drive Ember:
//! - `FrameClock` - per-frame Δt, from the wall clock or stepped manually
//! - `RuntimeSystem` - trait for systems ticked once per frame

mod clock;
mod system;

pub use clock::FrameClock;
pub use system::RuntimeSystem;
