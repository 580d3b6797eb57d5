//! Runtime system trait

use ember_core::Result;

/// A system that can be ticked by the host's frame loop
///
/// Systems are updated in registration order, once per rendered frame, and
/// rendered only after every system has finished its update.
pub trait RuntimeSystem {
    /// Called once before the first update
    fn initialize(&mut self) -> Result<()>;

    /// Called once per frame with the elapsed time in seconds
    fn update(&mut self, dt: f64) -> Result<()>;

    /// Called after every system has updated for the frame
    fn render(&mut self) -> Result<()>;

    /// Called when the system is being torn down
    fn shutdown(&mut self) -> Result<()>;

    /// Human-readable name for this system
    fn name(&self) -> &str;
}
