//! Frame clock producing the per-frame time delta

use std::time::Instant;

/// Longest frame the clock will report, in seconds
const MAX_FRAME_TIME: f64 = 0.25;

/// Tracks elapsed time and the delta handed to `update(dt)` each frame.
///
/// Hosts with a real frame loop call `tick()`; headless runs and tests step
/// it deterministically with `advance(dt)`.
pub struct FrameClock {
    /// Total elapsed time in seconds
    pub total_time: f64,
    /// Time since last frame in seconds
    pub delta_time: f64,
    /// Number of frames produced so far
    pub frame: u64,
    /// Last tick instant
    last_instant: Instant,
    /// Whether this is the first tick
    first_tick: bool,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self {
            total_time: 0.0,
            delta_time: 0.0,
            frame: 0,
            last_instant: Instant::now(),
            first_tick: true,
        }
    }
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance from the wall clock. Call once per frame.
    pub fn tick(&mut self) -> f64 {
        let now = Instant::now();

        if self.first_tick {
            self.first_tick = false;
            self.last_instant = now;
            self.delta_time = 0.0;
            self.frame += 1;
            return 0.0;
        }

        let elapsed = now.duration_since(self.last_instant).as_secs_f64();
        self.last_instant = now;
        self.advance(elapsed)
    }

    /// Advance by an explicit delta. Negative or non-finite input counts as zero.
    pub fn advance(&mut self, dt: f64) -> f64 {
        let dt = if dt.is_finite() {
            dt.clamp(0.0, MAX_FRAME_TIME)
        } else {
            0.0
        };
        self.first_tick = false;
        self.delta_time = dt;
        self.total_time += dt;
        self.frame += 1;
        dt
    }
}
