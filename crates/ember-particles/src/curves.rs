//! Piecewise-linear keyframe tracks over normalized time

use ember_core::{EmberError, Result, Vec2, Vec3, Vec4};
use std::ops::Mul;

/// Values a keyframe track can interpolate
pub trait Interpolate: Copy + Mul<Output = Self> + std::fmt::Debug + Send + Sync + 'static {
    fn lerp(self, other: Self, t: f32) -> Self;
}

impl Interpolate for f32 {
    fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Interpolate for Vec2 {
    fn lerp(self, other: Self, t: f32) -> Self {
        Vec2::lerp(self, other, t)
    }
}

impl Interpolate for Vec3 {
    fn lerp(self, other: Self, t: f32) -> Self {
        Vec3::lerp(self, other, t)
    }
}

impl Interpolate for Vec4 {
    fn lerp(self, other: Self, t: f32) -> Self {
        Vec4::lerp(self, other, t)
    }
}

/// A value pinned at a normalized time in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe<T> {
    pub value: T,
    pub time: f32,
}

/// Ordered keyframes, non-decreasing in time, sampled with clamped ends.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyframeTrack<T> {
    keyframes: Vec<Keyframe<T>>,
}

impl<T: Interpolate> KeyframeTrack<T> {
    /// Build a track from `(value, time)` pairs.
    ///
    /// Rejects an empty list, times outside [0, 1] (or non-finite), and times
    /// that decrease. Repeated times are allowed and produce a step.
    pub fn new(pairs: impl IntoIterator<Item = (T, f32)>) -> Result<Self> {
        let keyframes: Vec<Keyframe<T>> = pairs
            .into_iter()
            .map(|(value, time)| Keyframe { value, time })
            .collect();

        if keyframes.is_empty() {
            return Err(EmberError::InvalidKeyframes(
                "track has no keyframes".into(),
            ));
        }

        for (i, kf) in keyframes.iter().enumerate() {
            if !kf.time.is_finite() || !(0.0..=1.0).contains(&kf.time) {
                return Err(EmberError::InvalidKeyframes(format!(
                    "keyframe {} has time {} outside [0, 1]",
                    i, kf.time
                )));
            }
            if i > 0 && kf.time < keyframes[i - 1].time {
                return Err(EmberError::InvalidKeyframes(format!(
                    "keyframe {} at time {} precedes keyframe {} at time {}",
                    i,
                    kf.time,
                    i - 1,
                    keyframes[i - 1].time
                )));
            }
        }

        Ok(Self { keyframes })
    }

    pub fn keyframes(&self) -> &[Keyframe<T>] {
        &self.keyframes
    }

    /// Sample at normalized time `t`.
    ///
    /// Before the first keyframe holds the first value, after the last holds
    /// the last value. A NaN `t` samples the first value. Keyframes sharing a
    /// time form a step: from that time on the later one wins.
    pub fn sample(&self, t: f32) -> T {
        let first = &self.keyframes[0];
        let last = &self.keyframes[self.keyframes.len() - 1];

        if t.is_nan() || t <= first.time {
            return first.value;
        }
        if t >= last.time {
            return last.value;
        }

        // First keyframe strictly after `t`, so `prev.time <= t < next.time`
        // and the span is never zero.
        let idx = self.keyframes.partition_point(|kf| kf.time <= t);
        let prev = &self.keyframes[idx - 1];
        let next = &self.keyframes[idx];
        prev.value.lerp(next.value, (t - prev.time) / (next.time - prev.time))
    }
}
