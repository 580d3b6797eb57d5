//! Per-tick operators
//!
//! Operators run every tick, in registration order, on every live slot
//! (including slots spawned earlier in the same tick). An operator returning
//! `false` ends the particle: the remaining operators are skipped for that
//! slot and it is marked dead.

use crate::curves::{Interpolate, KeyframeTrack};
use crate::generator::{ConstantGenerator, SharedGenerator};
use crate::particle::ParticleStore;
use crate::random::ParticleRng;
use crate::sequence::{Sequence, SequenceElement, SequenceTable};
use ember_core::{EmberError, Result, Vec2, Vec3};

/// What an operator may touch besides the slot itself
pub struct TickContext<'a> {
    /// Seconds elapsed this tick
    pub dt: f64,
    pub rng: &'a mut ParticleRng,
    pub sequences: &'a SequenceTable,
}

/// Keyframe track sampled at the particle's normalized age.
///
/// In relative mode the sampled value multiplies the attribute's initial
/// (spawn-time) value instead of replacing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpolator<T> {
    track: KeyframeTrack<T>,
    relative: bool,
}

impl<T: Interpolate> Interpolator<T> {
    pub fn new(track: KeyframeTrack<T>, relative: bool) -> Self {
        Self { track, relative }
    }

    /// Build from `(value, time)` pairs; see `KeyframeTrack::new`
    pub fn from_keyframes(pairs: impl IntoIterator<Item = (T, f32)>, relative: bool) -> Result<Self> {
        Ok(Self::new(KeyframeTrack::new(pairs)?, relative))
    }

    pub fn track(&self) -> &KeyframeTrack<T> {
        &self.track
    }

    pub fn is_relative(&self) -> bool {
        self.relative
    }

    pub fn evaluate(&self, initial: T, t: f32) -> T {
        let sampled = self.track.sample(t);
        if self.relative {
            initial * sampled
        } else {
            sampled
        }
    }
}

/// Advances a particle through its sprite sequence.
///
/// `speed` is seconds per frame: each tick the frame moves by `dt / speed`,
/// backwards when `reverse` is set. Overrunning the sequence wraps when
/// `looping`, otherwise the frame clamps to the boundary it crossed and the
/// particle ends on that tick. A system running a reverse operator spawns
/// its particles at the end of their sequence instead of the start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceOperator {
    speed: f32,
    looping: bool,
    reverse: bool,
}

impl SequenceOperator {
    pub fn new(speed: f32, looping: bool, reverse: bool) -> Result<Self> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(EmberError::Config(format!(
                "sequence speed must be a positive number of seconds per frame, got {speed}"
            )));
        }
        Ok(Self {
            speed,
            looping,
            reverse,
        })
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn is_reverse(&self) -> bool {
        self.reverse
    }

    /// Move `element` through `sequence` by `dt` seconds. Returns `false`
    /// when a non-looping sequence has run out.
    pub fn advance(&self, element: &mut SequenceElement, sequence: &Sequence, dt: f32) -> bool {
        let step = dt / self.speed;
        if self.reverse {
            element.current_frame -= step;
            if element.current_frame < sequence.start {
                if self.looping {
                    element.current_frame = sequence.end();
                } else {
                    element.current_frame = sequence.start;
                    return false;
                }
            }
        } else {
            element.current_frame += step;
            if element.current_frame >= sequence.end() {
                if self.looping {
                    element.current_frame = sequence.start;
                } else {
                    element.current_frame = sequence.end();
                    return false;
                }
            }
        }
        true
    }
}

#[derive(Debug, Clone)]
pub enum Operator {
    /// Samples an acceleration each tick and Euler-integrates it:
    /// `velocity += a * dt; position += velocity * dt`
    Acceleration(SharedGenerator<Vec3>),
    Opacity(Interpolator<f32>),
    Size(Interpolator<Vec2>),
    Color(Interpolator<Vec3>),
    Sequence(SequenceOperator),
}

impl Operator {
    pub fn acceleration(generator: SharedGenerator<Vec3>) -> Self {
        Operator::Acceleration(generator)
    }

    /// Fixed acceleration (e.g. gravity or buoyancy)
    pub fn constant_acceleration(acceleration: Vec3) -> Self {
        Operator::Acceleration(ConstantGenerator(acceleration).into_shared())
    }

    pub fn opacity(pairs: impl IntoIterator<Item = (f32, f32)>, relative: bool) -> Result<Self> {
        Ok(Operator::Opacity(Interpolator::from_keyframes(pairs, relative)?))
    }

    pub fn size(pairs: impl IntoIterator<Item = (Vec2, f32)>, relative: bool) -> Result<Self> {
        Ok(Operator::Size(Interpolator::from_keyframes(pairs, relative)?))
    }

    pub fn color(pairs: impl IntoIterator<Item = (Vec3, f32)>, relative: bool) -> Result<Self> {
        Ok(Operator::Color(Interpolator::from_keyframes(pairs, relative)?))
    }

    pub fn sequence(speed: f32, looping: bool, reverse: bool) -> Result<Self> {
        Ok(Operator::Sequence(SequenceOperator::new(speed, looping, reverse)?))
    }

    /// Short name for logs and error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Operator::Acceleration(_) => "acceleration",
            Operator::Opacity(_) => "opacity_interpolator",
            Operator::Size(_) => "size_interpolator",
            Operator::Color(_) => "color_interpolator",
            Operator::Sequence(_) => "sequence",
        }
    }

    /// Check this operator against the system's sequence table
    pub fn validate(&self, sequences: &SequenceTable) -> Result<()> {
        match self {
            Operator::Sequence(_) if sequences.is_empty() => Err(EmberError::InvalidSequence(
                "sequence operator needs at least one sequence".into(),
            )),
            _ => Ok(()),
        }
    }

    /// Run on one live slot. `Ok(false)` ends the particle.
    pub fn update(&self, store: &mut ParticleStore, slot: usize, ctx: &mut TickContext<'_>) -> Result<bool> {
        let dt = ctx.dt as f32;
        match self {
            Operator::Acceleration(generator) => {
                let acceleration = generator.generate(ctx.rng);
                store.acceleration[slot] = acceleration;
                store.velocity[slot] += acceleration * dt;
                store.position[slot] += store.velocity[slot] * dt;
            }
            Operator::Opacity(interpolator) => {
                let t = store.normalized_age(slot, ctx.sequences);
                store.opacity[slot] = interpolator.evaluate(store.initial_opacity[slot], t);
            }
            Operator::Size(interpolator) => {
                let t = store.normalized_age(slot, ctx.sequences);
                store.size[slot] = interpolator.evaluate(store.initial_size[slot], t);
            }
            Operator::Color(interpolator) => {
                let t = store.normalized_age(slot, ctx.sequences);
                store.color[slot] = interpolator.evaluate(store.initial_color[slot], t);
            }
            Operator::Sequence(operator) => {
                let element = &mut store.sequence[slot];
                let sequence = ctx.sequences.get(element.sequence_index).ok_or_else(|| {
                    EmberError::InvalidSequence(format!(
                        "particle references missing sequence {}",
                        element.sequence_index
                    ))
                })?;
                return Ok(operator.advance(element, sequence, dt));
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four_frames() -> Sequence {
        Sequence {
            start: 0.0,
            length: 4.0,
        }
    }

    #[test]
    fn looping_sequence_wraps_and_survives() {
        let op = SequenceOperator::new(1.0, true, false).unwrap();
        let mut element = SequenceElement::default();
        for _ in 0..3 {
            assert!(op.advance(&mut element, &four_frames(), 1.0));
        }
        assert_eq!(element.current_frame, 3.0);
        assert!(op.advance(&mut element, &four_frames(), 1.0));
        assert_eq!(element.current_frame, 0.0);
    }

    #[test]
    fn looping_sequence_wraps_in_one_long_tick() {
        let op = SequenceOperator::new(1.0, true, false).unwrap();
        let mut element = SequenceElement::default();
        assert!(op.advance(&mut element, &four_frames(), 4.0));
        assert_eq!(element.current_frame, 0.0);
    }

    #[test]
    fn non_looping_sequence_clamps_and_ends() {
        let op = SequenceOperator::new(1.0, false, false).unwrap();
        let mut element = SequenceElement::default();
        for _ in 0..3 {
            assert!(op.advance(&mut element, &four_frames(), 1.0));
        }
        assert!(!op.advance(&mut element, &four_frames(), 1.0));
        assert_eq!(element.current_frame, 4.0);
    }

    #[test]
    fn reverse_sequence_runs_backwards() {
        let seq = Sequence {
            start: 2.0,
            length: 4.0,
        };
        let looping = SequenceOperator::new(0.5, true, true).unwrap();
        let mut element = SequenceElement {
            current_frame: 3.0,
            sequence_index: 0,
        };
        assert!(looping.advance(&mut element, &seq, 0.25));
        assert!((element.current_frame - 2.5).abs() < 1e-6);
        assert!(looping.advance(&mut element, &seq, 0.5));
        assert_eq!(element.current_frame, 6.0);

        let once = SequenceOperator::new(0.5, false, true).unwrap();
        let mut element = SequenceElement {
            current_frame: 2.5,
            sequence_index: 0,
        };
        assert!(!once.advance(&mut element, &seq, 0.5));
        assert_eq!(element.current_frame, 2.0);
    }

    #[test]
    fn zero_dt_leaves_frame_alone() {
        let op = SequenceOperator::new(0.07, false, false).unwrap();
        let mut element = SequenceElement {
            current_frame: 1.5,
            sequence_index: 0,
        };
        assert!(op.advance(&mut element, &four_frames(), 0.0));
        assert_eq!(element.current_frame, 1.5);
    }

    #[test]
    fn sequence_speed_must_be_positive() {
        assert!(SequenceOperator::new(0.0, true, false).is_err());
        assert!(SequenceOperator::new(-1.0, true, false).is_err());
        assert!(SequenceOperator::new(f32::NAN, true, false).is_err());
    }

    #[test]
    fn acceleration_integrates_velocity_then_position() {
        let mut store = ParticleStore::new(1);
        let slot = store.activate(1)[0];
        store.position[slot] = Vec3::ZERO;
        store.velocity[slot] = Vec3::new(1.0, 0.0, 0.0);

        let mut rng = ParticleRng::new(1);
        let sequences = SequenceTable::new();
        let mut ctx = TickContext {
            dt: 0.5,
            rng: &mut rng,
            sequences: &sequences,
        };
        let op = Operator::constant_acceleration(Vec3::new(0.0, 2.0, 0.0));
        assert!(op.update(&mut store, slot, &mut ctx).unwrap());

        assert_eq!(store.acceleration(slot), Vec3::new(0.0, 2.0, 0.0));
        assert!((store.velocity(slot) - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-6);
        assert!((store.position(slot) - Vec3::new(0.5, 0.5, 0.0)).length() < 1e-6);
    }

    #[test]
    fn opacity_interpolator_follows_age() {
        let mut store = ParticleStore::new(1);
        let slot = store.activate(1)[0];
        store.lifetime[slot] = 2.0;
        store.age[slot] = 0.5;

        let mut rng = ParticleRng::new(1);
        let sequences = SequenceTable::new();
        let mut ctx = TickContext {
            dt: 0.0,
            rng: &mut rng,
            sequences: &sequences,
        };
        let op = Operator::opacity([(0.0, 0.0), (1.0, 0.5), (0.0, 1.0)], false).unwrap();
        op.update(&mut store, slot, &mut ctx).unwrap();
        assert!((store.opacity(slot) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn relative_interpolators_scale_initial_value_without_compounding() {
        let mut store = ParticleStore::new(1);
        let slot = store.activate(1)[0];
        store.lifetime[slot] = 1.0;
        store.age[slot] = 0.5;
        store.color[slot] = Vec3::new(1.0, 0.5, 0.0);
        store.initial_color[slot] = Vec3::new(1.0, 0.5, 0.0);

        let mut rng = ParticleRng::new(1);
        let sequences = SequenceTable::new();
        let mut ctx = TickContext {
            dt: 0.016,
            rng: &mut rng,
            sequences: &sequences,
        };
        let op = Operator::color([(Vec3::splat(2.0), 0.0), (Vec3::splat(2.0), 1.0)], true).unwrap();
        for _ in 0..5 {
            op.update(&mut store, slot, &mut ctx).unwrap();
        }
        assert!((store.color(slot) - Vec3::new(2.0, 1.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn size_interpolator_overwrites_in_absolute_mode() {
        let mut store = ParticleStore::new(1);
        let slot = store.activate(1)[0];
        store.lifetime[slot] = 1.0;
        store.age[slot] = 1.0;
        store.initial_size[slot] = Vec2::splat(5.0);

        let mut rng = ParticleRng::new(1);
        let sequences = SequenceTable::new();
        let mut ctx = TickContext {
            dt: 0.016,
            rng: &mut rng,
            sequences: &sequences,
        };
        let op = Operator::size([(Vec2::splat(0.3), 0.0), (Vec2::splat(0.1), 1.0)], false).unwrap();
        op.update(&mut store, slot, &mut ctx).unwrap();
        assert_eq!(store.size(slot), Vec2::splat(0.1));
    }

    #[test]
    fn sequence_operator_reports_missing_sequence() {
        let mut store = ParticleStore::new(1);
        let slot = store.activate(1)[0];
        store.sequence[slot].sequence_index = 2;

        let mut rng = ParticleRng::new(1);
        let mut sequences = SequenceTable::new();
        sequences.add(0.0, 4.0).unwrap();
        let mut ctx = TickContext {
            dt: 0.1,
            rng: &mut rng,
            sequences: &sequences,
        };
        let op = Operator::sequence(0.1, true, false).unwrap();
        assert!(op.update(&mut store, slot, &mut ctx).is_err());
    }

    #[test]
    fn sequence_operator_needs_sequences() {
        let op = Operator::sequence(0.1, true, false).unwrap();
        assert!(op.validate(&SequenceTable::new()).is_err());
    }
}
