//! Spawn-time initializers
//!
//! Each initializer runs exactly once per newly activated slot, in the order
//! it was registered, before the slot's first operator pass. Initializers
//! write emitter-local values; the owning system moves them into world space
//! afterwards when it simulates in world space.

use crate::generator::{RandomGenerator, SharedGenerator};
use crate::particle::ParticleStore;
use crate::random::ParticleRng;
use crate::sequence::{SequenceElement, SequenceTable};
use ember_core::{EmberError, Result, Vec2, Vec3};

/// What an initializer may touch besides the slot itself
pub struct SpawnContext<'a> {
    pub rng: &'a mut ParticleRng,
    pub sequences: &'a SequenceTable,
}

/// How a sequence initializer picks a particle's sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceSelection {
    /// Uniformly among all sequences in the table
    Random,
    /// Always the sequence at this index
    Fixed(u32),
}

#[derive(Debug, Clone)]
pub enum Initializer {
    /// Lifetime in seconds. 0 means no age limit; a negative sample is
    /// already expired and dies on its first step.
    Lifetime(SharedGenerator<f32>),
    /// Sprite size, also recorded as the initial size
    Size(SharedGenerator<Vec2>),
    /// Rotation in radians
    Rotation(SharedGenerator<f32>),
    /// Radians per second
    RotationalSpeed(SharedGenerator<f32>),
    /// Emitter-local spawn position
    Position(SharedGenerator<Vec3>),
    /// Emitter-local initial velocity
    Velocity(SharedGenerator<Vec3>),
    /// Opacity, also recorded as the initial opacity
    Opacity(SharedGenerator<f32>),
    /// Color multiplier, also recorded as the initial color
    Color(SharedGenerator<Vec3>),
    /// Assigns a sequence and starts at its first frame
    Sequence(SequenceSelection),
}

impl Initializer {
    /// `u * range + offset` seconds
    pub fn lifetime(range: f32, offset: f32) -> Self {
        Initializer::Lifetime(RandomGenerator::uniform(range, offset).into_shared())
    }

    /// Uniform point in the axis-aligned box `offset + [0, range)`
    pub fn box_position(range: Vec3, offset: Vec3) -> Self {
        Initializer::Position(RandomGenerator::uniform(range, offset).into_shared())
    }

    pub fn random_velocity(
        range: Vec3,
        offset: Vec3,
        uniform_range: f32,
        uniform_offset: f32,
        normalize: bool,
    ) -> Self {
        Initializer::Velocity(
            RandomGenerator::new(range, offset, uniform_range, uniform_offset, normalize).into_shared(),
        )
    }

    pub fn rotation(range: f32, offset: f32) -> Self {
        Initializer::Rotation(RandomGenerator::uniform(range, offset).into_shared())
    }

    pub fn rotational_speed(range: f32, offset: f32) -> Self {
        Initializer::RotationalSpeed(RandomGenerator::uniform(range, offset).into_shared())
    }

    /// Short name for logs and error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Initializer::Lifetime(_) => "lifetime",
            Initializer::Size(_) => "size",
            Initializer::Rotation(_) => "rotation",
            Initializer::RotationalSpeed(_) => "rotational_speed",
            Initializer::Position(_) => "position",
            Initializer::Velocity(_) => "velocity",
            Initializer::Opacity(_) => "opacity",
            Initializer::Color(_) => "color",
            Initializer::Sequence(_) => "sequence",
        }
    }

    /// Check this initializer against the system's sequence table
    pub fn validate(&self, sequences: &SequenceTable) -> Result<()> {
        match self {
            Initializer::Sequence(SequenceSelection::Random) if sequences.is_empty() => {
                Err(EmberError::InvalidSequence(
                    "sequence initializer needs at least one sequence".into(),
                ))
            }
            Initializer::Sequence(SequenceSelection::Fixed(index))
                if sequences.get(*index).is_none() =>
            {
                Err(EmberError::InvalidSequence(format!(
                    "sequence initializer references missing sequence {index}"
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn apply(&self, store: &mut ParticleStore, slot: usize, ctx: &mut SpawnContext<'_>) -> Result<()> {
        match self {
            Initializer::Lifetime(generator) => {
                store.lifetime[slot] = f64::from(generator.generate(ctx.rng));
            }
            Initializer::Size(generator) => {
                let size = generator.generate(ctx.rng);
                store.size[slot] = size;
                store.initial_size[slot] = size;
            }
            Initializer::Rotation(generator) => {
                store.rotation[slot] = generator.generate(ctx.rng);
            }
            Initializer::RotationalSpeed(generator) => {
                store.rotational_speed[slot] = generator.generate(ctx.rng);
            }
            Initializer::Position(generator) => {
                store.position[slot] = generator.generate(ctx.rng);
            }
            Initializer::Velocity(generator) => {
                store.velocity[slot] = generator.generate(ctx.rng);
            }
            Initializer::Opacity(generator) => {
                let opacity = generator.generate(ctx.rng);
                store.opacity[slot] = opacity;
                store.initial_opacity[slot] = opacity;
            }
            Initializer::Color(generator) => {
                let color = generator.generate(ctx.rng);
                store.color[slot] = color;
                store.initial_color[slot] = color;
            }
            Initializer::Sequence(selection) => {
                let index = match selection {
                    SequenceSelection::Random if !ctx.sequences.is_empty() => {
                        ctx.rng.index(ctx.sequences.len()) as u32
                    }
                    SequenceSelection::Random => {
                        return Err(EmberError::InvalidSequence(
                            "sequence initializer needs at least one sequence".into(),
                        ))
                    }
                    SequenceSelection::Fixed(index) => *index,
                };
                let sequence = ctx.sequences.get(index).ok_or_else(|| {
                    EmberError::InvalidSequence(format!("no sequence at index {index}"))
                })?;
                store.sequence[slot] = SequenceElement {
                    current_frame: sequence.start,
                    sequence_index: index,
                };
            }
        }
        Ok(())
    }
}
