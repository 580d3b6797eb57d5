//! Ember Particles - frame-driven particle simulation core
//!
//! Provides pooled per-system particle simulation with:
//! - Fixed-capacity structure-of-arrays store with slot recycling
//! - Generator-driven spawn initializers and per-tick operators
//! - Fractional-budget emission scheduling
//! - Keyframed opacity/size/color and sprite-sequence animation
//! - TOML effect descriptions with live parameter editing
//! - GPU instance packing for instanced draw calls

pub mod config;
pub mod curves;
pub mod effect;
pub mod emitter;
pub mod generator;
pub mod initializer;
pub mod light;
pub mod manager;
pub mod operator;
pub mod particle;
pub mod random;
pub mod render;
pub mod sequence;
pub mod system;

pub use config::{EffectConfig, LightConfig, SystemConfig};
pub use curves::{Keyframe, KeyframeTrack};
pub use effect::{Effect, ParamValue, ParameterEffect, RendererFactory};
pub use emitter::{EmissionPolicy, EmissionScheduler};
pub use generator::{
    ConstantGenerator, Generator, OutputShape, RandomGenerator, SharedGenerator,
    SphereRandomGenerator,
};
pub use initializer::{Initializer, SequenceSelection};
pub use light::{FlickerLight, LightState, ManagerComponent};
pub use manager::{FrameReport, ParticleManager};
pub use operator::{Interpolator, Operator, SequenceOperator};
pub use particle::ParticleStore;
pub use random::ParticleRng;
pub use render::{InstanceRenderer, ParticleInstance, ParticleRenderer, ParticleView};
pub use sequence::{Sequence, SequenceElement, SequenceTable};
pub use system::{ParticleSystem, ParticleSystemBuilder, SystemState, TickStats, MAX_CAPACITY};
