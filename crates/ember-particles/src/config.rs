//! Effect descriptions in TOML
//!
//! ```toml
//! name = "campfire"
//! scale = 1.0
//!
//! [[systems]]
//! name = "embers"
//! capacity = 150
//! emission = { type = "constant", rate = 6.0 }
//!
//! [[systems.initializers]]
//! type = "lifetime"
//! range = 3.0
//! offset = 1.0
//!
//! [[systems.operators]]
//! type = "opacity_interpolator"
//! keyframes = [{ value = 0.0, time = 0.0 }, { value = 0.7, time = 0.25 }, { value = 0.0, time = 1.0 }]
//!
//! [[lights]]
//! name = "fire"
//! intensity = 2.0
//! intensity_flux = 0.4
//! color = 0xf5d26b
//! ```
//!
//! `scale` multiplies every spatial quantity (positions, velocities,
//! accelerations and absolute sizes) when systems are built.

use crate::emitter::EmissionPolicy;
use crate::generator::{GeneratorValue, RandomGenerator, SharedGenerator, SphereRandomGenerator};
use crate::initializer::{Initializer, SequenceSelection};
use crate::light::FlickerLight;
use crate::operator::Operator;
use crate::render::ParticleRenderer;
use crate::sequence::SequenceTable;
use crate::system::ParticleSystem;
use ember_core::{EmberError, Quat, Result, Transform, Vec3};
use glam::EulerRot;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// A number or a list of numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Components {
    One(f32),
    Many(Vec<f32>),
}

impl Default for Components {
    fn default() -> Self {
        Components::Many(Vec::new())
    }
}

impl Components {
    pub fn as_slice(&self) -> &[f32] {
        match self {
            Components::One(v) => std::slice::from_ref(v),
            Components::Many(values) => values,
        }
    }

    /// Scaled copy; an empty list stands for `n` zeros
    fn resolve(&self, n: usize, scale: f32) -> Vec<f32> {
        match self.as_slice() {
            [] => vec![0.0; n],
            values => values.iter().map(|v| v * scale).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorKind {
    #[default]
    Random,
    Sphere,
}

/// Random generator parameters. Sphere generators (3D only) read the
/// spherical fields plus `offset`; random generators read the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub kind: GeneratorKind,
    pub range: Components,
    pub offset: Components,
    pub uniform_range: f32,
    pub uniform_offset: f32,
    pub normalize: bool,
    pub range_theta: f32,
    pub offset_theta: f32,
    pub range_phi: f32,
    pub offset_phi: f32,
    pub range_radius: f32,
    pub offset_radius: f32,
    pub scale: [f32; 3],
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        let sphere = SphereRandomGenerator::default();
        Self {
            kind: GeneratorKind::Random,
            range: Components::default(),
            offset: Components::default(),
            uniform_range: 0.0,
            uniform_offset: 0.0,
            normalize: false,
            range_theta: sphere.range_theta,
            offset_theta: sphere.offset_theta,
            range_phi: sphere.range_phi,
            offset_phi: sphere.offset_phi,
            range_radius: sphere.range_radius,
            offset_radius: sphere.offset_radius,
            scale: sphere.scale.to_array(),
        }
    }
}

impl GeneratorConfig {
    fn random<T: GeneratorValue>(&self, scale: f32) -> Result<RandomGenerator<T>> {
        let n = T::SHAPE.components();
        RandomGenerator::from_slices(
            &self.range.resolve(n, scale),
            &self.offset.resolve(n, scale),
            self.uniform_range * scale,
            self.uniform_offset * scale,
            self.normalize,
        )
    }

    pub fn build<T: GeneratorValue>(&self, scale: f32) -> Result<SharedGenerator<T>> {
        match self.kind {
            GeneratorKind::Random => Ok(self.random::<T>(scale)?.into_shared()),
            GeneratorKind::Sphere => Err(EmberError::Config(
                "sphere generators only produce 3D vectors".into(),
            )),
        }
    }

    pub fn build_vec3(&self, scale: f32) -> Result<SharedGenerator<Vec3>> {
        match self.kind {
            GeneratorKind::Random => self.build(scale),
            GeneratorKind::Sphere => {
                let offset = self.offset.resolve(3, scale);
                let offset = Vec3::from_components(&offset).ok_or(EmberError::GeneratorShape {
                    expected: 3,
                    got: offset.len(),
                })?;
                Ok(SphereRandomGenerator {
                    range_theta: self.range_theta,
                    offset_theta: self.offset_theta,
                    range_phi: self.range_phi,
                    offset_phi: self.offset_phi,
                    range_radius: self.range_radius,
                    offset_radius: self.offset_radius,
                    scale: Vec3::from_array(self.scale) * scale,
                    offset,
                }
                .into_shared())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyframeConfig {
    pub value: Components,
    pub time: f32,
}

fn keyframes<T: GeneratorValue>(frames: &[KeyframeConfig], scale: f32) -> Result<Vec<(T, f32)>> {
    frames
        .iter()
        .map(|frame| {
            let values = frame.value.resolve(0, scale);
            T::from_components(&values)
                .map(|value| (value, frame.time))
                .ok_or_else(|| {
                    EmberError::InvalidKeyframes(format!(
                        "expected {} component(s) per value, got {}",
                        T::SHAPE.components(),
                        values.len()
                    ))
                })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EmissionConfig {
    Constant { rate: f64 },
    Burst { count: u32, interval: f64 },
}

impl Default for EmissionConfig {
    fn default() -> Self {
        EmissionConfig::Constant { rate: 10.0 }
    }
}

impl EmissionConfig {
    pub fn policy(&self) -> EmissionPolicy {
        match *self {
            EmissionConfig::Constant { rate } => EmissionPolicy::Constant { rate },
            EmissionConfig::Burst { count, interval } => EmissionPolicy::Burst { count, interval },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SequenceConfig {
    pub start: f32,
    pub length: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InitializerConfig {
    Lifetime(GeneratorConfig),
    Size(GeneratorConfig),
    Rotation(GeneratorConfig),
    RotationalSpeed(GeneratorConfig),
    Position(GeneratorConfig),
    Velocity(GeneratorConfig),
    Opacity(GeneratorConfig),
    Color(GeneratorConfig),
    /// Random sequence unless `index` pins one
    Sequence {
        #[serde(default)]
        index: Option<u32>,
    },
}

impl InitializerConfig {
    pub fn build(&self, scale: f32) -> Result<Initializer> {
        Ok(match self {
            InitializerConfig::Lifetime(g) => Initializer::Lifetime(g.build(1.0)?),
            InitializerConfig::Size(g) => Initializer::Size(g.build(scale)?),
            InitializerConfig::Rotation(g) => Initializer::Rotation(g.build(1.0)?),
            InitializerConfig::RotationalSpeed(g) => Initializer::RotationalSpeed(g.build(1.0)?),
            InitializerConfig::Position(g) => Initializer::Position(g.build_vec3(scale)?),
            InitializerConfig::Velocity(g) => Initializer::Velocity(g.build_vec3(scale)?),
            InitializerConfig::Opacity(g) => Initializer::Opacity(g.build(1.0)?),
            InitializerConfig::Color(g) => Initializer::Color(g.build_vec3(1.0)?),
            InitializerConfig::Sequence { index } => Initializer::Sequence(match index {
                Some(index) => SequenceSelection::Fixed(*index),
                None => SequenceSelection::Random,
            }),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperatorConfig {
    Acceleration(GeneratorConfig),
    OpacityInterpolator {
        keyframes: Vec<KeyframeConfig>,
        #[serde(default)]
        relative: bool,
    },
    /// Absolute size keyframes are multiplied by the effect scale
    SizeInterpolator {
        keyframes: Vec<KeyframeConfig>,
        #[serde(default)]
        relative: bool,
    },
    ColorInterpolator {
        keyframes: Vec<KeyframeConfig>,
        #[serde(default)]
        relative: bool,
    },
    Sequence {
        /// Seconds per frame
        speed: f32,
        #[serde(default, rename = "loop")]
        looping: bool,
        #[serde(default)]
        reverse: bool,
    },
}

impl OperatorConfig {
    pub fn build(&self, scale: f32) -> Result<Operator> {
        match self {
            OperatorConfig::Acceleration(g) => Ok(Operator::acceleration(g.build_vec3(scale)?)),
            OperatorConfig::OpacityInterpolator { keyframes: k, relative } => {
                Operator::opacity(keyframes(k, 1.0)?, *relative)
            }
            OperatorConfig::SizeInterpolator { keyframes: k, relative } => {
                let scale = if *relative { 1.0 } else { scale };
                Operator::size(keyframes(k, scale)?, *relative)
            }
            OperatorConfig::ColorInterpolator { keyframes: k, relative } => {
                Operator::color(keyframes(k, 1.0)?, *relative)
            }
            OperatorConfig::Sequence {
                speed,
                looping,
                reverse,
            } => Operator::sequence(*speed, *looping, *reverse),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub name: String,
    pub capacity: usize,
    pub world_space: bool,
    pub seed: u64,
    /// Emission root position
    pub position: [f32; 3],
    /// Emission root orientation, euler degrees (yaw about Y applied first)
    pub rotation: [f32; 3],
    pub emission: EmissionConfig,
    pub sequences: Vec<SequenceConfig>,
    pub initializers: Vec<InitializerConfig>,
    pub operators: Vec<OperatorConfig>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            name: "particles".into(),
            capacity: 100,
            world_space: false,
            seed: 0,
            position: [0.0; 3],
            rotation: [0.0; 3],
            emission: EmissionConfig::default(),
            sequences: Vec::new(),
            initializers: Vec::new(),
            operators: Vec::new(),
        }
    }
}

impl SystemConfig {
    pub fn transform(&self) -> Transform {
        let [x, y, z] = self.rotation;
        Transform::from_position(Vec3::from_array(self.position)).with_rotation(Quat::from_euler(
            EulerRot::YXZ,
            y.to_radians(),
            x.to_radians(),
            z.to_radians(),
        ))
    }

    /// Build a stopped system at `scale`
    pub fn build(&self, scale: f32, renderer: Option<Box<dyn ParticleRenderer>>) -> Result<ParticleSystem> {
        let mut sequences = SequenceTable::new();
        for sequence in &self.sequences {
            sequences.add(sequence.start, sequence.length)?;
        }

        let mut builder = ParticleSystem::builder(self.name.clone(), self.capacity)
            .emitter_transform(self.transform())
            .emission(self.emission.policy())
            .simulate_in_world_space(self.world_space)
            .seed(self.seed)
            .sequences(sequences);
        for initializer in &self.initializers {
            builder = builder.initializer(initializer.build(scale)?);
        }
        for operator in &self.operators {
            builder = builder.operator(operator.build(scale)?);
        }
        if let Some(renderer) = renderer {
            builder = builder.renderer(renderer);
        }
        builder.build()
    }
}

/// Light color as `0xRRGGBB` or `[r, g, b]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorConfig {
    Hex(u32),
    Rgb([f32; 3]),
}

impl ColorConfig {
    pub fn to_vec3(self) -> Vec3 {
        match self {
            ColorConfig::Hex(hex) => hex_color(hex),
            ColorConfig::Rgb(rgb) => Vec3::from_array(rgb),
        }
    }
}

pub(crate) fn hex_color(hex: u32) -> Vec3 {
    let channel = |shift: u32| ((hex >> shift) & 0xff) as f32 / 255.0;
    Vec3::new(channel(16), channel(8), channel(0))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub name: String,
    pub intensity: f32,
    pub intensity_flux: f32,
    pub color: ColorConfig,
    pub position: [f32; 3],
    pub seed: u64,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            name: "light".into(),
            intensity: 1.0,
            intensity_flux: 0.0,
            color: ColorConfig::Rgb([1.0, 1.0, 1.0]),
            position: [0.0; 3],
            seed: 0,
        }
    }
}

impl LightConfig {
    pub fn build(&self) -> FlickerLight {
        FlickerLight::new(self.name.clone(), self.intensity, self.intensity_flux, self.color.to_vec3())
            .with_position(Vec3::from_array(self.position))
            .with_seed(self.seed)
    }
}

/// A whole effect: several particle systems plus their lights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectConfig {
    pub name: String,
    pub scale: f32,
    pub systems: Vec<SystemConfig>,
    pub lights: Vec<LightConfig>,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            name: "effect".into(),
            scale: 1.0,
            systems: Vec::new(),
            lights: Vec::new(),
        }
    }
}

impl EffectConfig {
    /// Parse and validate an effect from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: EffectConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|e| match e {
            EmberError::TomlParseError(msg) => {
                EmberError::TomlParseError(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Checks that need no system to be built
    pub fn validate(&self) -> Result<()> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(EmberError::Config(format!(
                "effect '{}' scale must be positive, got {}",
                self.name, self.scale
            )));
        }
        let mut names = HashSet::new();
        for system in &self.systems {
            if !names.insert(system.name.as_str()) {
                return Err(EmberError::Config(format!(
                    "effect '{}' has two systems named '{}'",
                    self.name, system.name
                )));
            }
        }
        let mut names = HashSet::new();
        for light in &self.lights {
            if !names.insert(light.name.as_str()) {
                return Err(EmberError::Config(format!(
                    "effect '{}' has two lights named '{}'",
                    self.name, light.name
                )));
            }
        }
        Ok(())
    }

    pub fn system(&self, name: &str) -> Option<&SystemConfig> {
        self.systems.iter().find(|s| s.name == name)
    }

    pub fn system_mut(&mut self, name: &str) -> Option<&mut SystemConfig> {
        self.systems.iter_mut().find(|s| s.name == name)
    }

    pub fn light_mut(&mut self, name: &str) -> Option<&mut LightConfig> {
        self.lights.iter_mut().find(|l| l.name == name)
    }

    /// Build every system, asking `renderer` for each one's renderer
    pub fn build_systems(
        &self,
        mut renderer: impl FnMut(&SystemConfig) -> Option<Box<dyn ParticleRenderer>>,
    ) -> Result<Vec<ParticleSystem>> {
        self.validate()?;
        self.systems
            .iter()
            .map(|system| system.build(self.scale, renderer(system)))
            .collect()
    }

    pub fn build_lights(&self) -> Vec<FlickerLight> {
        self.lights.iter().map(LightConfig::build).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::OutputShape;

    const EMBERS: &str = r#"
        name = "embers"
        scale = 2.0

        [[systems]]
        name = "embers"
        capacity = 150
        world_space = true
        seed = 7
        position = [0.0, 1.0, 0.0]
        emission = { type = "constant", rate = 6 }

        [[systems.initializers]]
        type = "lifetime"
        range = 3
        offset = 1

        [[systems.initializers]]
        type = "position"
        range = [0.05, 0, 0.05]
        offset = [-0.025, 0, -0.025]

        [[systems.initializers]]
        type = "velocity"
        range = [0.4, 0.5, 0.4]
        offset = [-0.2, 0.8, -0.2]
        uniform_range = 0.6
        uniform_offset = 0.8

        [[systems.operators]]
        type = "opacity_interpolator"
        keyframes = [
            { value = 0.0, time = 0.0 },
            { value = 0.7, time = 0.25 },
            { value = 0.9, time = 0.75 },
            { value = 0.0, time = 1.0 },
        ]

        [[systems.operators]]
        type = "color_interpolator"
        relative = true
        keyframes = [
            { value = [1.0, 0.7, 0.0], time = 0.0 },
            { value = [1.0, 0.4, 0.0], time = 1.0 },
        ]

        [[systems.operators]]
        type = "acceleration"
        kind = "sphere"
        range_radius = 20
        offset_radius = -8

        [[lights]]
        name = "fire"
        intensity = 2
        intensity_flux = 0.4
        color = 0xf5d26b
    "#;

    #[test]
    fn parses_systems_and_lights() {
        let config = EffectConfig::parse(EMBERS).unwrap();
        assert_eq!(config.scale, 2.0);
        let system = config.system("embers").unwrap();
        assert_eq!(system.capacity, 150);
        assert_eq!(system.seed, 7);
        assert_eq!(system.emission, EmissionConfig::Constant { rate: 6.0 });
        assert_eq!(system.initializers.len(), 3);
        assert_eq!(system.operators.len(), 3);
        match &system.initializers[0] {
            InitializerConfig::Lifetime(g) => {
                assert_eq!(g.range.as_slice(), &[3.0]);
                assert_eq!(g.kind, GeneratorKind::Random);
            }
            other => panic!("expected lifetime, got {other:?}"),
        }
        match &system.operators[2] {
            OperatorConfig::Acceleration(g) => {
                assert_eq!(g.kind, GeneratorKind::Sphere);
                assert_eq!(g.range_radius, 20.0);
                assert!((g.range_theta - std::f32::consts::TAU).abs() < 1e-6);
            }
            other => panic!("expected acceleration, got {other:?}"),
        }

        let light = &config.lights[0];
        let color = light.color.to_vec3();
        assert!((color.x - 245.0 / 255.0).abs() < 1e-6);
        assert!((color.y - 210.0 / 255.0).abs() < 1e-6);
        assert!((color.z - 107.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn builds_a_stopped_system() {
        let config = EffectConfig::parse(EMBERS).unwrap();
        let systems = config.build_systems(|_| None).unwrap();
        assert_eq!(systems.len(), 1);
        let system = &systems[0];
        assert!(!system.is_running());
        assert_eq!(system.capacity(), 150);
        assert!(system.simulate_in_world_space());
        assert_eq!(system.emitter_transform().position, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(system.emission_policy(), EmissionPolicy::Constant { rate: 6.0 });
        assert_eq!(config.build_lights().len(), 1);
    }

    #[test]
    fn scale_applies_to_spatial_generators() {
        let config = EffectConfig::parse(EMBERS).unwrap();
        let mut systems = config.build_systems(|_| None).unwrap();
        let system = &mut systems[0];
        system.start();
        system.queue_burst(50);
        system.update(0.0).unwrap();
        // Position box is [-0.025, 0.025) × 2 on x/z, offset by the emitter
        for slot in system.store().alive_indices() {
            let p = system.store().position(slot);
            assert!((-0.05..0.05).contains(&p.x));
            assert_eq!(p.y, 1.0);
        }
    }

    #[test]
    fn generator_shape_mismatch_is_a_config_error() {
        let generator = GeneratorConfig {
            range: Components::Many(vec![1.0, 2.0]),
            ..GeneratorConfig::default()
        };
        let err = generator.build::<Vec3>(1.0).err().unwrap();
        assert!(matches!(
            err,
            EmberError::GeneratorShape {
                expected: 3,
                got: 2
            }
        ));
        assert!(generator.build::<ember_core::Vec2>(1.0).is_ok());
        assert_eq!(OutputShape::Vec3.components(), 3);

        let sphere = GeneratorConfig {
            kind: GeneratorKind::Sphere,
            ..GeneratorConfig::default()
        };
        assert!(sphere.build::<f32>(1.0).is_err());
        assert!(sphere.build_vec3(1.0).is_ok());
    }

    #[test]
    fn malformed_keyframes_fail_at_build() {
        let operator = OperatorConfig::OpacityInterpolator {
            keyframes: vec![
                KeyframeConfig {
                    value: Components::One(1.0),
                    time: 0.5,
                },
                KeyframeConfig {
                    value: Components::One(0.0),
                    time: 0.2,
                },
            ],
            relative: false,
        };
        assert!(matches!(
            operator.build(1.0),
            Err(EmberError::InvalidKeyframes(_))
        ));

        let wrong_width = OperatorConfig::ColorInterpolator {
            keyframes: vec![KeyframeConfig {
                value: Components::One(1.0),
                time: 0.0,
            }],
            relative: true,
        };
        assert!(matches!(
            wrong_width.build(1.0),
            Err(EmberError::InvalidKeyframes(_))
        ));
    }

    #[test]
    fn rejects_bad_effects() {
        assert!(matches!(
            EffectConfig::parse("scale = 0.0"),
            Err(EmberError::Config(_))
        ));
        assert!(matches!(
            EffectConfig::parse("scale = [1"),
            Err(EmberError::TomlParseError(_))
        ));
        let twins = r#"
            [[systems]]
            name = "a"
            [[systems]]
            name = "a"
        "#;
        assert!(EffectConfig::parse(twins).is_err());

        let unknown = r#"
            [[systems]]
            name = "a"
            [[systems.operators]]
            type = "gravity_well"
        "#;
        assert!(EffectConfig::parse(unknown).is_err());

        let oversized = r#"
            [[systems]]
            name = "a"
            capacity = 1000000000000000000
        "#;
        let config = EffectConfig::parse(oversized).unwrap();
        assert!(matches!(
            config.build_systems(|_| None),
            Err(EmberError::Config(_))
        ));
    }

    #[test]
    fn sequence_entries_parse() {
        let toml = r#"
            [[systems]]
            name = "flame"
            sequences = [{ start = 0, length = 18 }]

            [[systems.initializers]]
            type = "sequence"

            [[systems.initializers]]
            type = "sequence"
            index = 0

            [[systems.operators]]
            type = "sequence"
            speed = 0.07
            loop = true
        "#;
        let config = EffectConfig::parse(toml).unwrap();
        let system = &config.systems[0];
        assert_eq!(system.initializers[0], InitializerConfig::Sequence { index: None });
        assert_eq!(system.initializers[1], InitializerConfig::Sequence { index: Some(0) });
        assert_eq!(
            system.operators[0],
            OperatorConfig::Sequence {
                speed: 0.07,
                looping: true,
                reverse: false
            }
        );
        assert!(config.build_systems(|_| None).is_ok());
    }
}
