//! Auxiliary manager components: the flickering point light

use crate::effect::ParamValue;
use crate::generator::{Generator, RandomGenerator};
use crate::random::ParticleRng;
use ember_core::{EmberError, Result, Vec3};

/// Light values a renderer reads each frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightState {
    pub position: Vec3,
    pub intensity: f32,
    pub color: Vec3,
}

/// Something besides a particle system that the manager ticks every frame
pub trait ManagerComponent: Send {
    fn name(&self) -> &str;

    fn update(&mut self, dt: f64) -> Result<()>;

    /// Current light output, for components that drive a light
    fn as_light(&self) -> Option<LightState> {
        None
    }

    /// Apply a live parameter edit addressed to `field`
    fn set_parameter(&mut self, field: &str, _value: &ParamValue) -> Result<()> {
        Err(EmberError::UnknownParameter(format!("{}.{field}", self.name())))
    }
}

/// Point light whose intensity is redrawn every frame from
/// `[intensity, intensity + intensity_flux)`.
#[derive(Debug, Clone)]
pub struct FlickerLight {
    name: String,
    position: Vec3,
    intensity: f32,
    intensity_flux: f32,
    color: Vec3,
    generator: RandomGenerator<f32>,
    rng: ParticleRng,
    current: f32,
}

impl FlickerLight {
    pub fn new(name: impl Into<String>, intensity: f32, intensity_flux: f32, color: Vec3) -> Self {
        Self {
            name: name.into(),
            position: Vec3::ZERO,
            intensity,
            intensity_flux,
            color,
            generator: RandomGenerator::uniform(intensity_flux, intensity),
            rng: ParticleRng::new(0),
            current: intensity,
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = ParticleRng::new(seed);
        self
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn intensity_flux(&self) -> f32 {
        self.intensity_flux
    }

    pub fn color(&self) -> Vec3 {
        self.color
    }

    /// Intensity drawn by the last update
    pub fn current_intensity(&self) -> f32 {
        self.current
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        self.intensity = intensity;
        self.generator = RandomGenerator::uniform(self.intensity_flux, intensity);
    }

    pub fn set_intensity_flux(&mut self, flux: f32) {
        self.intensity_flux = flux;
        self.generator = RandomGenerator::uniform(flux, self.intensity);
    }

    pub fn set_color(&mut self, color: Vec3) {
        self.color = color;
    }
}

impl ManagerComponent for FlickerLight {
    fn name(&self) -> &str {
        &self.name
    }

    fn update(&mut self, _dt: f64) -> Result<()> {
        self.current = self.generator.generate(&mut self.rng);
        Ok(())
    }

    fn as_light(&self) -> Option<LightState> {
        Some(LightState {
            position: self.position,
            intensity: self.current,
            color: self.color,
        })
    }

    fn set_parameter(&mut self, field: &str, value: &ParamValue) -> Result<()> {
        let key = format!("lights.{}.{field}", self.name);
        match field {
            "intensity" => self.set_intensity(value.as_f32(&key)?),
            "intensity_flux" => self.set_intensity_flux(value.as_f32(&key)?),
            "color" => self.set_color(value.as_color(&key)?),
            _ => return Err(EmberError::UnknownParameter(key)),
        }
        Ok(())
    }
}
