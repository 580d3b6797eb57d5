//! A running effect with live parameter editing

use crate::config::{hex_color, ColorConfig, EffectConfig, EmissionConfig, SystemConfig};
use crate::manager::{FrameReport, ParticleManager};
use crate::render::ParticleRenderer;
use crate::system::ParticleSystem;
use ember_core::{EmberError, Result, Vec3};
use log::info;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Creates the renderer for each system whenever systems are (re)built
pub type RendererFactory = Box<dyn Fn(&SystemConfig) -> Box<dyn ParticleRenderer> + Send + Sync>;

/// Value pushed by a parameter editor
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Number(f64),
    Bool(bool),
    Color(Vec3),
}

impl ParamValue {
    fn invalid(key: &str, message: impl Into<String>) -> EmberError {
        EmberError::InvalidParameter {
            key: key.to_string(),
            message: message.into(),
        }
    }

    pub fn as_f64(&self, key: &str) -> Result<f64> {
        match *self {
            ParamValue::Number(v) if v.is_finite() => Ok(v),
            ParamValue::Number(v) => Err(Self::invalid(key, format!("{v} is not finite"))),
            other => Err(Self::invalid(key, format!("expected a number, got {other}"))),
        }
    }

    pub fn as_f32(&self, key: &str) -> Result<f32> {
        self.as_f64(key).map(|v| v as f32)
    }

    pub fn as_bool(&self, key: &str) -> Result<bool> {
        match *self {
            ParamValue::Bool(b) => Ok(b),
            other => Err(Self::invalid(key, format!("expected true or false, got {other}"))),
        }
    }

    pub fn as_color(&self, key: &str) -> Result<Vec3> {
        match *self {
            ParamValue::Color(c) => Ok(c),
            other => Err(Self::invalid(key, format!("expected a color, got {other}"))),
        }
    }

    /// Whole, positive count (capacities)
    pub fn as_count(&self, key: &str) -> Result<usize> {
        let v = self.as_f64(key)?;
        if v < 1.0 || v.fract() != 0.0 {
            return Err(Self::invalid(key, format!("expected a positive whole number, got {v}")));
        }
        Ok(v as usize)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(v) => write!(f, "{v}"),
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Color(c) => write!(f, "{},{},{}", c.x, c.y, c.z),
        }
    }
}

/// Accepts `true`/`false`, numbers, `#rrggbb` / `0xrrggbb` colors and
/// `r,g,b` triples.
impl FromStr for ParamValue {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "true" => return Ok(ParamValue::Bool(true)),
            "false" => return Ok(ParamValue::Bool(false)),
            _ => {}
        }
        if let Some(hex) = s.strip_prefix('#').or_else(|| s.strip_prefix("0x")) {
            return u32::from_str_radix(hex, 16)
                .map(|hex| ParamValue::Color(hex_color(hex)))
                .map_err(|_| format!("invalid hex color '{s}'"));
        }
        if s.contains(',') {
            let parts: Vec<f32> = s
                .split(',')
                .map(|p| p.trim().parse::<f32>())
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| format!("invalid color triple '{s}'"))?;
            return match parts[..] {
                [r, g, b] => Ok(ParamValue::Color(Vec3::new(r, g, b))),
                _ => Err(format!("expected 3 color components, got {}", parts.len())),
            };
        }
        s.parse::<f64>()
            .map(ParamValue::Number)
            .map_err(|_| format!("cannot parse '{s}' as a number, bool or color"))
    }
}

/// How a parameter edit was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterEffect {
    /// Mutated in place on the running systems
    Live,
    /// Every system was disposed and rebuilt from the updated config
    Rebuilt,
}

/// Config + the manager built from it
pub struct Effect {
    config: EffectConfig,
    renderers: Option<RendererFactory>,
    manager: ParticleManager,
    running: bool,
}

impl Effect {
    pub fn new(config: EffectConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Like `new`, giving every system a renderer from `factory`
    pub fn with_renderers(config: EffectConfig, factory: RendererFactory) -> Result<Self> {
        Self::build(config, Some(factory))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Self::new(EffectConfig::parse(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::new(EffectConfig::load(path)?)
    }

    fn build(config: EffectConfig, renderers: Option<RendererFactory>) -> Result<Self> {
        let mut manager = ParticleManager::new();
        for system in build_systems(&config, renderers.as_ref())? {
            manager.add_system(system)?;
        }
        for light in config.build_lights() {
            manager.add_component(Box::new(light))?;
        }
        info!(
            "effect '{}' built with {} system(s) and {} light(s)",
            config.name,
            config.systems.len(),
            config.lights.len()
        );
        Ok(Self {
            config,
            renderers,
            manager,
            running: false,
        })
    }

    pub fn config(&self) -> &EffectConfig {
        &self.config
    }

    pub fn manager(&self) -> &ParticleManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut ParticleManager {
        &mut self.manager
    }

    pub fn start(&mut self) {
        self.manager.start_all();
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.manager.stop_all();
        self.running = false;
    }

    pub fn update(&mut self, dt: f64) -> FrameReport {
        self.manager.update(dt)
    }

    pub fn render(&mut self) {
        self.manager.render();
    }

    /// Apply one `(key, value)` edit.
    ///
    /// Live keys: `lights.<name>.intensity`, `lights.<name>.intensity_flux`,
    /// `lights.<name>.color`, `systems.<name>.emission_rate`.
    /// Rebuild keys: `scale`, `systems.<name>.capacity`,
    /// `systems.<name>.world_space`.
    pub fn set_parameter(&mut self, key: &str, value: ParamValue) -> Result<ParameterEffect> {
        if key == "scale" {
            let scale = value.as_f32(key)?;
            if scale <= 0.0 {
                return Err(ParamValue::invalid(key, "scale must be positive"));
            }
            let mut config = self.config.clone();
            config.scale = scale;
            return self.rebuild(config);
        }

        let unknown = || EmberError::UnknownParameter(key.to_string());
        let (section, rest) = key.split_once('.').ok_or_else(unknown)?;
        let (name, field) = rest.rsplit_once('.').ok_or_else(unknown)?;

        match section {
            "lights" => {
                let light = self.config.light_mut(name).ok_or_else(unknown)?;
                match field {
                    "intensity" => light.intensity = value.as_f32(key)?,
                    "intensity_flux" => light.intensity_flux = value.as_f32(key)?,
                    "color" => {
                        let c = value.as_color(key)?;
                        light.color = ColorConfig::Rgb(c.to_array());
                    }
                    _ => return Err(unknown()),
                }
                let component = self.manager.component_mut(name).ok_or_else(unknown)?;
                component.set_parameter(field, &value)?;
                Ok(ParameterEffect::Live)
            }
            "systems" => {
                if self.config.system(name).is_none() {
                    return Err(unknown());
                }
                match field {
                    "emission_rate" => {
                        let rate = value.as_f64(key)?;
                        let system = self.manager.system_mut(name).ok_or_else(unknown)?;
                        system
                            .set_emission_rate(rate)
                            .map_err(|e| ParamValue::invalid(key, e.to_string()))?;
                        if let Some(system) = self.config.system_mut(name) {
                            system.emission = EmissionConfig::Constant { rate };
                        }
                        Ok(ParameterEffect::Live)
                    }
                    "capacity" | "world_space" => {
                        let mut config = self.config.clone();
                        let system = config.system_mut(name).ok_or_else(unknown)?;
                        if field == "capacity" {
                            system.capacity = value.as_count(key)?;
                        } else {
                            system.world_space = value.as_bool(key)?;
                        }
                        self.rebuild(config)
                    }
                    _ => Err(unknown()),
                }
            }
            _ => Err(unknown()),
        }
    }

    /// Build replacement systems from `config`; only on success are the old
    /// systems dropped (disposing their renderers) and the config adopted.
    fn rebuild(&mut self, config: EffectConfig) -> Result<ParameterEffect> {
        let mut systems = build_systems(&config, self.renderers.as_ref())?;
        if self.running {
            for system in &mut systems {
                system.start();
            }
        }
        self.manager.replace_systems(systems);
        self.config = config;
        info!("effect '{}' rebuilt at scale {}", self.config.name, self.config.scale);
        Ok(ParameterEffect::Rebuilt)
    }
}

fn build_systems(
    config: &EffectConfig,
    renderers: Option<&RendererFactory>,
) -> Result<Vec<ParticleSystem>> {
    config.build_systems(|system| renderers.map(|factory| factory(system)))
}
