//! Typed random value generators
//!
//! Generators are immutable configuration objects: sampling one only consumes
//! randomness from the caller's `ParticleRng`, so a single generator can be
//! shared by any number of initializers and operators.

use crate::random::ParticleRng;
use ember_core::{EmberError, Result, Vec2, Vec3, Vec4};
use std::fmt;
use std::sync::Arc;

/// Shape of the value a generator produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputShape {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
}

impl OutputShape {
    /// Number of float components in this shape
    pub fn components(self) -> usize {
        match self {
            OutputShape::Scalar => 1,
            OutputShape::Vec2 => 2,
            OutputShape::Vec3 => 3,
            OutputShape::Vec4 => 4,
        }
    }
}

/// A value type a generator can produce.
pub trait GeneratorValue: Copy + fmt::Debug + Send + Sync + 'static {
    const SHAPE: OutputShape;

    /// Build from exactly `SHAPE.components()` floats; `None` on a length mismatch
    fn from_components(values: &[f32]) -> Option<Self>;

    /// Combine two values component by component, x first
    fn map2(self, other: Self, f: impl FnMut(f32, f32) -> f32) -> Self;

    /// Unit-length version of the value. Scalars collapse to their sign
    /// (`-1` for negatives, `+1` otherwise); a zero vector stays zero.
    fn normalized(self) -> Self;
}

impl GeneratorValue for f32 {
    const SHAPE: OutputShape = OutputShape::Scalar;

    fn from_components(values: &[f32]) -> Option<Self> {
        match values {
            [v] => Some(*v),
            _ => None,
        }
    }

    fn map2(self, other: Self, mut f: impl FnMut(f32, f32) -> f32) -> Self {
        f(self, other)
    }

    fn normalized(self) -> Self {
        if self < 0.0 {
            -1.0
        } else {
            1.0
        }
    }
}

impl GeneratorValue for Vec2 {
    const SHAPE: OutputShape = OutputShape::Vec2;

    fn from_components(values: &[f32]) -> Option<Self> {
        match values {
            [x, y] => Some(Vec2::new(*x, *y)),
            _ => None,
        }
    }

    fn map2(self, other: Self, mut f: impl FnMut(f32, f32) -> f32) -> Self {
        let x = f(self.x, other.x);
        let y = f(self.y, other.y);
        Vec2::new(x, y)
    }

    fn normalized(self) -> Self {
        self.normalize_or_zero()
    }
}

impl GeneratorValue for Vec3 {
    const SHAPE: OutputShape = OutputShape::Vec3;

    fn from_components(values: &[f32]) -> Option<Self> {
        match values {
            [x, y, z] => Some(Vec3::new(*x, *y, *z)),
            _ => None,
        }
    }

    fn map2(self, other: Self, mut f: impl FnMut(f32, f32) -> f32) -> Self {
        let x = f(self.x, other.x);
        let y = f(self.y, other.y);
        let z = f(self.z, other.z);
        Vec3::new(x, y, z)
    }

    fn normalized(self) -> Self {
        self.normalize_or_zero()
    }
}

impl GeneratorValue for Vec4 {
    const SHAPE: OutputShape = OutputShape::Vec4;

    fn from_components(values: &[f32]) -> Option<Self> {
        match values {
            [x, y, z, w] => Some(Vec4::new(*x, *y, *z, *w)),
            _ => None,
        }
    }

    fn map2(self, other: Self, mut f: impl FnMut(f32, f32) -> f32) -> Self {
        let x = f(self.x, other.x);
        let y = f(self.y, other.y);
        let z = f(self.z, other.z);
        let w = f(self.w, other.w);
        Vec4::new(x, y, z, w)
    }

    fn normalized(self) -> Self {
        self.normalize_or_zero()
    }
}

/// Produces a value of type `T` on demand.
pub trait Generator<T>: fmt::Debug + Send + Sync {
    fn generate(&self, rng: &mut ParticleRng) -> T;
}

/// Generators are shared between initializers, operators and rebuilt systems
pub type SharedGenerator<T> = Arc<dyn Generator<T>>;

/// Uniform random value with per-component range/offset plus a shared term.
///
/// Scalars: `u * range + offset`.
/// Vectors: `u_shared * uniform_range + u_c * range[c] + offset[c] + uniform_offset`
/// for each component `c`, where `u_shared` is drawn once per call and every
/// `u_c` is drawn independently.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomGenerator<T> {
    range: T,
    offset: T,
    uniform_range: f32,
    uniform_offset: f32,
    normalize: bool,
}

impl<T: GeneratorValue> RandomGenerator<T> {
    pub fn new(range: T, offset: T, uniform_range: f32, uniform_offset: f32, normalize: bool) -> Self {
        Self {
            range,
            offset,
            uniform_range,
            uniform_offset,
            normalize,
        }
    }

    /// `u * range + offset` per component, no shared term, no normalization
    pub fn uniform(range: T, offset: T) -> Self {
        Self::new(range, offset, 0.0, 0.0, false)
    }

    /// Build from untyped arrays, rejecting lengths that do not match `T`
    pub fn from_slices(
        range: &[f32],
        offset: &[f32],
        uniform_range: f32,
        uniform_offset: f32,
        normalize: bool,
    ) -> Result<Self> {
        let expected = T::SHAPE.components();
        let range = T::from_components(range).ok_or(EmberError::GeneratorShape {
            expected,
            got: range.len(),
        })?;
        let offset = T::from_components(offset).ok_or(EmberError::GeneratorShape {
            expected,
            got: offset.len(),
        })?;
        if !uniform_range.is_finite() || !uniform_offset.is_finite() {
            return Err(EmberError::Config(
                "generator uniform range/offset must be finite".into(),
            ));
        }
        Ok(Self::new(range, offset, uniform_range, uniform_offset, normalize))
    }

    pub fn shape(&self) -> OutputShape {
        T::SHAPE
    }

    pub fn into_shared(self) -> SharedGenerator<T> {
        Arc::new(self)
    }
}

impl<T: GeneratorValue> Generator<T> for RandomGenerator<T> {
    fn generate(&self, rng: &mut ParticleRng) -> T {
        let value = if T::SHAPE == OutputShape::Scalar {
            self.range
                .map2(self.offset, |range, offset| rng.next_f32() * range + offset)
        } else {
            let shared = rng.next_f32() * self.uniform_range;
            let uniform_offset = self.uniform_offset;
            self.range.map2(self.offset, |range, offset| {
                shared + rng.next_f32() * range + offset + uniform_offset
            })
        };

        if self.normalize {
            value.normalized()
        } else {
            value
        }
    }
}

/// Always yields the same value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantGenerator<T>(pub T);

impl<T: GeneratorValue> ConstantGenerator<T> {
    pub fn into_shared(self) -> SharedGenerator<T> {
        Arc::new(self)
    }
}

impl<T: GeneratorValue> Generator<T> for ConstantGenerator<T> {
    fn generate(&self, _rng: &mut ParticleRng) -> T {
        self.0
    }
}

/// Random point in a (scaled, offset) spherical shell.
///
/// `theta` is the azimuth around +Y, `phi` the elevation above the XZ plane:
/// `x = r cos(phi) cos(theta)`, `y = r sin(phi)`, `z = r cos(phi) sin(theta)`,
/// then each axis is multiplied by `scale` and shifted by `offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereRandomGenerator {
    pub range_theta: f32,
    pub offset_theta: f32,
    pub range_phi: f32,
    pub offset_phi: f32,
    pub range_radius: f32,
    pub offset_radius: f32,
    pub scale: Vec3,
    pub offset: Vec3,
}

impl Default for SphereRandomGenerator {
    fn default() -> Self {
        Self {
            range_theta: std::f32::consts::TAU,
            offset_theta: 0.0,
            range_phi: std::f32::consts::PI,
            offset_phi: -std::f32::consts::FRAC_PI_2,
            range_radius: 0.0,
            offset_radius: 1.0,
            scale: Vec3::ONE,
            offset: Vec3::ZERO,
        }
    }
}

impl SphereRandomGenerator {
    pub fn into_shared(self) -> SharedGenerator<Vec3> {
        Arc::new(self)
    }
}

impl Generator<Vec3> for SphereRandomGenerator {
    fn generate(&self, rng: &mut ParticleRng) -> Vec3 {
        let theta = rng.next_f32() * self.range_theta + self.offset_theta;
        let phi = rng.next_f32() * self.range_phi + self.offset_phi;
        let radius = rng.next_f32() * self.range_radius + self.offset_radius;

        let (sin_phi, cos_phi) = phi.sin_cos();
        let (sin_theta, cos_theta) = theta.sin_cos();
        let unit = Vec3::new(cos_phi * cos_theta, sin_phi, cos_phi * sin_theta);
        unit * radius * self.scale + self.offset
    }
}
