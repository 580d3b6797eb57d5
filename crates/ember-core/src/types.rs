//! Spatial types

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// A rigid transform with uniform-or-not scale, used as the emission root.
///
/// Points are transformed as `rotation * (scale * p) + position`; directions
/// skip the translation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Transform a point from the local frame into the parent frame
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * (self.scale * point) + self.position
    }

    /// Transform a direction (velocity, acceleration), skipping translation
    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation * (self.scale * vector)
    }

    /// Column-major 4x4 matrix, as renderers upload it
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_leaves_points_alone() {
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(Transform::IDENTITY.transform_point(p), p);
        assert_eq!(Transform::default().transform_vector(p), p);
    }

    #[test]
    fn vectors_ignore_translation() {
        let t = Transform::from_position(Vec3::new(10.0, 0.0, 0.0));
        let v = t.transform_vector(Vec3::Y);
        assert!((v - Vec3::Y).length() < 1e-6);
        let p = t.transform_point(Vec3::Y);
        assert!((p - Vec3::new(10.0, 1.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn rotation_applies_before_translation() {
        let t = Transform::from_position(Vec3::new(0.0, 5.0, 0.0))
            .with_rotation(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        let p = t.transform_point(Vec3::X);
        assert!((p - Vec3::new(0.0, 6.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn matrix_matches_point_transform() {
        let t = Transform::from_position(Vec3::new(1.0, 2.0, 3.0))
            .with_scale(Vec3::splat(2.0))
            .with_rotation(Quat::from_rotation_y(0.7));
        let p = Vec3::new(0.5, -1.0, 2.0);
        let via_matrix = t.to_matrix().transform_point3(p);
        assert!((via_matrix - t.transform_point(p)).length() < 1e-4);
    }
}
