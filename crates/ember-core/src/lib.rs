//! Ember Core - Foundational types for the Ember particle engine
//!
//! This crate provides the types every other Ember crate depends on:
//! - `Vec2`, `Vec3`, `Vec4`, `Quat` - math types (re-exported from glam)
//! - `Transform` - the emission root supplied by the host scene
//! - Error types and Result alias

mod error;
mod types;

pub use error::{EmberError, Result};
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
pub use types::Transform;
