//! Rendering collaborator contract and GPU instance packing

use crate::particle::ParticleStore;
use crate::sequence::{SequenceElement, SequenceTable};
use bytemuck::{Pod, Zeroable};
use ember_core::{Transform, Vec2, Vec3};

/// GPU instance data for one sprite.
/// 48 bytes: three vec4 rows, matching the instance vertex layout.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ParticleInstance {
    /// World position + sprite width
    pub pos_size: [f32; 4], // xyz = position, w = size.x
    /// Color multiplier with opacity
    pub color: [f32; 4], // rgb = color, a = opacity
    /// Rotation, atlas frame, sprite height, sequence index
    pub rotation_frame: [f32; 4], // x = rotation, y = frame, z = size.y, w = sequence
}

/// Read-only view of one system's latest tick, handed to its renderer.
pub struct ParticleView<'a> {
    pub(crate) name: &'a str,
    pub(crate) store: &'a ParticleStore,
    pub(crate) sequences: &'a SequenceTable,
    pub(crate) world_space: bool,
    pub(crate) emitter: Transform,
}

impl<'a> ParticleView<'a> {
    pub fn name(&self) -> &str {
        self.name
    }

    /// Whether positions are already in world space. When `false`, draw with
    /// `emitter_transform()` applied.
    pub fn simulate_in_world_space(&self) -> bool {
        self.world_space
    }

    pub fn emitter_transform(&self) -> Transform {
        self.emitter
    }

    pub fn alive_count(&self) -> usize {
        self.store.alive_count()
    }

    /// Slots to draw, in no particular order
    pub fn live_slots(&self) -> impl Iterator<Item = usize> + 'a {
        self.store.alive_indices()
    }

    pub fn position(&self, slot: usize) -> Vec3 {
        self.store.position(slot)
    }

    /// Position in world space regardless of the simulation space
    pub fn world_position(&self, slot: usize) -> Vec3 {
        let position = self.store.position(slot);
        if self.world_space {
            position
        } else {
            self.emitter.transform_point(position)
        }
    }

    pub fn size(&self, slot: usize) -> Vec2 {
        self.store.size(slot)
    }

    pub fn rotation(&self, slot: usize) -> f32 {
        self.store.rotation(slot)
    }

    pub fn opacity(&self, slot: usize) -> f32 {
        self.store.opacity(slot)
    }

    pub fn color(&self, slot: usize) -> Vec3 {
        self.store.color(slot)
    }

    pub fn sequence_element(&self, slot: usize) -> SequenceElement {
        self.store.sequence_element(slot)
    }

    /// Atlas frame for the slot's current sequence position, or `None` when
    /// the slot has no valid sequence
    pub fn atlas_frame(&self, slot: usize) -> Option<u32> {
        let element = self.store.sequence_element(slot);
        self.sequences
            .get(element.sequence_index)
            .map(|seq| seq.frame_at(element.current_frame))
    }

    /// Append one instance per live slot to `out`
    pub fn pack_instances(&self, out: &mut Vec<ParticleInstance>) {
        for slot in self.live_slots() {
            let position = self.world_position(slot);
            let size = self.size(slot);
            let color = self.color(slot);
            let frame = self.atlas_frame(slot).unwrap_or(0);
            out.push(ParticleInstance {
                pos_size: [position.x, position.y, position.z, size.x],
                color: [color.x, color.y, color.z, self.opacity(slot)],
                rotation_frame: [
                    self.rotation(slot),
                    frame as f32,
                    size.y,
                    self.sequence_element(slot).sequence_index as f32,
                ],
            });
        }
    }
}

/// Turns a system's particles into draw calls. Owns whatever GPU resources
/// that takes; `dispose()` releases them and is called exactly once when the
/// owning system is torn down.
pub trait ParticleRenderer: Send {
    fn render(&mut self, view: &ParticleView<'_>);
    fn dispose(&mut self);
}

/// Headless renderer that packs instances into a CPU-side buffer
#[derive(Debug, Default)]
pub struct InstanceRenderer {
    instances: Vec<ParticleInstance>,
    frames: u64,
    disposed: bool,
}

impl InstanceRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instances packed by the last `render`
    pub fn instances(&self) -> &[ParticleInstance] {
        &self.instances
    }

    /// Raw bytes ready for a vertex buffer upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.instances)
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl ParticleRenderer for InstanceRenderer {
    fn render(&mut self, view: &ParticleView<'_>) {
        self.instances.clear();
        view.pack_instances(&mut self.instances);
        self.frames += 1;
    }

    fn dispose(&mut self) {
        self.instances = Vec::new();
        self.disposed = true;
    }
}
