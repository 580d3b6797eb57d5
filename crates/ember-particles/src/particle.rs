//! Fixed-capacity structure-of-arrays particle store
//!
//! Every attribute lives in its own contiguous array indexed by slot. Slots
//! are never removed: a dead slot goes back on the free list at the next
//! `reclaim()` and is handed out again by `activate()`.
//!
//! **Recycled slots are not cleared.** `activate()` only flips the slot alive
//! and zeroes its age; every other attribute keeps the value left by the
//! slot's previous occupant. The initializers of a system must therefore set
//! every attribute its operators and renderer read.

use crate::sequence::{SequenceElement, SequenceTable};
use ember_core::{Vec2, Vec3};

pub struct ParticleStore {
    alive: Vec<bool>,
    pub(crate) age: Vec<f64>,
    pub(crate) lifetime: Vec<f64>,
    pub(crate) position: Vec<Vec3>,
    pub(crate) velocity: Vec<Vec3>,
    pub(crate) acceleration: Vec<Vec3>,
    pub(crate) size: Vec<Vec2>,
    pub(crate) initial_size: Vec<Vec2>,
    pub(crate) rotation: Vec<f32>,
    pub(crate) rotational_speed: Vec<f32>,
    pub(crate) opacity: Vec<f32>,
    pub(crate) initial_opacity: Vec<f32>,
    pub(crate) color: Vec<Vec3>,
    pub(crate) initial_color: Vec<Vec3>,
    pub(crate) sequence: Vec<SequenceElement>,
    /// Spawn-eligible slots; popped from the back
    free: Vec<usize>,
    /// Slots handed out and not yet reclaimed, in no particular order
    live: Vec<usize>,
}

impl ParticleStore {
    /// Allocate `capacity` slots. Never-used slots start with unit size,
    /// opacity and color, zero motion and zero lifetime.
    pub fn new(capacity: usize) -> Self {
        Self {
            alive: vec![false; capacity],
            age: vec![0.0; capacity],
            lifetime: vec![0.0; capacity],
            position: vec![Vec3::ZERO; capacity],
            velocity: vec![Vec3::ZERO; capacity],
            acceleration: vec![Vec3::ZERO; capacity],
            size: vec![Vec2::ONE; capacity],
            initial_size: vec![Vec2::ONE; capacity],
            rotation: vec![0.0; capacity],
            rotational_speed: vec![0.0; capacity],
            opacity: vec![1.0; capacity],
            initial_opacity: vec![1.0; capacity],
            color: vec![Vec3::ONE; capacity],
            initial_color: vec![Vec3::ONE; capacity],
            sequence: vec![SequenceElement::default(); capacity],
            free: (0..capacity).rev().collect(),
            live: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.alive.len()
    }

    /// Slots handed out and not yet reclaimed (includes slots marked dead this tick)
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Particles currently alive
    pub fn alive_count(&self) -> usize {
        self.live.iter().filter(|&&slot| self.alive[slot]).count()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Activate up to `count` free slots and return their indices.
    ///
    /// Short-spawns when fewer than `count` slots are free; never fails.
    pub fn activate(&mut self, count: usize) -> &[usize] {
        let first = self.live.len();
        let n = count.min(self.free.len());
        for _ in 0..n {
            let Some(slot) = self.free.pop() else {
                break;
            };
            self.alive[slot] = true;
            self.age[slot] = 0.0;
            self.live.push(slot);
        }
        &self.live[first..]
    }

    /// Flag a slot dead. It stops being simulated immediately and becomes
    /// spawn-eligible after the next `reclaim()`. Returns whether it was alive.
    pub fn mark_dead(&mut self, slot: usize) -> bool {
        match self.alive.get_mut(slot) {
            Some(alive) if *alive => {
                *alive = false;
                true
            }
            _ => false,
        }
    }

    /// Return every dead slot to the free list. Returns how many were reclaimed.
    pub fn reclaim(&mut self) -> usize {
        let mut reclaimed = 0;
        let mut i = 0;
        while i < self.live.len() {
            let slot = self.live[i];
            if self.alive[slot] {
                i += 1;
            } else {
                // Don't advance: the swapped-in slot needs checking
                self.live.swap_remove(i);
                self.free.push(slot);
                reclaimed += 1;
            }
        }
        reclaimed
    }

    /// Slots handed out since their last reclaim; order is not stable across ticks
    pub fn live_indices(&self) -> &[usize] {
        &self.live
    }

    /// Iterate slots that are currently alive
    pub fn alive_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.live.iter().copied().filter(|&slot| self.alive[slot])
    }

    pub fn is_alive(&self, slot: usize) -> bool {
        self.alive.get(slot).copied().unwrap_or(false)
    }

    pub fn age(&self, slot: usize) -> f64 {
        self.age[slot]
    }

    pub fn lifetime(&self, slot: usize) -> f64 {
        self.lifetime[slot]
    }

    pub fn position(&self, slot: usize) -> Vec3 {
        self.position[slot]
    }

    pub fn velocity(&self, slot: usize) -> Vec3 {
        self.velocity[slot]
    }

    pub fn acceleration(&self, slot: usize) -> Vec3 {
        self.acceleration[slot]
    }

    pub fn size(&self, slot: usize) -> Vec2 {
        self.size[slot]
    }

    pub fn rotation(&self, slot: usize) -> f32 {
        self.rotation[slot]
    }

    pub fn rotational_speed(&self, slot: usize) -> f32 {
        self.rotational_speed[slot]
    }

    pub fn opacity(&self, slot: usize) -> f32 {
        self.opacity[slot]
    }

    pub fn color(&self, slot: usize) -> Vec3 {
        self.color[slot]
    }

    pub fn sequence_element(&self, slot: usize) -> SequenceElement {
        self.sequence[slot]
    }

    /// Normalized age in [0, 1] used by interpolators.
    ///
    /// `age / lifetime` for bounded particles. Unbounded particles
    /// (`lifetime == 0`) follow their sprite sequence instead; with no valid
    /// sequence they stay at 0.
    pub fn normalized_age(&self, slot: usize, sequences: &SequenceTable) -> f32 {
        let lifetime = self.lifetime[slot];
        if lifetime > 0.0 {
            return (self.age[slot] / lifetime).clamp(0.0, 1.0) as f32;
        }
        let element = self.sequence[slot];
        sequences
            .get(element.sequence_index)
            .map(|seq| seq.progress(element.current_frame))
            .unwrap_or(0.0)
    }
}
