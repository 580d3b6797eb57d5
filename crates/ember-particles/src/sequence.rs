//! Sprite frame sequences within a shared atlas

use ember_core::{EmberError, Result};

/// A contiguous run of atlas frames `[start, start + length)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sequence {
    pub start: f32,
    pub length: f32,
}

impl Sequence {
    pub fn end(&self) -> f32 {
        self.start + self.length
    }

    /// Atlas frame to draw for a (possibly fractional) frame position,
    /// clamped into the sequence.
    pub fn frame_at(&self, position: f32) -> u32 {
        let last = (self.end() - 1.0).max(self.start);
        position.clamp(self.start, last).floor() as u32
    }

    /// Fraction of the sequence played at `position`, in [0, 1]
    pub fn progress(&self, position: f32) -> f32 {
        ((position - self.start) / self.length).clamp(0.0, 1.0)
    }
}

/// A particle's place in its assigned sequence
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SequenceElement {
    pub current_frame: f32,
    pub sequence_index: u32,
}

/// Ordered set of sequences, addressed by `sequence_index`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequenceTable {
    sequences: Vec<Sequence>,
}

impl SequenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sequence and return its index
    pub fn add(&mut self, start: f32, length: f32) -> Result<u32> {
        if !start.is_finite() || start < 0.0 {
            return Err(EmberError::InvalidSequence(format!(
                "start must be a non-negative frame, got {start}"
            )));
        }
        if !length.is_finite() || length <= 0.0 {
            return Err(EmberError::InvalidSequence(format!(
                "length must be positive, got {length}"
            )));
        }
        self.sequences.push(Sequence { start, length });
        Ok((self.sequences.len() - 1) as u32)
    }

    pub fn get(&self, index: u32) -> Option<&Sequence> {
        self.sequences.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sequence> {
        self.sequences.iter()
    }
}
