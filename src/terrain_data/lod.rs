//! Level of detail selection and relaxation.
//!
//! Each visible patch selects a level from its distance to the viewer.
//! Afterwards the levels are relaxed, so that visible neighbours differ by at most one level,
//! which is the precondition for stitching a patch towards its finer neighbours.

use crate::terrain_data::{patch::Patch, PatchIndex, Side, StitchSides, LOD_LEVELS};
use bevy::math::Vec3;
use serde::{Deserialize, Serialize};

/// Maps the distance to the viewer onto a continuous detail value.
///
/// `detail = falloff * (distance / distance_scale) ^ exponent`, clamped to `[0, LOD_LEVELS]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodPolicy {
    pub distance_scale: f32,
    pub falloff: f32,
    pub exponent: f32,
    /// The minimum number of frames between two detail updates of a patch.
    pub min_update_interval: u32,
    /// The maximum number of frames between two detail updates of a patch.
    pub max_update_interval: u32,
}

impl Default for LodPolicy {
    fn default() -> Self {
        Self {
            distance_scale: 1000.0,
            falloff: 1.0 / 25.0,
            exponent: 3.0,
            min_update_interval: 30,
            max_update_interval: 150,
        }
    }
}

impl LodPolicy {
    pub fn detail(&self, distance: f32) -> f32 {
        let detail = self.falloff * (distance.max(0.0) / self.distance_scale).powf(self.exponent);
        detail.clamp(0.0, LOD_LEVELS as f32)
    }

    #[inline]
    pub fn level(detail: f32) -> u8 {
        (detail as u8).min(LOD_LEVELS)
    }

    /// The number of frames until the next update of the patch.
    ///
    /// The intervals of the patches are staggered, so the updates spread over several frames.
    pub fn update_interval(&self, patch: PatchIndex, frame: u64) -> u64 {
        let min = self.min_update_interval as u64;
        let max = (self.max_update_interval as u64).max(min);

        min + stagger(patch, frame) % (max - min + 1)
    }
}

fn stagger(patch: PatchIndex, frame: u64) -> u64 {
    let mut hash = (patch as u64) ^ frame.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    hash ^= hash >> 33;
    hash = hash.wrapping_mul(0xFF51_AFD7_ED55_8CCD);
    hash ^ (hash >> 33)
}

impl Patch {
    /// Recomputes the detail value and level, if the update is due.
    ///
    /// Returns whether the detail was recomputed.
    pub(crate) fn update_lod(
        &mut self,
        index: PatchIndex,
        viewer: Vec3,
        frame: u64,
        policy: &LodPolicy,
    ) -> bool {
        if frame < self.next_lod_update {
            return false;
        }

        self.detail = policy.detail(self.center.distance(viewer));
        self.level = LodPolicy::level(self.detail);
        self.next_lod_update = frame + policy.update_interval(index, frame);

        true
    }
}

/// The finest level the patch may use given its visible neighbours.
fn neighbour_limit(patches: &[Patch], index: PatchIndex, tick: u32) -> u8 {
    let patch = &patches[index as usize];

    patch
        .neighbours
        .iter()
        .flatten()
        .map(|&neighbour| &patches[neighbour as usize])
        .filter(|neighbour| neighbour.is_visible(tick))
        .map(|neighbour| neighbour.level + 1)
        .fold(LOD_LEVELS, u8::min)
}

/// Lowers the levels of the visible patches until no two visible neighbours differ by more
/// than one level.
///
/// Returns the number of passes over the visible patches, including the final pass that
/// changed nothing.
pub fn relax_levels(patches: &mut [Patch], visible: &[PatchIndex], tick: u32) -> u32 {
    if visible.is_empty() {
        return 0;
    }

    let mut passes = 0;

    loop {
        passes += 1;
        let mut changed = false;

        for &index in visible {
            let limit = neighbour_limit(patches, index, tick);
            let patch = &mut patches[index as usize];

            if patch.level > limit {
                patch.level = limit;
                changed = true;
            }
        }

        if !changed {
            return passes;
        }
    }
}

/// The sides of the patch facing a visible neighbour with a finer level.
pub fn stitch_sides(patches: &[Patch], index: PatchIndex, tick: u32) -> StitchSides {
    let patch = &patches[index as usize];

    Side::ALL
        .into_iter()
        .filter(|&side| {
            patch.neighbour(side).is_some_and(|neighbour| {
                let neighbour = &patches[neighbour as usize];
                neighbour.is_visible(tick) && neighbour.level < patch.level
            })
        })
        .fold(StitchSides::empty(), |sides, side| sides | side.flag())
}

/// Whether the indices written for the patch no longer match its level or neighbours.
pub fn needs_rebuild(patch: &Patch, sides: StitchSides) -> bool {
    patch.baked_level != Some(patch.level) || patch.baked_sides != sides
}
