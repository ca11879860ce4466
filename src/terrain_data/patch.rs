use crate::{
    height_field::HeightField,
    terrain_data::{ClusterIndex, PatchIndex, Side, StitchSides, LOD_LEVELS, PATCH_EDGE, PATCH_SIZE},
};
use bevy::{
    math::{UVec2, Vec3},
    render::primitives::Aabb,
};
use itertools::iproduct;
use std::ops::Range;

/// A square section of the height field with [`PATCH_SIZE`] vertices per row.
#[derive(Clone, Debug)]
pub struct Patch {
    /// The grid position of the first vertex of the patch.
    pub(crate) origin: UVec2,
    /// The adjacent patches indexed by [`Side`].
    pub(crate) neighbours: [Option<PatchIndex>; 4],
    /// The continuous detail value, where 0.0 is the full resolution.
    pub(crate) detail: f32,
    /// The tessellation level, where the step between vertices is `2^level`.
    pub(crate) level: u8,
    /// The level of the indices currently written to the cluster.
    pub(crate) baked_level: Option<u8>,
    /// The stitched sides of the indices currently written to the cluster.
    pub(crate) baked_sides: StitchSides,
    /// The traversal tick during which the patch was last found visible.
    pub(crate) visible_tick: u32,
    /// The frame at which the detail value is recomputed next.
    pub(crate) next_lod_update: u64,
    pub(crate) cluster: ClusterIndex,
    /// The start of the private range inside the cluster index buffer.
    pub(crate) index_offset: u32,
    /// The number of indices currently written to the private range.
    pub(crate) index_count: u32,
    pub(crate) center: Vec3,
    pub(crate) aabb: Aabb,
}

impl Patch {
    pub(crate) fn new(origin: UVec2) -> Self {
        Self {
            origin,
            neighbours: [None; 4],
            detail: LOD_LEVELS as f32,
            level: LOD_LEVELS,
            baked_level: None,
            baked_sides: StitchSides::empty(),
            visible_tick: 0,
            next_lod_update: 0,
            cluster: 0,
            index_offset: 0,
            index_count: 0,
            center: Vec3::ZERO,
            aabb: Aabb::default(),
        }
    }

    #[inline]
    pub fn origin(&self) -> UVec2 {
        self.origin
    }

    #[inline]
    pub fn neighbour(&self, side: Side) -> Option<PatchIndex> {
        self.neighbours[side as usize]
    }

    #[inline]
    pub fn level(&self) -> u8 {
        self.level
    }

    #[inline]
    pub fn detail(&self) -> f32 {
        self.detail
    }

    #[inline]
    pub fn cluster(&self) -> ClusterIndex {
        self.cluster
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        self.center
    }

    #[inline]
    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    #[inline]
    pub fn is_visible(&self, tick: u32) -> bool {
        tick != 0 && self.visible_tick == tick
    }

    /// The distance between adjacent vertices of the current tessellation.
    #[inline]
    pub fn step(&self) -> u32 {
        (1 << self.level).min(PATCH_EDGE)
    }

    /// The part of the cluster index buffer holding the current tessellation.
    pub fn index_range(&self) -> Range<usize> {
        let start = self.index_offset as usize;
        start..start + self.index_count as usize
    }

    /// Computes the box around all vertices of the patch and their mean position.
    pub(crate) fn calculate_bounds(&mut self, height_field: &HeightField) {
        let mut min = Vec3::INFINITY;
        let mut max = Vec3::NEG_INFINITY;
        let mut sum = Vec3::ZERO;

        for (y, x) in iproduct!(0..PATCH_SIZE, 0..PATCH_SIZE) {
            let position = height_field.vertex_position(self.origin.x + x, self.origin.y + y);
            min = min.min(position);
            max = max.max(position);
            sum += position;
        }

        self.center = sum / (PATCH_SIZE * PATCH_SIZE) as f32;
        self.aabb = Aabb::from_min_max(min, max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::math::Vec2;

    #[test]
    fn bounds_cover_heights() {
        let field = HeightField::from_fn(UVec2::new(65, 33), Vec2::ONE, u16::MAX as f32, |x, y| {
            (x * y) as u16
        });
        let mut patch = Patch::new(UVec2::new(32, 0));
        patch.calculate_bounds(&field);

        assert_eq!(Vec3::from(patch.aabb.min()), Vec3::new(0.0, 0.0, -16.0));
        assert_eq!(Vec3::from(patch.aabb.max()), Vec3::new(32.0, 64.0 * 32.0, 16.0));
        assert_eq!(patch.center.x, 16.0);
        assert_eq!(patch.center.z, 0.0);
    }

    #[test]
    fn step_is_clamped() {
        let mut patch = Patch::new(UVec2::ZERO);
        assert_eq!(patch.step(), PATCH_EDGE);
        patch.level = 2;
        assert_eq!(patch.step(), 4);
        assert!(!patch.is_visible(0));
    }
}
