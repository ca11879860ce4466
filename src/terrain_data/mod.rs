//! This module contains the CPU side data structures of the terrain:
//! the [`PatchGrid`](grid::PatchGrid) with its [`Patch`](patch::Patch)es and
//! [`Cluster`](cluster::Cluster)s, and the [`QuadTree`](quadtree::QuadTree) spanning them.
//!
//! # Explanation
//! The height field is divided into square patches of [`PATCH_SIZE`] vertices per row.
//! Each frame the quadtree is traversed against the view frustum to find the visible patches
//! (see [`visibility`]). Their level of detail is then selected and relaxed, so that
//! neighbouring patches differ by at most one level (see [`lod`]).
//! Finally each stale patch is re-tessellated into its private range of its cluster's index
//! buffer, stitching the edges towards finer neighbours (see [`tessellator`]).
//!
//! Patches sharing a cluster share one vertex buffer, which keeps the vertex indices of a
//! cluster within the range of [`IndexType`].

use bevy::math::IVec2;

pub mod cluster;
pub mod grid;
pub mod lod;
pub mod patch;
pub mod quadtree;
pub mod tessellator;
pub mod visibility;

/// The number of coarser tessellation levels above the full resolution level 0.
pub const LOD_LEVELS: u8 = 5;
/// The number of grid cells along one edge of a patch.
pub const PATCH_EDGE: u32 = 1 << LOD_LEVELS;
/// The number of vertices along one edge of a patch.
pub const PATCH_SIZE: u32 = PATCH_EDGE + 1;
/// The worst case number of indices a single patch tessellation may emit.
pub const MAX_INDEX_COUNT: usize =
    (2 * PATCH_EDGE as usize * (PATCH_SIZE as usize + 1) - 2) + PATCH_SIZE as usize * 5;
/// The default vertex budget of a cluster, which allows up to 4x4 patches per cluster.
pub const MAX_CLUSTER_VERTICES: u32 = (4 * PATCH_EDGE + 1).pow(2) + 1;

/// The type of the indices stored in the cluster index buffers.
pub type IndexType = u16;
/// Index of a patch inside the patch grid.
pub type PatchIndex = u32;
/// Index of a cluster inside the patch grid.
pub type ClusterIndex = u32;
/// Index of a node inside the quadtree arena.
pub type NodeIndex = u32;

bitflags::bitflags! {
    /// The sides of a patch that have to be stitched towards a finer neighbour.
    ///
    /// The bits form the four bit code used to select the coarsest tessellation.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct StitchSides: u8 {
        const LEFT = 1 << 0;
        const RIGHT = 1 << 1;
        const TOP = 1 << 2;
        const BOTTOM = 1 << 3;
    }
}

/// A side of a patch inside the grid.
/// The top side is the one facing row zero of the height field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Left = 0,
    Right = 1,
    Top = 2,
    Bottom = 3,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Left, Side::Right, Side::Top, Side::Bottom];

    #[inline]
    pub fn flag(self) -> StitchSides {
        StitchSides::from_bits_retain(1 << self as u8)
    }

    /// The offset in patches towards the neighbour on this side.
    #[inline]
    pub fn offset(self) -> IVec2 {
        match self {
            Side::Left => IVec2::new(-1, 0),
            Side::Right => IVec2::new(1, 0),
            Side::Top => IVec2::new(0, -1),
            Side::Bottom => IVec2::new(0, 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants() {
        assert_eq!(PATCH_EDGE, 32);
        assert_eq!(PATCH_SIZE, 33);
        assert_eq!(MAX_INDEX_COUNT, 2339);
        assert_eq!(MAX_CLUSTER_VERTICES, 16642);
    }

    #[test]
    fn side_flags_match_coarsest_code() {
        let code: u8 = Side::ALL.iter().map(|side| side.flag().bits()).sum();
        assert_eq!(code, 0b1111);
        assert_eq!(Side::Top.flag(), StitchSides::TOP);
        assert_eq!(Side::Bottom.flag(), StitchSides::BOTTOM);
    }
}
