//! The terrain component and its per frame update.

use crate::{
    config::TerrainConfig,
    height_field::HeightField,
    terrain_data::{
        grid::PatchGrid,
        lod::{needs_rebuild, relax_levels, stitch_sides},
        tessellator::PatchTessellator,
        visibility::VisibilityTraversal,
        IndexType, PatchIndex, MAX_INDEX_COUNT,
    },
    terrain_view::TerrainViewer,
};
use anyhow::Result;
use bevy::{prelude::*, render::primitives::Aabb};
use ndarray::Array2;

/// Counters describing the work done by one terrain update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub visible_patches: u32,
    pub node_checks: u32,
    /// The number of patches whose detail value was recomputed.
    pub lod_updates: u32,
    pub relaxation_passes: u32,
    /// The number of patches whose indices were rewritten.
    pub rebuilt_patches: u32,
}

/// A height field terrain rendered with clustered patches of varying detail.
#[derive(Component)]
#[require(Transform, Visibility)]
pub struct Terrain {
    config: TerrainConfig,
    height_field: HeightField,
    grid: PatchGrid,
    traversal: VisibilityTraversal,
    scratch: Vec<IndexType>,
    stats: FrameStats,
}

impl Terrain {
    /// Creates a terrain from the height samples indexed by `[[y, x]]`.
    pub fn new(config: TerrainConfig, samples: Array2<u16>) -> Result<Self> {
        config.validate()?;

        let height_field = HeightField::new(samples, config.mesh_step(), config.height_scale);
        let grid = PatchGrid::new(&height_field, config.max_cluster_vertices);

        Ok(Self {
            config,
            height_field,
            grid,
            traversal: VisibilityTraversal::default(),
            scratch: Vec::with_capacity(MAX_INDEX_COUNT),
            stats: FrameStats::default(),
        })
    }

    /// Determines the visible patches for the viewer, selects their level of detail and
    /// rewrites the indices of every patch whose tessellation changed.
    pub fn update(&mut self, viewer: &TerrainViewer, frame: u64) -> FrameStats {
        let grid = &mut self.grid;

        self.traversal.traverse(&grid.quadtree, &mut grid.patches, viewer);
        let tick = self.traversal.tick();
        let visible = self.traversal.visible();

        let mut lod_updates = 0;
        for &index in visible {
            let patch = &mut grid.patches[index as usize];
            if patch.update_lod(index, viewer.position, frame, &self.config.lod) {
                lod_updates += 1;
            }
        }

        let relaxation_passes = relax_levels(&mut grid.patches, visible, tick);

        let mut rebuilt_patches = 0;
        for &index in visible {
            let sides = stitch_sides(&grid.patches, index, tick);
            let patch = &mut grid.patches[index as usize];

            if !needs_rebuild(patch, sides) {
                continue;
            }

            let cluster = &mut grid.clusters[patch.cluster as usize];
            let count = PatchTessellator::new(
                &mut self.scratch,
                cluster.window(),
                patch.origin,
                patch.step(),
                sides,
            )
            .tessellate();

            cluster.write_indices(patch.index_offset as usize, &self.scratch);
            patch.index_count = count as u32;
            patch.baked_level = Some(patch.level);
            patch.baked_sides = sides;
            rebuilt_patches += 1;
        }

        self.stats = FrameStats {
            visible_patches: visible.len() as u32,
            node_checks: self.traversal.checks(),
            lod_updates,
            relaxation_passes,
            rebuilt_patches,
        };

        self.stats
    }

    /// The visible patches of the last update.
    #[inline]
    pub fn visible_patches(&self) -> &[PatchIndex] {
        self.traversal.visible()
    }

    /// The tick of the last update.
    /// Patches visible in the last update carry this tick,
    /// see [`Patch::is_visible`](crate::terrain_data::patch::Patch::is_visible).
    #[inline]
    pub fn tick(&self) -> u32 {
        self.traversal.tick()
    }

    #[inline]
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    #[inline]
    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    #[inline]
    pub fn height_field(&self) -> &HeightField {
        &self.height_field
    }

    #[inline]
    pub fn grid(&self) -> &PatchGrid {
        &self.grid
    }

    pub(crate) fn grid_mut(&mut self) -> &mut PatchGrid {
        &mut self.grid
    }

    /// The local bounds of the whole terrain, if it has any patches.
    pub fn aabb(&self) -> Option<Aabb> {
        self.grid.quadtree().aabb().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        math::box_frustum,
        terrain_data::{lod::LodPolicy, StitchSides, LOD_LEVELS, PATCH_EDGE},
    };

    fn config() -> TerrainConfig {
        TerrainConfig {
            mesh_step_x: 1.0,
            mesh_step_z: 1.0,
            height_scale: 1.0,
            lod: LodPolicy {
                distance_scale: 10.0,
                falloff: 1.0,
                exponent: 1.0,
                min_update_interval: 0,
                max_update_interval: 0,
            },
            ..default()
        }
    }

    fn flat(patches: usize) -> Array2<u16> {
        let size = patches * PATCH_EDGE as usize + 1;
        Array2::zeros((size, size))
    }

    fn viewer_at(position: Vec3) -> TerrainViewer {
        TerrainViewer::new(box_frustum(Vec3::splat(-1e6), Vec3::splat(1e6)), position, 1e7)
    }

    #[test]
    fn distant_viewer_uses_coarsest_level() {
        let mut terrain = Terrain::new(config(), flat(4)).unwrap();
        let stats = terrain.update(&viewer_at(Vec3::new(0.0, 1e5, 0.0)), 0);

        assert_eq!(
            stats,
            FrameStats {
                visible_patches: 16,
                node_checks: 1,
                lod_updates: 16,
                relaxation_passes: 1,
                rebuilt_patches: 16,
            }
        );

        for patch in terrain.grid().patches() {
            assert_eq!(patch.level(), LOD_LEVELS);
            assert_eq!(patch.index_range().len(), 5);
        }

        // nothing changed, so nothing is rebuilt
        let stats = terrain.update(&viewer_at(Vec3::new(0.0, 1e5, 0.0)), 1);
        assert_eq!(stats.rebuilt_patches, 0);
    }

    #[test]
    fn viewer_above_corner() {
        let mut terrain = Terrain::new(config(), flat(4)).unwrap();
        // above the center of the patch in the first row and column
        let stats = terrain.update(&viewer_at(Vec3::new(-48.0, 1.0, -48.0)), 0);
        assert_eq!(stats.visible_patches, 16);

        let grid = terrain.grid();
        let tick = terrain.tick();
        assert_eq!(grid.patch(0).level(), 0);

        for (index, patch) in grid.patches().iter().enumerate() {
            for neighbour in patch.neighbours.iter().flatten() {
                assert!(patch.level().abs_diff(grid.patch(*neighbour).level()) <= 1);
            }

            // the written indices stay inside the patch
            let window = grid.cluster(patch.cluster()).window();
            let indices = &grid.cluster(patch.cluster()).indices()[patch.index_range()];
            assert!(!indices.is_empty(), "patch {index}");
            for &vertex in indices {
                let x = window.origin.x + vertex as u32 % window.size.x;
                let y = window.origin.y + vertex as u32 / window.size.x;
                assert!((patch.origin().x..=patch.origin().x + PATCH_EDGE).contains(&x));
                assert!((patch.origin().y..=patch.origin().y + PATCH_EDGE).contains(&y));
            }

            assert_eq!(patch.baked_sides, stitch_sides(grid.patches(), index as PatchIndex, tick));
        }

        assert_eq!(grid.patch(1).baked_sides, StitchSides::LEFT);
    }

    #[test]
    fn culled_patches_are_not_rebuilt() {
        let mut terrain = Terrain::new(config(), flat(4)).unwrap();
        let viewer = TerrainViewer::new(
            box_frustum(Vec3::splat(-1e6), Vec3::new(-1.0, 1e6, 1e6)),
            Vec3::new(-48.0, 1.0, 0.0),
            1e7,
        );

        let stats = terrain.update(&viewer, 0);
        assert_eq!(stats.visible_patches, 8);
        assert_eq!(stats.rebuilt_patches, 8);
        assert!(terrain
            .grid()
            .patches()
            .iter()
            .filter(|patch| !patch.is_visible(terrain.tick()))
            .all(|patch| patch.baked_level.is_none()));
    }

    #[test]
    fn small_height_field_is_empty() {
        let mut terrain = Terrain::new(config(), Array2::zeros((10, 10))).unwrap();
        let stats = terrain.update(&viewer_at(Vec3::ZERO), 0);

        assert_eq!(stats, FrameStats::default());
        assert!(terrain.aabb().is_none());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = TerrainConfig {
            mesh_step_x: -1.0,
            ..config()
        };
        assert!(Terrain::new(config, flat(1)).is_err());
    }
}
