use crate::{
    height_field::HeightField,
    terrain_data::{
        cluster::{Cluster, ClusterWindow},
        patch::Patch,
        quadtree::{QuadTree, QuadTreeNodeKind},
        ClusterIndex, NodeIndex, PatchIndex, Side, PATCH_EDGE,
    },
};
use bevy::{log::info, log::warn, math::UVec2};
use itertools::iproduct;

/// The patches of a height field, grouped into clusters and spanned by a quadtree.
#[derive(Clone, Debug, Default)]
pub struct PatchGrid {
    pub(crate) patches: Vec<Patch>,
    pub(crate) clusters: Vec<Cluster>,
    pub(crate) quadtree: QuadTree,
    patch_count: UVec2,
}

impl PatchGrid {
    /// Builds the patches, clusters and quadtree of the height field.
    ///
    /// A height field smaller than a single patch results in an empty grid.
    pub fn new(height_field: &HeightField, max_cluster_vertices: u32) -> Self {
        let patch_count = height_field.patch_count();

        if patch_count.x == 0 || patch_count.y == 0 {
            warn!(
                "The height field of size {} is too small for a single patch, the terrain is empty.",
                height_field.size()
            );
            return Self::default();
        }

        let mut grid = Self {
            patches: iproduct!(0..patch_count.y, 0..patch_count.x)
                .map(|(y, x)| Patch::new(UVec2::new(x, y) * PATCH_EDGE))
                .collect(),
            clusters: Vec::new(),
            quadtree: QuadTree::default(),
            patch_count,
        };

        grid.link_neighbours();

        let root = grid.build_node(UVec2::ZERO, patch_count, None, max_cluster_vertices);
        grid.quadtree.set_root(root);

        for cluster in &mut grid.clusters {
            cluster.allocate(height_field);
        }
        for patch in &mut grid.patches {
            patch.calculate_bounds(height_field);
        }
        grid.quadtree.calculate_bounds(&grid.patches);

        let memory: usize = grid.clusters.iter().map(Cluster::memory_size).sum();
        info!(
            "Built a terrain of {}x{} patches with {} clusters and {} quadtree nodes, using {} KiB of buffers.",
            patch_count.x,
            patch_count.y,
            grid.clusters.len(),
            grid.quadtree.len(),
            memory / 1024
        );

        grid
    }

    fn link_neighbours(&mut self) {
        let patch_count = self.patch_count;

        for (y, x) in iproduct!(0..patch_count.y, 0..patch_count.x) {
            let position = UVec2::new(x, y);

            let neighbours = Side::ALL.map(|side| {
                let neighbour = position.as_ivec2() + side.offset();
                self.patch_index(neighbour.x, neighbour.y)
            });

            if let Some(index) = self.patch_index(x as i32, y as i32) {
                self.patches[index as usize].neighbours = neighbours;
            }
        }
    }

    /// Whether a cluster spanning the given number of patches stays within the budget.
    fn fits_cluster(size: UVec2, max_cluster_vertices: u32) -> bool {
        let size = size.as_u64vec2() * PATCH_EDGE as u64 + 1;
        size.x * size.y < max_cluster_vertices as u64
    }

    fn allocate_cluster(&mut self, min: UVec2, max: UVec2) -> ClusterIndex {
        self.clusters.push(Cluster::new(ClusterWindow {
            origin: min * PATCH_EDGE,
            size: (max - min) * PATCH_EDGE + UVec2::ONE,
        }));

        (self.clusters.len() - 1) as ClusterIndex
    }

    /// Builds the subtree of the patches in `[min, max)`.
    ///
    /// The first range that fits into the vertex budget gets its own cluster, which is shared
    /// by all patches below it.
    fn build_node(
        &mut self,
        min: UVec2,
        max: UVec2,
        cluster: Option<ClusterIndex>,
        max_cluster_vertices: u32,
    ) -> NodeIndex {
        let size = max - min;

        if size == UVec2::ONE {
            let cluster = cluster.unwrap_or_else(|| self.allocate_cluster(min, max));
            let index = min.y * self.patch_count.x + min.x;

            let patch = &mut self.patches[index as usize];
            patch.cluster = cluster;
            patch.index_offset = self.clusters[cluster as usize].reserve_patch();

            return self.quadtree.push(QuadTreeNodeKind::Leaf(index));
        }

        let cluster = match cluster {
            None if Self::fits_cluster(size, max_cluster_vertices) => {
                Some(self.allocate_cluster(min, max))
            }
            cluster => cluster,
        };

        // an axis of extent one produces an empty lower half, which is skipped
        let center = (min + max) / 2;
        let mut children = [None; 4];

        for (x_half, y_half) in iproduct!(0..2, 0..2) {
            let child_min = UVec2::new(
                if x_half == 0 { min.x } else { center.x },
                if y_half == 0 { min.y } else { center.y },
            );
            let child_max = UVec2::new(
                if x_half == 0 { center.x } else { max.x },
                if y_half == 0 { center.y } else { max.y },
            );

            if child_min.cmplt(child_max).all() {
                children[(x_half << 1) | y_half] =
                    Some(self.build_node(child_min, child_max, cluster, max_cluster_vertices));
            }
        }

        self.quadtree.push(QuadTreeNodeKind::Branch(children))
    }

    /// The index of the patch at the patch position, if it lies inside the grid.
    pub fn patch_index(&self, x: i32, y: i32) -> Option<PatchIndex> {
        let (x, y) = (u32::try_from(x).ok()?, u32::try_from(y).ok()?);
        (x < self.patch_count.x && y < self.patch_count.y).then(|| y * self.patch_count.x + x)
    }

    #[inline]
    pub fn patch_count(&self) -> UVec2 {
        self.patch_count
    }

    #[inline]
    pub fn patch(&self, index: PatchIndex) -> &Patch {
        &self.patches[index as usize]
    }

    #[inline]
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    #[inline]
    pub fn cluster(&self, index: ClusterIndex) -> &Cluster {
        &self.clusters[index as usize]
    }

    #[inline]
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn clusters_mut(&mut self) -> &mut [Cluster] {
        &mut self.clusters
    }

    #[inline]
    pub fn quadtree(&self) -> &QuadTree {
        &self.quadtree
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}
