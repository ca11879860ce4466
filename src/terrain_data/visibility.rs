//! Coherent hierarchical frustum culling of the quadtree.

use crate::{
    math::{spheres_intersect, FrustumCulling, Intersection, PlaneMask},
    terrain_data::{
        patch::Patch,
        quadtree::{QuadTree, QuadTreeNode, QuadTreeNodeKind},
        NodeIndex, PatchIndex,
    },
    terrain_view::TerrainViewer,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NodeVisibility {
    Invisible,
    /// Intersects the planes remaining in the mask.
    PartlyVisible(PlaneMask),
    FullyVisible,
}

/// Collects the visible patches of the quadtree.
///
/// Each traversal advances the tick and stamps it onto the visible patches,
/// so visibility in the current frame can be queried per patch.
#[derive(Clone, Debug, Default)]
pub struct VisibilityTraversal {
    tick: u32,
    order: [usize; 4],
    visible: Vec<PatchIndex>,
    checks: u32,
}

impl VisibilityTraversal {
    /// The tick of the last traversal.
    #[inline]
    pub fn tick(&self) -> u32 {
        self.tick
    }

    /// The visible patches of the last traversal, roughly sorted front to back.
    #[inline]
    pub fn visible(&self) -> &[PatchIndex] {
        &self.visible
    }

    /// The number of nodes tested during the last traversal.
    #[inline]
    pub fn checks(&self) -> u32 {
        self.checks
    }

    pub fn traverse(
        &mut self,
        quadtree: &QuadTree,
        patches: &mut [Patch],
        viewer: &TerrainViewer,
    ) {
        // zero marks patches that were never visible
        self.tick = self.tick.wrapping_add(1).max(1);
        self.visible.clear();
        self.checks = 0;

        // visit the quadrant facing the viewer first and the opposite one last
        let near = (((viewer.position.x > 0.0) as usize) << 1) | (viewer.position.z > 0.0) as usize;
        self.order = [near, near ^ 1, near ^ 2, near ^ 3];

        let Some(root) = quadtree.root() else {
            return;
        };

        match self.test(quadtree.node(root), viewer, PlaneMask::all()) {
            NodeVisibility::Invisible => {}
            NodeVisibility::PartlyVisible(mask) => {
                self.visit(quadtree, patches, viewer, root, Some(mask))
            }
            NodeVisibility::FullyVisible => self.visit(quadtree, patches, viewer, root, None),
        }
    }

    fn test(
        &mut self,
        node: &QuadTreeNode,
        viewer: &TerrainViewer,
        mask: PlaneMask,
    ) -> NodeVisibility {
        self.checks += 1;

        if !spheres_intersect(&viewer.sphere, &node.sphere) {
            return NodeVisibility::Invisible;
        }

        match viewer.frustum.intersect_aabb_masked(&node.aabb, mask) {
            (Intersection::Outside, _) => NodeVisibility::Invisible,
            (Intersection::Inside, _) => NodeVisibility::FullyVisible,
            (Intersection::Intersects, mask) => NodeVisibility::PartlyVisible(mask),
        }
    }

    /// Visits a visible node. Without a mask the whole subtree is visible.
    fn visit(
        &mut self,
        quadtree: &QuadTree,
        patches: &mut [Patch],
        viewer: &TerrainViewer,
        index: NodeIndex,
        mask: Option<PlaneMask>,
    ) {
        let children = match quadtree.node(index).kind {
            QuadTreeNodeKind::Leaf(patch) => {
                patches[patch as usize].visible_tick = self.tick;
                self.visible.push(patch);
                return;
            }
            QuadTreeNodeKind::Branch(children) => children,
        };

        for slot in self.order {
            let Some(child) = children[slot] else {
                continue;
            };

            let Some(mask) = mask else {
                self.visit(quadtree, patches, viewer, child, None);
                continue;
            };

            match self.test(quadtree.node(child), viewer, mask) {
                NodeVisibility::Invisible => {}
                NodeVisibility::PartlyVisible(mask) => {
                    self.visit(quadtree, patches, viewer, child, Some(mask))
                }
                NodeVisibility::FullyVisible => self.visit(quadtree, patches, viewer, child, None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        height_field::HeightField,
        math::box_frustum,
        terrain_data::{grid::PatchGrid, MAX_CLUSTER_VERTICES, PATCH_EDGE},
    };
    use bevy::math::{UVec2, Vec2, Vec3};

    fn grid(patches: UVec2) -> PatchGrid {
        let size = patches * PATCH_EDGE + UVec2::ONE;
        let field = HeightField::from_fn(size, Vec2::ONE, 10.0, |x, y| ((x ^ y) * 97) as u16);
        PatchGrid::new(&field, MAX_CLUSTER_VERTICES)
    }

    fn viewer(min: Vec3, max: Vec3) -> TerrainViewer {
        TerrainViewer::new(box_frustum(min, max), Vec3::new(10.0, 5.0, 10.0), 1e6)
    }

    fn sorted(mut patches: Vec<PatchIndex>) -> Vec<PatchIndex> {
        patches.sort_unstable();
        patches
    }

    #[test]
    fn everything_visible() {
        let mut grid = grid(UVec2::new(5, 3));
        let mut traversal = VisibilityTraversal::default();
        let viewer = viewer(Vec3::splat(-1e5), Vec3::splat(1e5));
        traversal.traverse(&grid.quadtree, &mut grid.patches, &viewer);

        assert_eq!(sorted(traversal.visible().to_vec()), (0..15).collect::<Vec<_>>());
        // the root is fully inside, so no other node is tested
        assert_eq!(traversal.checks(), 1);
        assert!(grid.patches().iter().all(|patch| patch.is_visible(traversal.tick())));
    }

    #[test]
    fn half_space_culls_columns() {
        // patches span x in [-64, 64], with 32 units per patch
        let mut grid = grid(UVec2::new(4, 4));
        let mut traversal = VisibilityTraversal::default();
        let viewer = viewer(Vec3::splat(-1e5), Vec3::new(-1.0, 1e5, 1e5));
        traversal.traverse(&grid.quadtree, &mut grid.patches, &viewer);

        let expected: Vec<PatchIndex> = (0..16).filter(|index| index % 4 < 2).collect();
        assert_eq!(sorted(traversal.visible().to_vec()), expected);

        for (index, patch) in grid.patches().iter().enumerate() {
            let visible = patch.is_visible(traversal.tick());
            assert_eq!(visible, expected.contains(&(index as PatchIndex)));
            assert_eq!(
                visible,
                viewer.frustum.intersect_aabb(patch.aabb()) != Intersection::Outside
            );
        }
    }

    #[test]
    fn viewer_sphere_rejects_far_nodes() {
        let mut grid = grid(UVec2::new(4, 4));
        let mut traversal = VisibilityTraversal::default();
        let viewer = TerrainViewer::new(
            box_frustum(Vec3::splat(-1e5), Vec3::splat(1e5)),
            Vec3::new(-1e4, 0.0, 0.0),
            100.0,
        );
        traversal.traverse(&grid.quadtree, &mut grid.patches, &viewer);

        assert!(traversal.visible().is_empty());
        assert_eq!(traversal.checks(), 1);
    }

    #[test]
    fn traversal_is_idempotent() {
        let mut grid = grid(UVec2::new(6, 7));
        let mut traversal = VisibilityTraversal::default();
        let viewer = viewer(Vec3::new(-80.0, -1e5, -20.0), Vec3::new(30.0, 1e5, 90.0));

        traversal.traverse(&grid.quadtree, &mut grid.patches, &viewer);
        let first = traversal.visible().to_vec();
        let first_tick = traversal.tick();
        traversal.traverse(&grid.quadtree, &mut grid.patches, &viewer);

        assert!(!first.is_empty());
        assert_eq!(traversal.visible(), first.as_slice());
        assert_eq!(traversal.tick(), first_tick + 1);
    }

    #[test]
    fn nearest_quadrant_first() {
        let mut grid = grid(UVec2::new(2, 2));
        let mut traversal = VisibilityTraversal::default();
        let viewer_at = |position| {
            TerrainViewer::new(box_frustum(Vec3::splat(-1e5), Vec3::splat(1e5)), position, 1e6)
        };

        // children are indexed by (x_half << 1) | y_half, patches row major
        let viewer = viewer_at(Vec3::new(20.0, 0.0, 20.0));
        traversal.traverse(&grid.quadtree, &mut grid.patches, &viewer);
        assert_eq!(traversal.visible(), [3, 1, 2, 0]);

        let viewer = viewer_at(Vec3::new(-20.0, 0.0, -20.0));
        traversal.traverse(&grid.quadtree, &mut grid.patches, &viewer);
        assert_eq!(traversal.visible(), [0, 2, 1, 3]);
    }

    #[test]
    fn empty_tree() {
        let mut grid = PatchGrid::default();
        let mut traversal = VisibilityTraversal::default();
        let viewer = viewer(Vec3::splat(-1.0), Vec3::splat(1.0));
        traversal.traverse(&grid.quadtree, &mut grid.patches, &viewer);

        assert!(traversal.visible().is_empty());
        assert_eq!(traversal.checks(), 0);
    }

    #[test]
    fn tick_skips_zero() {
        let mut grid = PatchGrid::default();
        let mut traversal = VisibilityTraversal {
            tick: u32::MAX,
            ..Default::default()
        };
        let viewer = viewer(Vec3::splat(-1.0), Vec3::splat(1.0));
        traversal.traverse(&grid.quadtree, &mut grid.patches, &viewer);
        assert_eq!(traversal.tick(), 1);
    }
}
