//! The quadtree spanning the patch grid.
//!
//! The nodes are stored in an arena and address each other by [`NodeIndex`].
//! Children are always pushed before their parent, so the bounds can be computed bottom
//! up with a single sweep over the arena.

use crate::{
    math::{aabb_union, bounding_sphere},
    terrain_data::{patch::Patch, NodeIndex, PatchIndex},
};
use bevy::render::primitives::{Aabb, Sphere};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuadTreeNodeKind {
    /// Up to four children, indexed by `(x_half << 1) | y_half`.
    Branch([Option<NodeIndex>; 4]),
    Leaf(PatchIndex),
}

#[derive(Clone, Debug)]
pub struct QuadTreeNode {
    pub kind: QuadTreeNodeKind,
    pub aabb: Aabb,
    pub sphere: Sphere,
}

#[derive(Clone, Debug, Default)]
pub struct QuadTree {
    nodes: Vec<QuadTreeNode>,
    root: Option<NodeIndex>,
}

impl QuadTree {
    #[inline]
    pub fn root(&self) -> Option<NodeIndex> {
        self.root
    }

    #[inline]
    pub fn node(&self, index: NodeIndex) -> &QuadTreeNode {
        &self.nodes[index as usize]
    }

    #[inline]
    pub fn nodes(&self) -> &[QuadTreeNode] {
        &self.nodes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The bounds of the whole tree.
    pub fn aabb(&self) -> Option<&Aabb> {
        self.root.map(|root| &self.node(root).aabb)
    }

    pub(crate) fn push(&mut self, kind: QuadTreeNodeKind) -> NodeIndex {
        self.nodes.push(QuadTreeNode {
            kind,
            aabb: Aabb::default(),
            sphere: Sphere::default(),
        });

        (self.nodes.len() - 1) as NodeIndex
    }

    pub(crate) fn set_root(&mut self, root: NodeIndex) {
        self.root = Some(root);
    }

    /// Recomputes the bounds of all nodes from the bounds of the patches.
    pub(crate) fn calculate_bounds(&mut self, patches: &[Patch]) {
        for index in 0..self.nodes.len() {
            let aabb = match self.nodes[index].kind {
                QuadTreeNodeKind::Leaf(patch) => patches[patch as usize].aabb,
                QuadTreeNodeKind::Branch(children) => children
                    .into_iter()
                    .flatten()
                    .map(|child| self.nodes[child as usize].aabb)
                    .reduce(|a, b| aabb_union(&a, &b))
                    .unwrap_or_default(),
            };

            let node = &mut self.nodes[index];
            node.aabb = aabb;
            node.sphere = bounding_sphere(&aabb);
        }
    }

    /// Appends the patches of all leaves below the node.
    pub fn collect_leaves(&self, index: NodeIndex, leaves: &mut Vec<PatchIndex>) {
        match self.node(index).kind {
            QuadTreeNodeKind::Leaf(patch) => leaves.push(patch),
            QuadTreeNodeKind::Branch(children) => {
                for child in children.into_iter().flatten() {
                    self.collect_leaves(child, leaves);
                }
            }
        }
    }
}
