use bevy::render::primitives::{Aabb, Frustum};

/// The result of testing a bounding volume against a frustum.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intersection {
    Outside,
    Inside,
    Intersects,
}

bitflags::bitflags! {
    /// The frustum planes that still have to be tested.
    ///
    /// The bit order matches the half spaces of bevy's [`Frustum`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct PlaneMask: u32 {
        const LEFT = 1 << 0;
        const RIGHT = 1 << 1;
        const BOTTOM = 1 << 2;
        const TOP = 1 << 3;
        const NEAR = 1 << 4;
        const FAR = 1 << 5;
    }
}

/// Box culling against the planes of a frustum.
pub trait FrustumCulling {
    /// Tests the box only against the planes contained in the `mask`.
    ///
    /// Returns the classification and the mask with every plane cleared that the box lies
    /// completely inside of. Children of the box are contained in it, so they can skip the
    /// cleared planes.
    fn intersect_aabb_masked(&self, aabb: &Aabb, mask: PlaneMask) -> (Intersection, PlaneMask);

    /// Tests the box against all planes.
    fn intersect_aabb(&self, aabb: &Aabb) -> Intersection {
        self.intersect_aabb_masked(aabb, PlaneMask::all()).0
    }
}

impl FrustumCulling for Frustum {
    fn intersect_aabb_masked(&self, aabb: &Aabb, mask: PlaneMask) -> (Intersection, PlaneMask) {
        let mut remaining = mask;

        for (index, half_space) in self.half_spaces.iter().enumerate() {
            let plane = PlaneMask::from_bits_retain(1 << index);
            if !mask.contains(plane) {
                continue;
            }

            let normal = half_space.normal();
            // distance of the box center and the projected extent of the box onto the normal
            let distance = normal.dot(aabb.center) + half_space.d();
            let extent = normal.abs().dot(aabb.half_extents);

            if distance + extent < 0.0 {
                return (Intersection::Outside, remaining);
            }
            if distance - extent >= 0.0 {
                remaining.remove(plane);
            }
        }

        if remaining.is_empty() {
            (Intersection::Inside, remaining)
        } else {
            (Intersection::Intersects, remaining)
        }
    }
}
