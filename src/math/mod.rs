//! Geometric helpers used by the terrain culling and bounds computations.

mod bounds;
mod culling;

pub use bounds::{aabb_contains, aabb_union, bounding_sphere, spheres_intersect};
pub use culling::{FrustumCulling, Intersection, PlaneMask};

/// An axis aligned box shaped frustum.
#[cfg(test)]
pub(crate) fn box_frustum(
    min: bevy::math::Vec3,
    max: bevy::math::Vec3,
) -> bevy::render::primitives::Frustum {
    use bevy::{
        math::Vec4,
        render::primitives::{Frustum, HalfSpace},
    };

    Frustum {
        half_spaces: [
            HalfSpace::new(Vec4::new(1.0, 0.0, 0.0, -min.x)),
            HalfSpace::new(Vec4::new(-1.0, 0.0, 0.0, max.x)),
            HalfSpace::new(Vec4::new(0.0, 1.0, 0.0, -min.y)),
            HalfSpace::new(Vec4::new(0.0, -1.0, 0.0, max.y)),
            HalfSpace::new(Vec4::new(0.0, 0.0, 1.0, -min.z)),
            HalfSpace::new(Vec4::new(0.0, 0.0, -1.0, max.z)),
        ],
    }
}
