use bevy::{
    math::Vec3,
    render::primitives::{Aabb, Sphere},
};

/// The smallest box enclosing both boxes.
pub fn aabb_union(a: &Aabb, b: &Aabb) -> Aabb {
    Aabb::from_min_max(
        Vec3::from(a.min().min(b.min())),
        Vec3::from(a.max().max(b.max())),
    )
}

/// Whether `inner` lies completely inside of `outer`.
pub fn aabb_contains(outer: &Aabb, inner: &Aabb) -> bool {
    outer.min().cmple(inner.min()).all() && outer.max().cmpge(inner.max()).all()
}

/// The sphere around the box, centered at its midpoint with half the diagonal as radius.
pub fn bounding_sphere(aabb: &Aabb) -> Sphere {
    Sphere {
        center: aabb.center,
        radius: aabb.half_extents.length(),
    }
}

pub fn spheres_intersect(a: &Sphere, b: &Sphere) -> bool {
    let radius = a.radius + b.radius;
    (a.center - b.center).length_squared() <= radius * radius
}
