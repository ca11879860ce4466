use crate::{debug::DebugTerrain, terrain::Terrain};
use bevy::{
    core::FrameCount,
    prelude::*,
    render::primitives::{Frustum, Sphere},
};

/// Marks the camera the terrains select their level of detail and visibility for.
#[derive(Clone, Copy, Component, Default)]
pub struct TerrainView;

/// The view frustum and position of a camera in the local space of a terrain.
#[derive(Clone, Debug)]
pub struct TerrainViewer {
    pub frustum: Frustum,
    /// A sphere around the viewer enclosing the whole frustum.
    pub sphere: Sphere,
    pub position: Vec3,
}

impl TerrainViewer {
    pub fn new(frustum: Frustum, position: Vec3, radius: f32) -> Self {
        Self {
            frustum,
            sphere: Sphere {
                center: position.into(),
                radius,
            },
            position,
        }
    }

    /// Transforms the camera into the local space of the terrain.
    pub fn from_camera(
        clip_from_view: Mat4,
        view: &GlobalTransform,
        projection: &Projection,
        terrain: &GlobalTransform,
    ) -> Self {
        let local_from_world = terrain.affine().inverse();
        let clip_from_local =
            clip_from_view * view.compute_matrix().inverse() * terrain.compute_matrix();

        let position = local_from_world.transform_point3(view.translation());
        let back = local_from_world.transform_vector3(*view.back()).normalize_or_zero();
        let far = far_distance(projection);

        let frustum =
            Frustum::from_clip_from_world_custom_far(&clip_from_local, &position, &back, far);

        Self::new(frustum, position, bounding_radius(projection))
    }
}

fn far_distance(projection: &Projection) -> f32 {
    match projection {
        Projection::Perspective(perspective) => perspective.far,
        Projection::Orthographic(orthographic) => orthographic.far,
    }
}

/// The distance from the camera to the farthest corner of its frustum.
fn bounding_radius(projection: &Projection) -> f32 {
    match projection {
        Projection::Perspective(perspective) => {
            let tan_y = (perspective.fov / 2.0).tan();
            let tan_x = tan_y * perspective.aspect_ratio;
            perspective.far * (1.0 + tan_x * tan_x + tan_y * tan_y).sqrt()
        }
        Projection::Orthographic(orthographic) => orthographic
            .area
            .half_size()
            .extend(orthographic.far)
            .length(),
    }
}

/// Updates the visibility, level of detail and tessellation of all terrains for the first
/// active terrain view.
pub(crate) fn update_terrains(
    mut terrains: Query<(&mut Terrain, &GlobalTransform)>,
    views: Query<(&Camera, &GlobalTransform, &Projection), With<TerrainView>>,
    frame_count: Res<FrameCount>,
    debug: Option<Res<DebugTerrain>>,
) {
    if debug.is_some_and(|debug| debug.freeze) {
        return;
    }

    let Some((camera, view, projection)) = views.iter().find(|(camera, ..)| camera.is_active)
    else {
        return;
    };

    for (mut terrain, transform) in &mut terrains {
        let clip_from_view = camera.clip_from_view();
        let viewer = TerrainViewer::from_camera(clip_from_view, view, projection, transform);
        let stats = terrain.update(&viewer, frame_count.0 as u64);

        debug!(
            "terrain update: {} visible patches, {} node checks, {} lod updates, {} relaxation passes, {} rebuilt patches",
            stats.visible_patches,
            stats.node_checks,
            stats.lod_updates,
            stats.relaxation_passes,
            stats.rebuilt_patches
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{FrustumCulling, Intersection};
    use bevy::render::{camera::CameraProjection, primitives::Aabb};

    #[test]
    fn perspective_radius_covers_far_corners() {
        let projection = Projection::Perspective(PerspectiveProjection {
            fov: std::f32::consts::FRAC_PI_2,
            aspect_ratio: 1.0,
            far: 100.0,
            ..default()
        });

        let radius = bounding_radius(&projection);
        assert!((radius - 100.0 * 3.0f32.sqrt()).abs() < 1e-3);
    }

    #[test]
    fn frustum_in_terrain_space() {
        let projection = Projection::Perspective(PerspectiveProjection {
            far: 1000.0,
            ..default()
        });
        let clip_from_view = projection.get_clip_from_view();

        // camera at the world origin looking along -Z, terrain moved to z = -500
        let view = GlobalTransform::IDENTITY;
        let terrain = GlobalTransform::from_translation(Vec3::new(0.0, 0.0, -500.0));
        let viewer = TerrainViewer::from_camera(clip_from_view, &view, &projection, &terrain);

        assert!((viewer.position - Vec3::new(0.0, 0.0, 500.0)).length() < 1e-3);

        let ahead = Aabb::from_min_max(Vec3::splat(-1.0), Vec3::splat(1.0));
        let behind = Aabb::from_min_max(Vec3::new(-1.0, -1.0, 600.0), Vec3::new(1.0, 1.0, 602.0));
        assert_eq!(viewer.frustum.intersect_aabb(&ahead), Intersection::Inside);
        assert_eq!(viewer.frustum.intersect_aabb(&behind), Intersection::Outside);
    }
}
