use crate::terrain::Terrain;
use bevy::{input::mouse::MouseMotion, prelude::*};

/// A free flying camera, controlled with the arrow keys and the mouse while the right mouse
/// button is held.
#[derive(Component)]
pub struct DebugCamera {
    pub yaw: f32,
    pub pitch: f32,
    pub translation_speed: f32,
    pub rotation_speed: f32,
    pub acceleration: f32,
    /// The minimum height above the terrain surface.
    pub ground_clearance: f32,
}

impl Default for DebugCamera {
    fn default() -> Self {
        Self {
            yaw: -135.0_f32.to_radians(),
            pitch: 0.0,
            translation_speed: 600.0,
            rotation_speed: 0.2,
            acceleration: 1.03,
            ground_clearance: 2.0,
        }
    }
}

pub(crate) fn debug_camera_control(
    time: Res<Time>,
    mut motion_events: EventReader<MouseMotion>,
    keys: Res<ButtonInput<KeyCode>>,
    buttons: Res<ButtonInput<MouseButton>>,
    mut cameras: Query<(&mut Transform, &mut DebugCamera)>,
) {
    let delta_time = time.delta_secs();
    let mut rotation_delta = Vec2::ZERO;

    for motion in motion_events.read() {
        if buttons.pressed(MouseButton::Right) {
            rotation_delta -= motion.delta;
        }
    }

    let mut translation_delta = Vec3::ZERO;
    let mut speed_factor = 1.0;

    if keys.pressed(KeyCode::ArrowLeft) {
        translation_delta.x -= 1.0;
    }
    if keys.pressed(KeyCode::ArrowRight) {
        translation_delta.x += 1.0;
    }
    if keys.pressed(KeyCode::PageUp) {
        translation_delta.y += 1.0;
    }
    if keys.pressed(KeyCode::PageDown) {
        translation_delta.y -= 1.0;
    }
    if keys.pressed(KeyCode::ArrowUp) {
        translation_delta.z -= 1.0;
    }
    if keys.pressed(KeyCode::ArrowDown) {
        translation_delta.z += 1.0;
    }

    for (mut transform, mut camera) in &mut cameras {
        if keys.pressed(KeyCode::Home) {
            speed_factor = 1.0 / camera.acceleration;
        }
        if keys.pressed(KeyCode::End) {
            speed_factor = camera.acceleration;
        }
        camera.translation_speed *= speed_factor;

        camera.yaw += rotation_delta.x * camera.rotation_speed * delta_time;
        camera.pitch = (camera.pitch + rotation_delta.y * camera.rotation_speed * delta_time)
            .clamp(-1.5, 1.5);

        let yaw = Quat::from_rotation_y(camera.yaw);
        let direction = yaw * translation_delta.normalize_or_zero();

        transform.translation += direction * camera.translation_speed * delta_time;
        transform.rotation = yaw * Quat::from_rotation_x(camera.pitch);
    }
}

/// Keeps the debug cameras above the surface of the terrains.
pub(crate) fn keep_above_ground(
    terrains: Query<(&Terrain, &GlobalTransform)>,
    mut cameras: Query<(&mut Transform, &DebugCamera)>,
) {
    for (mut transform, camera) in &mut cameras {
        for (terrain, terrain_transform) in &terrains {
            let world_from_local = terrain_transform.affine();
            let local = world_from_local.inverse().transform_point3(transform.translation);

            let Some(height) = terrain.height_field().sample_height(local.xz()) else {
                continue;
            };

            let minimum = height + camera.ground_clearance;
            if local.y < minimum {
                let corrected = Vec3::new(local.x, minimum, local.z);
                transform.translation = world_from_local.transform_point3(corrected);
            }
        }
    }
}
