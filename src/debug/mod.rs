//! Contains a debug resource and systems controlling it to visualize different internal
//! data of the plugin.
use crate::{
    debug::camera::{debug_camera_control, keep_above_ground},
    terrain::Terrain,
    terrain_data::{quadtree::QuadTreeNodeKind, LOD_LEVELS},
};
use bevy::{prelude::*, render::primitives::Aabb};

pub mod camera;

/// Adds a terrain debug config, a debug camera, debug lighting and debug control systems.
pub struct TerrainDebugPlugin;

impl Plugin for TerrainDebugPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<DebugTerrain>()
            .add_systems(Startup, debug_lighting)
            .add_systems(
                Update,
                (
                    (debug_camera_control, keep_above_ground).chain(),
                    toggle_debug,
                    draw_patch_bounds,
                    draw_quadtree,
                    log_stats,
                ),
            );
    }
}

#[derive(Clone, Debug, Default, Resource)]
pub struct DebugTerrain {
    /// Stops updating the visibility and level of detail.
    pub freeze: bool,
    pub show_patches: bool,
    pub show_quadtree: bool,
    pub log_stats: bool,
}

pub fn toggle_debug(input: Res<ButtonInput<KeyCode>>, mut debug: ResMut<DebugTerrain>) {
    if input.just_pressed(KeyCode::KeyF) {
        debug.freeze = !debug.freeze;
        println!(
            "{} the terrain level of detail.",
            if debug.freeze { "Froze" } else { "Unfroze" }
        )
    }
    if input.just_pressed(KeyCode::KeyL) {
        debug.show_patches = !debug.show_patches;
        println!(
            "Toggled the patch lod view {}.",
            if debug.show_patches { "on" } else { "off" }
        )
    }
    if input.just_pressed(KeyCode::KeyQ) {
        debug.show_quadtree = !debug.show_quadtree;
        println!(
            "Toggled the quadtree view {}.",
            if debug.show_quadtree { "on" } else { "off" }
        )
    }
    if input.just_pressed(KeyCode::KeyI) {
        debug.log_stats = !debug.log_stats;
        println!(
            "Toggled the frame statistics {}.",
            if debug.log_stats { "on" } else { "off" }
        )
    }
}

/// The debug color of a tessellation level, from red (finest) to blue (coarsest).
pub fn level_color(level: u8) -> Color {
    Color::hsl(240.0 * level as f32 / LOD_LEVELS as f32, 1.0, 0.5)
}

fn aabb_transform(terrain: &GlobalTransform, aabb: &Aabb) -> GlobalTransform {
    *terrain
        * Transform::from_translation(aabb.center.into())
            .with_scale(Vec3::from(aabb.half_extents) * 2.0)
}

pub(crate) fn draw_patch_bounds(
    debug: Res<DebugTerrain>,
    terrains: Query<(&Terrain, &GlobalTransform)>,
    mut gizmos: Gizmos,
) {
    if !debug.show_patches {
        return;
    }

    for (terrain, transform) in &terrains {
        let grid = terrain.grid();

        for &index in terrain.visible_patches() {
            let patch = grid.patch(index);
            gizmos.cuboid(
                aabb_transform(transform, patch.aabb()),
                level_color(patch.level()),
            );
        }
    }
}

pub(crate) fn draw_quadtree(
    debug: Res<DebugTerrain>,
    terrains: Query<(&Terrain, &GlobalTransform)>,
    mut gizmos: Gizmos,
) {
    if !debug.show_quadtree {
        return;
    }

    for (terrain, transform) in &terrains {
        for node in terrain.grid().quadtree().nodes() {
            if let QuadTreeNodeKind::Branch(_) = node.kind {
                gizmos.cuboid(aabb_transform(transform, &node.aabb), Color::WHITE);
            }
        }
    }
}

pub(crate) fn log_stats(debug: Res<DebugTerrain>, terrains: Query<(Entity, &Terrain)>) {
    if !debug.log_stats {
        return;
    }

    for (entity, terrain) in &terrains {
        info!("Terrain {entity}: {:?}", terrain.stats());
    }
}

pub(crate) fn debug_lighting(mut commands: Commands) {
    commands.spawn((
        DirectionalLight {
            illuminance: 20000.0,
            ..default()
        },
        Transform::from_xyz(1.0, 1.0, 0.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
    commands.insert_resource(AmbientLight {
        brightness: 0.2,
        ..default()
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_colors_are_distinct() {
        let colors: Vec<Color> = (0..=LOD_LEVELS).map(level_color).collect();
        for (index, color) in colors.iter().enumerate() {
            assert!(!colors[index + 1..].contains(color));
        }
    }
}
