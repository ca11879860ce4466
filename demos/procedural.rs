use bevy::prelude::*;
use bevy_patch_terrain::prelude::*;
use ndarray::Array2;
use std::f32::consts::TAU;

const PATCH_COUNT: usize = 32;
const SIZE: usize = PATCH_COUNT * 32 + 1;

fn main() {
    App::new()
        .add_plugins((DefaultPlugins, TerrainPlugin, TerrainDebugPlugin))
        .add_systems(Startup, setup)
        .run();
}

/// Rolling hills made of a few octaves of sine waves.
fn hills(x: usize, y: usize) -> u16 {
    let (x, y) = (x as f32 / SIZE as f32, y as f32 / SIZE as f32);
    let mut height = 0.0;
    let mut amplitude = 0.5;
    let mut frequency = 3.0;

    for _ in 0..5 {
        height += amplitude
            * (0.5 + 0.25 * (x * frequency * TAU).sin() + 0.25 * (y * frequency * 5.1).cos());
        amplitude *= 0.45;
        frequency *= 2.1;
    }

    (height.clamp(0.0, 1.0) * u16::MAX as f32) as u16
}

fn setup(mut commands: Commands, asset_server: Res<AssetServer>) {
    let samples = Array2::from_shape_fn((SIZE, SIZE), |(y, x)| hills(x, y));

    // pass the asset path of a `.terrain.ron` file to override the default configuration
    match std::env::args().nth(1) {
        Some(path) => {
            commands.spawn_terrain(asset_server.load(path), samples);
        }
        None => {
            let config = TerrainConfig {
                height_scale: 1500.0,
                ..default()
            };

            match Terrain::new(config, samples) {
                Ok(terrain) => {
                    commands.spawn(terrain);
                }
                Err(error) => error!("{error:?}"),
            }
        }
    }

    commands.spawn((
        TerrainView,
        DebugCamera {
            pitch: -0.5,
            ..default()
        },
        Camera3d::default(),
        Projection::Perspective(PerspectiveProjection {
            far: 20000.0,
            ..default()
        }),
        Transform::from_xyz(-2000.0, 1800.0, -2000.0),
    ));
}
