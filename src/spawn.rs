use crate::{config::TerrainConfig, terrain::Terrain};
use bevy::{asset::LoadState, ecs::system::EntityCommands, prelude::*};
use ndarray::Array2;

/// A terrain waiting for its configuration asset to finish loading.
#[derive(Component)]
#[require(Transform, Visibility)]
pub struct PendingTerrain {
    config: Handle<TerrainConfig>,
    samples: Array2<u16>,
}

pub(crate) fn spawn_terrains(
    mut commands: Commands,
    mut pending: Query<(Entity, &mut PendingTerrain)>,
    configs: Res<Assets<TerrainConfig>>,
    asset_server: Option<Res<AssetServer>>,
) {
    for (entity, mut terrain) in &mut pending {
        let Some(config) = configs.get(&terrain.config) else {
            let failed = asset_server.as_ref().is_some_and(|server| {
                matches!(server.load_state(&terrain.config), LoadState::Failed(_))
            });

            if failed {
                error!("Failed to load the terrain config of {entity}.");
                commands.entity(entity).remove::<PendingTerrain>();
            }
            continue;
        };

        let samples = std::mem::take(&mut terrain.samples);

        match Terrain::new(config.clone(), samples) {
            Ok(terrain) => {
                commands
                    .entity(entity)
                    .remove::<PendingTerrain>()
                    .insert(terrain);
            }
            Err(error) => {
                error!("Failed to create the terrain {entity}: {error:?}");
                commands.entity(entity).remove::<PendingTerrain>();
            }
        }
    }
}

pub trait SpawnTerrainCommandsExt {
    /// Spawns a terrain from the height samples indexed by `[[y, x]]`, as soon as the
    /// configuration asset is loaded.
    fn spawn_terrain(
        &mut self,
        config: Handle<TerrainConfig>,
        samples: Array2<u16>,
    ) -> EntityCommands<'_>;
}

impl<'w, 's> SpawnTerrainCommandsExt for Commands<'w, 's> {
    fn spawn_terrain(
        &mut self,
        config: Handle<TerrainConfig>,
        samples: Array2<u16>,
    ) -> EntityCommands<'_> {
        self.spawn(PendingTerrain { config, samples })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain_data::PATCH_EDGE;

    fn app() -> App {
        let mut app = App::new();
        app.init_resource::<Assets<TerrainConfig>>()
            .add_systems(Update, spawn_terrains);
        app
    }

    fn samples() -> Array2<u16> {
        let size = 2 * PATCH_EDGE as usize + 1;
        Array2::zeros((size, size))
    }

    fn spawn(app: &mut App, config: Handle<TerrainConfig>) -> Entity {
        let mut queue = bevy::ecs::world::CommandQueue::default();
        let entity = Commands::new(&mut queue, app.world())
            .spawn_terrain(config, samples())
            .id();
        queue.apply(app.world_mut());
        entity
    }

    #[test]
    fn terrain_spawns_once_config_is_loaded() {
        let mut app = app();
        let config = app
            .world_mut()
            .resource_mut::<Assets<TerrainConfig>>()
            .reserve_handle();
        let entity = spawn(&mut app, config.clone());

        app.update();
        assert!(app.world().get::<PendingTerrain>(entity).is_some());
        assert!(app.world().get::<Terrain>(entity).is_none());

        app.world_mut()
            .resource_mut::<Assets<TerrainConfig>>()
            .insert(&config, TerrainConfig::default());
        app.update();

        let world = app.world();
        assert!(world.get::<PendingTerrain>(entity).is_none());
        let terrain = world.get::<Terrain>(entity).unwrap();
        assert_eq!(terrain.grid().patch_count(), UVec2::splat(2));
        assert_eq!(terrain.config(), &TerrainConfig::default());
    }

    #[test]
    fn invalid_config_spawns_no_terrain() {
        let mut app = app();
        let config = app
            .world_mut()
            .resource_mut::<Assets<TerrainConfig>>()
            .add(TerrainConfig {
                height_scale: f32::NAN,
                ..default()
            });
        let entity = spawn(&mut app, config);

        app.update();
        assert!(app.world().get::<PendingTerrain>(entity).is_none());
        assert!(app.world().get::<Terrain>(entity).is_none());
    }
}
