use crate::{
    config::TerrainConfig,
    render::{spawn_cluster_meshes, sync_cluster_meshes},
    spawn::spawn_terrains,
    terrain_view::update_terrains,
};
use bevy::{prelude::*, render::view::VisibilitySystems};
use bevy_common_assets::ron::RonAssetPlugin;

/// The systems updating the terrains, in execution order.
#[derive(Clone, Debug, Hash, PartialEq, Eq, SystemSet)]
pub enum TerrainSystems {
    SpawnTerrains,
    SpawnClusters,
    Update,
    SyncMeshes,
}

/// The plugin for the terrain renderer.
pub struct TerrainPlugin;

impl Plugin for TerrainPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(RonAssetPlugin::<TerrainConfig>::new(&["terrain.ron"]))
            .configure_sets(
                PostUpdate,
                (
                    TerrainSystems::SpawnTerrains,
                    TerrainSystems::SpawnClusters,
                    TerrainSystems::Update,
                    TerrainSystems::SyncMeshes,
                )
                    .chain()
                    .after(TransformSystem::TransformPropagate)
                    .before(VisibilitySystems::CheckVisibility),
            )
            .add_systems(
                PostUpdate,
                (
                    spawn_terrains.in_set(TerrainSystems::SpawnTerrains),
                    spawn_cluster_meshes.in_set(TerrainSystems::SpawnClusters),
                    update_terrains.in_set(TerrainSystems::Update),
                    sync_cluster_meshes.in_set(TerrainSystems::SyncMeshes),
                ),
            );
    }
}
