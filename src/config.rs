use crate::terrain_data::{lod::LodPolicy, MAX_CLUSTER_VERTICES, PATCH_SIZE};
use anyhow::{ensure, Context, Result};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// The configuration of a terrain.
///
/// Can be loaded from a `*.terrain.ron` file, either directly or as an asset.
#[derive(Asset, TypePath, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// The distance between two samples of the height field along the x axis.
    pub mesh_step_x: f32,
    /// The distance between two samples of the height field along the z axis.
    pub mesh_step_z: f32,
    /// The height of the largest sample value.
    pub height_scale: f32,
    /// The maximum number of vertices in the vertex buffer of a cluster.
    pub max_cluster_vertices: u32,
    pub lod: LodPolicy,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            mesh_step_x: 10.0,
            mesh_step_z: 10.0,
            height_scale: 5000.0,
            max_cluster_vertices: MAX_CLUSTER_VERTICES,
            lod: LodPolicy::default(),
        }
    }
}

impl TerrainConfig {
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let config: Self = ron::from_str(source).context("Failed to parse the terrain config.")?;
        config.validate()?;

        Ok(config)
    }

    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read the terrain config {}.", path.display()))?;

        Self::from_ron_str(&source)
            .with_context(|| format!("Invalid terrain config {}.", path.display()))
    }

    #[inline]
    pub fn mesh_step(&self) -> Vec2 {
        Vec2::new(self.mesh_step_x, self.mesh_step_z)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.mesh_step_x > 0.0 && self.mesh_step_z > 0.0,
            "The mesh step has to be positive, but is {}.",
            self.mesh_step()
        );
        ensure!(
            self.height_scale.is_finite(),
            "The height scale has to be finite."
        );
        // a single patch has to fit and every vertex has to be addressable by a 16 bit index
        ensure!(
            self.max_cluster_vertices > PATCH_SIZE * PATCH_SIZE
                && self.max_cluster_vertices <= u16::MAX as u32 + 2,
            "The cluster vertex budget {} has to be in ({}, {}].",
            self.max_cluster_vertices,
            PATCH_SIZE * PATCH_SIZE,
            u16::MAX as u32 + 2
        );
        ensure!(
            self.lod.distance_scale > 0.0 && self.lod.falloff >= 0.0 && self.lod.exponent > 0.0,
            "The lod policy requires a positive distance scale and exponent and a non negative falloff."
        );
        ensure!(
            self.lod.min_update_interval <= self.lod.max_update_interval,
            "The minimum lod update interval exceeds the maximum."
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_partial_config() {
        let config = TerrainConfig::from_ron_str(
            "(mesh_step_x: 2.0, max_cluster_vertices: 4226, lod: (min_update_interval: 0, max_update_interval: 0))",
        )
        .unwrap();

        assert_eq!(config.mesh_step(), Vec2::new(2.0, 10.0));
        assert_eq!(config.max_cluster_vertices, 4226);
        assert_eq!(config.lod.distance_scale, 1000.0);
        assert_eq!(config.lod.max_update_interval, 0);
    }

    #[test]
    fn default_is_valid() {
        TerrainConfig::default().validate().unwrap();
        let source = ron::to_string(&TerrainConfig::default()).unwrap();
        assert_eq!(TerrainConfig::from_ron_str(&source).unwrap(), TerrainConfig::default());
    }

    #[test]
    fn reject_invalid_values() {
        let invalid = [
            TerrainConfig {
                mesh_step_x: 0.0,
                ..default()
            },
            TerrainConfig {
                max_cluster_vertices: PATCH_SIZE * PATCH_SIZE,
                ..default()
            },
            TerrainConfig {
                max_cluster_vertices: 70000,
                ..default()
            },
            TerrainConfig {
                lod: LodPolicy {
                    min_update_interval: 5,
                    max_update_interval: 4,
                    ..default()
                },
                ..default()
            },
        ];

        for config in invalid {
            assert!(config.validate().is_err(), "{config:?}");
        }
        assert!(TerrainConfig::from_ron_str("(height_scale: \"high\")").is_err());
        assert!(TerrainConfig::load_file("missing.terrain.ron").is_err());
    }
}
