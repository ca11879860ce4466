//! Bevy meshes mirroring the cluster buffers of a terrain.
//!
//! Each cluster is rendered by a child entity of the terrain. Its mesh shares the vertices
//! of the cluster and draws the strips of the visible member patches as a triangle list.

use crate::{
    terrain::Terrain,
    terrain_data::{cluster::Cluster, ClusterIndex, IndexType, PatchIndex},
};
use bevy::{
    prelude::*,
    render::{
        mesh::{Indices, MeshVertexAttribute, PrimitiveTopology},
        render_asset::RenderAssetUsages,
        render_resource::VertexFormat,
    },
};
use itertools::Itertools;

/// The morph height and morph level of a vertex.
pub const ATTRIBUTE_MORPH: MeshVertexAttribute =
    MeshVertexAttribute::new("Terrain_Morph", 988_540_917, VertexFormat::Float32x2);

/// A child entity of a terrain rendering one of its clusters.
#[derive(Clone, Component, Debug)]
pub struct TerrainCluster {
    pub cluster: ClusterIndex,
    /// The patches drawn by the current mesh indices.
    visible: Vec<PatchIndex>,
}

impl TerrainCluster {
    pub fn new(cluster: ClusterIndex) -> Self {
        Self {
            cluster,
            visible: Vec::new(),
        }
    }
}

/// Creates a mesh with the vertices of the cluster and no indices.
pub fn cluster_mesh(cluster: &Cluster) -> Mesh {
    let vertices = cluster.vertices();

    Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default())
        .with_inserted_attribute(
            Mesh::ATTRIBUTE_POSITION,
            vertices.iter().map(|vertex| vertex.position).collect_vec(),
        )
        .with_inserted_attribute(
            Mesh::ATTRIBUTE_NORMAL,
            vertices.iter().map(|vertex| vertex.normal).collect_vec(),
        )
        .with_inserted_attribute(
            Mesh::ATTRIBUTE_UV_0,
            vertices.iter().map(|vertex| vertex.uv).collect_vec(),
        )
        .with_inserted_attribute(
            ATTRIBUTE_MORPH,
            vertices.iter().map(|vertex| vertex.morph).collect_vec(),
        )
        .with_inserted_indices(Indices::U16(Vec::new()))
}

/// Converts a triangle strip into a triangle list, dropping the degenerate triangles.
///
/// The strips wind clockwise when seen from above, so the triangles are reversed to face up.
/// Every second triangle of a strip has its winding flipped, which is undone here.
pub fn append_strip_triangles(strip: &[IndexType], triangles: &mut Vec<IndexType>) {
    for (index, window) in strip.windows(3).enumerate() {
        let (a, b, c) = (window[0], window[1], window[2]);

        if a == b || b == c || a == c {
            continue;
        }

        if index % 2 == 0 {
            triangles.extend([a, c, b]);
        } else {
            triangles.extend([a, b, c]);
        }
    }
}

pub(crate) fn spawn_cluster_meshes(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    terrains: Query<
        (Entity, &Terrain, Option<&MeshMaterial3d<StandardMaterial>>),
        Added<Terrain>,
    >,
) {
    for (entity, terrain, material) in &terrains {
        let material = match material {
            Some(material) => material.clone(),
            None => MeshMaterial3d(materials.add(StandardMaterial {
                base_color: Color::srgb(0.42, 0.48, 0.33),
                perceptual_roughness: 0.9,
                ..default()
            })),
        };

        let clusters = terrain.grid().clusters();

        commands.entity(entity).with_children(|parent| {
            for (index, cluster) in clusters.iter().enumerate() {
                parent.spawn((
                    TerrainCluster::new(index as ClusterIndex),
                    Mesh3d(meshes.add(cluster_mesh(cluster))),
                    material.clone(),
                    Visibility::Hidden,
                ));
            }
        });

        info!("Spawned {} cluster meshes for the terrain {entity}.", clusters.len());
    }
}

/// Writes the strips of the visible patches into the meshes of their clusters and hides
/// the clusters without visible patches.
pub(crate) fn sync_cluster_meshes(
    mut terrains: Query<(&mut Terrain, &Children)>,
    mut clusters: Query<(&mut TerrainCluster, &Mesh3d, &mut Visibility)>,
    mut meshes: ResMut<Assets<Mesh>>,
) {
    for (mut terrain, children) in &mut terrains {
        let grid = terrain.grid();
        let mut visible = terrain
            .visible_patches()
            .iter()
            .copied()
            .into_group_map_by(|&patch| grid.patch(patch).cluster());

        for &child in children.iter() {
            let Ok((mut cluster, mesh, mut visibility)) = clusters.get_mut(child) else {
                continue;
            };

            let patches = visible.remove(&cluster.cluster).unwrap_or_default();
            let dirty = terrain.grid_mut().clusters_mut()[cluster.cluster as usize].take_dirty();

            if patches.is_empty() {
                cluster.visible.clear();
                visibility.set_if_neq(Visibility::Hidden);
                continue;
            }

            if dirty || patches != cluster.visible {
                if let Some(mesh) = meshes.get_mut(&mesh.0) {
                    let grid = terrain.grid();
                    let indices = grid.cluster(cluster.cluster).indices();
                    let mut triangles = Vec::new();

                    for &patch in &patches {
                        let strip = &indices[grid.patch(patch).index_range()];
                        append_strip_triangles(strip, &mut triangles);
                    }

                    mesh.insert_indices(Indices::U16(triangles));
                }

                cluster.visible = patches;
            }

            visibility.set_if_neq(Visibility::Inherited);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        height_field::HeightField,
        terrain_data::{
            cluster::ClusterWindow, grid::PatchGrid, tessellator::PatchTessellator, StitchSides,
            LOD_LEVELS, MAX_CLUSTER_VERTICES, PATCH_EDGE, PATCH_SIZE,
        },
    };
    use bevy::render::mesh::VertexAttributeValues;

    #[test]
    fn strip_to_triangles() {
        let mut triangles = Vec::new();
        append_strip_triangles(&[0, 0, 1, 2, 3, 3, 4], &mut triangles);

        // (0, 0, 1), (2, 3, 3) and (3, 3, 4) are degenerate
        assert_eq!(triangles, [0, 1, 2, 1, 3, 2]);
    }

    #[test]
    fn triangles_face_up() {
        let window = ClusterWindow {
            origin: UVec2::ZERO,
            size: UVec2::splat(PATCH_SIZE),
        };
        let position = |index: IndexType| {
            let index = index as u32;
            Vec3::new((index % PATCH_SIZE) as f32, 0.0, (index / PATCH_SIZE) as f32)
        };

        for level in 0..=LOD_LEVELS {
            let step = (1u32 << level).min(PATCH_EDGE);

            for code in 0..16u8 {
                let sides = StitchSides::from_bits_truncate(code);
                if step == 1 && !sides.is_empty() {
                    continue;
                }

                let mut strip = Vec::new();
                PatchTessellator::new(&mut strip, window, UVec2::ZERO, step, sides).tessellate();
                let mut triangles = Vec::new();
                append_strip_triangles(&strip, &mut triangles);

                assert!(!triangles.is_empty());
                for triangle in triangles.chunks_exact(3) {
                    let [p0, p1, p2] = [0, 1, 2].map(|i| position(triangle[i]));
                    let normal = (p1 - p0).cross(p2 - p0);
                    assert!(normal.y > 0.0, "level {level} sides {sides:?} {triangle:?}");
                }
            }
        }
    }

    #[test]
    fn mesh_mirrors_cluster() {
        let size = UVec2::splat(2 * PATCH_EDGE + 1);
        let field = HeightField::from_fn(size, Vec2::ONE, 10.0, |x, y| (x * y) as u16);
        let grid = PatchGrid::new(&field, MAX_CLUSTER_VERTICES);
        let cluster = grid.cluster(0);
        let mesh = cluster_mesh(cluster);

        assert_eq!(mesh.count_vertices(), cluster.vertices().len());
        let Some(VertexAttributeValues::Float32x2(morph)) = mesh.attribute(ATTRIBUTE_MORPH) else {
            panic!("missing morph attribute");
        };
        assert_eq!(morph[0], cluster.vertices()[0].morph);
        assert_eq!(mesh.indices().map(Indices::len), Some(0));
    }
}
