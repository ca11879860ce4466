//! This crate renders large height field terrains with a level of detail scheme built
//! from fixed size patches.
//!
//! # Background
//! The height field is divided into square patches of 33x33 vertices.
//! Each patch is tessellated at one of six levels, where every level doubles the distance
//! between the vertices of the level below.
//!
//! ## Which patches have to be rendered?
//! The patches are the leaves of a quadtree, whose nodes store the bounds of their subtree.
//! The quadtree is traversed against the view frustum each frame, testing each node only
//! against the frustum planes its parent was not fully inside of.
//! See the [`terrain_data`] module for more information.
//!
//! ## How detailed should each patch be?
//! The level of a patch is selected by its distance to the viewer.
//! Afterwards the levels of neighbouring patches are relaxed to differ by at most one,
//! so that the coarser patch of each pair can stitch its edge towards the finer one
//! without leaving cracks.
//!
//! ## How is the geometry stored?
//! Neighbouring patches are grouped into clusters that share one vertex buffer, which keeps
//! every index within 16 bits. Each patch owns a private range of its cluster's index buffer
//! and only rewrites it, when its level or the levels of its neighbours change.
//! The clusters are rendered as regular bevy meshes, see the [`render`] module.

pub mod config;
pub mod debug;
pub mod height_field;
pub mod math;
pub mod plugin;
pub mod render;
pub mod spawn;
pub mod terrain;
pub mod terrain_data;
pub mod terrain_view;

pub mod prelude {
    #[doc(hidden)]
    pub use crate::{
        config::TerrainConfig,
        debug::{camera::DebugCamera, DebugTerrain, TerrainDebugPlugin},
        height_field::HeightField,
        plugin::{TerrainPlugin, TerrainSystems},
        render::TerrainCluster,
        spawn::{PendingTerrain, SpawnTerrainCommandsExt},
        terrain::{FrameStats, Terrain},
        terrain_data::lod::LodPolicy,
        terrain_view::{TerrainView, TerrainViewer},
    };
}
