//! The height samples of a terrain and their mapping into terrain local space.

use crate::terrain_data::{cluster::TerrainVertex, LOD_LEVELS, PATCH_EDGE};
use bevy::math::{UVec2, Vec2, Vec3};
use ndarray::Array2;

/// A regular grid of 16 bit height samples.
///
/// Grid x maps to local X, grid y maps to local Z and the height to local Y.
/// The terrain is centered around the local origin.
#[derive(Clone, Debug)]
pub struct HeightField {
    /// The raw samples indexed by `[[y, x]]`.
    samples: Array2<u16>,
    /// The number of usable vertices, rounded down to a whole number of patches.
    size: UVec2,
    /// The distance between two adjacent samples.
    mesh_step: Vec2,
    /// The height of the largest sample value.
    height_scale: f32,
    center: Vec2,
}

impl HeightField {
    pub fn new(samples: Array2<u16>, mesh_step: Vec2, height_scale: f32) -> Self {
        let (rows, columns) = samples.dim();
        let round = |count: usize| {
            let count = count as u32;
            if count == 0 {
                0
            } else {
                (count - 1) / PATCH_EDGE * PATCH_EDGE + 1
            }
        };
        let size = UVec2::new(round(columns), round(rows));
        let center = (size.saturating_sub(UVec2::ONE)).as_vec2() * mesh_step / 2.0;

        Self {
            samples,
            size,
            mesh_step,
            height_scale,
            center,
        }
    }

    /// Samples the function `height(x, y)` at each grid position.
    pub fn from_fn(
        size: UVec2,
        mesh_step: Vec2,
        height_scale: f32,
        height: impl Fn(u32, u32) -> u16,
    ) -> Self {
        let samples = Array2::from_shape_fn((size.y as usize, size.x as usize), |(y, x)| {
            height(x as u32, y as u32)
        });

        Self::new(samples, mesh_step, height_scale)
    }

    #[inline]
    pub fn size(&self) -> UVec2 {
        self.size
    }

    /// The number of whole patches along each axis.
    pub fn patch_count(&self) -> UVec2 {
        self.size.saturating_sub(UVec2::ONE) / PATCH_EDGE
    }

    #[inline]
    pub fn mesh_step(&self) -> Vec2 {
        self.mesh_step
    }

    #[inline]
    pub fn height(&self, x: u32, y: u32) -> f32 {
        self.samples[[y as usize, x as usize]] as f32 * self.height_scale / u16::MAX as f32
    }

    /// The height at a grid position clamped to the usable grid.
    fn clamped_height(&self, x: i64, y: i64) -> f32 {
        let max = self.size.saturating_sub(UVec2::ONE);
        self.height(
            x.clamp(0, max.x as i64) as u32,
            y.clamp(0, max.y as i64) as u32,
        )
    }

    #[inline]
    pub fn vertex_x(&self, x: u32) -> f32 {
        x as f32 * self.mesh_step.x - self.center.x
    }

    #[inline]
    pub fn vertex_z(&self, y: u32) -> f32 {
        y as f32 * self.mesh_step.y - self.center.y
    }

    pub fn vertex_position(&self, x: u32, y: u32) -> Vec3 {
        Vec3::new(self.vertex_x(x), self.height(x, y), self.vertex_z(y))
    }

    /// The grid cell containing the local position (may lie outside of the grid).
    pub fn grid_position(&self, local: Vec2) -> (i64, i64) {
        let grid = (local + self.center) / self.mesh_step;
        (grid.x.floor() as i64, grid.y.floor() as i64)
    }

    /// Bilinearly interpolates the height below the local `xz` position.
    ///
    /// Returns `None` outside of the terrain.
    pub fn sample_height(&self, local: Vec2) -> Option<f32> {
        if self.size.x < 2 || self.size.y < 2 {
            return None;
        }

        let grid = (local + self.center) / self.mesh_step;
        let max = (self.size - UVec2::ONE).as_vec2();
        if grid.x < 0.0 || grid.y < 0.0 || grid.x > max.x || grid.y > max.y {
            return None;
        }

        let cell = grid.floor().min(max - Vec2::ONE);
        let t = grid - cell;
        let (x, y) = (cell.x as u32, cell.y as u32);

        let top = self.height(x, y) * (1.0 - t.x) + self.height(x + 1, y) * t.x;
        let bottom = self.height(x, y + 1) * (1.0 - t.x) + self.height(x + 1, y + 1) * t.x;

        Some(top * (1.0 - t.y) + bottom * t.y)
    }

    fn normal(&self, x: u32, y: u32) -> Vec3 {
        let (x, y) = (x as i64, y as i64);
        let dx = (self.clamped_height(x + 1, y) - self.clamped_height(x - 1, y))
            / (2.0 * self.mesh_step.x);
        let dz = (self.clamped_height(x, y + 1) - self.clamped_height(x, y - 1))
            / (2.0 * self.mesh_step.y);

        Vec3::new(-dx, 1.0, -dz).normalize()
    }

    /// The coarsest level the vertex is part of and the height it takes one level above,
    /// interpolated from the two coarser vertices it splits.
    fn morph(&self, x: u32, y: u32) -> (f32, u8) {
        let mut step = PATCH_EDGE / 2;
        let mut level = LOD_LEVELS - 1;

        loop {
            if x % step == 0 && y % step == 0 {
                let even_x = x % (2 * step) == 0;
                let even_y = y % (2 * step) == 0;

                let height = match (even_x, even_y) {
                    (true, true) => None,
                    (false, false) => Some(
                        self.height(x + step, y - step) + self.height(x - step, y + step),
                    ),
                    (true, false) => Some(self.height(x, y - step) + self.height(x, y + step)),
                    (false, true) => Some(self.height(x - step, y) + self.height(x + step, y)),
                };

                if let Some(height) = height {
                    return (height / 2.0, level);
                }
            }

            if step == 1 {
                return (self.height(x, y), LOD_LEVELS);
            }

            step /= 2;
            level -= 1;
        }
    }

    /// Builds the vertex at the grid position.
    /// The texture coordinates span the whole height field.
    pub(crate) fn terrain_vertex(&self, x: u32, y: u32) -> TerrainVertex {
        let extent = self.size.saturating_sub(UVec2::ONE).max(UVec2::ONE).as_vec2();
        let (morph_height, morph_level) = self.morph(x, y);

        TerrainVertex {
            position: self.vertex_position(x, y).to_array(),
            normal: self.normal(x, y).to_array(),
            uv: [x as f32 / extent.x, 1.0 - y as f32 / extent.y],
            morph: [morph_height, morph_level as f32],
        }
    }
}
