use crate::{
    height_field::HeightField,
    terrain_data::{IndexType, MAX_INDEX_COUNT},
};
use bevy::math::UVec2;
use itertools::iproduct;

/// A vertex of the cluster vertex buffers, split into mesh attributes when rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TerrainVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    /// The height one level above the coarsest level containing the vertex and that level.
    pub morph: [f32; 2],
}

/// The rectangle of grid vertices covered by a cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClusterWindow {
    /// The grid position of the first vertex.
    pub origin: UVec2,
    /// The number of vertices along each axis.
    pub size: UVec2,
}

impl ClusterWindow {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.size.x as usize * self.size.y as usize
    }

    /// Converts a grid position into an index of the cluster vertex buffer.
    ///
    /// # Panics
    /// If the position lies outside of the window.
    #[inline]
    pub fn vertex_index(&self, x: u32, y: u32) -> IndexType {
        assert!(
            x >= self.origin.x
                && y >= self.origin.y
                && x < self.origin.x + self.size.x
                && y < self.origin.y + self.size.y,
            "vertex ({x}, {y}) lies outside of the cluster window {self:?}"
        );

        ((y - self.origin.y) * self.size.x + (x - self.origin.x)) as IndexType
    }
}

/// A group of neighbouring patches sharing one vertex and one index buffer.
#[derive(Clone, Debug)]
pub struct Cluster {
    window: ClusterWindow,
    vertices: Vec<TerrainVertex>,
    indices: Vec<IndexType>,
    /// The number of indices reserved by the member patches.
    reserved: usize,
    dirty: bool,
}

impl Cluster {
    pub(crate) fn new(window: ClusterWindow) -> Self {
        Self {
            window,
            vertices: Vec::new(),
            indices: Vec::new(),
            reserved: 0,
            dirty: false,
        }
    }

    /// Reserves the worst case number of indices for a new member patch and returns the
    /// offset of its range.
    pub(crate) fn reserve_patch(&mut self) -> u32 {
        let offset = self.reserved;
        self.reserved += MAX_INDEX_COUNT;
        offset as u32
    }

    /// Creates the vertex buffer from the height field and the zeroed index buffer.
    pub(crate) fn allocate(&mut self, height_field: &HeightField) {
        let ClusterWindow { origin, size } = self.window;

        self.vertices = iproduct!(0..size.y, 0..size.x)
            .map(|(y, x)| height_field.terrain_vertex(origin.x + x, origin.y + y))
            .collect();
        self.indices = vec![0; self.reserved];
        self.dirty = true;
    }

    /// Overwrites a sub range of the index buffer.
    ///
    /// # Panics
    /// If the range exceeds the index buffer.
    pub fn write_indices(&mut self, offset: usize, indices: &[IndexType]) {
        self.indices[offset..offset + indices.len()].copy_from_slice(indices);
        self.dirty = true;
    }

    #[inline]
    pub fn window(&self) -> ClusterWindow {
        self.window
    }

    #[inline]
    pub fn vertices(&self) -> &[TerrainVertex] {
        &self.vertices
    }

    #[inline]
    pub fn indices(&self) -> &[IndexType] {
        &self.indices
    }

    /// Whether indices were written since the last call to [`Self::take_dirty`].
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// The memory used by the vertex and the index buffer in bytes.
    pub fn memory_size(&self) -> usize {
        std::mem::size_of_val(self.vertices.as_slice())
            + std::mem::size_of_val(self.indices.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::math::Vec2;

    fn window() -> ClusterWindow {
        ClusterWindow {
            origin: UVec2::new(32, 64),
            size: UVec2::new(65, 33),
        }
    }

    #[test]
    fn vertex_index_is_row_major() {
        let window = window();
        assert_eq!(window.vertex_index(32, 64), 0);
        assert_eq!(window.vertex_index(96, 64), 64);
        assert_eq!(window.vertex_index(33, 65), 66);
        assert_eq!(window.vertex_count(), 65 * 33);
    }

    #[test]
    #[should_panic]
    fn vertex_outside_window() {
        window().vertex_index(97, 64);
    }

    #[test]
    fn allocate_and_write() {
        let field = HeightField::from_fn(UVec2::new(129, 129), Vec2::ONE, 1.0, |_, _| 0);
        let mut cluster = Cluster::new(window());
        assert_eq!(cluster.reserve_patch(), 0);
        assert_eq!(cluster.reserve_patch(), MAX_INDEX_COUNT as u32);

        cluster.allocate(&field);
        assert_eq!(cluster.vertices().len(), 65 * 33);
        assert_eq!(cluster.indices().len(), 2 * MAX_INDEX_COUNT);
        assert_eq!(
            cluster.vertices()[66].position,
            field.vertex_position(33, 65).to_array()
        );

        assert_eq!(cluster.memory_size(), 65 * 33 * 40 + 2 * MAX_INDEX_COUNT * 2);
        assert!(cluster.take_dirty());
        cluster.write_indices(MAX_INDEX_COUNT, &[1, 2, 3]);
        assert!(cluster.is_dirty());
        assert_eq!(&cluster.indices()[MAX_INDEX_COUNT..MAX_INDEX_COUNT + 4], &[1, 2, 3, 0]);
    }
}
