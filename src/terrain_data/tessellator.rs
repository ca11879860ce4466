//! Tessellation of a single patch into one triangle strip.
//!
//! Rows of the strip are joined by repeating vertices, which produces degenerate triangles.
//! Sides facing a finer neighbour are stitched: the vertices along such an edge are placed
//! half a step apart, matching the vertices of the neighbour, so no cracks appear.

use crate::terrain_data::{
    cluster::ClusterWindow, IndexType, StitchSides, MAX_INDEX_COUNT, PATCH_EDGE, PATCH_SIZE,
};
use bevy::math::UVec2;

/// One element of a fixed strip of the coarsest tessellation.
#[derive(Clone, Copy)]
enum Stroke {
    /// A vertex given in multiples of half the patch edge.
    At(u32, u32),
    /// Repeats the previous vertex.
    Again,
}

use Stroke::{Again, At};

/// The strips of the coarsest tessellation, indexed by the bits of [`StitchSides`].
const COARSEST_STRIPS: [&[Stroke]; 16] = [
    &[At(0, 0), Again, At(0, 2), At(2, 0), At(2, 2)],
    &[At(0, 0), Again, At(0, 1), At(2, 0), At(0, 2), At(2, 2), Again],
    &[At(2, 2), Again, At(2, 1), At(0, 2), At(2, 0), At(0, 0), Again],
    &[At(0, 0), Again, At(0, 1), At(2, 0), At(0, 2), At(2, 1), At(2, 2)],
    &[At(0, 0), At(1, 0), At(0, 2), At(2, 0), At(2, 2)],
    &[At(0, 0), Again, At(0, 1), At(1, 0), At(0, 2), At(2, 0), At(2, 2)],
    &[At(0, 0), Again, At(0, 2), At(1, 0), At(2, 0), Again, At(0, 2), At(2, 1), At(2, 2)],
    &[At(2, 2), Again, At(2, 1), At(0, 2), At(2, 0), At(0, 1), At(1, 0), At(0, 0), Again],
    &[At(2, 2), At(1, 2), At(2, 0), At(0, 2), At(0, 0)],
    &[At(2, 2), Again, At(2, 0), At(1, 2), At(0, 2), Again, At(2, 0), At(0, 1), At(0, 0)],
    &[At(2, 2), Again, At(2, 1), At(1, 2), At(2, 0), At(0, 2), At(0, 0)],
    &[At(0, 0), Again, At(0, 1), At(2, 0), At(0, 2), At(2, 1), At(1, 2), At(2, 2), Again],
    &[At(0, 0), At(1, 0), At(0, 2), At(2, 0), At(1, 2), At(2, 2), Again],
    &[At(0, 0), Again, At(0, 1), At(1, 0), At(0, 2), At(2, 0), At(1, 2), At(2, 2), Again],
    &[At(2, 2), Again, At(2, 1), At(1, 2), At(2, 0), At(0, 2), At(1, 0), At(0, 0), Again],
    &[At(0, 0), Again, At(0, 1), At(1, 0), At(0, 2), At(2, 0), At(1, 2), At(2, 1), At(2, 2)],
];

/// Writes the triangle strip of a patch into a caller owned scratch buffer.
pub struct PatchTessellator<'a> {
    indices: &'a mut Vec<IndexType>,
    window: ClusterWindow,
    origin: UVec2,
    step: u32,
    sides: StitchSides,
    last: Option<IndexType>,
}

impl<'a> PatchTessellator<'a> {
    /// Prepares the tessellation of the patch at the grid `origin` with the vertex distance
    /// `step`, stitching the `sides` towards finer neighbours. Clears the scratch buffer.
    ///
    /// # Panics
    /// If stitching is requested for the full resolution, which has no finer neighbour.
    pub fn new(
        indices: &'a mut Vec<IndexType>,
        window: ClusterWindow,
        origin: UVec2,
        step: u32,
        sides: StitchSides,
    ) -> Self {
        debug_assert!(step.is_power_of_two() && step <= PATCH_EDGE);
        assert!(
            step > 1 || sides.is_empty(),
            "the full resolution can not be stitched towards a finer level"
        );

        indices.clear();

        Self {
            indices,
            window,
            origin,
            step,
            sides,
            last: None,
        }
    }

    /// Emits the strip and returns the number of indices written.
    pub fn tessellate(mut self) -> usize {
        if self.step == PATCH_EDGE {
            self.coarsest();
        } else {
            self.strips();
        }

        self.indices.len()
    }

    fn push(&mut self, index: IndexType) {
        assert!(
            self.indices.len() < MAX_INDEX_COUNT,
            "patch tessellation exceeds {MAX_INDEX_COUNT} indices"
        );
        self.indices.push(index);
    }

    fn vertex(&mut self, x: u32, y: u32) {
        let index = self
            .window
            .vertex_index(self.origin.x + x, self.origin.y + y);
        self.push(index);
        self.last = Some(index);
    }

    fn again(&mut self) {
        if let Some(index) = self.last {
            self.push(index);
        }
    }

    #[inline]
    fn stitched(&self, side: StitchSides) -> bool {
        self.sides.contains(side)
    }

    fn coarsest(&mut self) {
        let half = self.step / 2;

        for &stroke in COARSEST_STRIPS[self.sides.bits() as usize] {
            match stroke {
                At(x, y) => self.vertex(x * half, y * half),
                Again => self.again(),
            }
        }
    }

    /// One past the last coordinate a row or column of the strip may start at.
    #[inline]
    fn max_count(&self) -> u32 {
        PATCH_SIZE - self.step
    }

    fn strips(&mut self) {
        let step = self.step;
        let max_count = self.max_count();
        let count = if self.stitched(StitchSides::BOTTOM) {
            max_count - step
        } else {
            max_count
        };
        let mut y = 0;

        if self.stitched(StitchSides::TOP) {
            self.top_row();
            if y + step != max_count {
                self.again();
            }
            y += step;
        }

        while y < count {
            self.row(y);
            if y + step != max_count {
                self.again();
            }
            y += step;
        }

        if self.stitched(StitchSides::BOTTOM) {
            self.bottom_row();
        }
    }

    /// A row between `y` and `y + step`, stitched only on the left and right.
    fn row(&mut self, y: u32) {
        let step = self.step;
        let half = step / 2;
        let mut x = 0;
        let count = if self.stitched(StitchSides::RIGHT) {
            self.max_count() - step
        } else {
            self.max_count() + step
        };

        self.vertex(0, y);

        if self.stitched(StitchSides::LEFT) {
            self.again();
            self.again();
            self.vertex(x + step, y);
            self.vertex(x, y + half);
            self.vertex(x + step, y + step);
            self.vertex(x, y + step);
            self.vertex(x + step, y + step);
            self.again();
            x += step;
        }

        while x < count {
            self.vertex(x, y);
            self.vertex(x, y + step);
            x += step;
        }

        if self.stitched(StitchSides::RIGHT) {
            self.vertex(x, y);
            self.vertex(x, y + step);
            self.vertex(x, y);
            self.vertex(x + step, y + half);
            self.vertex(x + step, y);
            self.vertex(x + step, y + half);
            self.again();
            self.vertex(x, y + step);
            self.vertex(x + step, y + step);
            self.again();
        }
    }

    /// The first row, with half steps along the top edge.
    fn top_row(&mut self) {
        let step = self.step;
        let half = step / 2;
        let mut x = 0;
        let count = if self.stitched(StitchSides::RIGHT) {
            self.max_count() - step
        } else {
            self.max_count()
        };

        self.vertex(0, 0);

        if self.stitched(StitchSides::LEFT) {
            self.vertex(x, 0);
            self.vertex(x, half);
            self.vertex(x + half, 0);
            self.vertex(x, step);
            self.vertex(x + half, 0);
            self.vertex(x + step, step);
            x += step;
        }

        while x < count {
            self.vertex(x, 0);
            self.vertex(x, step);
            self.vertex(x + half, 0);
            self.vertex(x + step, step);
            x += step;
        }

        if self.stitched(StitchSides::RIGHT) {
            self.vertex(x, 0);
            self.vertex(x, step);
            self.vertex(x + half, 0);
            self.vertex(x + step, step);
            self.vertex(x + half, 0);
            self.vertex(x + step, half);
            self.vertex(x + step, 0);
            self.again();
        } else {
            self.vertex(x, 0);
            self.vertex(x, step);
        }
    }

    /// The last row, with half steps along the bottom edge.
    fn bottom_row(&mut self) {
        let step = self.step;
        let half = step / 2;
        let y = PATCH_EDGE - step;
        let mut x = 0;
        let count = if self.stitched(StitchSides::RIGHT) {
            self.max_count() - step
        } else {
            self.max_count()
        };

        self.vertex(0, y);

        if self.stitched(StitchSides::LEFT) {
            self.again();
            self.vertex(x, y + half);
            self.vertex(x + step, y);
            self.vertex(x, y + step);
            self.vertex(x + half, y + step);
            self.again();
            x += step;
        }

        while x < count {
            self.vertex(x, y);
            self.vertex(x, y + step);
            self.vertex(x, y);
            self.vertex(x + half, y + step);
            x += step;
        }

        if self.stitched(StitchSides::RIGHT) {
            self.vertex(x, y);
            self.vertex(x, y + step);
            self.vertex(x, y);
            self.vertex(x + half, y + step);
            self.vertex(x + step, y);
            self.vertex(x + step, y + half);
            self.again();
            self.vertex(x + half, y + step);
            self.vertex(x + step, y + step);
        } else {
            self.vertex(x, y);
            self.vertex(x, y + step);
        }
    }
}
