//! Support maps: where an object may rest on or inside another.
//!
//! Each supporting object carries, per [`SupportPredicate`] and per
//! `(body, link)` surface, a list of height levels with a 2-D occupancy grid.
//! Grids are indexed `(row, col)` = `(y, x)` at [`CELLS_PER_METER`] cells per
//! metre, with cell `(0, 0)` at local `(-GRID_ORIGIN_OFFSET,
//! -GRID_ORIGIN_OFFSET)` in the surface link frame before scaling.
//!
//! Grids store only a window of the canonical map; cells outside the window
//! are unoccupied. Erosion treats cells beyond the map image as occupied, so
//! surfaces reaching the image edge keep their outermost cells.

use crate::condition::SupportPredicate;
use crate::types::{LinkId, ObjectId};
use indexmap::IndexMap;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Planar resolution of every height map
pub const CELLS_PER_METER: f64 = 100.0;

/// Distance from the link origin to cell `(0, 0)` along x and y
pub const GRID_ORIGIN_OFFSET: f64 = 2.0;

/// Cells per side of the canonical map, `2 × GRID_ORIGIN_OFFSET × CELLS_PER_METER`
pub const CANONICAL_CELLS: usize = 400;

/// A cell of a grid, `(row, col)`
pub type Cell = (usize, usize);

/// Binary occupancy window of a canonical height map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyGrid {
    /// Canonical row of the window's first row
    pub row_offset: usize,
    /// Canonical column of the window's first column
    pub col_offset: usize,
    /// Window height
    pub rows: usize,
    /// Window width
    pub cols: usize,
    /// Row-major cells; non-zero means the cell may support an object
    pub cells: Vec<u8>,
}

impl OccupancyGrid {
    /// All-zero window
    #[must_use]
    pub fn empty(row_offset: usize, col_offset: usize, rows: usize, cols: usize) -> Self {
        Self {
            row_offset,
            col_offset,
            rows,
            cols,
            cells: vec![0; rows * cols],
        }
    }

    /// Fully occupied window
    #[must_use]
    pub fn filled(row_offset: usize, col_offset: usize, rows: usize, cols: usize) -> Self {
        Self {
            row_offset,
            col_offset,
            rows,
            cols,
            cells: vec![1; rows * cols],
        }
    }

    /// Window covering the local rectangle `[min_x, max_x] × [min_y, max_y]`
    /// (metres, link frame, before scaling)
    #[must_use]
    pub fn covering(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        let to_cell = |v: f64| (v + GRID_ORIGIN_OFFSET) * CELLS_PER_METER;
        let col_start = to_cell(min_x).ceil().max(0.0) as usize;
        let col_end = to_cell(max_x).floor().max(0.0) as usize;
        let row_start = to_cell(min_y).ceil().max(0.0) as usize;
        let row_end = to_cell(max_y).floor().max(0.0) as usize;
        let cols = (col_end + 1).saturating_sub(col_start);
        let rows = (row_end + 1).saturating_sub(row_start);
        Self::filled(row_start, col_start, rows, cols)
    }

    /// Cell value inside the window, zero outside
    #[inline]
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> u8 {
        if row < self.rows && col < self.cols {
            self.cells[row * self.cols + col]
        } else {
            0
        }
    }

    /// Set a cell inside the window
    pub fn set(&mut self, row: usize, col: usize, value: u8) {
        if row < self.rows && col < self.cols {
            self.cells[row * self.cols + col] = value;
        }
    }

    /// Number of non-zero cells
    #[must_use]
    pub fn count_nonzero(&self) -> usize {
        self.cells.iter().filter(|&&c| c != 0).count()
    }

    /// Canonical coordinates of every non-zero cell, row-major
    #[must_use]
    pub fn nonzero_cells(&self) -> Vec<Cell> {
        let mut out = Vec::new();
        for r in 0..self.rows {
            for c in 0..self.cols {
                if self.cells[r * self.cols + c] != 0 {
                    out.push((r + self.row_offset, c + self.col_offset));
                }
            }
        }
        out
    }

    /// Morphological erosion with a `kernel_rows × kernel_cols` block of ones
    ///
    /// The anchor sits at `(kernel_rows / 2, kernel_cols / 2)`. A cell survives
    /// only if every cell under the kernel is non-zero. The image spans the
    /// canonical map, or the window if it reaches further; kernel cells beyond
    /// the image count as non-zero. Rectangular kernels are separable, so rows
    /// and columns are eroded in two passes.
    #[must_use]
    pub fn erode(&self, kernel_rows: usize, kernel_cols: usize) -> OccupancyGrid {
        let kernel_rows = kernel_rows.max(1) as isize;
        let kernel_cols = kernel_cols.max(1) as isize;
        let anchor_r = kernel_rows / 2;
        let anchor_c = kernel_cols / 2;
        let image_rows = CANONICAL_CELLS.max(self.row_offset + self.rows) as isize;
        let image_cols = CANONICAL_CELLS.max(self.col_offset + self.cols) as isize;
        let (row_offset, col_offset) = (self.row_offset as isize, self.col_offset as isize);

        let mut horizontal = vec![0u8; self.cells.len()];
        for r in 0..self.rows {
            for c in 0..self.cols {
                let start = col_offset + c as isize - anchor_c;
                let all = (start..start + kernel_cols).all(|cc| {
                    if cc < 0 || cc >= image_cols {
                        return true;
                    }
                    let local = cc - col_offset;
                    local >= 0 && self.get(r, local as usize) != 0
                });
                horizontal[r * self.cols + c] = u8::from(all);
            }
        }

        let mut out = OccupancyGrid::empty(self.row_offset, self.col_offset, self.rows, self.cols);
        for r in 0..self.rows {
            for c in 0..self.cols {
                let start = row_offset + r as isize - anchor_r;
                let all = (start..start + kernel_rows).all(|rr| {
                    if rr < 0 || rr >= image_rows {
                        return true;
                    }
                    let local = rr - row_offset;
                    local >= 0
                        && (local as usize) < self.rows
                        && horizontal[local as usize * self.cols + c] != 0
                });
                out.cells[r * self.cols + c] = u8::from(all);
            }
        }
        out
    }
}

/// Map a canonical cell to the local surface point (metres, before scaling)
#[must_use]
pub fn cell_to_local(cell: Cell, height: f64) -> Vector3<f64> {
    let (row, col) = cell;
    Vector3::new(
        col as f64 / CELLS_PER_METER - GRID_ORIGIN_OFFSET,
        row as f64 / CELLS_PER_METER - GRID_ORIGIN_OFFSET,
        height,
    )
}

/// Erosion kernel `(rows, cols)` guaranteeing clearance for an object with
/// the given native planar bounding-box size on a surface of scale `scale`
#[must_use]
pub fn clearance_kernel(object_size_x: f64, object_size_y: f64, scale: &Vector3<f64>) -> (usize, usize) {
    let half_cells = object_size_x.max(object_size_y) / 2.0 * CELLS_PER_METER;
    let rows = (half_cells / scale.y).ceil();
    let cols = (half_cells / scale.x).ceil();
    (rows.max(1.0) as usize, cols.max(1.0) as usize)
}

/// One height level of a surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportSurface {
    /// Local z of the resting plane
    pub height: f64,
    /// Where the plane can hold an object
    pub grid: OccupancyGrid,
}

/// Identifies the body and link a surface belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurfaceKey {
    /// Physics body
    pub body: ObjectId,
    /// Link on that body
    pub link: LinkId,
}

/// Per-predicate support surfaces of one object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupportMap {
    #[serde(default)]
    entries: IndexMap<SupportPredicate, Vec<(SurfaceKey, Vec<SupportSurface>)>>,
}

impl SupportMap {
    /// Empty map
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a height level to a surface
    pub fn add_surface(&mut self, predicate: SupportPredicate, key: SurfaceKey, surface: SupportSurface) {
        let surfaces = self.entries.entry(predicate).or_default();
        if let Some((_, levels)) = surfaces.iter_mut().find(|(k, _)| *k == key) {
            levels.push(surface);
        } else {
            surfaces.push((key, vec![surface]));
        }
    }

    /// Builder form of [`Self::add_surface`]
    #[must_use]
    pub fn with_surface(mut self, predicate: SupportPredicate, key: SurfaceKey, surface: SupportSurface) -> Self {
        self.add_surface(predicate, key, surface);
        self
    }

    /// Whether any surface supports `predicate`
    #[must_use]
    pub fn supports(&self, predicate: SupportPredicate) -> bool {
        self.entries
            .get(&predicate)
            .is_some_and(|s| s.iter().any(|(_, levels)| !levels.is_empty()))
    }

    /// Surfaces for `predicate`, in insertion order
    #[must_use]
    pub fn surfaces(&self, predicate: SupportPredicate) -> &[(SurfaceKey, Vec<SupportSurface>)] {
        self.entries.get(&predicate).map_or(&[], Vec::as_slice)
    }

    /// Rewrite every surface key to point at `body`
    ///
    /// Used when a synthetic object aliases another body.
    pub fn rebind(&mut self, body: ObjectId) {
        for surfaces in self.entries.values_mut() {
            for (key, _) in surfaces.iter_mut() {
                key.body = body;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_from(rows: &[&str]) -> OccupancyGrid {
        let mut g = OccupancyGrid::empty(0, 0, rows.len(), rows[0].len());
        for (r, line) in rows.iter().enumerate() {
            for (c, ch) in line.chars().enumerate() {
                g.set(r, c, u8::from(ch == '#'));
            }
        }
        g
    }

    #[test]
    fn erosion_shrinks_block() {
        let g = grid_from(&[
            ".....",
            ".###.",
            ".###.",
            ".###.",
            ".....",
        ]);
        let e = g.erode(3, 3);
        assert_eq!(e.nonzero_cells(), vec![(2, 2)]);
    }

    #[test]
    fn erosion_with_unit_kernel_is_identity() {
        let g = grid_from(&["#.#", "##."]);
        assert_eq!(g.erode(1, 1), g);
    }

    #[test]
    fn even_kernel_anchor_is_offset() {
        let mut g = grid_from(&["####"]);
        g.row_offset = 5;
        g.col_offset = 5;
        // Kernel of width 2 anchored at column 1 looks at (c-1, c).
        let e = g.erode(1, 2);
        assert_eq!(e.nonzero_cells(), vec![(5, 6), (5, 7), (5, 8)]);
    }

    #[test]
    fn image_edge_does_not_erode() {
        let near = OccupancyGrid::filled(0, 0, 5, 5).erode(3, 3);
        let expected: Vec<Cell> = (0..4).flat_map(|r| (0..4).map(move |c| (r, c))).collect();
        assert_eq!(near.nonzero_cells(), expected);

        let far = OccupancyGrid::filled(395, 395, 5, 5).erode(3, 3);
        let expected: Vec<Cell> = (396..400).flat_map(|r| (396..400).map(move |c| (r, c))).collect();
        assert_eq!(far.nonzero_cells(), expected);
    }

    #[test]
    fn window_beyond_canonical_map_widens_image() {
        // a 6 m floor window runs past the canonical map on the high side
        let g = OccupancyGrid::covering(-3.0, 3.0, -0.5, 0.5);
        assert_eq!(g.col_offset + g.cols, 501);
        let e = g.erode(1, 3);
        assert_ne!(e.get(0, 0), 0);
        assert_ne!(e.get(0, g.cols - 1), 0);
        assert_eq!(e.get(0, 399), e.get(0, 400));
    }

    #[test]
    fn oversized_kernel_empties_grid() {
        let g = OccupancyGrid::filled(0, 0, 4, 4);
        assert_eq!(g.erode(9, 9).count_nonzero(), 0);
    }

    #[test]
    fn covering_window_maps_back_inside_rectangle() {
        let g = OccupancyGrid::covering(-0.1, 0.1, -0.05, 0.05);
        assert_eq!(g.cols, 21);
        assert_eq!(g.rows, 11);
        for cell in g.nonzero_cells() {
            let p = cell_to_local(cell, 0.0);
            assert!(p.x >= -0.1 - 1e-9 && p.x <= 0.1 + 1e-9);
            assert!(p.y >= -0.05 - 1e-9 && p.y <= 0.05 + 1e-9);
        }
    }

    #[test]
    fn clearance_kernel_scales_with_surface() {
        let k = clearance_kernel(0.1, 0.06, &Vector3::new(1.0, 2.0, 1.0));
        assert_eq!(k, (3, 5));
    }

    #[test]
    fn support_map_groups_levels_by_surface() {
        let key = SurfaceKey { body: ObjectId(3), link: LinkId::BASE };
        let surface = SupportSurface { height: 0.5, grid: OccupancyGrid::filled(0, 0, 1, 1) };
        let map = SupportMap::new()
            .with_surface(SupportPredicate::OnTop, key, surface.clone())
            .with_surface(SupportPredicate::OnTop, key, surface);
        assert!(map.supports(SupportPredicate::OnTop));
        assert!(!map.supports(SupportPredicate::Inside));
        assert_eq!(map.surfaces(SupportPredicate::OnTop)[0].1.len(), 2);
    }
}
