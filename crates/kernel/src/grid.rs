//! Uniform-grid spatial hash for neighbor search.
//!
//! Cells are keyed by their integer coordinate `floor(p / cell_size)` in a
//! `HashMap`, so the grid is unbounded and any cell lookup that misses simply
//! contributes nothing. The grid is rebuilt from scratch every step.

use std::collections::HashMap;

/// Integer coordinate of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    /// Cell index along x.
    pub x: i32,
    /// Cell index along y.
    pub y: i32,
    /// Cell index along z.
    pub z: i32,
}

impl CellCoord {
    /// Construct from components.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Cell containing `position` for the given cell size.
    #[inline]
    pub fn from_position(position: [f32; 3], cell_size: f32) -> Self {
        Self {
            x: (position[0] / cell_size).floor() as i32,
            y: (position[1] / cell_size).floor() as i32,
            z: (position[2] / cell_size).floor() as i32,
        }
    }

    /// This cell shifted by `(dx, dy, dz)` cells, saturating at the edge of
    /// the `i32` range.
    #[inline]
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
            z: self.z.saturating_add(dz),
        }
    }

    /// World position of the cell's minimum corner.
    #[inline]
    pub fn origin(self, cell_size: f32) -> [f32; 3] {
        [
            self.x as f32 * cell_size,
            self.y as f32 * cell_size,
            self.z as f32 * cell_size,
        ]
    }

    /// This cell shifted by `(dx, dy, dz)`, or `None` past the `i32` range.
    #[inline]
    pub fn checked_offset(self, dx: i32, dy: i32, dz: i32) -> Option<Self> {
        Some(Self {
            x: self.x.checked_add(dx)?,
            y: self.y.checked_add(dy)?,
            z: self.z.checked_add(dz)?,
        })
    }

    /// The cells of the 3x3x3 block centered on this cell; 27 except at the
    /// edge of the `i32` range, where cells past the edge are left out.
    pub fn block_3x3x3(self) -> impl Iterator<Item = CellCoord> {
        (-1i32..=1).flat_map(move |dz| {
            (-1i32..=1).flat_map(move |dy| {
                (-1i32..=1).filter_map(move |dx| self.checked_offset(dx, dy, dz))
            })
        })
    }
}

/// Cell-bucketed particle index shared by both backends.
///
/// Implementors answer exact per-cell lookups; neighbor enumeration over the
/// 27 surrounding cells is derived from that. Distance filtering is left to
/// the caller.
pub trait NeighborSearch: Sync {
    /// Cell size the index was built with.
    fn cell_size(&self) -> f32;

    /// Call `f` with every particle index stored in exactly `cell`.
    fn for_each_in_cell<F: FnMut(usize)>(&self, cell: CellCoord, f: F);

    /// Every occupied cell, ascending.
    fn occupied_cells(&self) -> Vec<CellCoord>;

    /// Call `f` with every particle index in the 3x3x3 block of cells around
    /// the cell containing `position`, including the particle itself if it is
    /// stored there.
    fn for_each_candidate<F: FnMut(usize)>(&self, position: [f32; 3], mut f: F) {
        let center = CellCoord::from_position(position, self.cell_size());
        for cell in center.block_3x3x3() {
            self.for_each_in_cell(cell, &mut f);
        }
    }
}

/// Sparse cell -> particle-index map, rebuilt every step.
#[derive(Debug, Clone)]
pub struct SpatialHashGrid {
    cell_size: f32,
    cells: HashMap<CellCoord, Vec<usize>>,
}

impl SpatialHashGrid {
    /// Create an empty grid with the given cell size.
    pub fn new(cell_size: f32) -> Self {
        assert!(cell_size > 0.0, "cell_size must be positive");
        Self {
            cell_size,
            cells: HashMap::new(),
        }
    }

    /// Cell size used by the last rebuild.
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Cell containing `position`.
    #[inline]
    pub fn cell_of(&self, position: [f32; 3]) -> CellCoord {
        CellCoord::from_position(position, self.cell_size)
    }

    /// Clear the grid and insert every particle into the cell containing it.
    ///
    /// The three slices must all have the same length (one entry per particle).
    pub fn rebuild(&mut self, x: &[f32], y: &[f32], z: &[f32], cell_size: f32) {
        let n = x.len();
        assert_eq!(n, y.len(), "y length mismatch");
        assert_eq!(n, z.len(), "z length mismatch");
        assert!(cell_size > 0.0, "cell_size must be positive");

        self.cell_size = cell_size;
        self.cells.clear();
        for i in 0..n {
            let cell = self.cell_of([x[i], y[i], z[i]]);
            self.cells.entry(cell).or_default().push(i);
        }
    }

    /// Union of the indices in the 27 cells around `cell_of(position)`.
    pub fn neighbors(&self, position: [f32; 3]) -> Vec<usize> {
        let mut out = Vec::new();
        self.for_each_candidate(position, |j| out.push(j));
        out
    }

    /// Indices stored in `cell`, if it is occupied.
    pub fn cell(&self, cell: CellCoord) -> Option<&[usize]> {
        self.cells.get(&cell).map(Vec::as_slice)
    }

    /// Iterate over occupied cells and their indices, in arbitrary order.
    pub fn cells(&self) -> impl Iterator<Item = (CellCoord, &[usize])> {
        self.cells.iter().map(|(c, v)| (*c, v.as_slice()))
    }

    /// Number of occupied cells.
    pub fn occupied_cell_count(&self) -> usize {
        self.cells.len()
    }
}

impl NeighborSearch for SpatialHashGrid {
    fn cell_size(&self) -> f32 {
        self.cell_size
    }

    fn for_each_in_cell<F: FnMut(usize)>(&self, cell: CellCoord, mut f: F) {
        if let Some(indices) = self.cells.get(&cell) {
            for &j in indices {
                f(j);
            }
        }
    }

    fn occupied_cells(&self) -> Vec<CellCoord> {
        let mut cells: Vec<CellCoord> = self.cells.keys().copied().collect();
        cells.sort_unstable();
        cells
    }
}
