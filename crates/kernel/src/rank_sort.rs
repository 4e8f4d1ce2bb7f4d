//! Sort-based neighbor table for the data-parallel path.
//!
//! Each particle gets a key derived from a lossy hash of its cell coordinate.
//! `(key, particle)` entries are ordered with a bitonic sorting network, whose
//! steps are independent per lane, and an offset table records where each
//! key's run starts. Because distinct cells can share a key, every entry
//! carries its true cell coordinate and lookups confirm it before yielding.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::exec::LaneExecutor;
use crate::grid::{CellCoord, NeighborSearch};

/// Offset-table value for a key with no entries.
pub const EMPTY_OFFSET: u32 = u32::MAX;

const HASH_K1: u32 = 15_823;
const HASH_K2: u32 = 9_737_333;
const HASH_K3: u32 = 440_817_757;

/// One sortable record: table key, particle index and the cell it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpatialEntry {
    /// `cell_hash(cell) % table_size`.
    pub key: u32,
    /// Particle index.
    pub index: u32,
    /// Exact cell, used to reject key collisions.
    pub cell: CellCoord,
}

impl SpatialEntry {
    #[inline]
    fn order(&self) -> (u32, u32) {
        (self.key, self.index)
    }
}

/// Lossy scalar hash of a cell coordinate (wrapping arithmetic).
#[inline]
pub fn cell_hash(cell: CellCoord) -> u32 {
    (cell.x as u32)
        .wrapping_mul(HASH_K1)
        .wrapping_add((cell.y as u32).wrapping_mul(HASH_K2))
        .wrapping_add((cell.z as u32).wrapping_mul(HASH_K3))
}

/// Reduce a hash into `[0, table_size)`.
#[inline]
pub fn key_from_hash(hash: u32, table_size: u32) -> u32 {
    hash % table_size
}

/// Number of network stages for `n` entries: `ceil(log2(n))`.
pub fn bitonic_stage_count(n: usize) -> u32 {
    if n <= 1 {
        0
    } else {
        n.next_power_of_two().trailing_zeros()
    }
}

/// The element position `k` is compared against in one network step, and
/// whether `k` is the left (smaller) side of that pair.
#[inline]
pub fn bitonic_partner(k: usize, group_width: usize, step_index: u32) -> (usize, bool) {
    let block = 2 * group_width;
    let pos = k % block;
    if step_index == 0 {
        let base = k - pos;
        (base + block - 1 - pos, pos < group_width)
    } else if pos < group_width {
        (k + group_width, true)
    } else {
        (k - group_width, false)
    }
}

/// Sort `entries` by `(key, index)` with a bitonic network.
///
/// Every step is one pass over the entries in which each lane reads the
/// previous buffer and writes its own slot of the next, so lanes never
/// race. Inputs need not be a power of two in length.
pub fn bitonic_sort<E: LaneExecutor>(exec: &E, entries: &mut Vec<SpatialEntry>) {
    let n = entries.len();
    let stages = bitonic_stage_count(n);

    for stage in 0..stages {
        for step in 0..=stage {
            let group_width = 1usize << (stage - step);
            let src: &[SpatialEntry] = entries;
            let next = exec.map_lanes(n, |k| {
                let (partner, is_left) = bitonic_partner(k, group_width, step);
                if partner >= n {
                    return src[k];
                }
                let (a, b) = (src[k], src[partner]);
                let (lo, hi) = if a.order() <= b.order() { (a, b) } else { (b, a) };
                if is_left {
                    lo
                } else {
                    hi
                }
            });
            *entries = next;
        }
    }
}

/// Build the key -> first-position table for sorted `entries`.
///
/// One lane per entry writes its own position wherever its key differs from
/// its predecessor's; each key starts exactly once, so writes never collide.
pub fn compute_offsets<E: LaneExecutor>(
    exec: &E,
    entries: &[SpatialEntry],
    table_size: usize,
) -> Vec<u32> {
    let offsets: Vec<AtomicU32> = (0..table_size)
        .map(|_| AtomicU32::new(EMPTY_OFFSET))
        .collect();

    exec.for_each_lane(entries.len(), |i| {
        let key = entries[i].key;
        if i == 0 || entries[i - 1].key != key {
            offsets[key as usize].store(i as u32, Ordering::Relaxed);
        }
    });

    offsets.into_iter().map(AtomicU32::into_inner).collect()
}

/// Sorted entries plus offset table, queried like a spatial hash grid.
#[derive(Debug, Clone)]
pub struct ParallelRankSorter {
    cell_size: f32,
    table_size: u32,
    entries: Vec<SpatialEntry>,
    offsets: Vec<u32>,
}

impl ParallelRankSorter {
    /// Create an empty table with the given cell size.
    pub fn new(cell_size: f32) -> Self {
        assert!(cell_size > 0.0, "cell_size must be positive");
        Self {
            cell_size,
            table_size: 1,
            entries: Vec::new(),
            offsets: vec![EMPTY_OFFSET],
        }
    }

    /// Hash every particle, sort, and recompute offsets.
    ///
    /// The key table has one slot per particle.
    pub fn rebuild<E: LaneExecutor>(
        &mut self,
        exec: &E,
        x: &[f32],
        y: &[f32],
        z: &[f32],
        cell_size: f32,
    ) {
        let n = x.len();
        assert_eq!(n, y.len(), "y length mismatch");
        assert_eq!(n, z.len(), "z length mismatch");
        assert!(cell_size > 0.0, "cell_size must be positive");

        self.cell_size = cell_size;
        self.table_size = n.max(1) as u32;
        let table_size = self.table_size;

        // Hash update
        self.entries = exec.map_lanes(n, |i| {
            let cell = CellCoord::from_position([x[i], y[i], z[i]], cell_size);
            SpatialEntry {
                key: key_from_hash(cell_hash(cell), table_size),
                index: i as u32,
                cell,
            }
        });

        // Sort stages
        bitonic_sort(exec, &mut self.entries);

        // Offset computation
        self.offsets = compute_offsets(exec, &self.entries, table_size as usize);
    }

    /// Table key for `cell`.
    #[inline]
    pub fn key_of(&self, cell: CellCoord) -> u32 {
        key_from_hash(cell_hash(cell), self.table_size)
    }
}

impl NeighborSearch for ParallelRankSorter {
    fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Scans the key's run of sorted entries and keeps only exact cell
    /// matches, so two cells whose hashes collide never alias.
    fn for_each_in_cell<F: FnMut(usize)>(&self, cell: CellCoord, mut f: F) {
        let key = self.key_of(cell);
        let start = self.offsets[key as usize];
        if start == EMPTY_OFFSET {
            return;
        }
        for entry in self.entries[start as usize..]
            .iter()
            .take_while(|e| e.key == key)
        {
            if entry.cell == cell {
                f(entry.index as usize);
            }
        }
    }

    fn occupied_cells(&self) -> Vec<CellCoord> {
        let mut cells: Vec<CellCoord> = self.entries.iter().map(|e| e.cell).collect();
        cells.sort_unstable();
        cells.dedup();
        cells
    }
}
