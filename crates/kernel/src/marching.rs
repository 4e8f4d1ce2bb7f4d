//! Marching cubes over a dense field or over occupied hash-grid cells.
//!
//! Vertices sit at edge midpoints; corner values only decide which edges
//! are crossed, never where along the edge the vertex lands. Output is a
//! flat triangle soup with no vertex sharing between cubes.

use crate::field::ScalarField;
use crate::grid::{CellCoord, NeighborSearch};
use crate::mesh::Mesh;
use crate::tables::{CORNER_OFFSETS, EDGE_CONNECTIONS, END, TRI_TABLE};

/// Bit `i` is set when corner `i` is strictly above `threshold`.
pub fn configuration_index(corners: &[f32; 8], threshold: f32) -> u8 {
    let mut config = 0u8;
    for (i, &value) in corners.iter().enumerate() {
        if value > threshold {
            config |= 1 << i;
        }
    }
    config
}

/// Midpoint of `edge` in cube-local units.
fn edge_midpoint(edge: usize) -> [f32; 3] {
    let [a, b] = EDGE_CONNECTIONS[edge];
    let (ca, cb) = (CORNER_OFFSETS[a], CORNER_OFFSETS[b]);
    [0, 1, 2].map(|axis| (ca[axis] + cb[axis]) as f32 * 0.5)
}

/// Stateless isosurface extractor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarchingCubesMesher {
    threshold: f32,
}

impl MarchingCubesMesher {
    /// Mesher that treats values above `threshold` as inside.
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Iso threshold.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Triangulate one cube whose minimum corner is at `origin`, appending to
    /// `mesh`. Returns the number of triangles emitted.
    pub fn march_cube(
        &self,
        origin: [f32; 3],
        cell_size: f32,
        corners: &[f32; 8],
        mesh: &mut Mesh,
    ) -> usize {
        let config = configuration_index(corners, self.threshold);
        if config == 0 || config == 255 {
            return 0;
        }

        let to_world = |edge: i8| {
            let m = edge_midpoint(edge as usize);
            [0, 1, 2].map(|axis| origin[axis] + m[axis] * cell_size)
        };

        let mut emitted = 0;
        for tri in TRI_TABLE[config as usize].chunks_exact(3) {
            if tri[0] == END {
                break;
            }
            mesh.push_triangle(to_world(tri[0]), to_world(tri[1]), to_world(tri[2]));
            emitted += 1;
        }
        emitted
    }

    /// Scan every cube of a dense field.
    pub fn mesh_field(&self, field: &ScalarField) -> Mesh {
        let mut mesh = Mesh::new();
        let [nx, ny, nz] = field.dims();
        if nx < 2 || ny < 2 || nz < 2 {
            return mesh;
        }
        let cell_size = field.cell_size();

        for z in 0..nz - 1 {
            for y in 0..ny - 1 {
                for x in 0..nx - 1 {
                    let corners = CORNER_OFFSETS.map(|[dx, dy, dz]| {
                        field.get(x + dx as usize, y + dy as usize, z + dz as usize)
                    });
                    let origin = field.node_position(x, y, z);
                    self.march_cube(origin, cell_size, &corners, &mut mesh);
                }
            }
        }
        mesh
    }

    /// One cube per occupied cell of `index`, with corner values taken from
    /// the mean density of the particles in each corner cell. Empty corner
    /// cells read as zero.
    pub fn mesh_cells<N: NeighborSearch>(&self, index: &N, densities: &[f32]) -> Mesh {
        let mut mesh = Mesh::new();
        let cell_size = index.cell_size();

        for cell in index.occupied_cells() {
            let corners = CORNER_OFFSETS
                .map(|[dx, dy, dz]| mean_cell_density(index, cell.offset(dx, dy, dz), densities));
            self.march_cube(cell.origin(cell_size), cell_size, &corners, &mut mesh);
        }
        mesh
    }
}

/// Average density of the particles stored in `cell`, zero when empty.
pub fn mean_cell_density<N: NeighborSearch>(index: &N, cell: CellCoord, densities: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    let mut count = 0usize;
    index.for_each_in_cell(cell, |j| {
        sum += densities[j];
        count += 1;
    });
    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::SpatialHashGrid;
    use crate::tables::triangle_count;

    #[test]
    fn configuration_bits_follow_corner_order() {
        let mut corners = [0.0; 8];
        assert_eq!(configuration_index(&corners, 0.5), 0);
        corners[0] = 1.0;
        corners[6] = 1.0;
        assert_eq!(configuration_index(&corners, 0.5), 0b0100_0001);
        // Equal to the threshold is outside.
        corners[3] = 0.5;
        assert_eq!(configuration_index(&corners, 0.5), 0b0100_0001);
    }

    #[test]
    fn full_and_empty_cubes_emit_nothing() {
        let mesher = MarchingCubesMesher::new(0.5);
        let mut mesh = Mesh::new();
        assert_eq!(mesher.march_cube([0.0; 3], 1.0, &[0.0; 8], &mut mesh), 0);
        assert_eq!(mesher.march_cube([0.0; 3], 1.0, &[1.0; 8], &mut mesh), 0);
        assert!(mesh.vertices.is_empty());
    }

    #[test]
    fn single_corner_gives_one_midpoint_triangle() {
        let mesher = MarchingCubesMesher::new(0.5);
        let mut corners = [0.0; 8];
        corners[0] = 1.0;
        let mut mesh = Mesh::new();
        let n = mesher.march_cube([10.0, 20.0, 30.0], 2.0, &corners, &mut mesh);
        assert_eq!(n, 1);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        // Edges 0, 8, 3 meet at corner 0.
        assert_eq!(
            mesh.vertices,
            vec![[11.0, 20.0, 30.0], [10.0, 21.0, 30.0], [10.0, 20.0, 31.0]]
        );
    }

    #[test]
    fn dense_field_vertices_are_offset_by_field_origin() {
        let mut field = ScalarField::zeros([-1.0, -1.0, -1.0], 0.5, [2, 2, 2]);
        field.add(1, 1, 1, 1.0);
        let mesh = MarchingCubesMesher::new(0.5).mesh_field(&field);
        assert_eq!(mesh.triangle_count(), triangle_count(1 << 6));
        for v in &mesh.vertices {
            for &c in v {
                assert!((-1.0..=-0.5).contains(&c), "{v:?}");
            }
        }
    }

    #[test]
    fn missing_corner_cells_read_as_zero() {
        let mut grid = SpatialHashGrid::new(1.0);
        grid.rebuild(&[0.5, 0.6], &[0.5, 0.4], &[0.5, 0.5], 1.0);
        let densities = [2.0, 4.0];
        assert_eq!(mean_cell_density(&grid, CellCoord::new(0, 0, 0), &densities), 3.0);
        assert_eq!(mean_cell_density(&grid, CellCoord::new(1, 0, 0), &densities), 0.0);

        // Only corner 0 of the single occupied cell is populated.
        let mesh = MarchingCubesMesher::new(1.0).mesh_cells(&grid, &densities);
        assert_eq!(mesh.triangle_count(), 1);
    }
}
