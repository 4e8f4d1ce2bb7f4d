//! Lattice density field built by Gaussian splatting.
//!
//! The lattice covers the simulation bounds with one node per `cell_size`
//! step, so a bounds size of `s` along an axis gives `floor(s / cell) + 1`
//! nodes. Each particle adds `exp(-d^2 / (2 r^2))` to the 3x3x3 block of
//! nodes around the lattice cell that contains it, where `d` is the distance
//! from the particle to the node's world position.

use crate::exec::LaneExecutor;
use crate::params::SimParams;
use crate::particle::ParticleArrays;

/// Dense scalar field sampled on a regular lattice.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    origin: [f32; 3],
    cell_size: f32,
    dims: [usize; 3],
    values: Vec<f32>,
}

impl ScalarField {
    /// All-zero field with `dims` nodes per axis.
    pub fn zeros(origin: [f32; 3], cell_size: f32, dims: [usize; 3]) -> Self {
        Self {
            origin,
            cell_size,
            dims,
            values: vec![0.0; dims[0] * dims[1] * dims[2]],
        }
    }

    /// World position of node `(0, 0, 0)`.
    pub fn origin(&self) -> [f32; 3] {
        self.origin
    }

    /// Node spacing.
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Node count per axis.
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Flat node values, x fastest then y then z.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    #[inline]
    fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x + self.dims[0] * (y + self.dims[1] * z)
    }

    /// Value at node `(x, y, z)`. Panics when out of range.
    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> f32 {
        self.values[self.index(x, y, z)]
    }

    /// Add `value` to node `(x, y, z)`.
    #[inline]
    pub fn add(&mut self, x: usize, y: usize, z: usize, value: f32) {
        let i = self.index(x, y, z);
        self.values[i] += value;
    }

    /// World position of node `(x, y, z)`.
    pub fn node_position(&self, x: usize, y: usize, z: usize) -> [f32; 3] {
        [
            self.origin[0] + x as f32 * self.cell_size,
            self.origin[1] + y as f32 * self.cell_size,
            self.origin[2] + z as f32 * self.cell_size,
        ]
    }
}

/// Fixed-size buffer of node weights from one particle.
#[derive(Debug, Clone, Copy, Default)]
struct NodeSplat {
    weights: [([usize; 3], f32); 27],
    count: usize,
}

impl NodeSplat {
    fn nodes(&self) -> &[([usize; 3], f32)] {
        &self.weights[..self.count]
    }
}

/// Splats particles into a [`ScalarField`] covering the bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalarFieldSampler {
    bounds_min: [f32; 3],
    cell_size: f32,
    resolution: [usize; 3],
    splat_radius: f32,
}

impl ScalarFieldSampler {
    /// Sampler over `params` bounds with lattice spacing equal to the
    /// smoothing length.
    pub fn new(params: &SimParams, splat_radius: f32) -> Self {
        let cell_size = params.cell_size();
        let resolution = [0, 1, 2].map(|axis| {
            let cells = (params.bounds_size[axis] / cell_size).floor();
            if cells.is_finite() && cells > 0.0 {
                cells as usize
            } else {
                0
            }
        });
        Self {
            bounds_min: params.bounds_min(),
            cell_size,
            resolution,
            splat_radius,
        }
    }

    /// Lattice cells per axis. The field has one more node than this.
    pub fn resolution(&self) -> [usize; 3] {
        self.resolution
    }

    /// Lattice cell containing `position`, relative to the bounds minimum.
    ///
    /// May lie outside the lattice for positions outside the bounds.
    pub fn cell_in_bounds(&self, position: [f32; 3]) -> [i64; 3] {
        [0, 1, 2].map(|axis| ((position[axis] - self.bounds_min[axis]) / self.cell_size).floor() as i64)
    }

    /// World position of a lattice cell's minimum corner.
    pub fn cell_origin_in_world(&self, cell: [i64; 3]) -> [f32; 3] {
        [0, 1, 2].map(|axis| self.bounds_min[axis] + cell[axis] as f32 * self.cell_size)
    }

    /// Gaussian weights one particle adds to its 3x3x3 node block, clamped
    /// to the lattice. Only the first `count` entries are filled.
    fn splat(&self, position: [f32; 3]) -> NodeSplat {
        let cell = self.cell_in_bounds(position);
        let inv_two_r2 = 1.0 / (2.0 * self.splat_radius * self.splat_radius);
        let mut out = NodeSplat::default();

        for dz in -1..=1i64 {
            for dy in -1..=1i64 {
                for dx in -1..=1i64 {
                    let node = [
                        cell[0].saturating_add(dx),
                        cell[1].saturating_add(dy),
                        cell[2].saturating_add(dz),
                    ];
                    let in_range = (0..3).all(|a| node[a] >= 0 && node[a] <= self.resolution[a] as i64);
                    if !in_range {
                        continue;
                    }
                    let world = self.cell_origin_in_world(node);
                    let d2: f32 = (0..3).map(|a| (position[a] - world[a]).powi(2)).sum();
                    out.weights[out.count] = (
                        [node[0] as usize, node[1] as usize, node[2] as usize],
                        (-d2 * inv_two_r2).exp(),
                    );
                    out.count += 1;
                }
            }
        }
        out
    }

    /// Build a fresh field from every particle position.
    ///
    /// Contributions are computed per particle through `exec` and then summed
    /// in particle order, so both backends produce identical fields.
    pub fn sample<E: LaneExecutor>(&self, exec: &E, particles: &ParticleArrays) -> ScalarField {
        let dims = self.resolution.map(|r| r + 1);
        let mut field = ScalarField::zeros(self.bounds_min, self.cell_size, dims);

        let splats = exec.map_lanes(particles.len(), |i| self.splat(particles.position(i)));
        for splat in &splats {
            for &([x, y, z], w) in splat.nodes() {
                field.add(x, y, z, w);
            }
        }
        field
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{ParallelExecutor, SequentialExecutor};

    fn params() -> SimParams {
        SimParams {
            smoothing_length: 1.0,
            bounds_center: [0.0; 3],
            bounds_size: [4.0, 4.0, 4.0],
            ..SimParams::default()
        }
    }

    #[test]
    fn resolution_floors_bounds_over_cell() {
        let p = SimParams {
            bounds_size: [4.5, 3.0, 1.0],
            ..params()
        };
        let s = ScalarFieldSampler::new(&p, 1.0);
        assert_eq!(s.resolution(), [4, 3, 1]);
    }

    #[test]
    fn cell_round_trip_stays_within_one_cell() {
        let s = ScalarFieldSampler::new(&params(), 1.0);
        for &p in &[[-2.0, -2.0, -2.0], [0.3, -1.7, 1.99], [1.5, 0.0, -0.01]] {
            let origin = s.cell_origin_in_world(s.cell_in_bounds(p));
            for axis in 0..3 {
                let d = p[axis] - origin[axis];
                assert!((0.0..1.0).contains(&d), "p={p:?} origin={origin:?}");
            }
        }
    }

    #[test]
    fn particle_on_node_gets_unit_weight() {
        let s = ScalarFieldSampler::new(&params(), 0.5);
        let mut particles = ParticleArrays::new();
        // Node (2, 2, 2) sits at the bounds center.
        particles.push_particle([0.0, 0.0, 0.0], [0.0; 3]);
        let field = s.sample(&SequentialExecutor, &particles);
        assert_eq!(field.dims(), [5, 5, 5]);
        assert!((field.get(2, 2, 2) - 1.0).abs() < 1.0e-6);
        let expected = (-1.0f32 / (2.0 * 0.25)).exp();
        assert!((field.get(3, 2, 2) - expected).abs() < 1.0e-6);
        // Outside the 3x3x3 block.
        assert_eq!(field.get(0, 2, 2), 0.0);
    }

    #[test]
    fn corner_particle_is_clamped_to_lattice() {
        let s = ScalarFieldSampler::new(&params(), 1.0);
        let mut particles = ParticleArrays::new();
        particles.push_particle([-2.0, -2.0, -2.0], [0.0; 3]);
        let field = s.sample(&SequentialExecutor, &particles);
        let nonzero = field.values().iter().filter(|&&v| v > 0.0).count();
        assert_eq!(nonzero, 8);
    }

    #[test]
    fn interior_particle_fills_whole_block() {
        let s = ScalarFieldSampler::new(&params(), 1.0);
        assert_eq!(s.splat([0.1, 0.1, 0.1]).nodes().len(), 27);
        assert_eq!(s.splat([-2.0, -2.0, -2.0]).nodes().len(), 8);
    }

    #[test]
    fn far_away_particle_adds_nothing() {
        let s = ScalarFieldSampler::new(&params(), 1.0);
        let mut particles = ParticleArrays::new();
        particles.push_particle([1.0e30, -1.0e30, 0.0], [0.0; 3]);
        let field = s.sample(&SequentialExecutor, &particles);
        assert!(field.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn backends_produce_identical_fields() {
        let s = ScalarFieldSampler::new(&params(), 0.7);
        let mut particles = ParticleArrays::new();
        for i in 0..300 {
            let t = i as f32 * 0.013;
            particles.push_particle([(t * 7.0).sin() * 1.8, (t * 3.0).cos() * 1.8, t - 1.9], [0.0; 3]);
        }
        let a = s.sample(&SequentialExecutor, &particles);
        let b = s.sample(&ParallelExecutor, &particles);
        assert_eq!(a, b);
    }
}
