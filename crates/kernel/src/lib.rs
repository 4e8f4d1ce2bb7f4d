//! SPH Fluid Solver and Surface Mesher
//!
//! This crate advances a particle fluid with Smoothed Particle Hydrodynamics
//! and extracts a triangle mesh of its surface after every step.
//!
//! # Modules
//! - [`particle`] -- Struct-of-arrays particle storage and the jittered spawn lattice.
//! - [`params`] -- Per-step simulation parameters, obstacle and surface settings.
//! - [`exec`] -- Sequential and rayon-backed stage executors.
//! - [`grid`] -- Hash-map spatial grid and the shared neighbor-search trait.
//! - [`rank_sort`] -- Bitonic-sorted key table used by the data-parallel backend.
//! - [`sph`] -- Poly6 / Spiky / viscosity kernels and the solver stages.
//! - [`boundary`] -- Bounds and obstacle collision response.
//! - [`field`] -- Gaussian-splatted lattice density field.
//! - [`marching`] -- Marching cubes over a dense field or occupied cells.
//! - [`tables`] -- Marching cubes lookup tables.
//! - [`mesh`] -- Triangle soup with normals and double-sided output.

#![warn(missing_docs)]

pub mod boundary;
pub mod error;
pub mod exec;
pub mod field;
pub mod grid;
pub mod marching;
pub mod mesh;
pub mod params;
pub mod particle;
pub mod rank_sort;
pub mod sph;
pub mod tables;

pub use boundary::BoundaryResolver;
pub use error::SimError;
pub use exec::{LaneExecutor, ParallelExecutor, SequentialExecutor};
pub use field::{ScalarField, ScalarFieldSampler};
pub use grid::{CellCoord, NeighborSearch, SpatialHashGrid};
pub use marching::MarchingCubesMesher;
pub use mesh::Mesh;
pub use params::{ObstacleBox, SimParams, SurfaceMode, SurfaceSettings};
pub use particle::{ParticleArrays, SpawnLayout};
pub use rank_sort::ParallelRankSorter;
pub use sph::{poly6, spiky_gradient, viscosity_laplacian};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// FluidKernel trait
// ---------------------------------------------------------------------------

/// Which executor and neighbor index drive the solver stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backend {
    /// Single-threaded loops over a [`SpatialHashGrid`].
    Sequential,
    /// Rayon lanes over a [`ParallelRankSorter`].
    DataParallel,
}

/// Summary of one completed step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StepStats {
    /// Ordered particle pairs closer than the smoothing length.
    pub neighbor_pairs: usize,
    /// Largest particle density.
    pub max_density: f32,
    /// Smallest particle density.
    pub min_density: f32,
    /// Mean particle density.
    pub mean_density: f32,
    /// Largest particle speed after boundary resolution.
    pub max_speed: f32,
    /// Triangles in the extracted surface, zero when meshing is off.
    pub triangle_count: usize,
}

/// Trait every simulation back-end implements.
///
/// One call to [`FluidKernel::step`] runs the whole pipeline:
///
/// 1. Neighbor index rebuild
/// 2. Density summation
/// 3. Pressure from the linear equation of state
/// 4. Pressure and viscosity forces
/// 5. Semi-implicit Euler integration with gravity
/// 6. Bounds and obstacle collision
/// 7. Optional surface extraction
pub trait FluidKernel {
    /// Advance the simulation by `dt` with the given parameters.
    fn step(&mut self, params: &SimParams, dt: f32) -> Result<StepStats, SimError>;

    /// Current particle state.
    fn particles(&self) -> &ParticleArrays;

    /// Surface mesh from the last step; empty if meshing is disabled.
    fn mesh(&self) -> &Mesh;

    /// Number of particles in the simulation.
    fn particle_count(&self) -> usize {
        self.particles().len()
    }

    /// Positions as packed triples.
    fn positions(&self) -> Vec<[f32; 3]> {
        self.particles().positions()
    }

    /// Velocities as packed triples.
    fn velocities(&self) -> Vec<[f32; 3]> {
        self.particles().velocities()
    }

    /// Density of particle `i` from the last step.
    fn density(&self, i: usize) -> f32 {
        self.particles().density[i]
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum SpatialIndex {
    HashGrid(SpatialHashGrid),
    RankSorted(ParallelRankSorter),
}

/// Owned simulation state, stepped explicitly by the caller.
#[derive(Debug, Clone)]
pub struct Simulation {
    particles: ParticleArrays,
    backend: Backend,
    index: SpatialIndex,
    mesh: Mesh,
    steps: u64,
    time: f64,
}

impl Simulation {
    /// Spawn `count` particles on a jittered lattice.
    pub fn new(
        count: usize,
        layout: &SpawnLayout,
        params: &SimParams,
        backend: Backend,
    ) -> Result<Self, SimError> {
        params.validate()?;
        let particles = ParticleArrays::jittered_lattice(count, layout)?;
        Self::from_particles(particles, params, backend)
    }

    /// Wrap an existing particle set.
    pub fn from_particles(
        particles: ParticleArrays,
        params: &SimParams,
        backend: Backend,
    ) -> Result<Self, SimError> {
        params.validate()?;
        if particles.is_empty() {
            return Err(SimError::InvalidParticleCount(0));
        }
        particles.assert_consistent();

        let cell_size = params.cell_size();
        let index = match backend {
            Backend::Sequential => SpatialIndex::HashGrid(SpatialHashGrid::new(cell_size)),
            Backend::DataParallel => SpatialIndex::RankSorted(ParallelRankSorter::new(cell_size)),
        };

        tracing::info!(
            particles = particles.len(),
            ?backend,
            smoothing_length = params.smoothing_length,
            "SPH simulation initialized"
        );

        Ok(Self {
            particles,
            backend,
            index,
            mesh: Mesh::new(),
            steps: 0,
            time: 0.0,
        })
    }

    /// Back-end chosen at construction.
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Completed steps.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Accumulated simulated time.
    pub fn time(&self) -> f64 {
        self.time
    }
}

impl FluidKernel for Simulation {
    fn step(&mut self, params: &SimParams, dt: f32) -> Result<StepStats, SimError> {
        params.validate()?;
        if !(dt.is_finite() && dt >= 0.0) {
            return Err(SimError::InvalidTimeStep(dt));
        }
        self.particles.assert_consistent();

        let cell_size = params.cell_size();
        let (neighbor_pairs, mesh) = match &mut self.index {
            SpatialIndex::HashGrid(grid) => {
                let p = &self.particles;
                grid.rebuild(&p.x, &p.y, &p.z, cell_size);
                run_pipeline(&SequentialExecutor, &*grid, &mut self.particles, params, dt)
            }
            SpatialIndex::RankSorted(sorter) => {
                let p = &self.particles;
                sorter.rebuild(&ParallelExecutor, &p.x, &p.y, &p.z, cell_size);
                run_pipeline(&ParallelExecutor, &*sorter, &mut self.particles, params, dt)
            }
        };
        self.mesh = mesh;
        self.steps += 1;
        self.time += dt as f64;

        let stats = step_stats(&self.particles, neighbor_pairs, self.mesh.triangle_count());
        if !self.particles.is_finite() {
            tracing::warn!(step = self.steps, "non-finite particle state");
        }
        tracing::debug!(
            step = self.steps,
            neighbor_pairs,
            max_density = stats.max_density,
            max_speed = stats.max_speed,
            triangles = stats.triangle_count,
            "step complete"
        );
        Ok(stats)
    }

    fn particles(&self) -> &ParticleArrays {
        &self.particles
    }

    fn mesh(&self) -> &Mesh {
        &self.mesh
    }
}

/// Stages 2-7 on an already rebuilt index. Each stage finishes for every
/// particle before the next begins.
fn run_pipeline<E, N>(
    exec: &E,
    index: &N,
    particles: &mut ParticleArrays,
    params: &SimParams,
    dt: f32,
) -> (usize, Mesh)
where
    E: LaneExecutor,
    N: NeighborSearch,
{
    let h = params.smoothing_length;
    tracing::trace!(executor = exec.name(), particles = particles.len(), "running step stages");

    particles.density = sph::compute_densities(exec, index, particles, params);
    particles.pressure = sph::compute_pressures(exec, &particles.density, params);

    let forces = sph::compute_forces(exec, index, particles, params);
    for (i, f) in forces.into_iter().enumerate() {
        particles.fx[i] = f[0];
        particles.fy[i] = f[1];
        particles.fz[i] = f[2];
    }
    let neighbor_pairs = sph::count_neighbor_pairs(exec, index, particles, h);

    sph::integrate(exec, particles, params.gravity, dt);
    BoundaryResolver::from_params(params).resolve_all(exec, particles);

    let mesh = match &params.surface {
        Some(surface) => extract_surface(exec, index, particles, params, surface),
        None => Mesh::new(),
    };
    (neighbor_pairs, mesh)
}

fn extract_surface<E, N>(
    exec: &E,
    index: &N,
    particles: &ParticleArrays,
    params: &SimParams,
    surface: &SurfaceSettings,
) -> Mesh
where
    E: LaneExecutor,
    N: NeighborSearch,
{
    let mesher = MarchingCubesMesher::new(surface.iso_threshold);
    let mut mesh = match surface.mode {
        SurfaceMode::Dense => {
            let radius = surface.splat_radius.unwrap_or(params.smoothing_length);
            let field = ScalarFieldSampler::new(params, radius).sample(exec, particles);
            mesher.mesh_field(&field)
        }
        // The index still holds this step's pre-integration cells.
        SurfaceMode::Sparse => mesher.mesh_cells(index, &particles.density),
    };
    mesh.recalculate_normals();
    if surface.double_sided {
        mesh = mesh.double_sided();
    }
    mesh
}

fn step_stats(particles: &ParticleArrays, neighbor_pairs: usize, triangle_count: usize) -> StepStats {
    let n = particles.len();
    let mut max_density = f32::MIN;
    let mut min_density = f32::MAX;
    let mut sum = 0.0f64;
    let mut max_speed = 0.0f32;
    for i in 0..n {
        let d = particles.density[i];
        max_density = max_density.max(d);
        min_density = min_density.min(d);
        sum += d as f64;
        let [vx, vy, vz] = particles.velocity(i);
        max_speed = max_speed.max((vx * vx + vy * vy + vz * vz).sqrt());
    }
    StepStats {
        neighbor_pairs,
        max_density,
        min_density,
        mean_density: if n == 0 { 0.0 } else { (sum / n as f64) as f32 },
        max_speed,
        triangle_count,
    }
}
