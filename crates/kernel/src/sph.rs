//! SPH smoothing kernels and solver stages.
//!
//! Implements the Müller-style Poly6 kernel for density, the Spiky kernel
//! gradient for pressure and the viscosity kernel Laplacian, all with
//! support radius `h`. Each stage is a per-particle function run through a
//! [`LaneExecutor`] over a [`NeighborSearch`], so the same math serves the
//! sequential and the data-parallel backends.

use std::f32::consts::PI;

use crate::exec::LaneExecutor;
use crate::grid::NeighborSearch;
use crate::params::SimParams;
use crate::particle::ParticleArrays;

/// Floor applied to a neighbor's density before dividing by it.
pub const MIN_DENSITY: f32 = 1.0e-6;

/// Poly6 smoothing kernel.
///
/// ```text
/// W(h, r) = 315 / (64 pi h^9) * (h^2 - r^2)^3    for 0 <= r < h
/// W(h, r) = 0                                     otherwise
/// ```
pub fn poly6(h: f32, r: f32) -> f32 {
    if !(0.0..h).contains(&r) {
        return 0.0;
    }
    let sigma = 315.0 / (64.0 * PI * h.powi(9));
    let d = h * h - r * r;
    sigma * d * d * d
}

/// Radial derivative of the Spiky kernel.
///
/// ```text
/// dW/dr = -45 / (pi h^6) * (1 - r/h)^2    for 0 <= r < h
/// ```
pub fn spiky_gradient(h: f32, r: f32) -> f32 {
    if !(0.0..h).contains(&r) {
        return 0.0;
    }
    let t = 1.0 - r / h;
    -45.0 / (PI * h.powi(6)) * t * t
}

/// Laplacian of the viscosity kernel.
///
/// ```text
/// lap W = 45 / (pi h^6) * (1 - r/h)    for 0 <= r < h
/// ```
pub fn viscosity_laplacian(h: f32, r: f32) -> f32 {
    if !(0.0..h).contains(&r) {
        return 0.0;
    }
    45.0 / (PI * h.powi(6)) * (1.0 - r / h)
}

/// Linear equation of state `P = k (rho - rho0)`. Negative below rest density.
#[inline]
pub fn pressure_from_density(density: f32, rest_density: f32, stiffness: f32) -> f32 {
    stiffness * (density - rest_density)
}

#[inline]
fn distance(a: [f32; 3], b: [f32; 3]) -> f32 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

// ---------------------------------------------------------------------------
// Density
// ---------------------------------------------------------------------------

/// Density summation over every neighbor within `h`, the particle included.
///
/// ```text
/// rho_i = sum_j m * W(h, |p_i - p_j|)
/// ```
pub fn compute_densities<E, N>(
    exec: &E,
    search: &N,
    particles: &ParticleArrays,
    params: &SimParams,
) -> Vec<f32>
where
    E: LaneExecutor,
    N: NeighborSearch,
{
    let h = params.smoothing_length;
    let mass = params.molar_mass;

    exec.map_lanes(particles.len(), |i| {
        let pi = particles.position(i);
        let mut rho = 0.0f32;
        search.for_each_candidate(pi, |j| {
            let r = distance(pi, particles.position(j));
            if r < h {
                rho += mass * poly6(h, r);
            }
        });
        rho
    })
}

/// Ordered pairs `(i, j)`, `i != j`, closer than `h`.
pub fn count_neighbor_pairs<E, N>(exec: &E, search: &N, particles: &ParticleArrays, h: f32) -> usize
where
    E: LaneExecutor,
    N: NeighborSearch,
{
    exec.map_lanes(particles.len(), |i| {
        let pi = particles.position(i);
        let mut count = 0usize;
        search.for_each_candidate(pi, |j| {
            if j != i && distance(pi, particles.position(j)) < h {
                count += 1;
            }
        });
        count
    })
    .into_iter()
    .sum()
}

// ---------------------------------------------------------------------------
// Pressure
// ---------------------------------------------------------------------------

/// Pressure for every particle from its density.
pub fn compute_pressures<E: LaneExecutor>(
    exec: &E,
    densities: &[f32],
    params: &SimParams,
) -> Vec<f32> {
    let rest = params.rest_density;
    let k = params.stiffness;
    exec.map_lanes(densities.len(), |i| pressure_from_density(densities[i], rest, k))
}

// ---------------------------------------------------------------------------
// Forces
// ---------------------------------------------------------------------------

/// Pressure and viscosity force on every particle. Gravity is not included.
///
/// For each neighbor `j != i` within `h`:
/// ```text
/// F_p += dir(i->j) * -(P_i + P_j) / (2 rho_j) * dW_spiky(h, r)
/// F_v += mu * (v_j - v_i) / rho_j * lapW_visc(h, r)
/// ```
/// Both terms divide by the neighbor's density, floored at [`MIN_DENSITY`].
/// Coincident particles contribute no pressure direction.
pub fn compute_forces<E, N>(
    exec: &E,
    search: &N,
    particles: &ParticleArrays,
    params: &SimParams,
) -> Vec<[f32; 3]>
where
    E: LaneExecutor,
    N: NeighborSearch,
{
    let h = params.smoothing_length;
    let mu = params.viscosity;

    exec.map_lanes(particles.len(), |i| {
        let pi = particles.position(i);
        let vi = particles.velocity(i);
        let pressure_i = particles.pressure[i];
        let mut force = [0.0f32; 3];

        search.for_each_candidate(pi, |j| {
            if j == i {
                return;
            }
            let pj = particles.position(j);
            let r = distance(pi, pj);
            if r >= h {
                return;
            }
            let rho_j = particles.density[j].max(MIN_DENSITY);

            if r > 0.0 {
                let inv_r = 1.0 / r;
                let magnitude =
                    -(pressure_i + particles.pressure[j]) / (2.0 * rho_j) * spiky_gradient(h, r);
                for axis in 0..3 {
                    force[axis] += (pj[axis] - pi[axis]) * inv_r * magnitude;
                }
            }

            let vj = particles.velocity(j);
            let lap = viscosity_laplacian(h, r);
            for axis in 0..3 {
                force[axis] += mu * (vj[axis] - vi[axis]) / rho_j * lap;
            }
        });

        force
    })
}

// ---------------------------------------------------------------------------
// Integration
// ---------------------------------------------------------------------------

/// Semi-implicit Euler for one particle: force, then gravity, then position.
#[inline]
pub fn integrate_particle(
    position: [f32; 3],
    velocity: [f32; 3],
    force: [f32; 3],
    gravity: f32,
    dt: f32,
) -> ([f32; 3], [f32; 3]) {
    let mut v = [
        velocity[0] + force[0] * dt,
        velocity[1] + force[1] * dt,
        velocity[2] + force[2] * dt,
    ];
    v[1] -= gravity * dt;
    let p = [
        position[0] + v[0] * dt,
        position[1] + v[1] * dt,
        position[2] + v[2] * dt,
    ];
    (p, v)
}

/// Advance every particle by `dt` using the stored forces.
pub fn integrate<E: LaneExecutor>(
    exec: &E,
    particles: &mut ParticleArrays,
    gravity: f32,
    dt: f32,
) {
    let snapshot: &ParticleArrays = particles;
    let moved = exec.map_lanes(snapshot.len(), |i| {
        integrate_particle(
            snapshot.position(i),
            snapshot.velocity(i),
            snapshot.force(i),
            gravity,
            dt,
        )
    });

    for (i, (p, v)) in moved.into_iter().enumerate() {
        particles.x[i] = p[0];
        particles.y[i] = p[1];
        particles.z[i] = p[2];
        particles.vx[i] = v[0];
        particles.vy[i] = v[1];
        particles.vz[i] = v[2];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::SequentialExecutor;
    use crate::grid::SpatialHashGrid;

    #[test]
    fn poly6_at_zero_distance() {
        let h = 0.5f32;
        let expected = 315.0 / (64.0 * PI * h.powi(9)) * h.powi(6);
        let w = poly6(h, 0.0);
        assert!((w - expected).abs() / expected < 1.0e-5, "w={w}, expected={expected}");
    }

    #[test]
    fn kernels_vanish_at_and_beyond_support() {
        let h = 0.3;
        for &r in &[h, h * 1.0001, 2.0 * h, 10.0] {
            assert_eq!(poly6(h, r), 0.0, "poly6 at r={r}");
            assert_eq!(spiky_gradient(h, r), 0.0, "spiky at r={r}");
            assert_eq!(viscosity_laplacian(h, r), 0.0, "laplacian at r={r}");
        }
    }

    #[test]
    fn kernel_signs_inside_support() {
        let h = 1.0;
        for i in 0..10 {
            let r = i as f32 * 0.099;
            assert!(poly6(h, r) > 0.0, "poly6 r={r}");
            assert!(spiky_gradient(h, r) < 0.0, "spiky r={r}");
            assert!(viscosity_laplacian(h, r) > 0.0, "laplacian r={r}");
        }
    }

    #[test]
    fn poly6_normalization_numerical() {
        // Riemann sum over the support cube should integrate to ~1.
        let h = 1.0_f32;
        let n = 80;
        let cell = 2.0 * h / n as f32;
        let dv = (cell * cell * cell) as f64;
        let mut integral = 0.0_f64;
        for ix in 0..n {
            let x = -h + (ix as f32 + 0.5) * cell;
            for iy in 0..n {
                let y = -h + (iy as f32 + 0.5) * cell;
                for iz in 0..n {
                    let z = -h + (iz as f32 + 0.5) * cell;
                    let r = (x * x + y * y + z * z).sqrt();
                    integral += poly6(h, r) as f64 * dv;
                }
            }
        }
        assert!((integral - 1.0).abs() < 0.02, "poly6 integral = {integral}");
    }

    #[test]
    fn pressure_is_signed() {
        assert_eq!(pressure_from_density(1.0, 1.0, 3.0), 0.0);
        assert!(pressure_from_density(1.5, 1.0, 3.0) > 0.0);
        assert!(pressure_from_density(0.5, 1.0, 3.0) < 0.0);
    }

    #[test]
    fn integration_order_is_force_gravity_position() {
        let (p, v) = integrate_particle([0.0; 3], [1.0, 0.0, 0.0], [0.0, 2.0, 0.0], 10.0, 0.5);
        // v = (1, 0 + 2*0.5 - 10*0.5, 0) = (1, -4, 0); p = v * 0.5
        assert_eq!(v, [1.0, -4.0, 0.0]);
        assert_eq!(p, [0.5, -2.0, 0.0]);
    }

    #[test]
    fn isolated_particle_has_self_density_and_no_force() {
        let mut particles = ParticleArrays::new();
        particles.push_particle([0.0; 3], [0.0; 3]);
        let params = SimParams::default();
        let mut grid = SpatialHashGrid::new(params.cell_size());
        grid.rebuild(&particles.x, &particles.y, &particles.z, params.cell_size());

        let rho = compute_densities(&SequentialExecutor, &grid, &particles, &params);
        let expected = params.molar_mass * poly6(params.smoothing_length, 0.0);
        assert!((rho[0] - expected).abs() < 1.0e-6);

        particles.density = rho;
        let forces = compute_forces(&SequentialExecutor, &grid, &particles, &params);
        assert_eq!(forces[0], [0.0; 3]);
    }

    #[test]
    fn zero_density_neighbor_does_not_produce_nan() {
        let mut particles = ParticleArrays::new();
        particles.push_particle([0.0; 3], [0.0; 3]);
        particles.push_particle([0.3, 0.0, 0.0], [1.0, 0.0, 0.0]);
        particles.pressure = vec![1.0, 1.0];
        // Densities deliberately left at zero.
        let params = SimParams::default();
        let mut grid = SpatialHashGrid::new(params.cell_size());
        grid.rebuild(&particles.x, &particles.y, &particles.z, params.cell_size());

        let forces = compute_forces(&SequentialExecutor, &grid, &particles, &params);
        for f in &forces {
            assert!(f.iter().all(|c| c.is_finite()), "{f:?}");
        }
    }

    #[test]
    fn viscosity_pulls_toward_neighbor_velocity() {
        let mut particles = ParticleArrays::new();
        particles.push_particle([0.0; 3], [0.0; 3]);
        particles.push_particle([0.5, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let params = SimParams {
            stiffness: 0.0,
            ..SimParams::default()
        };
        let mut grid = SpatialHashGrid::new(params.cell_size());
        grid.rebuild(&particles.x, &particles.y, &particles.z, params.cell_size());
        particles.density = compute_densities(&SequentialExecutor, &grid, &particles, &params);
        particles.pressure = compute_pressures(&SequentialExecutor, &particles.density, &params);

        let forces = compute_forces(&SequentialExecutor, &grid, &particles, &params);
        assert!(forces[0][1] > 0.0, "particle 0 should be dragged up: {:?}", forces[0]);
        assert!(forces[1][1] < 0.0, "particle 1 should be dragged down: {:?}", forces[1]);
    }
}
