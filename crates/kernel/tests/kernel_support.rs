//! Kernel support, density sign and lattice equilibrium.

use fluid_kernel::exec::SequentialExecutor;
use fluid_kernel::sph::{compute_densities, compute_pressures};
use fluid_kernel::{
    poly6, spiky_gradient, viscosity_laplacian, ParticleArrays, SimParams, SpatialHashGrid,
};

#[test]
fn kernels_are_zero_outside_support() {
    for &h in &[0.1f32, 0.5, 1.0, 2.0, 7.5] {
        for k in 0..50 {
            let r = h * (1.0 + k as f32 * 0.1);
            assert_eq!(poly6(h, r), 0.0, "poly6 h={h} r={r}");
            assert_eq!(spiky_gradient(h, r), 0.0, "spiky h={h} r={r}");
            assert_eq!(viscosity_laplacian(h, r), 0.0, "visc h={h} r={r}");
        }
    }
}

fn grid_for(particles: &ParticleArrays, params: &SimParams) -> SpatialHashGrid {
    let mut grid = SpatialHashGrid::new(params.cell_size());
    grid.rebuild(&particles.x, &particles.y, &particles.z, params.cell_size());
    grid
}

#[test]
fn density_is_never_negative() {
    let params = SimParams {
        smoothing_length: 0.4,
        ..SimParams::default()
    };
    let mut particles = ParticleArrays::new();
    let mut state = 0x9e37_79b9_u32;
    let mut next = || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        (state % 10_000) as f32 / 10_000.0 * 3.0 - 1.5
    };
    for _ in 0..400 {
        let p = [next(), next(), next()];
        particles.push_particle(p, [0.0; 3]);
    }
    // A few coincident particles.
    particles.push_particle([0.0; 3], [0.0; 3]);
    particles.push_particle([0.0; 3], [0.0; 3]);

    let grid = grid_for(&particles, &params);
    let rho = compute_densities(&SequentialExecutor, &grid, &particles, &params);
    assert!(rho.iter().all(|&d| d >= 0.0 && d.is_finite()));
}

#[test]
fn uniform_lattice_at_rest_density_has_zero_pressure() {
    let spacing = 0.5f32;
    let n = 9;
    let mut particles = ParticleArrays::new();
    for ix in 0..n {
        for iy in 0..n {
            for iz in 0..n {
                particles.push_particle(
                    [ix as f32 * spacing, iy as f32 * spacing, iz as f32 * spacing],
                    [0.0; 3],
                );
            }
        }
    }

    let mut params = SimParams {
        smoothing_length: 1.0,
        stiffness: 50.0,
        ..SimParams::default()
    };
    let grid = grid_for(&particles, &params);
    let rho = compute_densities(&SequentialExecutor, &grid, &particles, &params);

    let center = (n / 2) * n * n + (n / 2) * n + n / 2;
    params.rest_density = rho[center];
    let pressure = compute_pressures(&SequentialExecutor, &rho, &params);

    // Particles at least h from every lattice face see a full neighborhood.
    let margin = (params.smoothing_length / spacing).ceil() as usize;
    let interior = |i: usize| (margin..n - margin).contains(&i);
    let scale = params.stiffness * params.rest_density;
    let mut checked = 0;
    for ix in 0..n {
        for iy in 0..n {
            for iz in 0..n {
                if !(interior(ix) && interior(iy) && interior(iz)) {
                    continue;
                }
                let i = ix * n * n + iy * n + iz;
                assert!(
                    pressure[i].abs() <= 1.0e-4 * scale,
                    "pressure {} at lattice ({ix},{iy},{iz})",
                    pressure[i]
                );
                checked += 1;
            }
        }
    }
    assert!(checked > 0);
}
