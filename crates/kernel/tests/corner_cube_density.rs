//! Density of eight particles on the corners of a unit cube.
//!
//! With h = 2 every particle sees all eight corners: itself at distance 0,
//! three edge neighbors at 1, three face diagonals at sqrt(2) and the body
//! diagonal at sqrt(3).

use fluid_kernel::{poly6, Backend, FluidKernel, ParticleArrays, SimParams, Simulation};

const H: f32 = 2.0;
const MASS: f32 = 0.018;

fn corner_particles() -> ParticleArrays {
    let mut particles = ParticleArrays::new();
    for &x in &[0.0, 1.0] {
        for &y in &[0.0, 1.0] {
            for &z in &[0.0, 1.0] {
                particles.push_particle([x, y, z], [0.0; 3]);
            }
        }
    }
    particles
}

fn params() -> SimParams {
    SimParams {
        smoothing_length: H,
        molar_mass: MASS,
        gravity: 0.0,
        bounds_center: [0.5; 3],
        bounds_size: [20.0; 3],
        ..SimParams::default()
    }
}

fn expected_density() -> f32 {
    let self_term = {
        // sigma * h^6 at zero distance
        let sigma = 315.0 / (64.0 * std::f32::consts::PI * H.powi(9));
        sigma * H.powi(6)
    };
    assert!((poly6(H, 0.0) - self_term).abs() / self_term < 1.0e-6);

    MASS * (self_term
        + 3.0 * poly6(H, 1.0)
        + 3.0 * poly6(H, 2.0f32.sqrt())
        + poly6(H, 3.0f32.sqrt()))
}

fn densities_after_zero_step(backend: Backend) -> Vec<f32> {
    let params = params();
    let mut sim = Simulation::from_particles(corner_particles(), &params, backend).unwrap();
    sim.step(&params, 0.0).unwrap();
    (0..sim.particle_count()).map(|i| sim.density(i)).collect()
}

#[test]
fn corner_density_matches_closed_form() {
    let expected = expected_density();
    for rho in densities_after_zero_step(Backend::Sequential) {
        assert!(
            (rho - expected).abs() / expected < 1.0e-5,
            "density {rho} != expected {expected}"
        );
    }
}

#[test]
fn corner_density_matches_on_data_parallel_backend() {
    let expected = expected_density();
    for rho in densities_after_zero_step(Backend::DataParallel) {
        assert!(
            (rho - expected).abs() / expected < 1.0e-5,
            "density {rho} != expected {expected}"
        );
    }
}

#[test]
fn all_corners_are_symmetric() {
    let d = densities_after_zero_step(Backend::Sequential);
    for rho in &d[1..] {
        assert_eq!(*rho, d[0]);
    }
}
