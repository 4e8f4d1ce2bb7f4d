//! Sequential and data-parallel backends run the same math.

use fluid_kernel::{
    Backend, FluidKernel, SimParams, Simulation, SpawnLayout, SurfaceMode, SurfaceSettings,
};

fn params(mode: SurfaceMode) -> SimParams {
    SimParams {
        smoothing_length: 0.35,
        bounds_size: [3.0, 3.0, 3.0],
        surface: Some(SurfaceSettings {
            mode,
            ..SurfaceSettings::default()
        }),
        ..SimParams::default()
    }
}

fn layout() -> SpawnLayout {
    SpawnLayout {
        center: [0.0, 0.3, 0.0],
        size: 1.6,
        jitter: 0.03,
        seed: 11,
        ..SpawnLayout::default()
    }
}

fn run(backend: Backend, params: &SimParams, steps: usize) -> Simulation {
    let mut sim = Simulation::new(343, &layout(), params, backend).unwrap();
    for _ in 0..steps {
        sim.step(params, 0.004).unwrap();
    }
    sim
}

fn assert_close(a: &[[f32; 3]], b: &[[f32; 3]], tol: f32) {
    assert_eq!(a.len(), b.len());
    for (i, (pa, pb)) in a.iter().zip(b).enumerate() {
        for axis in 0..3 {
            assert!(
                (pa[axis] - pb[axis]).abs() <= tol,
                "particle {i} axis {axis}: {} vs {}",
                pa[axis],
                pb[axis]
            );
        }
    }
}

#[test]
fn positions_and_velocities_agree() {
    let params = params(SurfaceMode::Dense);
    let seq = run(Backend::Sequential, &params, 10);
    let par = run(Backend::DataParallel, &params, 10);
    assert_close(&seq.positions(), &par.positions(), 1.0e-4);
    assert_close(&seq.velocities(), &par.velocities(), 1.0e-3);
}

#[test]
fn dense_surfaces_agree() {
    let params = params(SurfaceMode::Dense);
    let seq = run(Backend::Sequential, &params, 3);
    let par = run(Backend::DataParallel, &params, 3);
    assert!(seq.mesh().triangle_count() > 0);
    assert_eq!(seq.mesh().triangle_count(), par.mesh().triangle_count());
}

#[test]
fn sparse_surfaces_agree() {
    let params = SimParams {
        surface: Some(SurfaceSettings {
            mode: SurfaceMode::Sparse,
            iso_threshold: 0.01,
            ..SurfaceSettings::default()
        }),
        ..params(SurfaceMode::Sparse)
    };
    let seq = run(Backend::Sequential, &params, 1);
    let par = run(Backend::DataParallel, &params, 1);
    assert!(seq.mesh().triangle_count() > 0);
    assert_eq!(seq.mesh(), par.mesh());
}
