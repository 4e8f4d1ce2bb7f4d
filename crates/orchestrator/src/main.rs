//! Headless simulation binary
//!
//! Usage: `fluid-sim <config.json>`
//!
//! Runs the configured simulation to its stopping condition and logs a summary
//! of the final frame. Log verbosity follows `RUST_LOG`.

use fluid_orchestrator::{create_simulation, RunnerState};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fluid_orchestrator=info,fluid_kernel=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .ok_or("usage: fluid-sim <config.json>")?;

    let runner = create_simulation(&config_path)?;
    runner.start();

    while matches!(runner.state(), RunnerState::Running | RunnerState::Paused) {
        std::thread::sleep(Duration::from_millis(20));
    }

    let state = runner.state();
    let error = runner.error_message();
    if let Some(frame) = runner.latest_frame() {
        tracing::info!(
            "Final frame: step {}, t={:.4}s, density min/mean/max = {:.4}/{:.4}/{:.4}, max speed {:.3}, {} neighbor pairs, {} triangles",
            frame.timestep,
            frame.sim_time,
            frame.stats.min_density,
            frame.stats.mean_density,
            frame.stats.max_density,
            frame.stats.max_speed,
            frame.stats.neighbor_pairs,
            frame.mesh.triangle_count(),
        );
    }
    runner.join()?;

    match state {
        RunnerState::Error => Err(error
            .unwrap_or_else(|| "simulation failed".to_string())
            .into()),
        _ => Ok(()),
    }
}
