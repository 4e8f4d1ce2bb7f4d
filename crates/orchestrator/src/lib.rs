//! Orchestration Layer
//!
//! This crate wires the SPH fluid kernel into a runnable simulation:
//! - JSON configuration loading and validation
//! - Backend selection
//! - Background runner with lifecycle management and frame read-back

#![warn(missing_docs)]

pub mod config;
pub mod runner;

pub use config::{BackendType, SimulationConfig};
pub use runner::{FrameSnapshot, RunSettings, RunnerState, SimulationRunner};

use fluid_kernel::{FluidKernel, Simulation};

/// Create a complete simulation from a configuration file
///
/// This function performs the full simulation setup pipeline:
/// 1. Load and validate the configuration
/// 2. Spawn the particle lattice and create the kernel
/// 3. Wrap in a SimulationRunner for lifecycle management
///
/// # Arguments
/// * `config_path` - Path to the JSON configuration file
///
/// # Returns
/// A `SimulationRunner` ready to be started, or an error if setup fails
///
/// # Example
/// ```no_run
/// use fluid_orchestrator::create_simulation;
///
/// let runner = create_simulation("configs/dam_break.json")?;
/// runner.start();
/// // ... query status, pause, resume, read back frames
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn create_simulation(config_path: &str) -> Result<SimulationRunner, Box<dyn std::error::Error>> {
    tracing::info!("Creating simulation from config: {}", config_path);

    let config = SimulationConfig::load(config_path)?;
    tracing::info!("Configuration loaded: {}", config.name);

    build_runner(&config)
}

/// Create a runner from an already validated configuration
pub fn build_runner(config: &SimulationConfig) -> Result<SimulationRunner, Box<dyn std::error::Error>> {
    let kernel = create_kernel(config)?;

    let settings = RunSettings {
        params: config.to_params(),
        time_step: config.time_step,
        max_timesteps: config.max_timesteps,
        max_time: config.max_time,
    };

    tracing::info!("Simulation ready to start");
    Ok(SimulationRunner::new(kernel, settings))
}

/// Create a simulation kernel based on the backend configuration.
pub fn create_kernel(
    config: &SimulationConfig,
) -> Result<Box<dyn FluidKernel + Send>, fluid_kernel::SimError> {
    let backend = config.backend.resolve();
    tracing::info!(
        "Creating {:?} kernel with {} particles",
        backend,
        config.particle_count
    );
    let sim = Simulation::new(config.particle_count, &config.spawn, &config.to_params(), backend)?;
    Ok(Box::new(sim))
}
