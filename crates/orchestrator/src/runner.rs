//! Simulation runner with lifecycle management
//!
//! This module provides the `SimulationRunner` which steps a fluid kernel in
//! a background thread, including start, pause, resume, status tracking and
//! read-back of the most recent completed frame.

use fluid_kernel::{FluidKernel, Mesh, SimParams, StepStats};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Runner state enum
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerState {
    /// Simulation created but not yet started
    Created,
    /// Simulation actively running
    Running,
    /// Simulation paused
    Paused,
    /// Simulation finished (reached stopping condition)
    Finished,
    /// Simulation encountered an error
    Error,
}

/// Particle and surface state copied out after a completed step.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    /// Steps completed when the frame was taken
    pub timestep: u64,
    /// Simulated time at the frame (seconds)
    pub sim_time: f64,
    /// Particle positions
    pub positions: Vec<[f32; 3]>,
    /// Particle velocities
    pub velocities: Vec<[f32; 3]>,
    /// Particle densities
    pub densities: Vec<f32>,
    /// Extracted surface (empty when meshing is off)
    pub mesh: Mesh,
    /// Statistics of the step that produced this frame
    pub stats: StepStats,
}

impl FrameSnapshot {
    fn capture(kernel: &dyn FluidKernel, timestep: u64, sim_time: f64, stats: StepStats) -> Self {
        Self {
            timestep,
            sim_time,
            positions: kernel.positions(),
            velocities: kernel.velocities(),
            densities: kernel.particles().density.clone(),
            mesh: kernel.mesh().clone(),
            stats,
        }
    }
}

/// Shared state between the runner thread and control interface
struct SharedState {
    /// Current runner state
    state: RunnerState,
    /// Current simulation time (seconds)
    sim_time: f64,
    /// Number of timesteps executed
    timestep_count: u64,
    /// Most recent error message (if state is Error)
    error_message: Option<String>,
    /// Last fully completed frame
    latest_frame: Option<Arc<FrameSnapshot>>,
}

/// Stepping parameters handed to the background thread
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Parameters applied on every step
    pub params: SimParams,
    /// Fixed time step (seconds)
    pub time_step: f32,
    /// Optional maximum number of timesteps
    pub max_timesteps: Option<u64>,
    /// Optional maximum simulation time (seconds)
    pub max_time: Option<f64>,
}

/// Handle for controlling and querying a running simulation
pub struct SimulationRunner {
    /// Shared state (protected by mutex)
    shared: Arc<Mutex<SharedState>>,
    /// Handle to the background thread
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl SimulationRunner {
    /// Create a new simulation runner with the given kernel
    ///
    /// The thread is spawned immediately but does not step until
    /// [`SimulationRunner::start`] is called.
    pub fn new(mut kernel: Box<dyn FluidKernel + Send>, settings: RunSettings) -> Self {
        let shared = Arc::new(Mutex::new(SharedState {
            state: RunnerState::Created,
            sim_time: 0.0,
            timestep_count: 0,
            error_message: None,
            latest_frame: None,
        }));

        let shared_clone = Arc::clone(&shared);

        // Spawn background thread
        let thread_handle = thread::spawn(move || {
            run_simulation_loop(kernel.as_mut(), shared_clone, settings);
        });

        Self {
            shared,
            thread_handle: Some(thread_handle),
        }
    }

    /// Get current runner state
    pub fn state(&self) -> RunnerState {
        self.shared.lock().unwrap().state.clone()
    }

    /// Get current simulation time (seconds)
    pub fn sim_time(&self) -> f64 {
        self.shared.lock().unwrap().sim_time
    }

    /// Get current timestep count
    pub fn timestep_count(&self) -> u64 {
        self.shared.lock().unwrap().timestep_count
    }

    /// Get error message if state is Error
    pub fn error_message(&self) -> Option<String> {
        self.shared.lock().unwrap().error_message.clone()
    }

    /// Last completed frame, or `None` before the first step finishes.
    ///
    /// A frame is published only after its step has fully completed, so it
    /// never shows a step in flight.
    pub fn latest_frame(&self) -> Option<Arc<FrameSnapshot>> {
        self.shared.lock().unwrap().latest_frame.clone()
    }

    /// Pause the simulation
    pub fn pause(&self) {
        let mut state = self.shared.lock().unwrap();
        if state.state == RunnerState::Running {
            state.state = RunnerState::Paused;
        }
    }

    /// Resume the simulation
    pub fn resume(&self) {
        let mut state = self.shared.lock().unwrap();
        if state.state == RunnerState::Paused {
            state.state = RunnerState::Running;
        }
    }

    /// Start the simulation (transition from Created to Running)
    pub fn start(&self) {
        let mut state = self.shared.lock().unwrap();
        if state.state == RunnerState::Created {
            state.state = RunnerState::Running;
        }
    }

    /// Stop the simulation after the step in progress
    pub fn stop(&self) {
        let mut state = self.shared.lock().unwrap();
        if matches!(
            state.state,
            RunnerState::Created | RunnerState::Running | RunnerState::Paused
        ) {
            state.state = RunnerState::Finished;
        }
    }

    /// Wait for the simulation thread to complete
    pub fn join(mut self) -> Result<(), String> {
        if let Some(handle) = self.thread_handle.take() {
            handle.join().map_err(|_| "Thread panicked".to_string())?;
        }
        Ok(())
    }
}

impl Drop for SimulationRunner {
    fn drop(&mut self) {
        // Set state to Finished to signal thread to exit
        if let Ok(mut state) = self.shared.lock() {
            if matches!(
                state.state,
                RunnerState::Created | RunnerState::Running | RunnerState::Paused
            ) {
                state.state = RunnerState::Finished;
            }
        }
    }
}

/// Main simulation loop executed in background thread
fn run_simulation_loop(
    kernel: &mut dyn FluidKernel,
    shared: Arc<Mutex<SharedState>>,
    settings: RunSettings,
) {
    // Wait for start signal
    loop {
        let state = {
            let guard = shared.lock().unwrap();
            guard.state.clone()
        };

        match state {
            RunnerState::Created => {
                // Wait a bit and check again
                thread::sleep(Duration::from_millis(10));
            }
            RunnerState::Running => break,
            _ => return, // Exit if finished or error
        }
    }

    let start_wall_time = Instant::now();
    let dt = settings.time_step;
    let mut sim_time = 0.0_f64;
    let mut timestep_count = 0_u64;
    let mut last_stats = StepStats::default();

    loop {
        // Check state
        let current_state = {
            let guard = shared.lock().unwrap();
            guard.state.clone()
        };

        match current_state {
            RunnerState::Running => {
                let stats = match kernel.step(&settings.params, dt) {
                    Ok(stats) => stats,
                    Err(e) => {
                        tracing::error!("Simulation step {} failed: {}", timestep_count + 1, e);
                        let mut guard = shared.lock().unwrap();
                        guard.state = RunnerState::Error;
                        guard.error_message = Some(e.to_string());
                        break;
                    }
                };

                // Update counters
                sim_time += dt as f64;
                timestep_count += 1;
                last_stats = stats;

                // Publish the completed frame
                let frame = Arc::new(FrameSnapshot::capture(kernel, timestep_count, sim_time, stats));
                {
                    let mut guard = shared.lock().unwrap();
                    guard.sim_time = sim_time;
                    guard.timestep_count = timestep_count;
                    guard.latest_frame = Some(frame);
                }

                // Check stopping conditions
                if let Some(max_steps) = settings.max_timesteps {
                    if timestep_count >= max_steps {
                        tracing::info!(
                            "Simulation finished: reached max_timesteps = {}",
                            max_steps
                        );
                        let mut guard = shared.lock().unwrap();
                        guard.state = RunnerState::Finished;
                        break;
                    }
                }

                if let Some(max_t) = settings.max_time {
                    if sim_time >= max_t {
                        tracing::info!(
                            "Simulation finished: reached max_time = {:.3}s",
                            max_t
                        );
                        let mut guard = shared.lock().unwrap();
                        guard.state = RunnerState::Finished;
                        break;
                    }
                }

                // Log progress periodically
                if timestep_count % 100 == 0 {
                    let wall_time = start_wall_time.elapsed().as_secs_f64();
                    tracing::debug!(
                        "Step {}: sim_time={:.4}s, max_density={:.4}, max_speed={:.3}, triangles={}, wall_time={:.2}s",
                        timestep_count,
                        sim_time,
                        stats.max_density,
                        stats.max_speed,
                        stats.triangle_count,
                        wall_time,
                    );
                }
            }
            RunnerState::Paused => {
                // Wait while paused
                thread::sleep(Duration::from_millis(50));
            }
            RunnerState::Finished | RunnerState::Error => {
                // Exit loop
                break;
            }
            RunnerState::Created => {
                // Shouldn't happen, but treat as finished
                break;
            }
        }
    }

    tracing::info!(
        "Simulation thread exiting: {} timesteps, {:.4}s simulated, mean density {:.4}, {:.2}s wall",
        timestep_count,
        sim_time,
        last_stats.mean_density,
        start_wall_time.elapsed().as_secs_f64(),
    );
}
