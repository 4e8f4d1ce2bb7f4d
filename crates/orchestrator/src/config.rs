//! Configuration parsing and validation for SPH simulations

use fluid_kernel::{Backend, ObstacleBox, SimParams, SpawnLayout, SurfaceSettings};
use serde::{Deserialize, Serialize};
use std::fs;

/// Main simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Human-readable simulation name
    pub name: String,
    /// Number of fluid particles to spawn
    pub particle_count: usize,
    /// Initial particle placement
    #[serde(default)]
    pub spawn: SpawnLayout,
    /// Execution backend
    #[serde(default)]
    pub backend: BackendType,
    /// Kernel support radius; also the neighbor grid cell size
    #[serde(default = "default_smoothing_length")]
    pub smoothing_length: f32,
    /// Density at which pressure is zero
    #[serde(default = "default_rest_density")]
    pub rest_density: f32,
    /// Equation-of-state stiffness
    #[serde(default = "default_stiffness")]
    pub stiffness: f32,
    /// Viscosity coefficient
    #[serde(default = "default_viscosity")]
    pub viscosity: f32,
    /// Gravity magnitude along -y
    #[serde(default = "default_gravity")]
    pub gravity: f32,
    /// Per-particle mass
    #[serde(default = "default_molar_mass")]
    pub molar_mass: f32,
    /// Velocity scale applied on collision
    #[serde(default = "default_collision_damping")]
    pub collision_damping: f32,
    /// Particle collision radius
    #[serde(default = "default_particle_radius")]
    pub particle_radius: f32,
    /// Simulation bounds
    pub bounds: BoundsConfig,
    /// Optional interior obstacle box
    #[serde(default)]
    pub obstacle: Option<ObstacleBox>,
    /// Optional surface extraction
    #[serde(default)]
    pub surface: Option<SurfaceSettings>,
    /// Fixed time step (seconds)
    #[serde(default = "default_time_step")]
    pub time_step: f32,
    /// Stop after this many timesteps
    pub max_timesteps: Option<u64>,
    /// Stop after this much simulated time (seconds)
    pub max_time: Option<f64>,
}

/// Backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendType {
    /// Single-threaded stages over the hash grid
    Sequential,
    /// Rayon stages over the sorted key table
    DataParallel,
    /// Data-parallel when more than one core is available
    #[default]
    Auto,
}

impl BackendType {
    /// Resolve to a concrete kernel backend.
    pub fn resolve(self) -> Backend {
        match self {
            BackendType::Sequential => Backend::Sequential,
            BackendType::DataParallel => Backend::DataParallel,
            BackendType::Auto => {
                let cores = std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1);
                if cores > 1 {
                    Backend::DataParallel
                } else {
                    Backend::Sequential
                }
            }
        }
    }
}

/// Axis-aligned simulation bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundsConfig {
    /// Box center [x, y, z]
    pub center: [f32; 3],
    /// Full box size [x, y, z]
    pub size: [f32; 3],
}

// Default values
fn default_smoothing_length() -> f32 {
    0.35
}

fn default_rest_density() -> f32 {
    1.0
}

fn default_stiffness() -> f32 {
    2.0
}

fn default_viscosity() -> f32 {
    0.5
}

fn default_gravity() -> f32 {
    9.8
}

fn default_molar_mass() -> f32 {
    0.018
}

fn default_collision_damping() -> f32 {
    0.5
}

fn default_particle_radius() -> f32 {
    0.05
}

fn default_time_step() -> f32 {
    1.0 / 120.0
}

impl SimulationConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &str) -> Result<Self, String> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path, e))?;

        let config: SimulationConfig = serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse config JSON: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.particle_count == 0 {
            return Err("particle_count must be at least 1".to_string());
        }

        if !(self.time_step.is_finite() && self.time_step > 0.0) {
            return Err("time_step must be positive".to_string());
        }

        if self.max_timesteps.is_none() && self.max_time.is_none() {
            return Err("one of max_timesteps or max_time must be set".to_string());
        }

        if let Some(max_timesteps) = self.max_timesteps {
            if max_timesteps == 0 {
                return Err("max_timesteps must be at least 1".to_string());
            }
        }

        if let Some(max_time) = self.max_time {
            if max_time <= 0.0 {
                return Err("max_time must be positive".to_string());
            }
        }

        if !(self.spawn.size.is_finite() && self.spawn.size >= 0.0) {
            return Err("spawn.size must be non-negative".to_string());
        }

        // Physics parameters share the kernel's checks
        self.to_params().validate().map_err(|e| e.to_string())
    }

    /// Per-step kernel parameters described by this configuration
    pub fn to_params(&self) -> SimParams {
        SimParams {
            smoothing_length: self.smoothing_length,
            rest_density: self.rest_density,
            stiffness: self.stiffness,
            viscosity: self.viscosity,
            gravity: self.gravity,
            molar_mass: self.molar_mass,
            collision_damping: self.collision_damping,
            particle_radius: self.particle_radius,
            bounds_center: self.bounds.center,
            bounds_size: self.bounds.size,
            obstacle: self.obstacle,
            surface: self.surface,
        }
    }
}
