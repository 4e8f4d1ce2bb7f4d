//! Error type for simulation construction and stepping.

/// Error returned when a simulation refuses to start or step.
///
/// Only degenerate configuration is reported here. Numeric hazards with a
/// documented default (zero neighbor density, absent grid cells) are handled
/// in place, and array-length mismatches are programming errors that panic.
#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    /// Particle count was zero.
    InvalidParticleCount(usize),
    /// Smoothing length was zero, negative or not finite.
    InvalidSmoothingLength(f32),
    /// Time step was negative or not finite.
    InvalidTimeStep(f32),
    /// Bounds size was non-positive on at least one axis.
    InvalidBounds([f32; 3]),
    /// Some other parameter was outside its valid range.
    InvalidParameter {
        /// Parameter name as it appears in `SimParams`.
        name: &'static str,
        /// Offending value.
        value: f32,
    },
}

impl std::fmt::Display for SimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimError::InvalidParticleCount(n) => {
                write!(f, "particle count must be at least 1, got {n}")
            }
            SimError::InvalidSmoothingLength(h) => {
                write!(f, "smoothing length must be positive and finite, got {h}")
            }
            SimError::InvalidTimeStep(dt) => {
                write!(f, "time step must be non-negative and finite, got {dt}")
            }
            SimError::InvalidBounds(size) => write!(
                f,
                "bounds size must be positive on every axis, got [{}, {}, {}]",
                size[0], size[1], size[2]
            ),
            SimError::InvalidParameter { name, value } => {
                write!(f, "parameter `{name}` out of range: {value}")
            }
        }
    }
}

impl std::error::Error for SimError {}
