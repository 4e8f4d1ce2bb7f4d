//! Simulation parameters, fixed for the duration of one step.

use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Axis-aligned box obstacle placed inside the simulation bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObstacleBox {
    /// Box center (world units).
    pub center: [f32; 3],
    /// Half the box size along each axis.
    pub half_extents: [f32; 3],
}

impl ObstacleBox {
    /// Minimum corner.
    pub fn min(&self) -> [f32; 3] {
        [
            self.center[0] - self.half_extents[0],
            self.center[1] - self.half_extents[1],
            self.center[2] - self.half_extents[2],
        ]
    }

    /// Maximum corner.
    pub fn max(&self) -> [f32; 3] {
        [
            self.center[0] + self.half_extents[0],
            self.center[1] + self.half_extents[1],
            self.center[2] + self.half_extents[2],
        ]
    }

    /// Radius of the sphere that gates the per-axis collision test.
    ///
    /// This is the length of the full size vector, so it over-covers the box
    /// by a factor of two.
    pub fn bounding_radius(&self) -> f32 {
        let [hx, hy, hz] = self.half_extents;
        2.0 * (hx * hx + hy * hy + hz * hz).sqrt()
    }
}

/// Which scalar source the mesher triangulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceMode {
    /// Gaussian-splatted lattice field covering the whole bounds.
    Dense,
    /// Per-cell averaged particle density taken from the spatial hash grid.
    Sparse,
}

/// Surface extraction settings. When absent, no mesh is produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceSettings {
    /// Scalar source for the mesher.
    #[serde(default = "default_surface_mode")]
    pub mode: SurfaceMode,
    /// Corner values strictly above this are inside the surface.
    #[serde(default = "default_iso_threshold")]
    pub iso_threshold: f32,
    /// Gaussian radius for the dense field; the smoothing length when unset.
    #[serde(default)]
    pub splat_radius: Option<f32>,
    /// Append a reversed-winding copy so both faces render.
    #[serde(default = "default_true")]
    pub double_sided: bool,
}

fn default_surface_mode() -> SurfaceMode {
    SurfaceMode::Dense
}

fn default_iso_threshold() -> f32 {
    0.5
}

fn default_true() -> bool {
    true
}

impl Default for SurfaceSettings {
    fn default() -> Self {
        Self {
            mode: default_surface_mode(),
            iso_threshold: default_iso_threshold(),
            splat_radius: None,
            double_sided: true,
        }
    }
}

/// Per-step simulation parameters.
///
/// The cell size of every grid in the pipeline equals `smoothing_length`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimParams {
    /// Kernel support radius `h`; also the hash-grid cell size.
    pub smoothing_length: f32,
    /// Density at which pressure is zero.
    pub rest_density: f32,
    /// Linear equation-of-state stiffness `k` in `P = k (rho - rho0)`.
    pub stiffness: f32,
    /// Viscosity coefficient `mu`.
    pub viscosity: f32,
    /// Magnitude of gravity along -y.
    pub gravity: f32,
    /// Per-particle mass used in density summation.
    pub molar_mass: f32,
    /// Velocity scale applied (with sign flip) on collision.
    pub collision_damping: f32,
    /// Particle collision radius; bounds and obstacle faces are inset by it.
    pub particle_radius: f32,
    /// Center of the simulation bounds.
    pub bounds_center: [f32; 3],
    /// Full size of the simulation bounds.
    pub bounds_size: [f32; 3],
    /// Optional interior box obstacle.
    #[serde(default)]
    pub obstacle: Option<ObstacleBox>,
    /// Optional surface extraction after each step.
    #[serde(default)]
    pub surface: Option<SurfaceSettings>,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            smoothing_length: 1.0,
            rest_density: 0.2,
            stiffness: 2.0,
            viscosity: 0.5,
            gravity: 9.8,
            molar_mass: 0.018,
            collision_damping: 1.0,
            particle_radius: 0.1,
            bounds_center: [0.0; 3],
            bounds_size: [10.0; 3],
            obstacle: None,
            surface: None,
        }
    }
}

impl SimParams {
    /// Hash-grid cell size.
    pub fn cell_size(&self) -> f32 {
        self.smoothing_length
    }

    /// Minimum corner of the bounds.
    pub fn bounds_min(&self) -> [f32; 3] {
        [
            self.bounds_center[0] - 0.5 * self.bounds_size[0],
            self.bounds_center[1] - 0.5 * self.bounds_size[1],
            self.bounds_center[2] - 0.5 * self.bounds_size[2],
        ]
    }

    /// Maximum corner of the bounds.
    pub fn bounds_max(&self) -> [f32; 3] {
        [
            self.bounds_center[0] + 0.5 * self.bounds_size[0],
            self.bounds_center[1] + 0.5 * self.bounds_size[1],
            self.bounds_center[2] + 0.5 * self.bounds_size[2],
        ]
    }

    /// Check that the parameters cannot cause division by zero or an
    /// unbounded loop.
    pub fn validate(&self) -> Result<(), SimError> {
        let h = self.smoothing_length;
        if !(h.is_finite() && h > 0.0) {
            return Err(SimError::InvalidSmoothingLength(h));
        }
        if self.bounds_size.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(SimError::InvalidBounds(self.bounds_size));
        }

        non_negative("rest_density", self.rest_density)?;
        finite("stiffness", self.stiffness)?;
        non_negative("viscosity", self.viscosity)?;
        finite("gravity", self.gravity)?;
        non_negative("collision_damping", self.collision_damping)?;
        non_negative("particle_radius", self.particle_radius)?;
        if !(self.molar_mass.is_finite() && self.molar_mass > 0.0) {
            return Err(SimError::InvalidParameter {
                name: "molar_mass",
                value: self.molar_mass,
            });
        }
        if self.bounds_center.iter().any(|c| !c.is_finite()) {
            return Err(SimError::InvalidBounds(self.bounds_size));
        }

        if let Some(obstacle) = &self.obstacle {
            for &e in &obstacle.half_extents {
                if !(e.is_finite() && e > 0.0) {
                    return Err(SimError::InvalidParameter {
                        name: "obstacle.half_extents",
                        value: e,
                    });
                }
            }
        }

        if let Some(surface) = &self.surface {
            finite("surface.iso_threshold", surface.iso_threshold)?;
            if let Some(r) = surface.splat_radius {
                if !(r.is_finite() && r > 0.0) {
                    return Err(SimError::InvalidParameter {
                        name: "surface.splat_radius",
                        value: r,
                    });
                }
            }
        }

        Ok(())
    }
}

fn finite(name: &'static str, value: f32) -> Result<(), SimError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SimError::InvalidParameter { name, value })
    }
}

fn non_negative(name: &'static str, value: f32) -> Result<(), SimError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SimError::InvalidParameter { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SimParams::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_smoothing_length() {
        let mut params = SimParams::default();
        params.smoothing_length = 0.0;
        assert_eq!(
            params.validate(),
            Err(SimError::InvalidSmoothingLength(0.0))
        );
        params.smoothing_length = -1.0;
        assert!(params.validate().is_err());
        params.smoothing_length = f32::NAN;
        assert!(params.validate().is_err());
    }

    #[test]
    fn rejects_flat_bounds() {
        let mut params = SimParams::default();
        params.bounds_size = [10.0, 0.0, 10.0];
        assert!(matches!(params.validate(), Err(SimError::InvalidBounds(_))));
    }

    #[test]
    fn rejects_degenerate_obstacle() {
        let mut params = SimParams::default();
        params.obstacle = Some(ObstacleBox {
            center: [0.0; 3],
            half_extents: [1.0, 0.0, 1.0],
        });
        assert!(params.validate().is_err());
    }

    #[test]
    fn bounds_corners() {
        let params = SimParams {
            bounds_center: [1.0, 2.0, 3.0],
            bounds_size: [2.0, 4.0, 6.0],
            ..SimParams::default()
        };
        assert_eq!(params.bounds_min(), [0.0, 0.0, 0.0]);
        assert_eq!(params.bounds_max(), [2.0, 4.0, 6.0]);
    }

    #[test]
    fn obstacle_bounding_radius_covers_full_size() {
        let obstacle = ObstacleBox {
            center: [0.0; 3],
            half_extents: [1.0, 2.0, 2.0],
        };
        assert!((obstacle.bounding_radius() - 6.0).abs() < 1.0e-6);
        assert_eq!(obstacle.min(), [-1.0, -2.0, -2.0]);
        assert_eq!(obstacle.max(), [1.0, 2.0, 2.0]);
    }

    #[test]
    fn surface_settings_fill_defaults_from_json() {
        let s: SurfaceSettings = serde_json::from_str(r#"{ "mode": "Sparse" }"#).unwrap();
        assert_eq!(s.mode, SurfaceMode::Sparse);
        assert_eq!(s.iso_threshold, 0.5);
        assert!(s.double_sided);
        assert!(s.splat_radius.is_none());
    }
}
