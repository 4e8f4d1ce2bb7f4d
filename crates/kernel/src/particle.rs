//! Particle data structures using struct-of-arrays layout.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Initial particle layout: a jittered cubic lattice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnLayout {
    /// Center of the spawn cube.
    pub center: [f32; 3],
    /// Side length of the spawn cube.
    pub size: f32,
    /// Radius of the random displacement applied to every lattice point.
    #[serde(default)]
    pub jitter: f32,
    /// Velocity every particle starts with.
    #[serde(default)]
    pub start_velocity: [f32; 3],
    /// RNG seed for the jitter.
    #[serde(default)]
    pub seed: u64,
}

impl Default for SpawnLayout {
    fn default() -> Self {
        Self {
            center: [0.0; 3],
            size: 4.0,
            jitter: 0.05,
            start_velocity: [0.0; 3],
            seed: 0,
        }
    }
}

/// Struct-of-arrays particle storage.
///
/// All arrays are parallel: index `i` across every array refers to the same
/// particle. The count is fixed once allocated.
#[derive(Debug, Clone, Default)]
pub struct ParticleArrays {
    // ---- Positions ----
    /// X positions
    pub x: Vec<f32>,
    /// Y positions
    pub y: Vec<f32>,
    /// Z positions
    pub z: Vec<f32>,

    // ---- Velocities ----
    /// X velocities
    pub vx: Vec<f32>,
    /// Y velocities
    pub vy: Vec<f32>,
    /// Z velocities
    pub vz: Vec<f32>,

    // ---- Accumulated forces ----
    /// X force
    pub fx: Vec<f32>,
    /// Y force
    pub fy: Vec<f32>,
    /// Z force
    pub fz: Vec<f32>,

    // ---- Scalar fields ----
    /// Density (always >= 0)
    pub density: Vec<f32>,
    /// Pressure (signed)
    pub pressure: Vec<f32>,
}

impl ParticleArrays {
    /// Create an empty particle collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty collection with room for `n` particles.
    pub fn with_capacity(n: usize) -> Self {
        Self {
            x: Vec::with_capacity(n),
            y: Vec::with_capacity(n),
            z: Vec::with_capacity(n),
            vx: Vec::with_capacity(n),
            vy: Vec::with_capacity(n),
            vz: Vec::with_capacity(n),
            fx: Vec::with_capacity(n),
            fy: Vec::with_capacity(n),
            fz: Vec::with_capacity(n),
            density: Vec::with_capacity(n),
            pressure: Vec::with_capacity(n),
        }
    }

    /// Place `count` particles on a jittered lattice.
    ///
    /// The lattice has `ceil(cbrt(count))` points per axis spanning a cube of
    /// side `layout.size`; filling stops once `count` particles exist.
    pub fn jittered_lattice(count: usize, layout: &SpawnLayout) -> Result<Self, SimError> {
        if count == 0 {
            return Err(SimError::InvalidParticleCount(count));
        }
        if !(layout.size.is_finite() && layout.size >= 0.0) {
            return Err(SimError::InvalidParameter {
                name: "spawn.size",
                value: layout.size,
            });
        }
        if !(layout.jitter.is_finite() && layout.jitter >= 0.0) {
            return Err(SimError::InvalidParameter {
                name: "spawn.jitter",
                value: layout.jitter,
            });
        }

        let per_axis = lattice_points_per_axis(count);
        let mut rng = StdRng::seed_from_u64(layout.seed);
        let mut particles = Self::with_capacity(count);
        let [vx, vy, vz] = layout.start_velocity;

        'fill: for ix in 0..per_axis {
            for iy in 0..per_axis {
                for iz in 0..per_axis {
                    if particles.len() == count {
                        break 'fill;
                    }
                    let t = [
                        lattice_fraction(ix, per_axis),
                        lattice_fraction(iy, per_axis),
                        lattice_fraction(iz, per_axis),
                    ];
                    let jitter = random_in_unit_sphere(&mut rng);
                    let p = [
                        (t[0] - 0.5) * layout.size + layout.center[0] + jitter[0] * layout.jitter,
                        (t[1] - 0.5) * layout.size + layout.center[1] + jitter[1] * layout.jitter,
                        (t[2] - 0.5) * layout.size + layout.center[2] + jitter[2] * layout.jitter,
                    ];
                    particles.push_particle(p, [vx, vy, vz]);
                }
            }
        }

        tracing::debug!(
            count,
            per_axis,
            size = layout.size,
            jitter = layout.jitter,
            "spawned jittered particle lattice"
        );
        Ok(particles)
    }

    /// Return the number of particles currently stored.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Return `true` if there are no particles.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Append a single particle. Force, density and pressure start at zero.
    pub fn push_particle(&mut self, position: [f32; 3], velocity: [f32; 3]) {
        self.x.push(position[0]);
        self.y.push(position[1]);
        self.z.push(position[2]);
        self.vx.push(velocity[0]);
        self.vy.push(velocity[1]);
        self.vz.push(velocity[2]);
        self.fx.push(0.0);
        self.fy.push(0.0);
        self.fz.push(0.0);
        self.density.push(0.0);
        self.pressure.push(0.0);
    }

    /// Position of particle `i`.
    #[inline]
    pub fn position(&self, i: usize) -> [f32; 3] {
        [self.x[i], self.y[i], self.z[i]]
    }

    /// Velocity of particle `i`.
    #[inline]
    pub fn velocity(&self, i: usize) -> [f32; 3] {
        [self.vx[i], self.vy[i], self.vz[i]]
    }

    /// Accumulated force on particle `i`.
    #[inline]
    pub fn force(&self, i: usize) -> [f32; 3] {
        [self.fx[i], self.fy[i], self.fz[i]]
    }

    /// All positions as packed triples.
    pub fn positions(&self) -> Vec<[f32; 3]> {
        (0..self.len()).map(|i| self.position(i)).collect()
    }

    /// All velocities as packed triples.
    pub fn velocities(&self) -> Vec<[f32; 3]> {
        (0..self.len()).map(|i| self.velocity(i)).collect()
    }

    /// `true` when every position and velocity component is finite.
    pub fn is_finite(&self) -> bool {
        [&self.x, &self.y, &self.z, &self.vx, &self.vy, &self.vz]
            .iter()
            .all(|a| a.iter().all(|v| v.is_finite()))
    }

    /// Panic if any parallel array disagrees in length with `x`.
    pub fn assert_consistent(&self) {
        let n = self.x.len();
        assert_eq!(self.y.len(), n, "y length mismatch");
        assert_eq!(self.z.len(), n, "z length mismatch");
        assert_eq!(self.vx.len(), n, "vx length mismatch");
        assert_eq!(self.vy.len(), n, "vy length mismatch");
        assert_eq!(self.vz.len(), n, "vz length mismatch");
        assert_eq!(self.fx.len(), n, "fx length mismatch");
        assert_eq!(self.fy.len(), n, "fy length mismatch");
        assert_eq!(self.fz.len(), n, "fz length mismatch");
        assert_eq!(self.density.len(), n, "density length mismatch");
        assert_eq!(self.pressure.len(), n, "pressure length mismatch");
    }
}

/// Smallest lattice edge count whose cube holds `count` points.
fn lattice_points_per_axis(count: usize) -> usize {
    let mut per_axis = (count as f64).cbrt().round() as usize;
    while per_axis.pow(3) < count {
        per_axis += 1;
    }
    per_axis.max(1)
}

fn lattice_fraction(i: usize, per_axis: usize) -> f32 {
    if per_axis <= 1 {
        0.5
    } else {
        i as f32 / (per_axis - 1) as f32
    }
}

fn random_in_unit_sphere(rng: &mut StdRng) -> [f32; 3] {
    loop {
        let v = [
            rng.random_range(-1.0f32..=1.0),
            rng.random_range(-1.0f32..=1.0),
            rng.random_range(-1.0f32..=1.0),
        ];
        if v[0] * v[0] + v[1] * v[1] + v[2] * v[2] <= 1.0 {
            return v;
        }
    }
}
