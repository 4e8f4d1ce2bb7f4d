//! Collision response against the simulation bounds and an interior box.
//!
//! Both tests are per-axis and position-only: a particle found past a face
//! is snapped back to it and the matching velocity component is flipped and
//! scaled by the collision damping. There is no swept test, so a fast
//! particle can still tunnel through a thin obstacle or clip a box corner.

use crate::exec::LaneExecutor;
use crate::params::{ObstacleBox, SimParams};
use crate::particle::ParticleArrays;

/// Per-step collision resolver built from [`SimParams`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryResolver {
    bounds_min: [f32; 3],
    bounds_max: [f32; 3],
    particle_radius: f32,
    damping: f32,
    obstacle: Option<ObstacleBox>,
}

impl BoundaryResolver {
    /// Capture the bounds, particle radius, damping and obstacle of `params`.
    pub fn from_params(params: &SimParams) -> Self {
        Self {
            bounds_min: params.bounds_min(),
            bounds_max: params.bounds_max(),
            particle_radius: params.particle_radius,
            damping: params.collision_damping,
            obstacle: params.obstacle,
        }
    }

    /// Clamp a particle inside the bounds, inset by the particle radius.
    ///
    /// On each axis independently the lower face is tested first; the upper
    /// face is only tested when the lower one did not fire.
    pub fn resolve_bounds(&self, position: &mut [f32; 3], velocity: &mut [f32; 3]) {
        let r = self.particle_radius;
        for axis in 0..3 {
            let lo = self.bounds_min[axis];
            let hi = self.bounds_max[axis];
            if position[axis] - r < lo {
                position[axis] = lo + r;
                velocity[axis] *= -self.damping;
            } else if position[axis] + r > hi {
                position[axis] = hi - r;
                velocity[axis] *= -self.damping;
            }
        }
    }

    /// Push a particle out of the obstacle box, if one is configured.
    ///
    /// Only particles within the obstacle's bounding radius of its center are
    /// tested. On each axis, a particle lying between a face (inset by the
    /// particle radius) and the center is moved just outside that face. Its
    /// velocity component is reflected only while it still points into the box.
    pub fn resolve_obstacle(&self, position: &mut [f32; 3], velocity: &mut [f32; 3]) {
        let Some(obstacle) = self.obstacle else {
            return;
        };

        let c = obstacle.center;
        let dx = position[0] - c[0];
        let dy = position[1] - c[1];
        let dz = position[2] - c[2];
        if (dx * dx + dy * dy + dz * dz).sqrt() > obstacle.bounding_radius() {
            return;
        }

        let r = self.particle_radius;
        let box_min = obstacle.min();
        let box_max = obstacle.max();
        for axis in 0..3 {
            let p = position[axis];
            if p >= box_min[axis] + r && p < c[axis] {
                position[axis] = box_min[axis] - r;
                if velocity[axis] > 0.0 {
                    velocity[axis] *= -self.damping;
                }
            } else if p <= box_max[axis] - r && p > c[axis] {
                position[axis] = box_max[axis] + r;
                if velocity[axis] < 0.0 {
                    velocity[axis] *= -self.damping;
                }
            }
        }
    }

    /// Bounds first, then the obstacle.
    pub fn resolve(&self, position: &mut [f32; 3], velocity: &mut [f32; 3]) {
        self.resolve_bounds(position, velocity);
        self.resolve_obstacle(position, velocity);
    }

    /// Resolve every particle in place.
    pub fn resolve_all<E: LaneExecutor>(&self, exec: &E, particles: &mut ParticleArrays) {
        let snapshot: &ParticleArrays = particles;
        let resolved = exec.map_lanes(snapshot.len(), |i| {
            let mut p = snapshot.position(i);
            let mut v = snapshot.velocity(i);
            self.resolve(&mut p, &mut v);
            (p, v)
        });

        for (i, (p, v)) in resolved.into_iter().enumerate() {
            particles.x[i] = p[0];
            particles.y[i] = p[1];
            particles.z[i] = p[2];
            particles.vx[i] = v[0];
            particles.vy[i] = v[1];
            particles.vz[i] = v[2];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(obstacle: Option<ObstacleBox>) -> BoundaryResolver {
        BoundaryResolver::from_params(&SimParams {
            bounds_center: [0.0; 3],
            bounds_size: [10.0; 3],
            particle_radius: 0.1,
            collision_damping: 0.5,
            obstacle,
            ..SimParams::default()
        })
    }

    #[test]
    fn floor_hit_clamps_and_reflects() {
        let b = resolver(None);
        let mut p = [0.0, -5.05, 0.0];
        let mut v = [1.0, -2.0, 0.0];
        b.resolve_bounds(&mut p, &mut v);
        assert!((p[1] - -4.9).abs() < 1.0e-6, "{p:?}");
        assert_eq!(v, [1.0, 1.0, 0.0]);
    }

    #[test]
    fn ceiling_hit_clamps_and_reflects() {
        let b = resolver(None);
        let mut p = [0.0, 0.0, 4.95];
        let mut v = [0.0, 0.0, 3.0];
        b.resolve_bounds(&mut p, &mut v);
        assert!((p[2] - 4.9).abs() < 1.0e-6, "{p:?}");
        assert_eq!(v[2], -1.5);
    }

    #[test]
    fn interior_particle_untouched() {
        let b = resolver(None);
        let mut p = [1.0, 2.0, -3.0];
        let mut v = [0.4, -0.2, 0.1];
        b.resolve(&mut p, &mut v);
        assert_eq!(p, [1.0, 2.0, -3.0]);
        assert_eq!(v, [0.4, -0.2, 0.1]);
    }

    #[test]
    fn obstacle_pushes_out_of_nearer_face() {
        let b = resolver(Some(ObstacleBox {
            center: [0.0; 3],
            half_extents: [1.0; 3],
        }));
        // Inside the box on the -x side, moving toward +x.
        let mut p = [-0.5, 0.0, 0.0];
        let mut v = [2.0, 0.0, 0.0];
        b.resolve_obstacle(&mut p, &mut v);
        assert!((p[0] - -1.1).abs() < 1.0e-6, "{p:?}");
        assert_eq!(v[0], -1.0);
    }

    #[test]
    fn obstacle_keeps_velocity_moving_away() {
        let b = resolver(Some(ObstacleBox {
            center: [0.0; 3],
            half_extents: [1.0; 3],
        }));
        let mut p = [0.0, 0.5, 0.0];
        let mut v = [0.0, 3.0, 0.0];
        b.resolve_obstacle(&mut p, &mut v);
        assert!((p[1] - 1.1).abs() < 1.0e-6, "{p:?}");
        assert_eq!(v[1], 3.0);
    }

    #[test]
    fn obstacle_ignores_distant_particles() {
        let b = resolver(Some(ObstacleBox {
            center: [0.0; 3],
            half_extents: [0.5; 3],
        }));
        // Bounding radius is 2 * |(0.5, 0.5, 0.5)| ~= 1.73.
        let mut p = [-2.0, -0.2, 0.0];
        let mut v = [1.0, 0.0, 0.0];
        b.resolve_obstacle(&mut p, &mut v);
        assert_eq!(p, [-2.0, -0.2, 0.0]);
        assert_eq!(v, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn resolve_all_matches_per_particle() {
        let b = resolver(None);
        let mut particles = ParticleArrays::new();
        particles.push_particle([0.0, -6.0, 0.0], [0.0, -1.0, 0.0]);
        particles.push_particle([0.0, 0.0, 0.0], [0.0, -1.0, 0.0]);
        b.resolve_all(&crate::exec::SequentialExecutor, &mut particles);
        assert!((particles.y[0] - -4.9).abs() < 1.0e-6);
        assert_eq!(particles.vy[0], 0.5);
        assert_eq!(particles.y[1], 0.0);
    }
}
