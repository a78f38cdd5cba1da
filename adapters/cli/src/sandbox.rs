//! Minimal falling-body simulation used as the physics host of the CLI.
//!
//! Bodies fall under gravity onto a ground plane, lose energy on every bounce and
//! fall asleep once they have rested for a short while. Sleeping bodies are reported
//! as inactive, which is what the harness samples.

use std::collections::HashMap;

use glam::Vec3;
use physics_stress_core::{ActivityQuery, BodyFactory, BodyHandle, SpawnPose};

const GRAVITY: f32 = -981.0;
const BODY_RADIUS: f32 = 50.0;
const RESTITUTION: f32 = 0.35;
const GROUND_FRICTION: f32 = 0.8;
const REST_SPEED: f32 = 60.0;
const SLEEP_SPEED: f32 = 5.0;
const SLEEP_DELAY_SECONDS: f32 = 0.5;
const MAX_STEP_SECONDS: f32 = 1.0 / 60.0;

#[derive(Clone, Copy, Debug)]
struct Body {
    position: Vec3,
    velocity: Vec3,
    calm_seconds: f32,
    asleep: bool,
}

impl Body {
    fn at(position: Vec3) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            calm_seconds: 0.0,
            asleep: false,
        }
    }

    fn integrate(&mut self, step: f32) {
        if self.asleep {
            return;
        }

        self.velocity.y += GRAVITY * step;
        self.position += self.velocity * step;

        let grounded = self.position.y <= BODY_RADIUS;
        if grounded {
            self.position.y = BODY_RADIUS;
            if self.velocity.y < 0.0 {
                self.velocity.y = -self.velocity.y * RESTITUTION;
                self.velocity.x *= GROUND_FRICTION;
                self.velocity.z *= GROUND_FRICTION;
            }
            if self.velocity.y < REST_SPEED {
                self.velocity.y = 0.0;
            }
        }

        if grounded && self.velocity.length() < SLEEP_SPEED {
            self.calm_seconds += step;
            if self.calm_seconds >= SLEEP_DELAY_SECONDS {
                self.asleep = true;
                self.velocity = Vec3::ZERO;
            }
        } else {
            self.calm_seconds = 0.0;
        }
    }
}

/// In-process physics host with an optional body limit.
#[derive(Debug, Default)]
pub(crate) struct Sandbox {
    bodies: HashMap<BodyHandle, Body>,
    next_id: u64,
    capacity: Option<usize>,
}

impl Sandbox {
    /// Creates an empty sandbox that refuses spawns beyond `capacity` live bodies.
    pub(crate) fn new(capacity: Option<usize>) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Advances every awake body by `delta_seconds`, split into bounded sub-steps.
    pub(crate) fn step(&mut self, delta_seconds: f32) {
        if !(delta_seconds.is_finite() && delta_seconds > 0.0) {
            return;
        }

        let substeps = (delta_seconds / MAX_STEP_SECONDS).ceil().max(1.0) as u32;
        let step = delta_seconds / substeps as f32;
        for body in self.bodies.values_mut() {
            for _ in 0..substeps {
                body.integrate(step);
            }
        }
    }

    /// Number of bodies currently alive.
    pub(crate) fn live_count(&self) -> usize {
        self.bodies.len()
    }

    /// Number of live bodies that fell asleep.
    pub(crate) fn sleeping_count(&self) -> usize {
        self.bodies.values().filter(|body| body.asleep).count()
    }
}

impl BodyFactory for Sandbox {
    fn spawn(&mut self, pose: SpawnPose) -> Option<BodyHandle> {
        if self
            .capacity
            .is_some_and(|capacity| self.bodies.len() >= capacity)
        {
            return None;
        }

        self.next_id += 1;
        let handle = BodyHandle::new(self.next_id);
        let _ = self.bodies.insert(handle, Body::at(pose.position));
        Some(handle)
    }

    fn destroy(&mut self, handle: BodyHandle) {
        let _ = self.bodies.remove(&handle);
    }
}

impl ActivityQuery for Sandbox {
    fn is_active(&self, handle: BodyHandle) -> Option<bool> {
        self.bodies.get(&handle).map(|body| !body.asleep)
    }
}

#[cfg(test)]
mod tests {
    use glam::Quat;

    use super::*;

    fn pose(height: f32) -> SpawnPose {
        SpawnPose {
            position: Vec3::new(0.0, height, 0.0),
            rotation: Quat::IDENTITY,
        }
    }

    #[test]
    fn dropped_bodies_eventually_sleep() {
        let mut sandbox = Sandbox::new(None);
        let handle = sandbox.spawn(pose(500.0)).expect("spawn");
        assert_eq!(sandbox.is_active(handle), Some(true));

        for _ in 0..600 {
            sandbox.step(1.0 / 60.0);
        }

        assert_eq!(sandbox.is_active(handle), Some(false));
        assert_eq!(sandbox.sleeping_count(), 1);
    }

    #[test]
    fn falling_bodies_stay_active() {
        let mut sandbox = Sandbox::new(None);
        let handle = sandbox.spawn(pose(5_000.0)).expect("spawn");

        sandbox.step(0.5);

        assert_eq!(sandbox.is_active(handle), Some(true));
    }

    #[test]
    fn destroyed_bodies_no_longer_resolve() {
        let mut sandbox = Sandbox::new(None);
        let handle = sandbox.spawn(pose(100.0)).expect("spawn");

        sandbox.destroy(handle);

        assert_eq!(sandbox.is_active(handle), None);
        assert_eq!(sandbox.live_count(), 0);
    }

    #[test]
    fn capacity_limits_spawns() {
        let mut sandbox = Sandbox::new(Some(2));
        assert!(sandbox.spawn(pose(100.0)).is_some());
        assert!(sandbox.spawn(pose(100.0)).is_some());
        assert!(sandbox.spawn(pose(100.0)).is_none());
        assert_eq!(sandbox.live_count(), 2);
    }

    #[test]
    fn degenerate_steps_are_ignored() {
        let mut sandbox = Sandbox::new(None);
        let handle = sandbox.spawn(pose(300.0)).expect("spawn");

        sandbox.step(0.0);
        sandbox.step(f32::NAN);

        assert_eq!(sandbox.bodies[&handle].position.y, 300.0);
    }
}
