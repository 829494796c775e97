//! Rotational dynamics of a body the tool can push around.
//!
//! The body is pinned at its origin and only rotates. Each step integrates the
//! reaction torque of the contact force, applies viscous damping, and rotates
//! the orientation by the resulting angular velocity in the world frame:
//!
//! ```text
//! ω ← ω − (Δt / M) · ((x − c) × F)
//! ω ← ω · max(0, 1 − Kv·Δt)
//! R ← Rot(ω/‖ω‖, ‖ω‖) · R          if ‖ω‖ > ε
//! ```
//!
//! The rotation angle is `‖ω‖` per step, so the visual spin rate follows the
//! loop rate.

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::types::BodyPose;
use crate::ANGULAR_REST_EPSILON;

/// Inertial parameters of a [`RigidBody`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigidBodyConfig {
    /// Scalar rotational inertia `M`.
    pub inertia: f64,
    /// Viscous damping coefficient `Kv` (1/s).
    pub damping: f64,
}

impl Default for RigidBodyConfig {
    fn default() -> Self {
        Self {
            inertia: 1000.0,
            damping: 1.0,
        }
    }
}

impl RigidBodyConfig {
    /// Largest step for which `1 − Kv·Δt` stays non-negative.
    ///
    /// Returns `None` when there is no damping.
    pub fn max_stable_dt(&self) -> Option<f64> {
        (self.damping > 0.0).then(|| 1.0 / self.damping)
    }

    /// Per-step velocity multiplier for a step of `dt` seconds.
    pub fn damping_factor(&self, dt: f64) -> f64 {
        (1.0 - self.damping * dt).max(0.0)
    }
}

/// A body rotating about a fixed centre.
#[derive(Clone, Debug, PartialEq)]
pub struct RigidBody {
    pose: BodyPose,
    angular_velocity: Vector3<f64>,
    config: RigidBodyConfig,
}

impl RigidBody {
    /// Body at `pose`, at rest.
    #[must_use]
    pub fn new(pose: BodyPose, config: RigidBodyConfig) -> Self {
        Self {
            pose,
            angular_velocity: Vector3::zeros(),
            config,
        }
    }

    /// Start with a given angular velocity.
    #[must_use]
    pub fn with_angular_velocity(mut self, omega: Vector3<f64>) -> Self {
        self.angular_velocity = omega;
        self
    }

    /// Current pose.
    pub fn pose(&self) -> &BodyPose {
        &self.pose
    }

    /// Current orientation.
    pub fn orientation(&self) -> UnitQuaternion<f64> {
        self.pose.orientation
    }

    /// Current angular velocity (rad per step).
    pub fn angular_velocity(&self) -> Vector3<f64> {
        self.angular_velocity
    }

    /// Inertial parameters.
    pub fn config(&self) -> &RigidBodyConfig {
        &self.config
    }

    /// Stop the body dead.
    pub fn halt(&mut self) {
        self.angular_velocity = Vector3::zeros();
    }

    /// Advance one step.
    ///
    /// `contact_point` is where `force` acts on the tool (world coordinates);
    /// the body receives the reaction. When `halt` is set the velocity is
    /// zeroed and nothing else happens this step.
    pub fn update(&mut self, dt: f64, contact_point: &Vector3<f64>, force: &Vector3<f64>, halt: bool) {
        if halt {
            self.halt();
            return;
        }

        let lever = contact_point - self.pose.position;
        let torque = lever.cross(force);
        self.angular_velocity -= torque * (dt / self.config.inertia);

        self.angular_velocity *= self.config.damping_factor(dt);

        if self.angular_velocity.norm() > ANGULAR_REST_EPSILON {
            let step = UnitQuaternion::from_scaled_axis(self.angular_velocity);
            self.pose.orientation = step * self.pose.orientation;
            self.pose.orientation.renormalize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body() -> RigidBody {
        RigidBody::new(BodyPose::identity(), RigidBodyConfig::default())
    }

    #[test]
    fn test_geometric_decay_without_force() {
        let dt = 0.001;
        let mut body = body().with_angular_velocity(Vector3::new(0.0, 0.0, 1e-3));

        for _ in 0..100 {
            body.update(dt, &Vector3::zeros(), &Vector3::zeros(), false);
        }

        let expected = 1e-3 * 0.999_f64.powi(100);
        assert!((body.angular_velocity().norm() - expected).abs() < 1e-15);
        // Direction is preserved
        assert!(body.angular_velocity().x.abs() < 1e-18);
    }

    #[test]
    fn test_orientation_unchanged_at_rest() {
        let start = BodyPose::from_axis_angle(Vector3::zeros(), Vector3::new(0.0, 1.0, -1.0), 0.8);
        let mut body = RigidBody::new(start, RigidBodyConfig::default())
            .with_angular_velocity(Vector3::new(5e-11, 0.0, 0.0));

        body.update(0.001, &Vector3::zeros(), &Vector3::zeros(), false);
        assert_eq!(body.orientation(), start.orientation);
    }

    #[test]
    fn test_halt_zeroes_velocity() {
        let mut body = body().with_angular_velocity(Vector3::new(0.1, 0.2, 0.3));
        let before = body.orientation();

        body.update(0.001, &Vector3::new(0.05, 0.0, 0.0), &Vector3::new(0.0, 10.0, 0.0), true);

        assert_eq!(body.angular_velocity(), Vector3::zeros());
        assert_eq!(body.orientation(), before);
    }

    #[test]
    fn test_torque_direction() {
        let mut body = body();
        // Tool pushed +y at +x: reaction on the body spins it about -z
        body.update(0.001, &Vector3::new(0.05, 0.0, 0.0), &Vector3::new(0.0, 10.0, 0.0), false);

        let omega = body.angular_velocity();
        let expected = -(0.001 / 1000.0) * 0.5 * 0.999;
        assert!((omega.z - expected).abs() < 1e-15);
        assert!(omega.x.abs() < 1e-18 && omega.y.abs() < 1e-18);
    }

    #[test]
    fn test_rotation_applied_in_world_frame() {
        let mut body = RigidBody::new(
            BodyPose::from_axis_angle(Vector3::zeros(), Vector3::x(), 0.3),
            RigidBodyConfig {
                inertia: 1.0,
                damping: 0.0,
            },
        )
        .with_angular_velocity(Vector3::new(0.0, 0.0, 0.2));

        let before = body.orientation();
        body.update(0.001, &Vector3::zeros(), &Vector3::zeros(), false);

        let expected = UnitQuaternion::from_scaled_axis(Vector3::new(0.0, 0.0, 0.2)) * before;
        assert!(body.orientation().angle_to(&expected) < 1e-12);
    }

    #[test]
    fn test_damping_factor_clamped() {
        let config = RigidBodyConfig {
            inertia: 1.0,
            damping: 100.0,
        };
        assert_eq!(config.damping_factor(0.05), 0.0);
        assert_eq!(config.max_stable_dt(), Some(0.01));

        let mut body = RigidBody::new(BodyPose::identity(), config)
            .with_angular_velocity(Vector3::new(1.0, 0.0, 0.0));
        body.update(0.05, &Vector3::zeros(), &Vector3::zeros(), false);
        assert_eq!(body.angular_velocity(), Vector3::zeros());
    }
}
