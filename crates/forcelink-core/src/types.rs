//! Core data types shared by the control loop and its observers.

use nalgebra::{Rotation3, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::safety::SafetyState;

/// Position and orientation of a simulated body in world coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BodyPose {
    /// Body origin (m).
    pub position: Vector3<f64>,
    /// Body orientation.
    pub orientation: UnitQuaternion<f64>,
}

impl BodyPose {
    /// Pose at the world origin with no rotation.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
        }
    }

    /// Create a pose from a position and a rotation of `angle_rad` about `axis`.
    ///
    /// A zero-length axis yields no rotation.
    #[must_use]
    pub fn from_axis_angle(position: Vector3<f64>, axis: Vector3<f64>, angle_rad: f64) -> Self {
        let orientation = Unit::try_new(axis, crate::NORMAL_EPSILON)
            .map_or_else(UnitQuaternion::identity, |axis| {
                UnitQuaternion::from_axis_angle(&axis, angle_rad)
            });

        Self {
            position,
            orientation,
        }
    }

    /// Express a world point in the body's local frame.
    #[must_use]
    pub fn to_local(&self, world: &Vector3<f64>) -> Vector3<f64> {
        self.orientation.inverse_transform_vector(&(world - self.position))
    }

    /// Express a local point in world coordinates.
    #[must_use]
    pub fn to_world(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.orientation.transform_vector(local) + self.position
    }

    /// Rotate a local direction into world coordinates (no translation).
    #[must_use]
    pub fn rotate_to_world(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.orientation.transform_vector(local)
    }
}

impl Default for BodyPose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Sampled state of the device tool.
///
/// Velocity is not stored; it is implicit in consecutive samples.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolState {
    /// Tool position in the device frame (m).
    pub position: Vector3<f64>,
    /// Orientation frame for wristed devices (identity for 3-DOF devices).
    pub orientation: Option<Rotation3<f64>>,
}

impl ToolState {
    /// Tool at a position with no orientation information.
    #[must_use]
    pub fn at(position: Vector3<f64>) -> Self {
        Self {
            position,
            orientation: None,
        }
    }
}

impl Default for ToolState {
    fn default() -> Self {
        Self::at(Vector3::zeros())
    }
}

/// Output commanded to the actuators for one iteration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForceCommand {
    /// Force on the tool (N).
    pub force: Vector3<f64>,
    /// Gripper force magnitude (N); ignored by devices without a gripper.
    pub gripper: f64,
}

impl ForceCommand {
    /// No force at all.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            force: Vector3::zeros(),
            gripper: 0.0,
        }
    }

    /// Force on the tool with no gripper force.
    #[must_use]
    pub fn from_force(force: Vector3<f64>) -> Self {
        Self {
            force,
            gripper: 0.0,
        }
    }

    /// True when both the force and the gripper force are exactly zero.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_zero(&self) -> bool {
        self.force.iter().all(|c| *c == 0.0) && self.gripper == 0.0
    }
}

impl Default for ForceCommand {
    fn default() -> Self {
        Self::zero()
    }
}

/// Read-only view of the loop state handed to renderers.
///
/// Published once per control loop iteration, or once per received telemetry
/// packet on the renderer side of a split setup.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderSnapshot {
    /// Iteration that produced this snapshot.
    pub iteration: u64,
    /// Raw tool position (m).
    pub tool_position: Vector3<f64>,
    /// Tool orientation frame, for wristed devices.
    pub tool_orientation: Option<Rotation3<f64>>,
    /// Tool position projected onto the free-space boundary (m).
    pub proxy_position: Vector3<f64>,
    /// Contact force before gating (N).
    pub contact_force: Vector3<f64>,
    /// Orientation of the dynamic body, if the scene has one.
    pub body_orientation: Option<UnitQuaternion<f64>>,
    /// Gate state when the snapshot was taken.
    pub safety_state: SafetyState,
}

impl Default for RenderSnapshot {
    fn default() -> Self {
        Self {
            iteration: 0,
            tool_position: Vector3::zeros(),
            tool_orientation: None,
            proxy_position: Vector3::zeros(),
            contact_force: Vector3::zeros(),
            body_orientation: None,
            safety_state: SafetyState::Arming,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_pose_round_trip() {
        let pose = BodyPose::from_axis_angle(
            Vector3::new(0.1, -0.2, 0.3),
            Vector3::new(0.0, 1.0, -1.0),
            0.7,
        );
        let world = Vector3::new(0.05, 0.02, -0.01);
        let back = pose.to_world(&pose.to_local(&world));

        assert!((back - world).norm() < 1e-12);
    }

    #[test]
    fn test_pose_zero_axis_is_identity() {
        let pose = BodyPose::from_axis_angle(Vector3::zeros(), Vector3::zeros(), 1.0);
        assert_eq!(pose.orientation, UnitQuaternion::identity());
    }

    #[test]
    fn test_rotate_to_world() {
        let pose = BodyPose::from_axis_angle(Vector3::zeros(), Vector3::z(), FRAC_PI_2);
        let rotated = pose.rotate_to_world(&Vector3::x());

        assert!((rotated - Vector3::y()).norm() < 1e-12);
    }

    #[test]
    fn test_force_command_zero() {
        assert!(ForceCommand::zero().is_zero());
        assert!(!ForceCommand::from_force(Vector3::new(0.0, 1e-12, 0.0)).is_zero());

        let gripper_only = ForceCommand {
            force: Vector3::zeros(),
            gripper: 0.5,
        };
        assert!(!gripper_only.is_zero());
    }
}
