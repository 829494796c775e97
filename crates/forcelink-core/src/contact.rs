//! Penalty-based contact forces between a spherical tool and a simulated shape.
//!
//! The tool is a small sphere of radius `tool_radius` centred on the device
//! position. Each shape defines a *free-space boundary*: the set of tool
//! centres that just touch the shape. The signed distance to that boundary is
//! the penetration depth; when it is negative the tool is pushed back out by a
//! linear spring:
//!
//! ```text
//! F = -d · k · n        (d < 0)
//! F = 0                 (d ≥ 0)
//! ```
//!
//! where `n` is the unit vector from the nearest boundary reference point to
//! the tool. No damping is applied to the contact force.
//!
//! # Shapes
//!
//! - **Sphere**: reference point is the sphere centre, boundary radius is
//!   `radius + tool_radius`.
//! - **Torus**: the tool is expressed in the torus frame, projected onto the
//!   torus plane and pushed out to the medial circle (`outer_radius`). The
//!   boundary is a tube of radius `inner_radius + tool_radius` around that
//!   circle.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::types::BodyPose;
use crate::{NORMAL_EPSILON, POSITION_EPSILON_SQ};

/// Geometry of the shape the tool collides with.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContactShape {
    /// Solid sphere centred on the body origin.
    Sphere {
        /// Sphere radius (m).
        radius: f64,
    },
    /// Torus lying in the body's local XY plane.
    Torus {
        /// Radius of the medial circle (m).
        outer_radius: f64,
        /// Radius of the tube around the medial circle (m).
        inner_radius: f64,
    },
}

/// Result of evaluating the contact model for one tool position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contact {
    /// Restoring force on the tool in world coordinates (N).
    pub force: Vector3<f64>,
    /// Signed distance to the free-space boundary (m); negative inside.
    pub penetration: f64,
    /// Tool position projected onto the free-space boundary when in contact,
    /// otherwise the tool position itself.
    pub proxy: Vector3<f64>,
}

impl Contact {
    /// No contact: zero force, proxy at the tool.
    #[must_use]
    pub fn free(tool: Vector3<f64>, penetration: f64) -> Self {
        Self {
            force: Vector3::zeros(),
            penetration,
            proxy: tool,
        }
    }

    /// Whether the tool is pushing into the shape.
    #[must_use]
    pub fn in_contact(&self) -> bool {
        self.penetration < 0.0 && self.force.norm_squared() > 0.0
    }
}

/// Linear-spring contact model for a single shape.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContactModel {
    /// Shape geometry.
    pub shape: ContactShape,
    /// Radius of the spherical tool (m).
    pub tool_radius: f64,
    /// Spring stiffness (N/m).
    pub stiffness: f64,
    /// Multiplier applied to the spring force before output.
    #[serde(default = "default_force_scale")]
    pub force_scale: f64,
}

fn default_force_scale() -> f64 {
    1.0
}

impl ContactModel {
    /// Create a contact model with unit force scale.
    #[must_use]
    pub fn new(shape: ContactShape, tool_radius: f64, stiffness: f64) -> Self {
        Self {
            shape,
            tool_radius,
            stiffness,
            force_scale: 1.0,
        }
    }

    /// Scale the output force (e.g. `0.1` to soften a remote device).
    #[must_use]
    pub fn with_force_scale(mut self, scale: f64) -> Self {
        self.force_scale = scale;
        self
    }

    /// Radius of the free-space boundary around the shape's reference curve.
    #[must_use]
    pub fn boundary_radius(&self) -> f64 {
        match self.shape {
            ContactShape::Sphere { radius } => radius + self.tool_radius,
            ContactShape::Torus { inner_radius, .. } => inner_radius + self.tool_radius,
        }
    }

    /// Evaluate the contact force for a tool at `tool` (world coordinates)
    /// against the shape placed at `pose`.
    #[must_use]
    pub fn evaluate(&self, tool: &Vector3<f64>, pose: &BodyPose) -> Contact {
        match self.shape {
            ContactShape::Sphere { .. } => self.evaluate_sphere(tool, pose),
            ContactShape::Torus { outer_radius, .. } => {
                self.evaluate_torus(tool, pose, outer_radius)
            }
        }
    }

    fn evaluate_sphere(&self, tool: &Vector3<f64>, pose: &BodyPose) -> Contact {
        let delta = tool - pose.position;
        let distance = delta.norm();
        let boundary = self.boundary_radius();
        let penetration = distance - boundary;

        // Written positively so NaN input lands in free space
        let pushing = penetration < 0.0 && distance > NORMAL_EPSILON;
        if !pushing {
            return Contact::free(*tool, penetration);
        }

        let normal = delta / distance;
        Contact {
            force: self.spring(penetration) * normal,
            penetration,
            proxy: pose.position + boundary * normal,
        }
    }

    fn evaluate_torus(&self, tool: &Vector3<f64>, pose: &BodyPose, outer_radius: f64) -> Contact {
        let local = pose.to_local(tool);
        let off_centre = local.norm_squared() > POSITION_EPSILON_SQ;
        if !off_centre {
            return Contact::free(*tool, f64::INFINITY);
        }

        // Nearest point on the medial circle
        let projection = Vector3::new(local.x, local.y, 0.0);
        let projection_norm = projection.norm();
        let off_axis = projection_norm * projection_norm > POSITION_EPSILON_SQ;
        if !off_axis {
            return Contact::free(*tool, f64::INFINITY);
        }
        let axis_point = projection * (outer_radius / projection_norm);

        let offset = local - axis_point;
        let distance = offset.norm();
        let boundary = self.boundary_radius();
        let penetration = distance - boundary;

        let pushing = penetration < 0.0 && distance > NORMAL_EPSILON;
        if !pushing {
            return Contact::free(*tool, penetration);
        }

        let normal = offset / distance;
        let force_local = self.spring(penetration) * normal;
        let proxy_local = axis_point + boundary * normal;

        Contact {
            force: pose.rotate_to_world(&force_local),
            penetration,
            proxy: pose.to_world(&proxy_local),
        }
    }

    /// Spring force magnitude for a (negative) penetration depth.
    fn spring(&self, penetration: f64) -> f64 {
        -penetration * self.stiffness * self.force_scale
    }
}
