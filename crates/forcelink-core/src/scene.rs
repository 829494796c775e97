//! Scene description: which shape the tool touches and how it moves.
//!
//! A torus scene has a dynamic body that the tool can spin; a sphere scene is
//! static.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::contact::{Contact, ContactModel, ContactShape};
use crate::dynamics::{RigidBody, RigidBodyConfig};
use crate::types::BodyPose;

// ============================================================================
// Errors
// ============================================================================

/// Invalid scene parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SceneError {
    /// A parameter that must be strictly positive was not.
    #[error("{name} must be positive, got {value}")]
    NonPositive {
        /// Parameter name as it appears in configuration
        name: &'static str,
        /// Offending value
        value: f64,
    },

    /// Torus tube radius does not fit inside the ring.
    #[error("torus inner radius {inner} must be smaller than outer radius {outer}")]
    InnerExceedsOuter {
        /// Tube radius
        inner: f64,
        /// Ring radius
        outer: f64,
    },

    /// A parameter that must be non-negative was negative.
    #[error("{name} must not be negative, got {value}")]
    Negative {
        /// Parameter name as it appears in configuration
        name: &'static str,
        /// Offending value
        value: f64,
    },
}

// ============================================================================
// Configuration
// ============================================================================

/// Scene parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Shape geometry.
    pub shape: ContactShape,
    /// Radius of the spherical tool (m).
    pub tool_radius: f64,
    /// Contact spring stiffness (N/m).
    pub stiffness: f64,
    /// Multiplier applied to the contact force.
    pub force_scale: f64,
    /// Fixed body centre (m).
    pub body_position: Vector3<f64>,
    /// Axis of the initial body rotation.
    pub initial_axis: Vector3<f64>,
    /// Angle of the initial body rotation (degrees).
    pub initial_angle_deg: f64,
    /// Inertia and damping of the dynamic body (torus only).
    pub dynamics: RigidBodyConfig,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self::torus()
    }
}

impl SceneConfig {
    /// Spinning torus tilted 45° about (0, 1, −1).
    #[must_use]
    pub fn torus() -> Self {
        Self {
            shape: ContactShape::Torus {
                outer_radius: 0.05,
                inner_radius: 0.027,
            },
            tool_radius: 0.005,
            stiffness: 1000.0,
            force_scale: 1.0,
            body_position: Vector3::zeros(),
            initial_axis: Vector3::new(0.0, 1.0, -1.0),
            initial_angle_deg: 45.0,
            dynamics: RigidBodyConfig::default(),
        }
    }

    /// Static sphere of radius 3 cm at the origin.
    #[must_use]
    pub fn sphere() -> Self {
        Self {
            shape: ContactShape::Sphere { radius: 0.03 },
            tool_radius: 0.005,
            stiffness: 1000.0,
            force_scale: 1.0,
            body_position: Vector3::zeros(),
            initial_axis: Vector3::z(),
            initial_angle_deg: 0.0,
            dynamics: RigidBodyConfig::default(),
        }
    }

    /// Whether the body rotates in response to contact.
    pub fn is_dynamic(&self) -> bool {
        matches!(self.shape, ContactShape::Torus { .. })
    }

    /// Initial body pose.
    pub fn initial_pose(&self) -> BodyPose {
        BodyPose::from_axis_angle(
            self.body_position,
            self.initial_axis,
            self.initial_angle_deg.to_radians(),
        )
    }

    /// Contact model for this scene.
    pub fn contact_model(&self) -> ContactModel {
        ContactModel::new(self.shape, self.tool_radius, self.stiffness)
            .with_force_scale(self.force_scale)
    }

    /// Check that every parameter is physically meaningful.
    ///
    /// # Errors
    ///
    /// Returns the first invalid parameter found.
    pub fn validate(&self) -> Result<(), SceneError> {
        match self.shape {
            ContactShape::Sphere { radius } => positive("shape.radius", radius)?,
            ContactShape::Torus {
                outer_radius,
                inner_radius,
            } => {
                positive("shape.outer_radius", outer_radius)?;
                positive("shape.inner_radius", inner_radius)?;
                if inner_radius >= outer_radius {
                    return Err(SceneError::InnerExceedsOuter {
                        inner: inner_radius,
                        outer: outer_radius,
                    });
                }
            }
        }

        positive("tool_radius", self.tool_radius)?;
        positive("stiffness", self.stiffness)?;
        positive("force_scale", self.force_scale)?;

        if self.is_dynamic() {
            positive("dynamics.inertia", self.dynamics.inertia)?;
            if self.dynamics.damping < 0.0 || self.dynamics.damping.is_nan() {
                return Err(SceneError::Negative {
                    name: "dynamics.damping",
                    value: self.dynamics.damping,
                });
            }
        }

        Ok(())
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), SceneError> {
    // NaN fails the comparison as well
    if value > 0.0 {
        Ok(())
    } else {
        Err(SceneError::NonPositive { name, value })
    }
}

// ============================================================================
// Scene
// ============================================================================

/// A shape placed in the world, optionally free to rotate.
#[derive(Clone, Debug)]
pub struct Scene {
    model: ContactModel,
    pose: BodyPose,
    body: Option<RigidBody>,
}

impl Scene {
    /// Build a scene from validated parameters.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError`] if the configuration is invalid.
    pub fn new(config: &SceneConfig) -> Result<Self, SceneError> {
        config.validate()?;

        let pose = config.initial_pose();
        let body = config
            .is_dynamic()
            .then(|| RigidBody::new(pose, config.dynamics));

        Ok(Self {
            model: config.contact_model(),
            pose,
            body,
        })
    }

    /// Contact model in use.
    pub fn model(&self) -> &ContactModel {
        &self.model
    }

    /// Current body pose.
    pub fn pose(&self) -> BodyPose {
        self.body.as_ref().map_or(self.pose, |body| *body.pose())
    }

    /// Dynamic body, if the scene has one.
    pub fn body(&self) -> Option<&RigidBody> {
        self.body.as_ref()
    }

    /// Evaluate contact for `tool` and advance the body by `dt` seconds.
    ///
    /// The body receives the reaction to the ungated contact force, applied
    /// at the proxy point. `halt` stops the body for this step.
    pub fn step(&mut self, dt: f64, tool: &Vector3<f64>, halt: bool) -> Contact {
        let contact = self.model.evaluate(tool, &self.pose());

        if let Some(body) = self.body.as_mut() {
            // Free contacts carry no torque; the proxy may be a raw bad sample
            let point = if contact.in_contact() {
                contact.proxy
            } else {
                body.pose().position
            };
            body.update(dt, &point, &contact.force, halt);
        }

        contact
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid_torus() {
        let config = SceneConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.is_dynamic());
        assert!(!SceneConfig::sphere().is_dynamic());
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        let mut config = SceneConfig::sphere();
        config.shape = ContactShape::Sphere { radius: 0.0 };
        assert!(matches!(
            config.validate(),
            Err(SceneError::NonPositive { name: "shape.radius", .. })
        ));

        let mut config = SceneConfig::torus();
        config.shape = ContactShape::Torus {
            outer_radius: 0.02,
            inner_radius: 0.03,
        };
        assert!(matches!(config.validate(), Err(SceneError::InnerExceedsOuter { .. })));

        let mut config = SceneConfig::torus();
        config.stiffness = -5.0;
        assert!(config.validate().is_err());

        let mut config = SceneConfig::torus();
        config.dynamics.inertia = 0.0;
        assert!(config.validate().is_err());

        let mut config = SceneConfig::torus();
        config.tool_radius = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sphere_scene_is_static() {
        let mut scene = Scene::new(&SceneConfig::sphere()).unwrap();
        let before = scene.pose();

        let contact = scene.step(0.001, &Vector3::new(0.02, 0.0, 0.0), false);

        assert!((contact.force.norm() - 15.0).abs() < 1e-9);
        assert!(scene.body().is_none());
        assert_eq!(scene.pose(), before);
    }

    #[test]
    fn test_torus_scene_spins_on_contact() {
        let mut config = SceneConfig::torus();
        config.initial_angle_deg = 0.0;
        let mut scene = Scene::new(&config).unwrap();

        // Push against the side of the tube, off the body centre
        let tool = Vector3::new(0.05, 0.0, 0.01);
        let contact = scene.step(0.001, &tool, false);
        assert!(contact.in_contact());

        let body = scene.body().unwrap();
        assert!(body.angular_velocity().norm() > 0.0);
    }

    #[test]
    fn test_halt_zeroes_angular_velocity() {
        let mut config = SceneConfig::torus();
        config.initial_angle_deg = 0.0;
        let mut scene = Scene::new(&config).unwrap();
        let tool = Vector3::new(0.05, 0.0, 0.01);

        scene.step(0.001, &tool, false);
        assert!(scene.body().unwrap().angular_velocity().norm() > 0.0);

        scene.step(0.001, &tool, true);
        assert_eq!(scene.body().unwrap().angular_velocity(), Vector3::zeros());
    }

    #[test]
    fn test_non_finite_tool_leaves_body_untouched() {
        let mut scene = Scene::new(&SceneConfig::torus()).unwrap();
        let before = scene.pose();

        let contact = scene.step(0.001, &Vector3::new(f64::NAN, 0.0, 0.0), false);

        assert_eq!(contact.force, Vector3::zeros());
        let body = scene.body().unwrap();
        assert_eq!(body.angular_velocity(), Vector3::zeros());
        assert_eq!(scene.pose(), before);
    }
}
