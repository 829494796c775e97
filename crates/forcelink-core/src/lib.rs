//! Forcelink Core - haptic rendering math and wire types
//!
//! This crate holds everything the haptic control loop computes, without any
//! I/O: contact forces against simulated shapes, the startup safety gate, the
//! rotational dynamics of a grabbable body, and the telemetry packet codec used
//! to mirror loop state into a separate renderer process.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Haptic Loop Iteration                            │
//! │                                                                         │
//! │  tool position ──▶ ┌──────────────┐ ──▶ ┌────────────┐ ──▶ ┌─────────┐  │
//! │                    │ ContactModel │     │ RigidBody  │     │ Safety  │  │
//! │                    │ sphere/torus │     │ (torus)    │     │ Gate    │  │
//! │                    └──────────────┘     └────────────┘     └────┬────┘  │
//! │                                                                 │       │
//! │                                   force command ◀───────────────┘       │
//! │                                   TelemetryPacket / RenderSnapshot      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`types`]: Poses, tool state, force commands and the render snapshot
//! - [`contact`]: Penalty-based contact forces for sphere and torus shapes
//! - [`safety`]: One-way arming gate for force output
//! - [`dynamics`]: Rotational dynamics of the torus body
//! - [`scene`]: Scene configuration and validation
//! - [`telemetry`]: ASCII datagram codec for loop state
//!
//! # Example
//!
//! ```rust
//! use forcelink_core::contact::{ContactModel, ContactShape};
//! use forcelink_core::types::BodyPose;
//! use nalgebra::Vector3;
//!
//! let model = ContactModel::new(ContactShape::Sphere { radius: 0.03 }, 0.005, 1000.0);
//! let contact = model.evaluate(&Vector3::new(0.02, 0.0, 0.0), &BodyPose::identity());
//!
//! assert!((contact.force.norm() - 15.0).abs() < 1e-9);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod contact;
pub mod dynamics;
pub mod safety;
pub mod scene;
pub mod telemetry;
pub mod types;

pub use contact::{Contact, ContactModel, ContactShape};
pub use dynamics::{RigidBody, RigidBodyConfig};
pub use safety::{SafetyGate, SafetyState};
pub use scene::{Scene, SceneConfig, SceneError};
pub use telemetry::{TelemetryPacket, TelemetryParseError};
pub use types::{BodyPose, ForceCommand, RenderSnapshot, ToolState};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Squared norm below which a position is treated as coincident with a
/// shape's reference point.
pub const POSITION_EPSILON_SQ: f64 = 1e-10;

/// Distance below which a contact normal is considered numerically unstable.
pub const NORMAL_EPSILON: f64 = 1e-6;

/// Angular speed (rad per step) below which the body is considered at rest.
pub const ANGULAR_REST_EPSILON: f64 = 1e-10;
