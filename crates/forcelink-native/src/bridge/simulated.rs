//! Scripted device for running without hardware.
//!
//! The tool sweeps radially in and out between two radii while the sweep plane
//! turns slowly about the vertical axis, so it repeatedly enters and leaves
//! the shape. Time advances by a fixed step per position read, which keeps the
//! trajectory identical from run to run regardless of loop pacing.

use std::f64::consts::TAU;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use forcelink_core::types::ForceCommand;

use super::device::{ButtonState, DeviceError, DeviceInfo, DeviceKind, DeviceResult, HapticDevice};

/// Trajectory parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedConfig {
    /// Centre of the sweep (m)
    pub center: Vector3<f64>,
    /// Closest approach to the centre (m)
    pub min_radius: f64,
    /// Farthest point from the centre (m); the tool starts here
    pub max_radius: f64,
    /// Time for one in-and-out sweep (s)
    pub sweep_period_s: f64,
    /// Time for the sweep plane to turn once (s)
    pub turn_period_s: f64,
    /// Height oscillation amplitude (m)
    pub height: f64,
    /// Simulated time per position read (s)
    pub step_s: f64,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            center: Vector3::zeros(),
            min_radius: 0.02,
            max_radius: 0.12,
            sweep_period_s: 4.0,
            turn_period_s: 30.0,
            height: 0.01,
            step_s: 0.001,
        }
    }
}

impl SimulatedConfig {
    /// Tool position at simulated time `t` seconds.
    pub fn position_at(&self, t: f64) -> Vector3<f64> {
        // Cosine sweep starts at max_radius, in free space
        let sweep = 0.5 * (1.0 + (TAU * t / self.sweep_period_s).cos());
        let radius = self.min_radius + (self.max_radius - self.min_radius) * sweep;
        let azimuth = TAU * t / self.turn_period_s;
        let z = self.height * (TAU * t / self.sweep_period_s).sin();

        self.center + Vector3::new(radius * azimuth.cos(), radius * azimuth.sin(), z)
    }
}

/// Device following [`SimulatedConfig`]'s trajectory.
#[derive(Debug)]
pub struct SimulatedDevice {
    config: SimulatedConfig,
    open: bool,
    force_enabled: bool,
    reads: u64,
    last_command: ForceCommand,
    commands_sent: u64,
    nonzero_commands: u64,
    max_force: f64,
}

impl SimulatedDevice {
    /// Create a closed device.
    pub fn new(config: SimulatedConfig) -> Self {
        Self {
            config,
            open: false,
            force_enabled: false,
            reads: 0,
            last_command: ForceCommand::zero(),
            commands_sent: 0,
            nonzero_commands: 0,
            max_force: 0.0,
        }
    }

    /// Simulated time elapsed (s).
    #[allow(clippy::cast_precision_loss)]
    pub fn elapsed_s(&self) -> f64 {
        self.reads as f64 * self.config.step_s
    }

    /// Most recent commanded force.
    pub fn last_command(&self) -> ForceCommand {
        self.last_command
    }

    /// Number of force commands received.
    pub fn commands_sent(&self) -> u64 {
        self.commands_sent
    }

    /// Number of non-zero force commands received.
    pub fn nonzero_commands(&self) -> u64 {
        self.nonzero_commands
    }

    /// Largest force magnitude commanded so far (N).
    pub fn max_force(&self) -> f64 {
        self.max_force
    }

    /// Whether actuator output is enabled.
    pub fn force_enabled(&self) -> bool {
        self.force_enabled
    }
}

impl HapticDevice for SimulatedDevice {
    fn open(&mut self) -> DeviceResult<DeviceInfo> {
        self.open = true;
        self.reads = 0;
        Ok(self.info())
    }

    fn close(&mut self) -> DeviceResult<()> {
        self.ensure_open()?;
        self.open = false;
        self.force_enabled = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn enable_force(&mut self, enable: bool) -> DeviceResult<()> {
        self.ensure_open()?;
        self.force_enabled = enable;
        Ok(())
    }

    fn position(&mut self) -> DeviceResult<Vector3<f64>> {
        self.ensure_open()?;
        let position = self.config.position_at(self.elapsed_s());
        self.reads += 1;
        Ok(position)
    }

    fn set_force(&mut self, force: &Vector3<f64>) -> DeviceResult<()> {
        self.set_force_and_gripper(force, 0.0)
    }

    fn set_force_and_gripper(&mut self, force: &Vector3<f64>, gripper: f64) -> DeviceResult<()> {
        if !self.open {
            return Err(DeviceError::NotOpen);
        }

        let command = ForceCommand {
            force: *force,
            gripper,
        };
        if !command.is_zero() {
            self.nonzero_commands += 1;
        }
        self.max_force = self.max_force.max(force.norm());
        self.last_command = command;
        self.commands_sent += 1;
        Ok(())
    }

    fn button(&mut self, _index: usize) -> ButtonState {
        ButtonState::Released
    }

    fn system_name(&self) -> String {
        "simulated".to_string()
    }

    fn sdk_version(&self) -> String {
        forcelink_core::VERSION.to_string()
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::Simulate
    }
}
