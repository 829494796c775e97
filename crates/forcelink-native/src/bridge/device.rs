//! Haptic device abstraction.
//!
//! Every device the control loop can drive implements [`HapticDevice`]. The
//! contract mirrors the vendor SDK: the device must be opened before any other
//! call, positions are in meters in the device frame, and forces are in
//! newtons. Commanding a non-zero force before the tool reaches free space is
//! prevented by the caller, not by the device.
//!
//! # Variants
//!
//! | kind       | backend                                              |
//! |------------|------------------------------------------------------|
//! | `simulate` | scripted trajectory, no hardware ([`SimulatedDevice`]) |
//! | `emulate`  | host pointer and keyboard input ([`EmulatedDevice`])   |
//! | `dhd`      | Force Dimension SDK loaded at runtime (`dhd` feature)  |

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::emulated::{EmulatedConfig, EmulatedDevice, HostInput};
use super::simulated::{SimulatedConfig, SimulatedDevice};

// ============================================================================
// Error Types
// ============================================================================

/// Errors reported by a haptic device.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// A call was made before `open()` or after `close()`
    #[error("Device is not open")]
    NotOpen,

    /// The device could not be opened
    #[error("Failed to open device: {0}")]
    OpenFailed(String),

    /// Reading device state failed
    #[error("Failed to read {what}: {reason}")]
    Read {
        /// Quantity being read (e.g. "position")
        what: &'static str,
        /// Reason reported by the backend
        reason: String,
    },

    /// Commanding force failed
    #[error("Failed to command force: {0}")]
    Write(String),

    /// Loading or binding the vendor library failed
    #[error("Device library error: {0}")]
    Library(String),

    /// The requested backend is not compiled into this build
    #[error("Device kind `{0}` is not available in this build")]
    Unsupported(DeviceKind),
}

/// Result type for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

// ============================================================================
// Device Information
// ============================================================================

/// State of a device button.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonState {
    /// Not pressed
    #[default]
    Released,
    /// Held down
    Pressed,
}

impl ButtonState {
    /// Whether the button is held down.
    pub fn is_pressed(self) -> bool {
        self == Self::Pressed
    }
}

impl From<bool> for ButtonState {
    fn from(pressed: bool) -> Self {
        if pressed {
            Self::Pressed
        } else {
            Self::Released
        }
    }
}

/// Capabilities reported by an opened device.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Backend that produced this device
    pub kind: DeviceKind,
    /// Human-readable device name
    pub system_name: String,
    /// Backend or SDK version
    pub sdk_version: String,
    /// Device reports an orientation frame
    pub has_wrist: bool,
    /// Device has a gripper
    pub has_gripper: bool,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] sdk {} wrist={} gripper={}",
            self.system_name, self.kind, self.sdk_version, self.has_wrist, self.has_gripper
        )
    }
}

// ============================================================================
// Device Trait
// ============================================================================

/// Capability boundary over a physical or simulated haptic device.
pub trait HapticDevice: Send {
    /// Open the device. Must succeed before any other call.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::OpenFailed`] or [`DeviceError::Library`].
    fn open(&mut self) -> DeviceResult<DeviceInfo>;

    /// Release the device.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::NotOpen`] if the device was never opened.
    fn close(&mut self) -> DeviceResult<()>;

    /// Whether `open()` has succeeded and `close()` has not been called.
    fn is_open(&self) -> bool;

    /// Enable or disable actuator output.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::NotOpen`] before `open()`.
    fn enable_force(&mut self, _enable: bool) -> DeviceResult<()> {
        self.ensure_open()
    }

    /// Tool position in meters.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Read`] or [`DeviceError::NotOpen`].
    fn position(&mut self) -> DeviceResult<Vector3<f64>>;

    /// Orientation frame of the tool; identity on 3-DOF devices.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Read`] or [`DeviceError::NotOpen`].
    fn orientation_frame(&mut self) -> DeviceResult<Matrix3<f64>> {
        self.ensure_open()?;
        Ok(Matrix3::identity())
    }

    /// Command a force on the tool in newtons.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Write`] or [`DeviceError::NotOpen`].
    fn set_force(&mut self, force: &Vector3<f64>) -> DeviceResult<()>;

    /// Command tool and gripper force together.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Write`] or [`DeviceError::NotOpen`].
    fn set_force_and_gripper(&mut self, force: &Vector3<f64>, _gripper: f64) -> DeviceResult<()> {
        self.set_force(force)
    }

    /// State of button `index`. Unknown buttons read as released.
    fn button(&mut self, index: usize) -> ButtonState;

    /// Device reports an orientation frame.
    fn has_wrist(&self) -> bool {
        false
    }

    /// Device has a gripper.
    fn has_gripper(&self) -> bool {
        false
    }

    /// Human-readable device name.
    fn system_name(&self) -> String;

    /// Backend or SDK version.
    fn sdk_version(&self) -> String;

    /// Backend kind.
    fn kind(&self) -> DeviceKind;

    /// Capabilities of this device.
    fn info(&self) -> DeviceInfo {
        DeviceInfo {
            kind: self.kind(),
            system_name: self.system_name(),
            sdk_version: self.sdk_version(),
            has_wrist: self.has_wrist(),
            has_gripper: self.has_gripper(),
        }
    }

    /// Fail with [`DeviceError::NotOpen`] unless the device is open.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::NotOpen`].
    fn ensure_open(&self) -> DeviceResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(DeviceError::NotOpen)
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Which backend to drive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Scripted trajectory, no hardware
    #[default]
    Simulate,
    /// Host pointer and keyboard input
    Emulate,
    /// Force Dimension SDK
    Dhd,
}

impl DeviceKind {
    /// All kinds, in display order.
    pub const ALL: [Self; 3] = [Self::Simulate, Self::Emulate, Self::Dhd];

    /// Configuration name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Simulate => "simulate",
            Self::Emulate => "emulate",
            Self::Dhd => "dhd",
        }
    }

    /// Whether this build can create the backend.
    pub fn is_available(self) -> bool {
        match self {
            Self::Simulate | Self::Emulate => true,
            Self::Dhd => cfg!(feature = "dhd"),
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simulate" | "sim" => Ok(Self::Simulate),
            "emulate" | "emu" => Ok(Self::Emulate),
            "dhd" => Ok(Self::Dhd),
            other => Err(format!(
                "unknown device kind `{other}` (expected simulate, emulate or dhd)"
            )),
        }
    }
}

/// Settings for the Force Dimension backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DhdConfig {
    /// Shared library to load (e.g. `libdhd.so`)
    pub library_path: PathBuf,
}

impl Default for DhdConfig {
    fn default() -> Self {
        let library_path = if cfg!(windows) {
            "dhd64.dll"
        } else if cfg!(target_os = "macos") {
            "libdhd.dylib"
        } else {
            "libdhd.so"
        };
        Self {
            library_path: PathBuf::from(library_path),
        }
    }
}

/// Device selection and per-backend settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Backend to use
    pub kind: DeviceKind,
    /// Scripted trajectory settings
    pub simulate: SimulatedConfig,
    /// Host-input emulation settings
    pub emulate: EmulatedConfig,
    /// Vendor SDK settings
    pub dhd: DhdConfig,
}

/// Create (but do not open) the configured device.
///
/// `host_input` feeds the `emulate` backend and is ignored by the others.
///
/// # Errors
///
/// Returns [`DeviceError::Unsupported`] when the backend is not compiled in,
/// or [`DeviceError::Library`] when the vendor library cannot be loaded.
pub fn create_device(config: &DeviceConfig, host_input: &HostInput) -> DeviceResult<Box<dyn HapticDevice>> {
    match config.kind {
        DeviceKind::Simulate => Ok(Box::new(SimulatedDevice::new(config.simulate.clone()))),
        DeviceKind::Emulate => Ok(Box::new(EmulatedDevice::new(
            config.emulate.clone(),
            host_input.clone(),
        ))),
        #[cfg(feature = "dhd")]
        DeviceKind::Dhd => Ok(Box::new(super::dhd::DhdDevice::load(&config.dhd.library_path)?)),
        #[cfg(not(feature = "dhd"))]
        DeviceKind::Dhd => Err(DeviceError::Unsupported(DeviceKind::Dhd)),
    }
}
