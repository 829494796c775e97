//! Bridges to haptic devices
//!
//! This module provides the [`HapticDevice`] trait and its backends:
//! - [`simulated`]: Scripted trajectory for running without hardware
//! - [`emulated`]: Host pointer/keyboard input standing in for a device
//! - [`dhd`]: Force Dimension SDK loaded at runtime (requires `dhd` feature)
//!
//! Backends are chosen by [`DeviceConfig::kind`] through [`create_device`].
//!
//! ```rust
//! use forcelink_native::bridge::{create_device, DeviceConfig, HostInput};
//!
//! let mut device = create_device(&DeviceConfig::default(), &HostInput::new())?;
//! let info = device.open()?;
//! println!("{info}");
//!
//! let position = device.position()?;
//! device.set_force(&nalgebra::Vector3::zeros())?;
//! device.close()?;
//! # let _ = position;
//! # Ok::<(), forcelink_native::bridge::DeviceError>(())
//! ```

pub mod device;
pub mod emulated;
pub mod simulated;

#[cfg(feature = "dhd")]
pub mod dhd;

// Re-export key types
pub use device::{
    create_device, ButtonState, DeviceConfig, DeviceError, DeviceInfo, DeviceKind, DeviceResult,
    DhdConfig, HapticDevice,
};
pub use emulated::{EmulatedConfig, EmulatedDevice, HostInput};
pub use simulated::{SimulatedConfig, SimulatedDevice};

#[cfg(feature = "dhd")]
pub use dhd::DhdDevice;
