//! Forcelink Native - host-side haptic loop, devices and telemetry
//!
//! This crate wires the pure math of `forcelink-core` to the outside world:
//! - Haptic device backends (simulated, emulated from host input, Force Dimension SDK)
//! - The real-time control loop thread and its stop handshake
//! - Lock-free snapshot hand-off to renderers
//! - UDP (and optional OSC) telemetry
//!
//! # Modules
//!
//! - [`bridge`]: Haptic device abstraction and backends
//! - [`control`]: Control loop thread
//! - [`snapshot`]: Latest-value snapshot channel
//! - [`streaming`]: Telemetry publishers and subscriber
//! - [`priority`]: Real-time scheduling for the loop thread

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod bridge;
pub mod control;
pub mod priority;
pub mod snapshot;
pub mod streaming;

// Re-export key types
pub use bridge::{create_device, DeviceConfig, DeviceError, DeviceKind, HapticDevice, HostInput};
pub use control::{
    ControlError, ControlLoop, ControlLoopConfig, ExitReason, LoopHandle, LoopOutcome, LoopState,
    LoopStats, Pacing, StopHandle,
};
pub use snapshot::{snapshot_channel, SnapshotPublisher, SnapshotReader};
pub use streaming::{
    FanOut, TelemetryConfig, TelemetryError, TelemetryPublisher, TelemetrySink,
    TelemetrySubscriber,
};
