//! Device emulation from host pointer and keyboard input.
//!
//! The pointer offset from the screen centre maps to x/y (y inverted, screen
//! rows grow downwards) and W/S key presses step z. Whatever feeds the input
//! (a terminal reader, a window event loop) writes into a shared
//! [`HostInput`]; the device reads it on every `position()` call.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::device::{ButtonState, DeviceInfo, DeviceKind, DeviceResult, HapticDevice};

/// Scaling from host input to tool position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatedConfig {
    /// Meters per pointer pixel
    pub pixel_to_meter: f64,
    /// Meters per W/S key press
    pub key_step: f64,
    /// Pointer position mapped to x = y = 0 (pixels)
    pub screen_center: [f64; 2],
    /// Initial z (m)
    pub initial_z: f64,
}

impl Default for EmulatedConfig {
    fn default() -> Self {
        Self {
            pixel_to_meter: 0.0005,
            key_step: 0.001,
            screen_center: [960.0, 540.0],
            initial_z: 0.0,
        }
    }
}

#[derive(Debug, Default)]
struct InputState {
    pointer: Option<[f64; 2]>,
    z_steps: i64,
    buttons: u32,
}

/// Shared host input written by the UI side and read by [`EmulatedDevice`].
#[derive(Clone, Debug, Default)]
pub struct HostInput {
    state: Arc<Mutex<InputState>>,
}

impl HostInput {
    /// Create an input handle with the pointer at the screen centre.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, InputState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move the pointer to absolute pixel coordinates.
    pub fn set_pointer(&self, x: f64, y: f64) {
        self.lock().pointer = Some([x, y]);
    }

    /// Return the pointer to the screen centre.
    pub fn center_pointer(&self) {
        self.lock().pointer = None;
    }

    /// One W press (`+1`) or S press (`-1`).
    pub fn step_z(&self, steps: i64) {
        let mut state = self.lock();
        state.z_steps = state.z_steps.saturating_add(steps);
    }

    /// Toggle button `index` (0..32).
    pub fn toggle_button(&self, index: usize) {
        if index < 32 {
            self.lock().buttons ^= 1 << index;
        }
    }

    /// Set button `index` (0..32).
    pub fn set_button(&self, index: usize, pressed: bool) {
        if index < 32 {
            let mut state = self.lock();
            if pressed {
                state.buttons |= 1 << index;
            } else {
                state.buttons &= !(1 << index);
            }
        }
    }

    /// State of button `index`.
    pub fn button(&self, index: usize) -> ButtonState {
        if index >= 32 {
            return ButtonState::Released;
        }
        ButtonState::from(self.lock().buttons & (1 << index) != 0)
    }

    /// Tool position implied by the current input.
    #[allow(clippy::cast_precision_loss)]
    pub fn position(&self, config: &EmulatedConfig) -> Vector3<f64> {
        let state = self.lock();
        let [cx, cy] = config.screen_center;
        let [px, py] = state.pointer.unwrap_or(config.screen_center);

        Vector3::new(
            (px - cx) * config.pixel_to_meter,
            -(py - cy) * config.pixel_to_meter,
            config.initial_z + state.z_steps as f64 * config.key_step,
        )
    }
}

/// Device driven by [`HostInput`].
#[derive(Debug)]
pub struct EmulatedDevice {
    config: EmulatedConfig,
    input: HostInput,
    open: bool,
}

impl EmulatedDevice {
    /// Create a closed device reading from `input`.
    pub fn new(config: EmulatedConfig, input: HostInput) -> Self {
        Self {
            config,
            input,
            open: false,
        }
    }
}

impl HapticDevice for EmulatedDevice {
    fn open(&mut self) -> DeviceResult<DeviceInfo> {
        self.open = true;
        Ok(self.info())
    }

    fn close(&mut self) -> DeviceResult<()> {
        self.ensure_open()?;
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn position(&mut self) -> DeviceResult<Vector3<f64>> {
        self.ensure_open()?;
        Ok(self.input.position(&self.config))
    }

    fn set_force(&mut self, _force: &Vector3<f64>) -> DeviceResult<()> {
        // No actuators
        self.ensure_open()
    }

    fn button(&mut self, index: usize) -> ButtonState {
        self.input.button(index)
    }

    fn system_name(&self) -> String {
        "host-input emulator".to_string()
    }

    fn sdk_version(&self) -> String {
        forcelink_core::VERSION.to_string()
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::Emulate
    }
}
