//! Startup safety gate for force output.
//!
//! When the device is opened the tool may already sit inside a shape. Sending
//! the resulting spring force immediately would jerk the handle. The gate holds
//! the output at zero until the loop computes an exactly-zero command once
//! (the tool has been moved to free space), then passes every command through
//! unchanged for the rest of the session.
//!
//! ```text
//!        computed == 0
//! Arming ─────────────▶ Active
//!   │ output = 0          │ output = computed
//!   └─◀ otherwise         └─◀ always (terminal)
//! ```

use serde::{Deserialize, Serialize};

use crate::types::ForceCommand;

/// State of the [`SafetyGate`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyState {
    /// Waiting for the first zero-force iteration; output is held at zero.
    #[default]
    Arming,
    /// Output passes through unchanged. Terminal.
    Active,
}

impl SafetyState {
    /// Short label for logs and status lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Arming => "arming",
            Self::Active => "active",
        }
    }
}

impl std::fmt::Display for SafetyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One-way gate applied to every force command before it reaches the device.
#[derive(Clone, Debug, Default)]
pub struct SafetyGate {
    state: SafetyState,
    held_iterations: u64,
}

impl SafetyGate {
    /// New gate in [`SafetyState::Arming`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> SafetyState {
        self.state
    }

    /// Whether the gate has armed.
    pub fn is_active(&self) -> bool {
        self.state == SafetyState::Active
    }

    /// Number of iterations whose output was suppressed while arming.
    pub fn held_iterations(&self) -> u64 {
        self.held_iterations
    }

    /// Filter a computed command, returning what may be sent to the device.
    pub fn filter(&mut self, computed: ForceCommand) -> ForceCommand {
        match self.state {
            SafetyState::Active => computed,
            SafetyState::Arming if computed.is_zero() => {
                self.state = SafetyState::Active;
                computed
            }
            SafetyState::Arming => {
                self.held_iterations += 1;
                ForceCommand::zero()
            }
        }
    }
}
