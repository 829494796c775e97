//! ASCII telemetry packet mirroring the loop output to a renderer.
//!
//! One datagram carries six reals separated by single spaces:
//!
//! ```text
//! x y z fx fy fz
//! ```
//!
//! There is no header, sequence number or checksum. Receivers keep the most
//! recent valid packet.

use std::fmt::Write as _;
use std::str::FromStr;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::RenderSnapshot;

/// Number of fields in a packet.
pub const FIELD_COUNT: usize = 6;

/// Digits after the decimal point used when none is configured.
pub const DEFAULT_PRECISION: usize = 10;

/// Why a datagram could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TelemetryParseError {
    /// Payload is not valid UTF-8.
    #[error("telemetry payload is not valid UTF-8")]
    NotUtf8,

    /// Wrong number of whitespace-separated fields.
    #[error("expected 6 fields, got {0}")]
    FieldCount(usize),

    /// A field is not a real number.
    #[error("invalid number: {0:?}")]
    InvalidNumber(String),
}

/// Tool position and force for one loop iteration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPacket {
    /// Tool position (m).
    pub tool_position: Vector3<f64>,
    /// Force (N).
    pub force: Vector3<f64>,
}

impl TelemetryPacket {
    /// Create a packet.
    #[must_use]
    pub fn new(tool_position: Vector3<f64>, force: Vector3<f64>) -> Self {
        Self {
            tool_position,
            force,
        }
    }

    /// Fields in wire order.
    pub fn to_array(&self) -> [f64; FIELD_COUNT] {
        [
            self.tool_position.x,
            self.tool_position.y,
            self.tool_position.z,
            self.force.x,
            self.force.y,
            self.force.z,
        ]
    }

    /// Build from fields in wire order.
    #[must_use]
    pub fn from_array(fields: [f64; FIELD_COUNT]) -> Self {
        Self::new(
            Vector3::new(fields[0], fields[1], fields[2]),
            Vector3::new(fields[3], fields[4], fields[5]),
        )
    }

    /// Encode with `precision` digits after the decimal point.
    pub fn encode(&self, precision: usize) -> String {
        let mut out = String::with_capacity(FIELD_COUNT * (precision + 4));
        for (i, value) in self.to_array().iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            // Writing to a String cannot fail
            let _ = write!(out, "{value:.precision$}");
        }
        out
    }

    /// Renderer-side snapshot for this packet.
    ///
    /// The packet carries no proxy, so the proxy sits on the tool. Fields
    /// the wire format does not carry keep their defaults.
    #[must_use]
    pub fn to_snapshot(&self, iteration: u64) -> RenderSnapshot {
        RenderSnapshot {
            iteration,
            tool_position: self.tool_position,
            proxy_position: self.tool_position,
            contact_force: self.force,
            ..RenderSnapshot::default()
        }
    }

    /// Decode a raw datagram.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryParseError`] when the payload is not six reals.
    pub fn decode(bytes: &[u8]) -> Result<Self, TelemetryParseError> {
        std::str::from_utf8(bytes)
            .map_err(|_| TelemetryParseError::NotUtf8)?
            .parse()
    }
}

impl FromStr for TelemetryPacket {
    type Err = TelemetryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        if tokens.len() != FIELD_COUNT {
            return Err(TelemetryParseError::FieldCount(tokens.len()));
        }

        let mut fields = [0.0; FIELD_COUNT];
        for (field, token) in fields.iter_mut().zip(&tokens) {
            *field = token
                .parse()
                .map_err(|_| TelemetryParseError::InvalidNumber((*token).to_string()))?;
        }

        Ok(Self::from_array(fields))
    }
}

impl From<&RenderSnapshot> for TelemetryPacket {
    fn from(snapshot: &RenderSnapshot) -> Self {
        Self::new(snapshot.tool_position, snapshot.contact_force)
    }
}
