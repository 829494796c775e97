//! Open Sound Control (OSC) output
//!
//! Mirrors the haptic loop into OSC-speaking tools (Max/MSP, Pure Data,
//! TouchDesigner) for sonification or live visuals.
//!
//! # Address Patterns
//!
//! ```text
//! /forcelink/tool       - Tool position x y z (3 floats, m)
//! /forcelink/force      - Contact force x y z (3 floats, N)
//! /forcelink/proxy      - Proxy position x y z (3 floats, m)
//! /forcelink/safety     - 1 once force output is armed, else 0
//! ```

use std::net::{SocketAddr, UdpSocket};

use nalgebra::Vector3;
use rosc::{encoder, OscBundle, OscMessage, OscPacket, OscTime, OscType};

use forcelink_core::types::RenderSnapshot;

use super::{resolve_addr, TelemetryError, TelemetryResult, TelemetrySink};

/// OSC publisher for loop snapshots
#[derive(Debug)]
pub struct OscPublisher {
    socket: UdpSocket,
    target: SocketAddr,
    prefix: String,
}

#[allow(clippy::cast_possible_truncation)]
fn vector_args(v: &Vector3<f64>) -> Vec<OscType> {
    v.iter().map(|&c| OscType::Float(c as f32)).collect()
}

impl OscPublisher {
    /// Create a new OSC publisher
    ///
    /// # Arguments
    ///
    /// * `target` - Target address (e.g., "127.0.0.1:9000")
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::InvalidAddress`] or [`TelemetryError::Network`].
    pub fn new(target: &str) -> TelemetryResult<Self> {
        let target = resolve_addr(target)?;
        let local = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local)?;

        Ok(Self {
            socket,
            target,
            prefix: "/forcelink".to_string(),
        })
    }

    /// Set address prefix (default: "/forcelink")
    #[must_use]
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    fn message(&self, name: &str, args: Vec<OscType>) -> OscPacket {
        OscPacket::Message(OscMessage {
            addr: format!("{}/{name}", self.prefix),
            args,
        })
    }

    fn send_packet(&self, packet: &OscPacket) -> TelemetryResult<()> {
        let bytes =
            encoder::encode(packet).map_err(|e| TelemetryError::Encoding(format!("{e:?}")))?;
        self.socket.send_to(&bytes, self.target)?;
        Ok(())
    }

    /// Send the tool position
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError`] on encode or send failure.
    pub fn send_tool(&self, position: &Vector3<f64>) -> TelemetryResult<()> {
        self.send_packet(&self.message("tool", vector_args(position)))
    }

    /// Send the contact force
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError`] on encode or send failure.
    pub fn send_force(&self, force: &Vector3<f64>) -> TelemetryResult<()> {
        self.send_packet(&self.message("force", vector_args(force)))
    }

    /// Send a whole snapshot as one bundle (tool, force, proxy, safety)
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError`] on encode or send failure.
    pub fn send_snapshot(&self, snapshot: &RenderSnapshot) -> TelemetryResult<()> {
        let armed = i32::from(snapshot.safety_state == forcelink_core::SafetyState::Active);
        let bundle = OscBundle {
            // Immediate
            timetag: OscTime::from((0, 1)),
            content: vec![
                self.message("tool", vector_args(&snapshot.tool_position)),
                self.message("force", vector_args(&snapshot.contact_force)),
                self.message("proxy", vector_args(&snapshot.proxy_position)),
                self.message("safety", vec![OscType::Int(armed)]),
            ],
        };
        self.send_packet(&OscPacket::Bundle(bundle))
    }
}

impl TelemetrySink for OscPublisher {
    fn publish(&mut self, snapshot: &RenderSnapshot) -> TelemetryResult<()> {
        self.send_snapshot(snapshot)
    }

    fn name(&self) -> &'static str {
        "osc"
    }
}
