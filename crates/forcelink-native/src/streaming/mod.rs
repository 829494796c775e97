//! Telemetry streaming to renderers and external tools
//!
//! - [`udp`]: Six-float ASCII datagrams between the haptic process and a
//!   separate renderer process
//! - [`osc`]: Open Sound Control output for audio/visual tools (requires
//!   `osc` feature)
//!
//! Delivery is best effort: no acknowledgement, no retransmission, last
//! write wins on the receiving side.
//!
//! ```rust,no_run
//! use forcelink_native::streaming::{TelemetryPublisher, TelemetrySubscriber};
//! use forcelink_core::TelemetryPacket;
//! use nalgebra::Vector3;
//!
//! let mut subscriber = TelemetrySubscriber::bind("127.0.0.1:9999")?;
//! let mut publisher = TelemetryPublisher::new("127.0.0.1:9999", 10)?;
//!
//! publisher.send(&TelemetryPacket::new(Vector3::new(0.01, 0.0, 0.0), Vector3::zeros()))?;
//! if let Some(packet) = subscriber.poll()? {
//!     println!("tool at {:?}", packet.tool_position);
//! }
//! # Ok::<(), forcelink_native::streaming::TelemetryError>(())
//! ```

pub mod udp;

#[cfg(feature = "osc")]
pub mod osc;

use std::net::{SocketAddr, ToSocketAddrs};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use forcelink_core::telemetry::{TelemetryParseError, DEFAULT_PRECISION};
use forcelink_core::types::RenderSnapshot;

pub use udp::{SubscriberStats, TelemetryPublisher, TelemetrySubscriber};

#[cfg(feature = "osc")]
pub use osc::OscPublisher;

// ============================================================================
// Error Types
// ============================================================================

/// Telemetry errors
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Socket creation, bind or send failure
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    /// Datagram did not decode
    #[error("Malformed telemetry packet: {0}")]
    Malformed(#[from] TelemetryParseError),

    /// Address did not parse
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Packet encoding failure
    #[error("Encoding error: {0}")]
    Encoding(String),
}

/// Telemetry result type
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Resolve `host:port` (numeric or a host name), preferring IPv4.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidAddress`] if nothing resolves.
pub fn resolve_addr(addr: &str) -> TelemetryResult<SocketAddr> {
    let invalid = || TelemetryError::InvalidAddress(format!("Invalid socket address: {addr}"));
    let resolved: Vec<SocketAddr> = addr.to_socket_addrs().map_err(|_| invalid())?.collect();

    resolved
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| resolved.first())
        .copied()
        .ok_or_else(invalid)
}

// ============================================================================
// Sink Trait
// ============================================================================

/// Destination for per-iteration loop output.
pub trait TelemetrySink: Send {
    /// Publish one snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError`] on send failure; callers treat it as
    /// non-fatal.
    fn publish(&mut self, snapshot: &RenderSnapshot) -> TelemetryResult<()>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Several sinks fed from one loop.
#[derive(Default)]
pub struct FanOut {
    sinks: Vec<Box<dyn TelemetrySink>>,
}

impl FanOut {
    /// Empty fan-out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    #[must_use]
    pub fn with(mut self, sink: Box<dyn TelemetrySink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Number of sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether there are no sinks.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl TelemetrySink for FanOut {
    /// Publishes to every sink and returns the first error, if any.
    fn publish(&mut self, snapshot: &RenderSnapshot) -> TelemetryResult<()> {
        let mut first_error = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.publish(snapshot) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn name(&self) -> &'static str {
        "fan-out"
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Telemetry endpoints and encoding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Where the sender publishes datagrams
    pub target: String,
    /// Where the receiver listens
    pub bind: String,
    /// Digits after the decimal point
    pub precision: usize,
    /// Optional OSC destination (used with the `osc` feature)
    pub osc_target: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            target: "127.0.0.1:9999".to_string(),
            bind: "127.0.0.1:9999".to_string(),
            precision: DEFAULT_PRECISION,
            osc_target: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSink {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl TelemetrySink for CountingSink {
        fn publish(&mut self, _snapshot: &RenderSnapshot) -> TelemetryResult<()> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                Err(TelemetryError::Encoding("test".to_string()))
            } else {
                Ok(())
            }
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[test]
    fn test_fan_out_reaches_every_sink() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut fan_out = FanOut::new()
            .with(Box::new(CountingSink {
                calls: Arc::clone(&calls),
                fail: true,
            }))
            .with(Box::new(CountingSink {
                calls: Arc::clone(&calls),
                fail: false,
            }));

        assert_eq!(fan_out.len(), 2);
        assert!(fan_out.publish(&RenderSnapshot::default()).is_err());
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_resolve_addr() {
        assert_eq!(
            resolve_addr("127.0.0.1:9999").unwrap(),
            "127.0.0.1:9999".parse::<SocketAddr>().unwrap()
        );

        let local = resolve_addr("localhost:9999").unwrap();
        assert!(local.ip().is_loopback());
        assert_eq!(local.port(), 9999);

        assert!(matches!(resolve_addr("localhost"), Err(TelemetryError::InvalidAddress(_))));
        assert!(matches!(resolve_addr("not an address"), Err(TelemetryError::InvalidAddress(_))));
    }

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.target, "127.0.0.1:9999");
        assert_eq!(config.precision, 10);
        assert!(config.osc_target.is_none());
    }
}
