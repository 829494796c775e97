//! UDP transport for [`TelemetryPacket`]s.
//!
//! The publisher is fire-and-forget. The subscriber never blocks: each
//! [`TelemetrySubscriber::poll`] drains every queued datagram and keeps the
//! last one that decodes. Malformed datagrams are logged and dropped without
//! touching the last good state.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};

use tracing::{debug, trace, warn};

use forcelink_core::telemetry::TelemetryPacket;
use forcelink_core::types::RenderSnapshot;

use super::{resolve_addr, TelemetryConfig, TelemetryResult, TelemetrySink};

/// Largest datagram the subscriber reads; longer payloads are truncated and
/// then fail to decode.
const RECV_BUFFER_LEN: usize = 1024;

// ============================================================================
// Publisher
// ============================================================================

/// Sends one datagram per packet to a fixed destination.
#[derive(Debug)]
pub struct TelemetryPublisher {
    socket: UdpSocket,
    target: SocketAddr,
    precision: usize,
    sent: u64,
}

impl TelemetryPublisher {
    /// Create a publisher sending to `target` with `precision` decimals.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::InvalidAddress`](super::TelemetryError::InvalidAddress) or
    /// [`TelemetryError::Network`](super::TelemetryError::Network) if the local socket cannot be bound.
    pub fn new(target: &str, precision: usize) -> TelemetryResult<Self> {
        let target = resolve_addr(target)?;
        let local = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local)?;

        debug!(destination = %target, "Telemetry publisher ready");

        Ok(Self {
            socket,
            target,
            precision,
            sent: 0,
        })
    }

    /// Create a publisher from configuration.
    ///
    /// # Errors
    ///
    /// See [`TelemetryPublisher::new`].
    pub fn from_config(config: &TelemetryConfig) -> TelemetryResult<Self> {
        Self::new(&config.target, config.precision)
    }

    /// Destination address.
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Datagrams sent so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Encode and send one packet.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Network`](super::TelemetryError::Network) if the send fails.
    pub fn send(&mut self, packet: &TelemetryPacket) -> TelemetryResult<()> {
        let payload = packet.encode(self.precision);
        self.socket.send_to(payload.as_bytes(), self.target)?;
        self.sent += 1;
        trace!(payload = %payload, "Telemetry sent");
        Ok(())
    }
}

impl TelemetrySink for TelemetryPublisher {
    fn publish(&mut self, snapshot: &RenderSnapshot) -> TelemetryResult<()> {
        self.send(&TelemetryPacket::from(snapshot))
    }

    fn name(&self) -> &'static str {
        "udp"
    }
}

// ============================================================================
// Subscriber
// ============================================================================

/// Receive counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubscriberStats {
    /// Datagrams that decoded
    pub accepted: u64,
    /// Datagrams dropped as malformed
    pub malformed: u64,
}

/// Non-blocking receiver keeping the most recent valid packet.
#[derive(Debug)]
pub struct TelemetrySubscriber {
    socket: UdpSocket,
    buffer: Vec<u8>,
    latest: Option<TelemetryPacket>,
    stats: SubscriberStats,
}

impl TelemetrySubscriber {
    /// Bind to `addr` in non-blocking mode.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::InvalidAddress`](super::TelemetryError::InvalidAddress) or
    /// [`TelemetryError::Network`](super::TelemetryError::Network) if the socket cannot be bound.
    pub fn bind(addr: &str) -> TelemetryResult<Self> {
        let addr = resolve_addr(addr)?;
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;

        debug!(local = %addr, "Telemetry subscriber listening");

        Ok(Self {
            socket,
            buffer: vec![0u8; RECV_BUFFER_LEN],
            latest: None,
            stats: SubscriberStats::default(),
        })
    }

    /// Bind from configuration.
    ///
    /// # Errors
    ///
    /// See [`TelemetrySubscriber::bind`].
    pub fn from_config(config: &TelemetryConfig) -> TelemetryResult<Self> {
        Self::bind(&config.bind)
    }

    /// Bound local address.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Network`](super::TelemetryError::Network) if the OS cannot report it.
    pub fn local_addr(&self) -> TelemetryResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Drain pending datagrams.
    ///
    /// Returns the newest valid packet received during this call, or `None`
    /// if nothing valid arrived. [`TelemetrySubscriber::latest`] still holds
    /// the last good packet from earlier polls.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Network`](super::TelemetryError::Network) on socket failure. Malformed
    /// datagrams are not errors.
    pub fn poll(&mut self) -> TelemetryResult<Option<TelemetryPacket>> {
        let mut fresh = None;

        loop {
            match self.socket.recv_from(&mut self.buffer) {
                Ok((len, from)) => match TelemetryPacket::decode(&self.buffer[..len]) {
                    Ok(packet) => {
                        self.stats.accepted += 1;
                        fresh = Some(packet);
                    }
                    Err(e) => {
                        self.stats.malformed += 1;
                        warn!(%from, error = %e, "Dropping malformed telemetry datagram");
                    }
                },
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                // ICMP port-unreachable from an earlier send on some platforms
                Err(ref e) if e.kind() == ErrorKind::ConnectionReset => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if fresh.is_some() {
            self.latest = fresh;
        }
        Ok(fresh)
    }

    /// Last valid packet ever received.
    pub fn latest(&self) -> Option<TelemetryPacket> {
        self.latest
    }

    /// Receive counters.
    pub fn stats(&self) -> SubscriberStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::TelemetryError;
    use nalgebra::Vector3;
    use std::time::{Duration, Instant};

    fn loopback_pair() -> (TelemetryPublisher, TelemetrySubscriber) {
        let subscriber = TelemetrySubscriber::bind("127.0.0.1:0").unwrap();
        let addr = subscriber.local_addr().unwrap();
        let publisher = TelemetryPublisher::new(&addr.to_string(), 10).unwrap();
        (publisher, subscriber)
    }

    /// Poll until `accepted + malformed` reaches `expected` or a second passes.
    fn poll_until(subscriber: &mut TelemetrySubscriber, expected: u64) -> Option<TelemetryPacket> {
        let deadline = Instant::now() + Duration::from_secs(1);
        let mut last = None;
        while Instant::now() < deadline {
            if let Some(packet) = subscriber.poll().unwrap() {
                last = Some(packet);
            }
            let stats = subscriber.stats();
            if stats.accepted + stats.malformed >= expected {
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        last
    }

    #[test]
    fn test_loopback_round_trip() {
        let (mut publisher, mut subscriber) = loopback_pair();
        let packet = TelemetryPacket::from_array([1.0, 2.0, 3.0, 0.1, 0.2, 0.3]);

        publisher.send(&packet).unwrap();
        let received = poll_until(&mut subscriber, 1).unwrap();

        for (a, b) in received.to_array().iter().zip(packet.to_array()) {
            assert!((a - b).abs() < 1e-10);
        }
        assert_eq!(publisher.sent(), 1);
    }

    #[test]
    fn test_drain_keeps_last() {
        let (mut publisher, mut subscriber) = loopback_pair();

        for i in 1..=5_u32 {
            let x = f64::from(i);
            publisher
                .send(&TelemetryPacket::new(Vector3::new(x, 0.0, 0.0), Vector3::zeros()))
                .unwrap();
        }

        poll_until(&mut subscriber, 5);
        let latest = subscriber.latest().unwrap();
        assert!((latest.tool_position.x - 5.0).abs() < 1e-12);
        assert_eq!(subscriber.stats().accepted, 5);
    }

    #[test]
    fn test_malformed_leaves_state_unchanged() {
        let (mut publisher, mut subscriber) = loopback_pair();
        let good = TelemetryPacket::from_array([0.1, 0.2, 0.3, 1.0, 2.0, 3.0]);
        publisher.send(&good).unwrap();
        poll_until(&mut subscriber, 1);

        let raw = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = subscriber.local_addr().unwrap();
        raw.send_to(b"garbage", addr).unwrap();
        raw.send_to(b"1 2 3 4", addr).unwrap();

        let fresh = poll_until(&mut subscriber, 3);
        assert!(fresh.is_none());
        assert_eq!(subscriber.stats().malformed, 2);

        let latest = subscriber.latest().unwrap();
        for (a, b) in latest.to_array().iter().zip(good.to_array()) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn test_poll_without_traffic() {
        let (_publisher, mut subscriber) = loopback_pair();
        assert!(subscriber.poll().unwrap().is_none());
        assert!(subscriber.latest().is_none());
    }

    #[test]
    fn test_host_name_target() {
        let mut subscriber = TelemetrySubscriber::bind("127.0.0.1:0").unwrap();
        let port = subscriber.local_addr().unwrap().port();
        let mut publisher = TelemetryPublisher::new(&format!("localhost:{port}"), 10).unwrap();

        publisher
            .send(&TelemetryPacket::new(Vector3::new(0.5, 0.0, 0.0), Vector3::zeros()))
            .unwrap();
        let received = poll_until(&mut subscriber, 1).unwrap();
        assert!((received.tool_position.x - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_address() {
        assert!(matches!(
            TelemetryPublisher::new("not-an-address", 10),
            Err(TelemetryError::InvalidAddress(_))
        ));
        assert!(matches!(
            TelemetrySubscriber::bind("localhost"),
            Err(TelemetryError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_sink_publishes_snapshot() {
        let (mut publisher, mut subscriber) = loopback_pair();
        let snapshot = RenderSnapshot {
            tool_position: Vector3::new(0.02, 0.0, 0.0),
            contact_force: Vector3::new(15.0, 0.0, 0.0),
            ..RenderSnapshot::default()
        };

        TelemetrySink::publish(&mut publisher, &snapshot).unwrap();
        let received = poll_until(&mut subscriber, 1).unwrap();
        assert!((received.force.x - 15.0).abs() < 1e-9);
    }
}
