//! The haptic control loop.
//!
//! One iteration:
//!
//! ```text
//! ┌────────┐   ┌─────────┐   ┌──────────┐   ┌──────┐   ┌─────────┐   ┌──────────┐
//! │ sense  │──▶│ contact │──▶│ dynamics │──▶│ gate │──▶│ actuate │──▶│ publish  │
//! │ device │   │  force  │   │ (torus)  │   │      │   │ device  │   │ snapshot │
//! └────────┘   └─────────┘   └──────────┘   └──────┘   └─────────┘   └──────────┘
//! ```
//!
//! The loop runs on its own named thread at elevated priority when allowed.
//! It owns the device and the scene outright; the only shared state is the
//! [`RenderSnapshot`] slot and the loop state flag.
//!
//! # Shutdown
//!
//! Stopping is a two-phase handshake, not a join. [`LoopHandle::request_stop`]
//! moves the loop from `Running` to `Stopping`; the loop notices at the top of
//! its next iteration, does no further device I/O and moves to `Stopped`.
//! [`LoopHandle::await_stopped`] polls for that acknowledgement. The device is
//! then handed back through [`LoopHandle::finish`] so the owner can zero the
//! force and close it.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use nalgebra::Rotation3;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use forcelink_core::dynamics::{RigidBody, RigidBodyConfig};
use forcelink_core::safety::{SafetyGate, SafetyState};
use forcelink_core::scene::Scene;
use forcelink_core::types::{ForceCommand, RenderSnapshot, ToolState};

use crate::bridge::{DeviceError, DeviceResult, HapticDevice};
use crate::priority::{self, CONTROL_PRIORITY};
use crate::snapshot::{snapshot_channel, SnapshotPublisher, SnapshotReader};
use crate::streaming::TelemetrySink;

/// Telemetry failures between repeated warnings.
const TELEMETRY_WARN_EVERY: u64 = 1000;

// ============================================================================
// Error Types
// ============================================================================

/// Errors starting or finishing the control loop.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The device must be opened before the loop starts
    #[error("Device must be open before starting the control loop")]
    DeviceNotOpen,

    /// Spawning the loop thread failed
    #[error("Failed to spawn control thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The loop thread panicked
    #[error("Control thread panicked")]
    Panicked,
}

/// Result type for control loop operations.
pub type ControlResult<T> = Result<T, ControlError>;

// ============================================================================
// Configuration
// ============================================================================

/// Loop cadence.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Pacing {
    /// No sleep between iterations
    AsFastAsPossible,
    /// Sleep so that iterations start `period_ms` apart
    Fixed {
        /// Iteration period in milliseconds
        period_ms: f64,
    },
}

impl Default for Pacing {
    fn default() -> Self {
        Self::AsFastAsPossible
    }
}

impl Pacing {
    /// Fixed pacing with the given period.
    pub fn fixed(period: Duration) -> Self {
        Self::Fixed {
            period_ms: period.as_secs_f64() * 1e3,
        }
    }

    /// Iteration period, if fixed.
    pub fn period(&self) -> Option<Duration> {
        match *self {
            Self::AsFastAsPossible => None,
            Self::Fixed { period_ms } => Duration::try_from_secs_f64(period_ms / 1e3).ok(),
        }
    }
}

/// Control loop settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlLoopConfig {
    /// Loop cadence
    pub pacing: Pacing,
    /// Button that halts the body's rotation while held
    pub halt_button: usize,
    /// Request real-time scheduling for the loop thread
    pub elevate_priority: bool,
    /// Seconds between loop-rate log lines (0 disables)
    pub stats_interval_s: f64,
    /// End the loop after this many iterations
    pub max_iterations: Option<u64>,
}

impl Default for ControlLoopConfig {
    fn default() -> Self {
        Self {
            pacing: Pacing::AsFastAsPossible,
            halt_button: 0,
            elevate_priority: true,
            stats_interval_s: 1.0,
            max_iterations: None,
        }
    }
}

impl ControlLoopConfig {
    /// Warning when the fixed period makes `1 − Kv·Δt` negative.
    ///
    /// The damping factor is clamped at zero in that case, which stops the
    /// body dead every step instead of damping it.
    pub fn damping_warning(&self, dynamics: &RigidBodyConfig) -> Option<String> {
        let period = self.pacing.period()?.as_secs_f64();
        let max_dt = dynamics.max_stable_dt()?;
        (period > max_dt).then(|| {
            format!(
                "loop period {:.3} ms exceeds 1/damping = {:.3} ms; body damping will be clamped",
                period * 1e3,
                max_dt * 1e3
            )
        })
    }
}

// ============================================================================
// Loop State
// ============================================================================

/// Lifecycle of the loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum LoopState {
    /// Iterating
    Running = 0,
    /// Stop requested; finishing the current iteration
    Stopping = 1,
    /// No further device I/O will occur
    Stopped = 2,
}

impl LoopState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

#[derive(Debug)]
struct SharedState(AtomicU8);

impl SharedState {
    fn new() -> Self {
        Self(AtomicU8::new(LoopState::Running as u8))
    }

    fn load(&self) -> LoopState {
        LoopState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn request_stop(&self) {
        // Only Running moves to Stopping; Stopped stays Stopped
        let _ = self.0.compare_exchange(
            LoopState::Running as u8,
            LoopState::Stopping as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    fn mark_stopped(&self) {
        self.0.store(LoopState::Stopped as u8, Ordering::Release);
    }
}

/// Cloneable handle that can only request a stop (e.g. from a signal handler).
#[derive(Clone, Debug)]
pub struct StopHandle {
    state: Arc<SharedState>,
}

impl StopHandle {
    /// Ask the loop to stop at the next iteration boundary.
    pub fn request_stop(&self) {
        self.state.request_stop();
    }

    /// Current loop state.
    pub fn state(&self) -> LoopState {
        self.state.load()
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Why the loop ended.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ExitReason {
    /// Has not ended
    #[default]
    Running,
    /// A stop was requested
    StopRequested,
    /// The configured iteration limit was reached
    IterationLimit,
    /// A device call failed
    DeviceFault(String),
}

/// Counters available after the loop stops.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoopStats {
    /// Completed iterations
    pub iterations: u64,
    /// Time spent iterating
    pub elapsed: Duration,
    /// Mean loop rate (Hz)
    pub rate_hz: f64,
    /// Iterations whose force was held at zero by the safety gate
    pub held_iterations: u64,
    /// Telemetry publish failures
    pub telemetry_failures: u64,
    /// Why the loop ended
    pub exit: ExitReason,
}

/// Everything the loop thread hands back.
pub struct LoopOutcome {
    /// The device, still open
    pub device: Box<dyn HapticDevice>,
    /// Final statistics
    pub stats: LoopStats,
}

impl LoopOutcome {
    /// Command zero force, disable actuation and close the device.
    ///
    /// # Errors
    ///
    /// Returns the first [`DeviceError`]; the device is closed regardless.
    pub fn release_device(mut self) -> DeviceResult<LoopStats> {
        if !self.device.is_open() {
            return Ok(self.stats);
        }

        let zero = ForceCommand::zero();
        let zeroed = self
            .device
            .set_force_and_gripper(&zero.force, zero.gripper)
            .and_then(|()| self.device.enable_force(false));
        let closed = self.device.close();

        zeroed.and(closed).map(|()| self.stats)
    }
}

// ============================================================================
// Control Loop
// ============================================================================

/// An unstarted control loop.
pub struct ControlLoop {
    device: Box<dyn HapticDevice>,
    scene: Scene,
    gate: SafetyGate,
    config: ControlLoopConfig,
    sink: Option<Box<dyn TelemetrySink>>,
    publisher: SnapshotPublisher,
    reader: SnapshotReader,
}

impl ControlLoop {
    /// Create a loop driving an already-opened `device` against `scene`.
    pub fn new(device: Box<dyn HapticDevice>, scene: Scene, config: ControlLoopConfig) -> Self {
        let (publisher, reader) = snapshot_channel();
        Self {
            device,
            scene,
            gate: SafetyGate::new(),
            config,
            sink: None,
            publisher,
            reader,
        }
    }

    /// Publish every iteration to `sink` as well.
    #[must_use]
    pub fn with_telemetry(mut self, sink: Box<dyn TelemetrySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Reader for the per-iteration snapshot.
    pub fn snapshots(&self) -> SnapshotReader {
        self.reader.clone()
    }

    /// Start the loop on a dedicated thread.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::DeviceNotOpen`] if the device was not opened,
    /// or [`ControlError::Spawn`] if the thread cannot be created.
    pub fn spawn(self) -> ControlResult<LoopHandle> {
        if !self.device.is_open() {
            return Err(ControlError::DeviceNotOpen);
        }

        if let Some(body) = self.scene.body() {
            if let Some(warning) = self.config.damping_warning(body.config()) {
                warn!("{warning}");
            }
        }

        let state = Arc::new(SharedState::new());
        let thread_state = Arc::clone(&state);
        let snapshots = self.reader.clone();

        let thread = thread::Builder::new()
            .name("forcelink-haptic".to_string())
            .spawn(move || self.run(&thread_state))
            .map_err(ControlError::Spawn)?;

        info!("Haptic loop started");

        Ok(LoopHandle {
            state,
            thread: Some(thread),
            snapshots,
        })
    }

    fn run(mut self, state: &SharedState) -> LoopOutcome {
        if self.config.elevate_priority {
            priority::raise_current_thread(CONTROL_PRIORITY);
        }

        let started = Instant::now();
        let mut stats = LoopStats::default();

        stats.exit = match self.device.enable_force(true) {
            Ok(()) => self.iterate(state, &mut stats),
            Err(e) => {
                error!(error = %e, "Failed to enable force output");
                ExitReason::DeviceFault(e.to_string())
            }
        };

        stats.elapsed = started.elapsed();
        if stats.elapsed > Duration::ZERO {
            #[allow(clippy::cast_precision_loss)]
            let iterations = stats.iterations as f64;
            stats.rate_hz = iterations / stats.elapsed.as_secs_f64();
        }
        stats.held_iterations = self.gate.held_iterations();

        info!(
            iterations = stats.iterations,
            rate_hz = format_args!("{:.0}", stats.rate_hz),
            telemetry_failures = stats.telemetry_failures,
            exit = ?stats.exit,
            "Haptic loop stopped"
        );

        state.mark_stopped();

        LoopOutcome {
            device: self.device,
            stats,
        }
    }

    fn sense(&mut self, has_wrist: bool) -> DeviceResult<ToolState> {
        let frame = self.device.orientation_frame()?;
        let position = self.device.position()?;
        Ok(ToolState {
            position,
            orientation: has_wrist.then(|| Rotation3::from_matrix(&frame)),
        })
    }

    fn iterate(&mut self, state: &SharedState, stats: &mut LoopStats) -> ExitReason {
        let has_wrist = self.device.has_wrist();
        let stats_interval = Duration::try_from_secs_f64(self.config.stats_interval_s)
            .ok()
            .filter(|d| !d.is_zero());

        let mut last = Instant::now();
        let mut window_start = last;
        let mut window_iterations = 0_u64;

        loop {
            if state.load() != LoopState::Running {
                return ExitReason::StopRequested;
            }
            if self.config.max_iterations.is_some_and(|max| stats.iterations >= max) {
                return ExitReason::IterationLimit;
            }

            let now = Instant::now();
            let dt = now.duration_since(last).as_secs_f64();
            last = now;

            let tool = match self.sense(has_wrist) {
                Ok(tool) => tool,
                Err(e) => return device_fault(&e),
            };

            let halt = self.device.button(self.config.halt_button).is_pressed();
            let contact = self.scene.step(dt, &tool.position, halt);

            let was_active = self.gate.is_active();
            let command = self.gate.filter(ForceCommand::from_force(contact.force));
            if !was_active && self.gate.is_active() {
                info!(iteration = stats.iterations, "Tool in free space, force output armed");
            }

            if let Err(e) = self.device.set_force_and_gripper(&command.force, command.gripper) {
                return device_fault(&e);
            }
            stats.iterations += 1;

            let snapshot = RenderSnapshot {
                iteration: stats.iterations,
                tool_position: tool.position,
                tool_orientation: tool.orientation,
                proxy_position: contact.proxy,
                contact_force: contact.force,
                body_orientation: self.scene.body().map(RigidBody::orientation),
                safety_state: self.gate.state(),
            };
            self.publisher.publish(snapshot);

            if let Some(sink) = self.sink.as_mut() {
                if let Err(e) = sink.publish(&snapshot) {
                    stats.telemetry_failures += 1;
                    if stats.telemetry_failures % TELEMETRY_WARN_EVERY == 1 {
                        warn!(
                            sink = sink.name(),
                            failures = stats.telemetry_failures,
                            error = %e,
                            "Telemetry publish failed"
                        );
                    }
                }
            }

            window_iterations += 1;
            if let Some(interval) = stats_interval {
                let window = now.duration_since(window_start);
                if window >= interval {
                    #[allow(clippy::cast_precision_loss)]
                    let rate_khz = window_iterations as f64 / window.as_secs_f64() / 1e3;
                    info!(
                        rate_khz = format_args!("{rate_khz:.2}"),
                        armed = self.gate.state() == SafetyState::Active,
                        "Haptic loop rate"
                    );
                    window_start = now;
                    window_iterations = 0;
                }
            }

            if let Some(period) = self.config.pacing.period() {
                let next = now + period;
                let remaining = next.saturating_duration_since(Instant::now());
                if !remaining.is_zero() {
                    thread::sleep(remaining);
                }
            }
        }
    }
}

fn device_fault(e: &DeviceError) -> ExitReason {
    error!(error = %e, "Device fault, stopping haptic loop");
    ExitReason::DeviceFault(e.to_string())
}

// ============================================================================
// Loop Handle
// ============================================================================

/// Handle to a running loop.
pub struct LoopHandle {
    state: Arc<SharedState>,
    thread: Option<JoinHandle<LoopOutcome>>,
    snapshots: SnapshotReader,
}

impl LoopHandle {
    /// Current loop state.
    pub fn state(&self) -> LoopState {
        self.state.load()
    }

    /// Ask the loop to stop at the next iteration boundary.
    pub fn request_stop(&self) {
        debug!("Haptic loop stop requested");
        self.state.request_stop();
    }

    /// Handle for requesting a stop from elsewhere.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Reader for the per-iteration snapshot.
    pub fn snapshots(&self) -> SnapshotReader {
        self.snapshots.clone()
    }

    /// Poll every `poll` until the loop reports `Stopped`.
    ///
    /// Returns `false` if `timeout` elapses first.
    pub fn await_stopped(&self, poll: Duration, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if self.state() == LoopState::Stopped {
                return true;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return false;
            }
            thread::sleep(poll);
        }
    }

    /// Collect the device and statistics from a stopped loop.
    ///
    /// Call after [`LoopHandle::await_stopped`]; the join returns at once.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Panicked`] if the loop thread panicked.
    pub fn finish(mut self) -> ControlResult<LoopOutcome> {
        self.request_stop();
        self.thread
            .take()
            .ok_or(ControlError::Panicked)?
            .join()
            .map_err(|_| ControlError::Panicked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{ButtonState, DeviceInfo, DeviceKind};
    use crate::streaming::{TelemetryError, TelemetryResult};
    use forcelink_core::scene::SceneConfig;
    use nalgebra::Vector3;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockLog {
        reads: u64,
        forces: Vec<ForceCommand>,
        force_enabled: bool,
        closed: bool,
    }

    struct MockDevice {
        path: Vec<Vector3<f64>>,
        fail_after: Option<u64>,
        button: bool,
        open: bool,
        log: Arc<Mutex<MockLog>>,
    }

    impl MockDevice {
        fn new(path: Vec<Vector3<f64>>) -> (Self, Arc<Mutex<MockLog>>) {
            let log = Arc::new(Mutex::new(MockLog::default()));
            let device = Self {
                path,
                fail_after: None,
                button: false,
                open: true,
                log: Arc::clone(&log),
            };
            (device, log)
        }
    }

    impl HapticDevice for MockDevice {
        fn open(&mut self) -> DeviceResult<DeviceInfo> {
            self.open = true;
            Ok(self.info())
        }

        fn close(&mut self) -> DeviceResult<()> {
            self.open = false;
            self.log.lock().unwrap().closed = true;
            Ok(())
        }

        fn is_open(&self) -> bool {
            self.open
        }

        fn enable_force(&mut self, enable: bool) -> DeviceResult<()> {
            self.log.lock().unwrap().force_enabled = enable;
            Ok(())
        }

        fn position(&mut self) -> DeviceResult<Vector3<f64>> {
            let mut log = self.log.lock().unwrap();
            if self.fail_after.is_some_and(|n| log.reads >= n) {
                return Err(DeviceError::Read {
                    what: "position",
                    reason: "cable unplugged".to_string(),
                });
            }
            let index = usize::try_from(log.reads).unwrap().min(self.path.len() - 1);
            log.reads += 1;
            Ok(self.path[index])
        }

        fn set_force(&mut self, force: &Vector3<f64>) -> DeviceResult<()> {
            self.set_force_and_gripper(force, 0.0)
        }

        fn set_force_and_gripper(&mut self, force: &Vector3<f64>, gripper: f64) -> DeviceResult<()> {
            self.log.lock().unwrap().forces.push(ForceCommand {
                force: *force,
                gripper,
            });
            Ok(())
        }

        fn button(&mut self, _index: usize) -> ButtonState {
            ButtonState::from(self.button)
        }

        fn system_name(&self) -> String {
            "mock".to_string()
        }

        fn sdk_version(&self) -> String {
            "0".to_string()
        }

        fn kind(&self) -> DeviceKind {
            DeviceKind::Simulate
        }
    }

    fn test_config(max_iterations: Option<u64>) -> ControlLoopConfig {
        ControlLoopConfig {
            elevate_priority: false,
            stats_interval_s: 0.0,
            max_iterations,
            ..ControlLoopConfig::default()
        }
    }

    fn sphere_scene() -> Scene {
        Scene::new(&SceneConfig::sphere()).unwrap()
    }

    fn run_to_end(control: ControlLoop) -> LoopOutcome {
        let handle = control.spawn().unwrap();
        assert!(handle.await_stopped(Duration::from_millis(1), Some(Duration::from_secs(10))));
        handle.finish().unwrap()
    }

    const INSIDE: Vector3<f64> = Vector3::new(0.02, 0.0, 0.0);
    const OUTSIDE: Vector3<f64> = Vector3::new(0.1, 0.0, 0.0);

    #[test]
    fn test_zero_force_while_starting_inside() {
        let mut path = vec![INSIDE; 10];
        path.push(OUTSIDE);
        path.extend([INSIDE; 5]);
        let (device, log) = MockDevice::new(path);

        let control = ControlLoop::new(Box::new(device), sphere_scene(), test_config(Some(16)));
        let outcome = run_to_end(control);

        let log = log.lock().unwrap();
        assert!(log.force_enabled);
        assert_eq!(log.forces.len(), 16);
        assert!(log.forces[..11].iter().all(ForceCommand::is_zero));
        for command in &log.forces[11..] {
            assert!((command.force.norm() - 15.0).abs() < 1e-9);
        }

        assert_eq!(outcome.stats.exit, ExitReason::IterationLimit);
        assert_eq!(outcome.stats.iterations, 16);
        assert_eq!(outcome.stats.held_iterations, 10);
    }

    #[test]
    fn test_stop_handshake_ends_device_io() {
        let (device, log) = MockDevice::new(vec![OUTSIDE]);
        let config = ControlLoopConfig {
            pacing: Pacing::fixed(Duration::from_millis(1)),
            ..test_config(None)
        };

        let handle = ControlLoop::new(Box::new(device), sphere_scene(), config)
            .spawn()
            .unwrap();
        let reader = handle.snapshots();

        let deadline = Instant::now() + Duration::from_secs(5);
        while reader.iteration() < 5 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }

        handle.stop_handle().request_stop();
        assert!(handle.await_stopped(Duration::from_millis(1), Some(Duration::from_secs(5))));
        assert_eq!(handle.state(), LoopState::Stopped);

        let reads = log.lock().unwrap().reads;
        thread::sleep(Duration::from_millis(20));
        assert_eq!(log.lock().unwrap().reads, reads);

        let outcome = handle.finish().unwrap();
        assert_eq!(outcome.stats.exit, ExitReason::StopRequested);
        assert!(outcome.stats.iterations >= 5);

        outcome.release_device().unwrap();
        let log = log.lock().unwrap();
        assert!(log.closed);
        assert!(!log.force_enabled);
        assert!(log.forces.last().unwrap().is_zero());
    }

    #[test]
    fn test_read_failure_stops_loop() {
        let (mut device, _log) = MockDevice::new(vec![OUTSIDE]);
        device.fail_after = Some(5);

        let control = ControlLoop::new(Box::new(device), sphere_scene(), test_config(None));
        let outcome = run_to_end(control);

        assert_eq!(outcome.stats.iterations, 5);
        assert!(matches!(outcome.stats.exit, ExitReason::DeviceFault(ref msg) if msg.contains("cable")));
    }

    #[test]
    fn test_snapshot_published_each_iteration() {
        let (device, _log) = MockDevice::new(vec![OUTSIDE, INSIDE]);
        let control = ControlLoop::new(Box::new(device), sphere_scene(), test_config(Some(2)));
        let reader = control.snapshots();

        run_to_end(control);

        let snapshot = reader.load();
        assert_eq!(snapshot.iteration, 2);
        assert_eq!(snapshot.safety_state, SafetyState::Active);
        assert_eq!(snapshot.tool_position, INSIDE);
        assert!((snapshot.proxy_position.x - 0.035).abs() < 1e-12);
        assert!(snapshot.body_orientation.is_none());
        assert!(snapshot.tool_orientation.is_none());
    }

    struct FailingSink;

    impl TelemetrySink for FailingSink {
        fn publish(&mut self, _snapshot: &RenderSnapshot) -> TelemetryResult<()> {
            Err(TelemetryError::Encoding("unreachable".to_string()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    #[test]
    fn test_telemetry_failures_are_not_fatal() {
        let (device, _log) = MockDevice::new(vec![OUTSIDE]);
        let control = ControlLoop::new(Box::new(device), sphere_scene(), test_config(Some(10)))
            .with_telemetry(Box::new(FailingSink));

        let outcome = run_to_end(control);

        assert_eq!(outcome.stats.exit, ExitReason::IterationLimit);
        assert_eq!(outcome.stats.telemetry_failures, 10);
    }

    #[test]
    fn test_button_halts_body() {
        let scene_config = SceneConfig::torus();
        let initial = scene_config.initial_pose().orientation;
        let scene = Scene::new(&scene_config).unwrap();

        // Inside the tube, well off the body centre
        let tool = scene_config.initial_pose().to_world(&Vector3::new(0.05, 0.0, 0.01));
        let (mut device, _log) = MockDevice::new(vec![Vector3::new(0.2, 0.0, 0.0), tool]);
        device.button = true;

        let control = ControlLoop::new(Box::new(device), scene, test_config(Some(50)));
        let reader = control.snapshots();
        run_to_end(control);

        let snapshot = reader.load();
        assert_eq!(snapshot.body_orientation, Some(initial));
        assert!(snapshot.contact_force.norm() > 0.0);
    }

    #[test]
    fn test_spawn_requires_open_device() {
        let (mut device, _log) = MockDevice::new(vec![OUTSIDE]);
        device.open = false;

        let result = ControlLoop::new(Box::new(device), sphere_scene(), test_config(Some(1))).spawn();
        assert!(matches!(result, Err(ControlError::DeviceNotOpen)));
    }

    #[test]
    fn test_damping_warning() {
        let dynamics = RigidBodyConfig {
            inertia: 1000.0,
            damping: 100.0,
        };
        let slow = ControlLoopConfig {
            pacing: Pacing::fixed(Duration::from_millis(50)),
            ..ControlLoopConfig::default()
        };
        assert!(slow.damping_warning(&dynamics).is_some());
        assert!(ControlLoopConfig::default().damping_warning(&dynamics).is_none());
        assert!(slow.damping_warning(&RigidBodyConfig::default()).is_none());
    }

    #[test]
    fn test_pacing_period() {
        assert_eq!(Pacing::AsFastAsPossible.period(), None);
        assert_eq!(
            Pacing::fixed(Duration::from_millis(50)).period(),
            Some(Duration::from_millis(50))
        );
    }
}
