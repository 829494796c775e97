//! Forcelink Application
//!
//! Drives a haptic device against a simulated sphere or torus, either in one
//! process or split across a haptic sender and a renderer-side receiver.
//!
//! # Usage
//!
//! ```bash
//! # Single process with the scripted device (default)
//! forcelink
//!
//! # Host-input emulation, commands on stdin
//! forcelink --device emulate run
//!
//! # Split setup: haptic side and renderer side
//! forcelink send --period-ms 1
//! forcelink receive
//!
//! # Inspect
//! forcelink devices
//! forcelink --config forcelink.toml config
//! ```

mod config;
mod input;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;

use forcelink_core::scene::Scene;
use forcelink_core::types::RenderSnapshot;
use forcelink_native::bridge::{create_device, DeviceKind, HostInput};
use forcelink_native::control::{ControlLoop, ExitReason, LoopHandle, LoopState, Pacing};
use forcelink_native::snapshot::{snapshot_channel, SnapshotReader};
use forcelink_native::streaming::{FanOut, TelemetryPublisher, TelemetrySink, TelemetrySubscriber};

use crate::config::ForcelinkConfig;

/// Poll interval while waiting for the loop to acknowledge a stop.
const STOP_POLL: Duration = Duration::from_millis(1);
/// Give up waiting for the acknowledgement after this long.
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Forcelink haptic control loop
#[derive(Parser, Debug)]
#[command(name = "forcelink")]
#[command(author, version, about = "Haptic rendering of simple shapes with UDP telemetry", long_about = None)]
struct Cli {
    /// Logging verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Device backend: simulate, emulate or dhd (overrides the config file)
    #[arg(short, long)]
    device: Option<DeviceKind>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the loop and a renderer in one process (default)
    Run {
        /// Stop after this many iterations
        #[arg(long)]
        max_iterations: Option<u64>,
    },

    /// Run the loop and stream telemetry to a separate renderer
    Send {
        /// Loop period in milliseconds
        #[arg(long, default_value = "1.0")]
        period_ms: f64,

        /// Telemetry destination (overrides the config file)
        #[arg(short, long)]
        target: Option<String>,

        /// Multiplier applied to the contact force (overrides the config file)
        #[arg(long)]
        force_scale: Option<f64>,

        /// Stop after this many iterations
        #[arg(long)]
        max_iterations: Option<u64>,
    },

    /// Receive telemetry and render it
    Receive {
        /// Bind address (overrides the config file)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// List device backends and open the configured one
    Devices,

    /// Print the effective configuration as TOML
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_names(true)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Forcelink v{}", env!("CARGO_PKG_VERSION"));

    let mut config = ForcelinkConfig::load(cli.config.as_deref())?;
    if let Some(kind) = cli.device {
        config.device.kind = kind;
    }

    match cli.command {
        None => run(config, None),
        Some(Commands::Run { max_iterations }) => run(config, max_iterations),
        Some(Commands::Send {
            period_ms,
            target,
            force_scale,
            max_iterations,
        }) => {
            config.control.pacing = Pacing::Fixed { period_ms };
            if let Some(target) = target {
                config.telemetry.target = target;
            }
            if let Some(scale) = force_scale {
                config.scene.force_scale = scale;
            }
            config.validate()?;
            send(config, max_iterations)
        }
        Some(Commands::Receive { bind }) => {
            if let Some(bind) = bind {
                config.telemetry.bind = bind;
            }
            receive(&config)
        }
        Some(Commands::Devices) => list_devices(&config),
        Some(Commands::Config) => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

/// Single process: haptic thread plus an in-process renderer.
fn run(mut config: ForcelinkConfig, max_iterations: Option<u64>) -> anyhow::Result<()> {
    config.control.max_iterations = max_iterations.or(config.control.max_iterations);
    let sink = osc_sink(&config)?;
    drive(&config, sink)
}

/// Split sender: haptic thread streaming to a remote renderer.
fn send(mut config: ForcelinkConfig, max_iterations: Option<u64>) -> anyhow::Result<()> {
    config.control.max_iterations = max_iterations.or(config.control.max_iterations);

    let publisher = TelemetryPublisher::from_config(&config.telemetry)
        .context("failed to create telemetry publisher")?;
    info!(destination = %publisher.target(), "Streaming telemetry");

    let mut fan_out = FanOut::new().with(Box::new(publisher));
    if let Some(osc) = osc_sink(&config)? {
        fan_out = fan_out.with(osc);
    }

    drive(&config, Some(Box::new(fan_out)))
}

#[cfg(feature = "osc")]
fn osc_sink(config: &ForcelinkConfig) -> anyhow::Result<Option<Box<dyn TelemetrySink>>> {
    use forcelink_native::streaming::OscPublisher;

    match &config.telemetry.osc_target {
        Some(target) => {
            let publisher = OscPublisher::new(target).context("failed to create OSC publisher")?;
            info!(destination = %target, "OSC output enabled");
            Ok(Some(Box::new(publisher)))
        }
        None => Ok(None),
    }
}

#[cfg(not(feature = "osc"))]
#[allow(clippy::unnecessary_wraps)]
fn osc_sink(config: &ForcelinkConfig) -> anyhow::Result<Option<Box<dyn TelemetrySink>>> {
    if config.telemetry.osc_target.is_some() {
        tracing::warn!("telemetry.osc_target is set but OSC output is not enabled. Rebuild with --features osc");
    }
    Ok(None)
}

/// Open the device, run the loop until it stops, then release the device.
fn drive(config: &ForcelinkConfig, sink: Option<Box<dyn TelemetrySink>>) -> anyhow::Result<()> {
    let scene = Scene::new(&config.scene)?;
    let host_input = HostInput::new();

    let mut device = create_device(&config.device, &host_input)?;
    let device_info = device.open()?;
    info!("Device: {device_info}");

    let mut control = ControlLoop::new(device, scene, config.control.clone());
    if let Some(sink) = sink {
        control = control.with_telemetry(sink);
    }
    let handle = control.spawn()?;

    if config.device.kind == DeviceKind::Emulate {
        info!("Emulated device: p <x> <y> | c | w | s | b | q");
        input::spawn_stdin_reader(host_input, handle.stop_handle())?;
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(render_until_stopped(&handle, config))?;

    handle.request_stop();
    if !handle.await_stopped(STOP_POLL, Some(STOP_TIMEOUT)) {
        anyhow::bail!("haptic loop did not acknowledge stop within {STOP_TIMEOUT:?}");
    }

    let outcome = handle.finish()?;
    let exit = outcome.stats.exit.clone();
    let stats = outcome.release_device()?;
    info!(
        iterations = stats.iterations,
        rate_hz = format_args!("{:.0}", stats.rate_hz),
        held = stats.held_iterations,
        telemetry_failures = stats.telemetry_failures,
        "Session ended"
    );

    match exit {
        ExitReason::DeviceFault(reason) => Err(anyhow::anyhow!("device fault: {reason}")),
        _ => Ok(()),
    }
}

/// Render snapshots until Ctrl-C or until the loop stops on its own.
async fn render_until_stopped(handle: &LoopHandle, config: &ForcelinkConfig) -> anyhow::Result<()> {
    let reader = handle.snapshots();
    let display_scale = config.render.force_display_scale(&config.scene.shape);
    let mut ticker = tokio::time::interval(frame_period(config));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result.context("failed to listen for Ctrl-C")?;
                info!("Interrupted, stopping haptic loop");
                return Ok(());
            }
            _ = ticker.tick() => {
                if handle.state() != LoopState::Running {
                    return Ok(());
                }
                render(&reader, display_scale);
            }
        }
    }
}

fn frame_period(config: &ForcelinkConfig) -> Duration {
    Duration::from_secs_f64(1.0 / config.render.refresh_hz).max(Duration::from_millis(1))
}

fn render(reader: &SnapshotReader, display_scale: f64) {
    let snapshot: &RenderSnapshot = &reader.load();
    let arrow = snapshot.contact_force * display_scale;
    debug!(
        iteration = snapshot.iteration,
        tool = ?snapshot.tool_position.as_slice(),
        proxy = ?snapshot.proxy_position.as_slice(),
        arrow = ?arrow.as_slice(),
        body = ?snapshot.body_orientation.map(|q| q.euler_angles()),
        safety = %snapshot.safety_state,
        "Frame"
    );
}

/// Renderer side of the split setup.
fn receive(config: &ForcelinkConfig) -> anyhow::Result<()> {
    let mut subscriber = TelemetrySubscriber::from_config(&config.telemetry)
        .context("failed to bind telemetry subscriber")?;
    info!(local = %subscriber.local_addr()?, "Receiving telemetry");

    let display_scale = config.render.force_display_scale(&config.scene.shape);
    let period = frame_period(config);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let (publisher, reader) = snapshot_channel();
    let mut received: u64 = 0;

    runtime.block_on(async {
        let mut ticker = tokio::time::interval(period);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                result = &mut ctrl_c => {
                    result.context("failed to listen for Ctrl-C")?;
                    break;
                }
                _ = ticker.tick() => {
                    match subscriber.poll() {
                        Ok(Some(packet)) => {
                            received += 1;
                            publisher.publish(packet.to_snapshot(received));
                        }
                        Ok(None) => {}
                        Err(e) => error!(error = %e, "Telemetry receive failed"),
                    }
                    if received > 0 {
                        render(&reader, display_scale);
                    }
                }
            }
        }
        anyhow::Ok(())
    })?;

    let stats = subscriber.stats();
    info!(accepted = stats.accepted, malformed = stats.malformed, "Receiver stopped");
    Ok(())
}

fn list_devices(config: &ForcelinkConfig) -> anyhow::Result<()> {
    println!("Device backends:");
    for kind in DeviceKind::ALL {
        let status = if kind.is_available() {
            "available"
        } else {
            "not compiled in"
        };
        let marker = if kind == config.device.kind { "*" } else { " " };
        println!("  {marker} {:<10} {status}", kind.as_str());
    }

    let mut device = create_device(&config.device, &HostInput::new())?;
    let device_info = device.open()?;
    println!();
    println!("{device_info}");
    device.close()?;

    Ok(())
}
