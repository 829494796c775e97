//! Benchmarks for the per-iteration haptic math

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::Vector3;

use forcelink_core::contact::{ContactModel, ContactShape};
use forcelink_core::safety::SafetyGate;
use forcelink_core::scene::{Scene, SceneConfig};
use forcelink_core::telemetry::TelemetryPacket;
use forcelink_core::types::{BodyPose, ForceCommand};

/// Tool samples on a circle that dips in and out of the shapes
fn generate_tool_path(n: usize) -> Vec<Vector3<f64>> {
    use std::f64::consts::TAU;

    (0..n)
        .map(|i| {
            let t = i as f64 / n as f64 * TAU;
            Vector3::new(0.045 * t.cos(), 0.045 * t.sin(), 0.01 * (3.0 * t).sin())
        })
        .collect()
}

fn bench_contact(c: &mut Criterion) {
    let mut group = c.benchmark_group("contact");

    let path = generate_tool_path(1024);
    let pose = BodyPose::from_axis_angle(Vector3::zeros(), Vector3::new(0.0, 1.0, -1.0), 0.785);

    let shapes = [
        ("sphere", ContactShape::Sphere { radius: 0.03 }),
        (
            "torus",
            ContactShape::Torus {
                outer_radius: 0.05,
                inner_radius: 0.027,
            },
        ),
    ];

    for (name, shape) in shapes {
        let model = ContactModel::new(shape, 0.005, 1000.0);
        group.bench_with_input(BenchmarkId::from_parameter(name), &model, |b, model| {
            b.iter(|| {
                let mut total = Vector3::zeros();
                for tool in &path {
                    total += model.evaluate(black_box(tool), &pose).force;
                }
                black_box(total)
            });
        });
    }

    group.finish();
}

fn bench_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("iteration");

    let path = generate_tool_path(1024);

    group.bench_function("torus_scene_step", |b| {
        let mut scene = Scene::new(&SceneConfig::torus()).expect("default scene is valid");
        let mut gate = SafetyGate::new();
        b.iter(|| {
            for tool in &path {
                let contact = scene.step(0.001, black_box(tool), false);
                black_box(gate.filter(ForceCommand::from_force(contact.force)));
            }
        });
    });

    group.finish();
}

fn bench_telemetry(c: &mut Criterion) {
    let mut group = c.benchmark_group("telemetry");

    let packet = TelemetryPacket::from_array([0.012, -0.034, 0.056, 1.5, -2.25, 0.125]);
    let wire = packet.encode(10);

    group.bench_function("encode", |b| {
        b.iter(|| black_box(black_box(&packet).encode(10)));
    });

    group.bench_function("decode", |b| {
        b.iter(|| black_box(TelemetryPacket::decode(black_box(wire.as_bytes()))));
    });

    group.finish();
}

criterion_group!(benches, bench_contact, bench_iteration, bench_telemetry);
criterion_main!(benches);
