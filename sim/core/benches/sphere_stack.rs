//! Tick throughput on a vertical stack of spheres.
//!
//! The stack chains every sphere into one collision group, which
//! stresses the grouped impulse solver; the lone-sphere case measures
//! the fixed per-tick overhead.

use criterion::{Criterion, criterion_group, criterion_main};
use nalgebra::Vector3;

use strider_core::collision::Shape;
use strider_core::engine::PhysicsEngine;
use strider_core::multibody::joint::{JointKind, JointPosition};
use strider_core::multibody::{Robot, RobotBuilder};
use strider_core::types::{MassProperties, Pose};

const RADIUS: f64 = 0.25;

fn stacked_sphere(index: usize) -> Robot {
    let name = format!("sphere_{index}");
    let mut builder = RobotBuilder::new(&name);
    let body = builder.add_body(
        &name,
        "root",
        JointKind::Floating,
        None,
        Pose::identity(),
        MassProperties::solid_sphere(1.0, RADIUS),
    );
    // Slightly interpenetrating so every pair is in contact from tick one.
    let z = RADIUS + index as f64 * (2.0 * RADIUS - 1e-4);
    builder.set_initial_position(
        body,
        JointPosition::Pose(Pose::from_translation(Vector3::new(0.0, 0.0, z))),
    );
    let (model, state) = builder.finish().expect("valid robot");
    let mut robot = Robot::new(model, state);
    robot
        .attach_collidable(body, Shape::Sphere { radius: RADIUS }, Pose::identity())
        .expect("body exists");
    robot
}

fn stack_engine(count: usize) -> PhysicsEngine {
    let mut engine = PhysicsEngine::new();
    engine
        .add_terrain_object("ground", vec![(Shape::HalfSpace, Pose::identity())])
        .expect("non-empty");
    for index in 0..count {
        engine.add_robot(stacked_sphere(index));
    }
    engine
}

fn bench_stack_tick(c: &mut Criterion) {
    let gravity = Vector3::new(0.0, 0.0, -9.81);
    let mut group = c.benchmark_group("sphere_stack");
    for count in [1usize, 4, 16] {
        group.bench_function(format!("tick_{count}"), |b| {
            let mut engine = stack_engine(count);
            engine.simulate(1e-3, &gravity).expect("tick");
            b.iter(|| engine.simulate(1e-3, &gravity).expect("tick"));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_stack_tick);
criterion_main!(benches);
