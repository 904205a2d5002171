//! Impulse-based rigid-body physics for articulated robots.
//!
//! This crate simulates kinematic trees of rigid bodies with fixed-step
//! forward dynamics and impulse-based contact resolution:
//!
//! - [`multibody`] - Robot construction, joint models, state
//! - [`dynamics`] - Articulated-body forward dynamics, mass matrix,
//!   point Jacobians
//! - [`collision`] - Shapes, broad/narrow phase contact detection
//! - [`group`] - Partitioning contacts into independent clusters
//! - [`solver`] - Iterative impulse resolution with friction,
//!   restitution, and joint limits
//! - [`integrate`] - Semi-implicit per-joint-type state integration
//! - [`engine`] - The tick orchestrator tying the phases together
//!
//! The engine runs headless and deterministically: a world stepped twice
//! from the same state with the same inputs produces identical
//! trajectories, regardless of how many threads resolve the collision
//! groups.
//!
//! # Quick Start
//!
//! ```
//! use nalgebra::Vector3;
//! use strider_core::collision::Shape;
//! use strider_core::engine::PhysicsEngine;
//! use strider_core::multibody::joint::JointKind;
//! use strider_core::multibody::{Robot, RobotBuilder};
//! use strider_core::types::{MassProperties, Pose};
//!
//! # fn main() -> strider_core::SimResult<()> {
//! // A free sphere one meter above the ground.
//! let mut builder = RobotBuilder::new("ball");
//! let body = builder.add_body(
//!     "ball",
//!     "root",
//!     JointKind::Floating,
//!     None,
//!     Pose::from_translation(Vector3::new(0.0, 0.0, 1.0)),
//!     MassProperties::solid_sphere(1.0, 0.2),
//! );
//! let (model, state) = builder.finish()?;
//! let mut robot = Robot::new(model, state);
//! robot.attach_collidable(body, Shape::Sphere { radius: 0.2 }, Pose::identity())?;
//!
//! let mut engine = PhysicsEngine::new();
//! let id = engine.add_robot(robot);
//! engine.add_terrain_object("ground", vec![(Shape::HalfSpace, Pose::identity())])?;
//!
//! let gravity = Vector3::new(0.0, 0.0, -9.81);
//! for _ in 0..500 {
//!     engine.simulate(1e-3, &gravity)?;
//! }
//! // The sphere has dropped onto the ground and rests on its radius.
//! let pose = engine.robot(id).state.body_poses[body.index()];
//! assert!((pose.translation.z - 0.2).abs() < 0.05);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod collision;
pub mod dynamics;
pub mod engine;
pub mod error;
pub mod group;
pub mod integrate;
pub mod multibody;
pub mod solver;

pub use engine::{PhysicsEngine, TickTimings};
pub use error::{SimError, SimResult};
pub use multibody::{Controller, Robot, RobotBuilder, Sensor};

pub use strider_types as types;
