//! Shared plain data types for the strider physics simulator.
//!
//! This crate holds the vocabulary types exchanged between the physics
//! kernel and its collaborators (model construction, visualization,
//! logging): entity ids, poses, mass properties, and the contact /
//! constraint / solver parameter structs. It deliberately contains no
//! simulation logic so that consumers can depend on it without pulling
//! in the kernel.

#![warn(missing_docs)]

mod ids;
mod mass;
mod params;
mod pose;

pub use ids::{BodyId, JointId, RobotId};
pub use mass::MassProperties;
pub use params::{ConstraintParameters, ContactParameters, SolverParameters};
pub use pose::Pose;
