//! Error types for the physics kernel.
//!
//! Two failure classes exist. Configuration errors are raised when a
//! robot or terrain definition is registered, before any tick runs.
//! Tick errors mean the current tick produced a non-finite or singular
//! quantity and cannot be completed; previously written state of
//! unrelated robots is left intact.

use thiserror::Error;

/// Errors produced by robot/terrain registration or by a simulation tick.
#[derive(Debug, Error)]
pub enum SimError {
    /// A body was registered without valid mass properties.
    #[error("body '{body}' of robot '{robot}' has invalid mass properties (mass = {mass})")]
    InvalidMassProperties {
        /// Robot name.
        robot: String,
        /// Body name.
        body: String,
        /// The offending mass value.
        mass: f64,
    },

    /// The kinematic tree has a cycle or more than one root.
    #[error("robot '{robot}' is not a tree: {message}")]
    MalformedTree {
        /// Robot name.
        robot: String,
        /// What went wrong.
        message: String,
    },

    /// A body handle used during construction does not exist.
    #[error("robot '{robot}' references unknown body index {index}")]
    UnknownBody {
        /// Robot name.
        robot: String,
        /// The out-of-range arena index.
        index: usize,
    },

    /// Duplicate body or joint name within one robot.
    #[error("robot '{robot}' declares duplicate name '{name}'")]
    DuplicateName {
        /// Robot name.
        robot: String,
        /// The duplicated body/joint name.
        name: String,
    },

    /// A joint was configured inconsistently with its kind.
    #[error("joint '{joint}' of robot '{robot}': {message}")]
    InvalidJoint {
        /// Robot name.
        robot: String,
        /// Joint name.
        joint: String,
        /// What is inconsistent.
        message: String,
    },

    /// A terrain definition carried no usable collision geometry.
    #[error("terrain object '{0}' has no collidable shape")]
    EmptyTerrain(String),

    /// Forward dynamics hit a singular articulated-body inertia.
    ///
    /// This indicates an underspecified tree (e.g. a massless branch)
    /// that slipped past construction-time validation.
    #[error("singular articulated inertia at joint '{joint}' of robot '{robot}'")]
    SingularInertia {
        /// Robot name.
        robot: String,
        /// Joint name.
        joint: String,
    },

    /// A tick was requested with a non-positive or non-finite step.
    #[error("invalid simulation time step {0}")]
    InvalidTimeStep(f64),

    /// The joint-space mass matrix failed to factor.
    #[error("mass matrix of robot '{robot}' is not positive definite")]
    SingularMassMatrix {
        /// Robot name.
        robot: String,
    },

    /// A tick produced a non-finite joint state; the tick is corrupted.
    #[error("non-finite {quantity} for joint '{joint}' of robot '{robot}'")]
    NonFiniteState {
        /// Robot name.
        robot: String,
        /// Joint name.
        joint: String,
        /// Which quantity went non-finite (position, velocity, acceleration).
        quantity: &'static str,
    },
}

/// Result alias used throughout the kernel.
pub type SimResult<T> = Result<T, SimError>;
