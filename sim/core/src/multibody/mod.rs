//! Articulated rigid-body robots: kinematic trees, joint models, and the
//! per-robot aggregate the engine steps.

pub mod joint;
pub mod model;

pub use model::{Joint, RigidBody, RobotBuilder, RobotModel, RobotState};

use strider_types::{BodyId, ContactParameters, Pose};

use crate::collision::{Collidable, Shape};
use crate::error::{SimError, SimResult};

/// User hook that writes joint efforts before each dynamics step.
///
/// Implementations read the state and write `state.efforts`; anything
/// outside the effort limits of a joint is clamped before dynamics run.
pub trait Controller: Send + Sync {
    /// One-time setup, run during engine initialization with the frames
    /// already current. May write initial efforts. The default does
    /// nothing.
    fn initialize(&mut self, _model: &RobotModel, _state: &mut RobotState) {}

    /// Produce efforts for the current tick. `time` is the simulation
    /// time at the start of the tick.
    fn control(&mut self, time: f64, model: &RobotModel, state: &mut RobotState);
}

/// User hook that observes the robot after state integration.
pub trait Sensor: Send + Sync {
    /// Observe the post-integration state. `time` is the simulation time
    /// at the end of the tick.
    fn sense(&mut self, time: f64, model: &RobotModel, state: &RobotState);
}

/// A robot registered with the engine: its immutable model, mutable
/// state, attached collision geometry, and optional hooks.
pub struct Robot {
    /// Kinematic and inertial description, fixed after construction.
    pub model: RobotModel,
    /// Positions, velocities, and per-tick accumulators.
    pub state: RobotState,
    /// Collision geometry attached to the robot's bodies.
    pub collidables: Vec<Collidable>,
    /// Per-robot contact parameters; contacts touching this robot use
    /// them instead of the engine-wide defaults.
    pub contact_parameters: Option<ContactParameters>,
    controller: Option<Box<dyn Controller>>,
    sensor: Option<Box<dyn Sensor>>,
}

impl Robot {
    /// Wrap a validated model/state pair (see [`RobotBuilder::finish`]).
    #[must_use]
    pub fn new(model: RobotModel, state: RobotState) -> Self {
        Self {
            model,
            state,
            collidables: Vec::new(),
            contact_parameters: None,
            controller: None,
            sensor: None,
        }
    }

    /// Attach a collision shape to one of the robot's bodies.
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownBody`] when `body` is not part of this robot.
    pub fn attach_collidable(
        &mut self,
        body: BodyId,
        shape: Shape,
        local_pose: Pose,
    ) -> SimResult<()> {
        if body.index() >= self.model.bodies.len() {
            return Err(SimError::UnknownBody {
                robot: self.model.name.clone(),
                index: body.index(),
            });
        }
        self.collidables.push(Collidable {
            shape,
            local_pose,
            body: Some(body),
        });
        Ok(())
    }

    /// Install the controller hook, replacing any previous one.
    pub fn set_controller(&mut self, controller: Box<dyn Controller>) {
        self.controller = Some(controller);
    }

    /// Install the sensor hook, replacing any previous one.
    pub fn set_sensor(&mut self, sensor: Box<dyn Sensor>) {
        self.sensor = Some(sensor);
    }

    /// Run the controller's one-time setup hook (if any). Efforts it
    /// writes are clamped like tick efforts.
    pub fn initialize_controller(&mut self) {
        if let Some(controller) = &mut self.controller {
            controller.initialize(&self.model, &mut self.state);
        }
        self.clamp_efforts();
    }

    /// Run the controller (if any) and clamp the resulting efforts to
    /// each joint's effort limit.
    pub fn run_controller(&mut self, time: f64) {
        if let Some(controller) = &mut self.controller {
            controller.control(time, &self.model, &mut self.state);
        }
        self.clamp_efforts();
    }

    fn clamp_efforts(&mut self) {
        for (i, joint) in self.model.joints.iter().enumerate() {
            if let Some(limits) = &joint.limits {
                let max = limits.effort_max;
                if max.is_finite() {
                    for dof in self.model.dof_range(i.into()) {
                        self.state.efforts[dof] = self.state.efforts[dof].clamp(-max, max);
                    }
                }
            }
        }
    }

    /// Run the sensor hook (if any) on the post-integration state.
    pub fn run_sensor(&mut self, time: f64) {
        if let Some(sensor) = &mut self.sensor {
            sensor.sense(time, &self.model, &self.state);
        }
    }
}
