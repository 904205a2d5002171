//! The tick orchestrator: owns the robots and terrain, and advances the
//! world by fixed steps.
//!
//! Tick order is fixed: controllers, forward dynamics, contact
//! detection, grouping, impulse resolution, integration, sensors.
//! Independent collision groups resolve in parallel; their velocity
//! deltas are applied sequentially in group order afterwards, so a tick
//! is deterministic for a given world regardless of thread scheduling.

use std::time::{Duration, Instant};

use nalgebra::Vector3;
use rayon::prelude::*;
use tracing::debug;

use strider_types::{ConstraintParameters, ContactParameters, Pose, RobotId, SolverParameters};

use crate::collision::{Collidable, Contact, Shape, WorldCollidable, detect_contacts};
use crate::dynamics::forward_dynamics;
use crate::error::{SimError, SimResult};
use crate::group::{CollisionGroup, group_contacts};
use crate::integrate::integrate;
use crate::multibody::Robot;
use crate::solver::joint_limit::detect_limit_candidates;
use crate::solver::{RobotResources, solve_group};

/// Wall-clock duration of each phase of the most recent tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickTimings {
    /// Controller hooks.
    pub controllers: Duration,
    /// Forward dynamics across all robots.
    pub dynamics: Duration,
    /// Broad and narrow phase contact detection.
    pub detection: Duration,
    /// Contact grouping and solver resource preparation.
    pub grouping: Duration,
    /// Impulse resolution across all groups.
    pub solving: Duration,
    /// State integration and sensor hooks.
    pub integration: Duration,
    /// Contacts detected this tick.
    pub contacts: usize,
    /// Collision groups resolved this tick.
    pub groups: usize,
}

/// Fixed-step impulse-based physics engine.
pub struct PhysicsEngine {
    robots: Vec<Robot>,
    terrain: Vec<Collidable>,
    global_contact_parameters: Option<ContactParameters>,
    global_constraint_parameters: Option<ConstraintParameters>,
    solver_parameters: SolverParameters,
    time: f64,
    initialized: bool,
    timings: TickTimings,
}

impl Default for PhysicsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsEngine {
    /// An empty world with default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            robots: Vec::new(),
            terrain: Vec::new(),
            global_contact_parameters: None,
            global_constraint_parameters: None,
            solver_parameters: SolverParameters::default(),
            time: 0.0,
            initialized: false,
            timings: TickTimings::default(),
        }
    }

    /// Register a robot; returns its handle.
    pub fn add_robot(&mut self, robot: Robot) -> RobotId {
        self.robots.push(robot);
        RobotId::from(self.robots.len() - 1)
    }

    /// Register a named static terrain object made of one or more shapes.
    ///
    /// # Errors
    ///
    /// [`SimError::EmptyTerrain`] when no shape is given.
    pub fn add_terrain_object(
        &mut self,
        name: impl Into<String>,
        shapes: Vec<(Shape, Pose)>,
    ) -> SimResult<()> {
        if shapes.is_empty() {
            return Err(SimError::EmptyTerrain(name.into()));
        }
        for (shape, local_pose) in shapes {
            self.terrain.push(Collidable {
                shape,
                local_pose,
                body: None,
            });
        }
        Ok(())
    }

    /// Install a global contact parameter override. While set it applies
    /// to every contact of every group, taking precedence over per-robot
    /// parameters; `None` restores the per-robot/default resolution.
    pub fn set_global_contact_parameters(&mut self, parameters: Option<ContactParameters>) {
        self.global_contact_parameters = parameters;
    }

    /// Install a global joint-limit constraint parameter override.
    pub fn set_global_constraint_parameters(&mut self, parameters: Option<ConstraintParameters>) {
        self.global_constraint_parameters = parameters;
    }

    /// Replace the impulse solver parameters.
    pub fn set_solver_parameters(&mut self, parameters: SolverParameters) {
        self.solver_parameters = parameters;
    }

    /// Shared access to a registered robot.
    #[must_use]
    pub fn robot(&self, id: RobotId) -> &Robot {
        &self.robots[id.index()]
    }

    /// Mutable access to a registered robot.
    pub fn robot_mut(&mut self, id: RobotId) -> &mut Robot {
        &mut self.robots[id.index()]
    }

    /// Simulation time accumulated so far.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Phase timings of the most recent tick.
    #[must_use]
    pub fn timings(&self) -> &TickTimings {
        &self.timings
    }

    /// One-time world setup: refreshes every robot's frames, runs the
    /// controller setup hooks, resolves initial accelerations, and lets
    /// the sensors observe the consistent initial state.
    ///
    /// Runs lazily on the first [`Self::simulate`] call; calling it again
    /// returns `Ok(false)` without doing work. Note that the first
    /// `simulate` call initializes and then still advances a full tick.
    ///
    /// # Errors
    ///
    /// Propagates forward dynamics failures.
    pub fn initialize(&mut self, gravity: &Vector3<f64>) -> SimResult<bool> {
        if self.initialized {
            return Ok(false);
        }
        let time = self.time;
        for robot in &mut self.robots {
            robot.state.update_frames(&robot.model);
            robot.initialize_controller();
            forward_dynamics(&robot.model, &mut robot.state, gravity)?;
            robot.run_sensor(time);
        }
        self.initialized = true;
        Ok(true)
    }

    /// Advance the world by one step of `dt` under the given gravity.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidTimeStep`] for a non-positive or non-finite
    /// `dt`; otherwise the first failure of any tick phase. On error the
    /// world state is not rolled back and should be considered corrupted.
    pub fn simulate(&mut self, dt: f64, gravity: &Vector3<f64>) -> SimResult<()> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(SimError::InvalidTimeStep(dt));
        }
        self.initialize(gravity)?;
        let mut timings = TickTimings::default();
        let contact_params = self.global_contact_parameters.unwrap_or_default();
        let constraint_params = self.global_constraint_parameters.unwrap_or_default();

        // Controllers.
        let mark = Instant::now();
        for robot in &mut self.robots {
            robot.state.reset_tick_accumulators();
            robot.run_controller(self.time);
        }
        timings.controllers = mark.elapsed();

        // Forward dynamics.
        let mark = Instant::now();
        for robot in &mut self.robots {
            forward_dynamics(&robot.model, &mut robot.state, gravity)?;
        }
        timings.dynamics = mark.elapsed();

        // Contact detection.
        let mark = Instant::now();
        let models: Vec<&crate::multibody::RobotModel> =
            self.robots.iter().map(|r| &r.model).collect();
        let mut world: Vec<WorldCollidable> = Vec::new();
        for (index, robot) in self.robots.iter().enumerate() {
            for collidable in &robot.collidables {
                let body = collidable
                    .body
                    .unwrap_or_else(|| unreachable!("robot collidables always carry a body"));
                world.push(WorldCollidable::new(
                    Some(index),
                    collidable,
                    &robot.state.body_poses[body.index()],
                ));
            }
        }
        for collidable in &self.terrain {
            world.push(WorldCollidable::new(None, collidable, &Pose::identity()));
        }
        let contacts: Vec<Contact> =
            detect_contacts(&world, &models, contact_params.minimum_penetration);
        timings.detection = mark.elapsed();
        timings.contacts = contacts.len();

        // Grouping and solver resources.
        let mark = Instant::now();
        let limit_candidates: Vec<_> = self
            .robots
            .iter()
            .map(|robot| {
                let qd_free = &robot.state.qd + &robot.state.qdd * dt;
                detect_limit_candidates(
                    &robot.model,
                    &robot.state,
                    &qd_free,
                    dt,
                    &constraint_params,
                )
            })
            .collect();
        // A global override silences the per-robot parameters entirely.
        let contact_overrides: Vec<_> = if self.global_contact_parameters.is_some() {
            vec![None; self.robots.len()]
        } else {
            self.robots.iter().map(|r| r.contact_parameters).collect()
        };

        let (mut groups, ungrouped) = group_contacts(contacts, self.robots.len());
        // A robot with no contacts but an active joint limit still needs
        // the impulse solver; it becomes a singleton group.
        for robot in ungrouped {
            if !limit_candidates[robot].is_empty() {
                groups.push(CollisionGroup {
                    robots: vec![robot],
                    contacts: Vec::new(),
                });
            }
        }

        let mut resources: Vec<Option<RobotResources>> = Vec::with_capacity(self.robots.len());
        for _ in 0..self.robots.len() {
            resources.push(None);
        }
        for group in &groups {
            for &index in &group.robots {
                if resources[index].is_none() {
                    let robot = &self.robots[index];
                    resources[index] =
                        Some(RobotResources::compute(&robot.model, &robot.state, dt)?);
                }
            }
        }
        timings.grouping = mark.elapsed();
        timings.groups = groups.len();

        // Impulse resolution, one group per task.
        let mark = Instant::now();
        let solutions: Vec<_> = groups
            .par_iter()
            .map(|group| {
                solve_group(
                    group,
                    &models,
                    &resources,
                    &limit_candidates,
                    &contact_overrides,
                    dt,
                    &contact_params,
                    &self.solver_parameters,
                )
            })
            .collect();
        drop(models);
        for solution in &solutions {
            for (slot, &index) in solution.robots.iter().enumerate() {
                self.robots[index].state.delta_qd = solution.delta_qd[slot].clone();
            }
        }
        timings.solving = mark.elapsed();

        // Integration and sensors.
        let mark = Instant::now();
        for robot in &mut self.robots {
            integrate(&robot.model, &mut robot.state, dt);
            robot.state.check_finite(&robot.model)?;
        }
        self.time += dt;
        for index in 0..self.robots.len() {
            self.robots[index].run_sensor(self.time);
        }
        timings.integration = mark.elapsed();

        debug!(
            time = self.time,
            contacts = timings.contacts,
            groups = timings.groups,
            solving_us = timings.solving.as_micros() as u64,
            "tick complete"
        );
        self.timings = timings;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multibody::joint::{JointKind, JointPosition};
    use crate::multibody::{Controller, RobotBuilder, RobotModel, RobotState};
    use approx::assert_relative_eq;
    use strider_types::{BodyId, MassProperties};

    fn gravity() -> Vector3<f64> {
        Vector3::new(0.0, 0.0, -9.81)
    }

    fn free_sphere(z0: f64) -> Robot {
        let mut builder = RobotBuilder::new("ball");
        let body = builder.add_body(
            "ball",
            "root",
            JointKind::Floating,
            None,
            Pose::identity(),
            MassProperties::solid_sphere(1.0, 0.5),
        );
        builder.set_initial_position(
            body,
            JointPosition::Pose(Pose::from_translation(Vector3::new(0.0, 0.0, z0))),
        );
        let (model, state) = builder.finish().expect("valid robot");
        let mut robot = Robot::new(model, state);
        robot
            .attach_collidable(BodyId(0), Shape::Sphere { radius: 0.5 }, Pose::identity())
            .expect("body exists");
        robot
    }

    fn ground() -> Vec<(Shape, Pose)> {
        vec![(Shape::HalfSpace, Pose::identity())]
    }

    #[test]
    fn rejects_bad_time_step() {
        let mut engine = PhysicsEngine::new();
        assert!(matches!(
            engine.simulate(0.0, &gravity()),
            Err(SimError::InvalidTimeStep(_))
        ));
        assert!(matches!(
            engine.simulate(f64::NAN, &gravity()),
            Err(SimError::InvalidTimeStep(_))
        ));
    }

    #[test]
    fn empty_terrain_object_is_rejected() {
        let mut engine = PhysicsEngine::new();
        assert!(matches!(
            engine.add_terrain_object("void", Vec::new()),
            Err(SimError::EmptyTerrain(_))
        ));
    }

    #[test]
    fn initialize_runs_once() {
        let mut engine = PhysicsEngine::new();
        engine.add_robot(free_sphere(2.0));
        assert!(engine.initialize(&gravity()).expect("well posed"));
        assert!(!engine.initialize(&gravity()).expect("well posed"));
    }

    struct InitialPush(f64);

    impl Controller for InitialPush {
        fn initialize(&mut self, _model: &RobotModel, state: &mut RobotState) {
            state.efforts[0] = self.0;
        }

        fn control(&mut self, _time: f64, _model: &RobotModel, state: &mut RobotState) {
            state.efforts[0] = 0.0;
        }
    }

    #[test]
    fn initialize_runs_controller_setup_before_dynamics() {
        let mut builder = RobotBuilder::new("slider");
        builder.add_body(
            "mass",
            "slide",
            JointKind::Prismatic {
                axis: Vector3::z_axis(),
            },
            None,
            Pose::identity(),
            MassProperties::point_mass(2.0),
        );
        let (model, state) = builder.finish().expect("valid robot");
        let mut robot = Robot::new(model, state);
        robot.set_controller(Box::new(InitialPush(3.0)));

        let mut engine = PhysicsEngine::new();
        let id = engine.add_robot(robot);
        engine.initialize(&Vector3::zeros()).expect("well posed");

        // The setup effort is visible and already folded into the
        // initial accelerations.
        let state = &engine.robot(id).state;
        assert_eq!(state.efforts[0], 3.0);
        assert_relative_eq!(state.qdd[0], 1.5, epsilon = 1e-12);
    }

    #[test]
    fn free_fall_matches_closed_form() {
        let mut engine = PhysicsEngine::new();
        let id = engine.add_robot(free_sphere(10.0));
        let dt = 1e-3;
        for _ in 0..1000 {
            engine.simulate(dt, &gravity()).expect("tick");
        }
        let JointPosition::Pose(pose) = engine.robot(id).state.positions[0] else {
            panic!("floating joint");
        };
        // One second of free fall from 10 m.
        assert_relative_eq!(pose.translation.z, 10.0 - 0.5 * 9.81, epsilon = 1e-6);
        assert_relative_eq!(engine.time(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn sphere_settles_on_ground() {
        let mut engine = PhysicsEngine::new();
        let id = engine.add_robot(free_sphere(0.6));
        engine.add_terrain_object("ground", ground()).expect("non-empty");
        let dt = 1e-3;
        for _ in 0..2000 {
            engine.simulate(dt, &gravity()).expect("tick");
        }
        let JointPosition::Pose(pose) = engine.robot(id).state.positions[0] else {
            panic!("floating joint");
        };
        // Resting height is the radius, give or take the contact slop.
        assert_relative_eq!(pose.translation.z, 0.5, epsilon = 5e-3);
        assert!(engine.robot(id).state.qd[5].abs() < 1e-2);
    }

    #[test]
    fn resting_sphere_height_stays_stable() {
        let mut engine = PhysicsEngine::new();
        let id = engine.add_robot(free_sphere(0.5 - 1e-4));
        engine.add_terrain_object("ground", ground()).expect("non-empty");
        let dt = 1e-3;
        engine.simulate(dt, &gravity()).expect("tick");
        let JointPosition::Pose(first) = engine.robot(id).state.positions[0] else {
            panic!("floating joint");
        };
        for _ in 0..10 {
            engine.simulate(dt, &gravity()).expect("tick");
        }
        let JointPosition::Pose(pose) = engine.robot(id).state.positions[0] else {
            panic!("floating joint");
        };
        // A resting contact keeps producing the same support impulse.
        assert_relative_eq!(pose.translation.z, first.translation.z, epsilon = 1e-4);
    }

    #[test]
    fn two_robots_on_shared_ground_solve_in_separate_groups() {
        let mut engine = PhysicsEngine::new();
        let a = engine.add_robot(free_sphere(0.55));
        let mut second = free_sphere(0.55);
        let JointPosition::Pose(pose) = &mut second.state.positions[0] else {
            panic!("floating joint");
        };
        pose.translation.x = 5.0;
        second.state.update_frames(&second.model);
        let b = engine.add_robot(second);
        engine.add_terrain_object("ground", ground()).expect("non-empty");

        let dt = 1e-3;
        for _ in 0..200 {
            engine.simulate(dt, &gravity()).expect("tick");
        }
        assert_eq!(engine.timings().groups, 2);
        // Far-apart robots behave identically.
        let JointPosition::Pose(pa) = engine.robot(a).state.positions[0] else {
            panic!("floating joint");
        };
        let JointPosition::Pose(pb) = engine.robot(b).state.positions[0] else {
            panic!("floating joint");
        };
        assert_relative_eq!(pa.translation.z, pb.translation.z, epsilon = 1e-6);
    }
}
