//! Kinematic tree arena, builder, and per-robot mutable state.
//!
//! Bodies and joints live in parallel arenas with matching indices: the
//! joint at index `i` is the parent joint of the body at index `i`. The
//! builder only accepts a parent that already exists, so arena order is
//! topological (every parent index is smaller than its children) and the
//! dynamics recursions are plain forward/backward loops over the arena.

use hashbrown::HashSet;
use nalgebra::DVector;
use strider_types::{BodyId, JointId, MassProperties, Pose};

use crate::dynamics::spatial::SpatialVector;
use crate::error::{SimError, SimResult};
use crate::multibody::joint::{
    JointKind, JointLimits, JointPosition, joint_motion,
};

/// A rigid body in the kinematic tree.
#[derive(Debug, Clone)]
pub struct RigidBody {
    /// Body name, unique within the robot.
    pub name: String,
    /// Mass, inertia about COM (body frame), and COM offset.
    pub mass: MassProperties,
    /// Parent joint; always the joint with the same arena index.
    pub parent_joint: JointId,
    /// Joints whose predecessor is this body.
    pub child_joints: Vec<JointId>,
}

/// A joint connecting a predecessor body (or the world) to its successor.
#[derive(Debug, Clone)]
pub struct Joint {
    /// Joint name, unique within the robot.
    pub name: String,
    /// Permitted motion.
    pub kind: JointKind,
    /// Predecessor body; `None` for the robot's root joint.
    pub predecessor: Option<BodyId>,
    /// Successor body; shares this joint's arena index.
    pub successor: BodyId,
    /// Fixed transform from the predecessor body frame (or world) to the
    /// frame before the joint.
    pub parent_transform: Pose,
    /// Scalar limits; only meaningful for 1-DoF kinds.
    pub limits: Option<JointLimits>,
}

/// Immutable description of one robot's kinematic tree.
#[derive(Debug, Clone)]
pub struct RobotModel {
    /// Robot name.
    pub name: String,
    /// Body arena, topologically ordered.
    pub bodies: Vec<RigidBody>,
    /// Joint arena, index-matched with `bodies`.
    pub joints: Vec<Joint>,
    /// First velocity index of each joint in the robot's flat DoF vector.
    pub dof_offsets: Vec<usize>,
    /// Total velocity degrees of freedom.
    pub nv: usize,
    /// Whether collidables on non-adjacent bodies of this robot may
    /// collide with each other.
    pub self_collision: bool,
}

impl RobotModel {
    /// Velocity-vector range of one joint.
    #[must_use]
    pub fn dof_range(&self, joint: JointId) -> std::ops::Range<usize> {
        let start = self.dof_offsets[joint.index()];
        start..start + self.joints[joint.index()].kind.dof()
    }

    /// True when the two bodies are connected by a fixed joint. Such
    /// bodies move as one rigid piece, so contacts between them are
    /// meaningless; articulated neighbors may still collide.
    #[must_use]
    pub fn rigidly_attached(&self, a: BodyId, b: BodyId) -> bool {
        let fixed = |child: BodyId, parent: BodyId| {
            self.joints[child.index()].predecessor == Some(parent)
                && self.joints[child.index()].kind == JointKind::Fixed
        };
        fixed(a, b) || fixed(b, a)
    }
}

/// Mutable per-robot simulation state.
///
/// Generalized velocities, accelerations, velocity deltas, and efforts
/// are flat vectors indexed through [`RobotModel::dof_range`]; positions
/// keep their kind-specific representation per joint.
#[derive(Debug, Clone)]
pub struct RobotState {
    /// Per-joint generalized positions.
    pub positions: Vec<JointPosition>,
    /// Generalized velocities (length `nv`).
    pub qd: DVector<f64>,
    /// Generalized accelerations (length `nv`), written by forward dynamics.
    pub qdd: DVector<f64>,
    /// Impulse-induced velocity deltas accumulated during constraint
    /// resolution (length `nv`), consumed by the integrator.
    pub delta_qd: DVector<f64>,
    /// Joint efforts written by the controller (length `nv`).
    pub efforts: DVector<f64>,
    /// World pose of each body (the frame after its parent joint).
    pub body_poses: Vec<Pose>,
    /// External wrenches about the world origin accumulated per body,
    /// cleared at the start of each tick.
    pub external_wrenches: Vec<SpatialVector>,
}

impl RobotState {
    fn new(model: &RobotModel, positions: Vec<JointPosition>, qd: DVector<f64>) -> Self {
        let nb = model.bodies.len();
        let mut state = Self {
            positions,
            qd,
            qdd: DVector::zeros(model.nv),
            delta_qd: DVector::zeros(model.nv),
            efforts: DVector::zeros(model.nv),
            body_poses: vec![Pose::identity(); nb],
            external_wrenches: vec![SpatialVector::zeros(); nb],
        };
        state.update_frames(model);
        state
    }

    /// Recompute world body poses from the current joint positions.
    pub fn update_frames(&mut self, model: &RobotModel) {
        for (i, joint) in model.joints.iter().enumerate() {
            let parent_pose = match joint.predecessor {
                Some(body) => self.body_poses[body.index()],
                None => Pose::identity(),
            };
            let before = parent_pose.compose(&joint.parent_transform);
            let motion = joint_motion(&joint.kind, &self.positions[i]);
            self.body_poses[joint.successor.index()] = before.compose(&motion);
        }
    }

    /// Clear per-tick accumulators (efforts, wrenches, velocity deltas).
    pub fn reset_tick_accumulators(&mut self) {
        self.efforts.fill(0.0);
        self.delta_qd.fill(0.0);
        for wrench in &mut self.external_wrenches {
            wrench.fill(0.0);
        }
    }

    /// Verify that positions, velocities, and accelerations are finite.
    pub fn check_finite(&self, model: &RobotModel) -> SimResult<()> {
        for i in 0..model.joints.len() {
            if !self.positions[i].is_finite() {
                return Err(non_finite(model, i, "position"));
            }
            for dof in model.dof_range(JointId::from(i)) {
                if !self.qd[dof].is_finite() {
                    return Err(non_finite(model, i, "velocity"));
                }
                if !self.qdd[dof].is_finite() {
                    return Err(non_finite(model, i, "acceleration"));
                }
            }
        }
        Ok(())
    }
}

fn non_finite(model: &RobotModel, joint: usize, quantity: &'static str) -> SimError {
    SimError::NonFiniteState {
        robot: model.name.clone(),
        joint: model.joints[joint].name.clone(),
        quantity,
    }
}

struct PendingBody {
    body_name: String,
    joint_name: String,
    kind: JointKind,
    predecessor: Option<BodyId>,
    parent_transform: Pose,
    mass: MassProperties,
    limits: Option<JointLimits>,
    initial_position: JointPosition,
    initial_velocity: Vec<f64>,
}

/// Incremental constructor for a [`RobotModel`] and its initial state.
///
/// The single-parent, acyclic-tree invariant is enforced here, by
/// construction: a body can only be attached to a parent that already
/// exists, and validation runs once in [`RobotBuilder::finish`].
pub struct RobotBuilder {
    name: String,
    pending: Vec<PendingBody>,
    self_collision: bool,
}

impl RobotBuilder {
    /// Start a robot definition.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pending: Vec::new(),
            self_collision: false,
        }
    }

    /// Allow contacts between non-adjacent bodies of this robot.
    #[must_use]
    pub fn with_self_collision(mut self, enabled: bool) -> Self {
        self.self_collision = enabled;
        self
    }

    /// Attach a body to `parent` (or the world when `None`) through a
    /// joint of the given kind. Returns the new body's handle.
    pub fn add_body(
        &mut self,
        body_name: impl Into<String>,
        joint_name: impl Into<String>,
        kind: JointKind,
        parent: Option<BodyId>,
        parent_transform: Pose,
        mass: MassProperties,
    ) -> BodyId {
        let id = BodyId::from(self.pending.len());
        self.pending.push(PendingBody {
            body_name: body_name.into(),
            joint_name: joint_name.into(),
            initial_position: kind.neutral_position(),
            initial_velocity: vec![0.0; kind.dof()],
            kind,
            predecessor: parent,
            parent_transform,
            mass,
            limits: None,
        });
        id
    }

    /// Set scalar limits on the parent joint of `body`.
    pub fn set_joint_limits(&mut self, body: BodyId, limits: JointLimits) {
        self.pending[body.index()].limits = Some(limits);
    }

    /// Set the initial position of the parent joint of `body`.
    pub fn set_initial_position(&mut self, body: BodyId, position: JointPosition) {
        self.pending[body.index()].initial_position = position;
    }

    /// Set the initial generalized velocity of the parent joint of `body`.
    pub fn set_initial_velocity(&mut self, body: BodyId, velocity: &[f64]) {
        self.pending[body.index()].initial_velocity = velocity.to_vec();
    }

    /// Validate and produce the model plus its initial state.
    pub fn finish(self) -> SimResult<(RobotModel, RobotState)> {
        let robot = self.name;

        let mut seen = HashSet::new();
        let mut roots = 0usize;
        for pending in &self.pending {
            for name in [&pending.body_name, &pending.joint_name] {
                if !seen.insert(name.clone()) {
                    return Err(SimError::DuplicateName {
                        robot: robot.clone(),
                        name: name.clone(),
                    });
                }
            }
            if !pending.mass.is_valid() {
                return Err(SimError::InvalidMassProperties {
                    robot: robot.clone(),
                    body: pending.body_name.clone(),
                    mass: pending.mass.mass,
                });
            }
            if let Some(parent) = pending.predecessor {
                if parent.index() >= self.pending.len() {
                    return Err(SimError::UnknownBody {
                        robot: robot.clone(),
                        index: parent.index(),
                    });
                }
            } else {
                roots += 1;
            }
            if pending.limits.is_some() && pending.kind.dof() != 1 {
                return Err(SimError::InvalidJoint {
                    robot: robot.clone(),
                    joint: pending.joint_name.clone(),
                    message: "scalar limits are only supported on 1-DoF joints".into(),
                });
            }
            if pending.initial_velocity.len() != pending.kind.dof() {
                return Err(SimError::InvalidJoint {
                    robot: robot.clone(),
                    joint: pending.joint_name.clone(),
                    message: format!(
                        "initial velocity has {} coordinates, joint has {} DoF",
                        pending.initial_velocity.len(),
                        pending.kind.dof()
                    ),
                });
            }
        }
        if roots != 1 {
            return Err(SimError::MalformedTree {
                robot,
                message: format!("expected exactly one root joint, found {roots}"),
            });
        }

        let mut bodies = Vec::with_capacity(self.pending.len());
        let mut joints = Vec::with_capacity(self.pending.len());
        let mut dof_offsets = Vec::with_capacity(self.pending.len());
        let mut positions = Vec::with_capacity(self.pending.len());
        let mut qd_flat = Vec::new();
        let mut nv = 0usize;

        for (i, pending) in self.pending.iter().enumerate() {
            bodies.push(RigidBody {
                name: pending.body_name.clone(),
                mass: pending.mass,
                parent_joint: JointId::from(i),
                child_joints: Vec::new(),
            });
            joints.push(Joint {
                name: pending.joint_name.clone(),
                kind: pending.kind,
                predecessor: pending.predecessor,
                successor: BodyId::from(i),
                parent_transform: pending.parent_transform,
                limits: pending.limits,
            });
            dof_offsets.push(nv);
            nv += pending.kind.dof();
            positions.push(pending.initial_position);
            qd_flat.extend_from_slice(&pending.initial_velocity);
        }

        for i in 0..joints.len() {
            if let Some(parent) = joints[i].predecessor {
                bodies[parent.index()].child_joints.push(JointId::from(i));
            }
        }

        let model = RobotModel {
            name: robot,
            bodies,
            joints,
            dof_offsets,
            nv,
            self_collision: self.self_collision,
        };
        let state = RobotState::new(&model, positions, DVector::from_vec(qd_flat));
        Ok((model, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn double_pendulum() -> (RobotModel, RobotState) {
        let mut builder = RobotBuilder::new("pendulum");
        let upper = builder.add_body(
            "upper",
            "shoulder",
            JointKind::Revolute {
                axis: Vector3::y_axis(),
            },
            None,
            Pose::identity(),
            MassProperties::point_mass(1.0),
        );
        builder.add_body(
            "lower",
            "elbow",
            JointKind::Revolute {
                axis: Vector3::y_axis(),
            },
            Some(upper),
            Pose::from_translation(Vector3::new(0.0, 0.0, -1.0)),
            MassProperties::point_mass(1.0),
        );
        builder.finish().expect("valid robot")
    }

    #[test]
    fn builds_topologically_ordered_tree() {
        let (model, _) = double_pendulum();
        assert_eq!(model.nv, 2);
        assert_eq!(model.dof_offsets, vec![0, 1]);
        assert_eq!(model.joints[1].predecessor, Some(BodyId(0)));
        assert_eq!(model.bodies[0].child_joints, vec![JointId(1)]);
    }

    #[test]
    fn forward_kinematics_places_lower_link() {
        let (model, mut state) = double_pendulum();
        state.positions[0] = JointPosition::Scalar(std::f64::consts::FRAC_PI_2);
        state.update_frames(&model);
        // Rotating the shoulder by +90° about y swings the elbow offset
        // (0, 0, -1) onto the world -x axis.
        assert_relative_eq!(
            state.body_poses[1].translation,
            Vector3::new(-1.0, 0.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn rejects_massless_body() {
        let mut builder = RobotBuilder::new("bad");
        builder.add_body(
            "base",
            "root",
            JointKind::Floating,
            None,
            Pose::identity(),
            MassProperties::point_mass(0.0),
        );
        assert!(matches!(
            builder.finish(),
            Err(SimError::InvalidMassProperties { .. })
        ));
    }

    #[test]
    fn rejects_two_roots() {
        let mut builder = RobotBuilder::new("twins");
        builder.add_body(
            "a",
            "ja",
            JointKind::Floating,
            None,
            Pose::identity(),
            MassProperties::point_mass(1.0),
        );
        builder.add_body(
            "b",
            "jb",
            JointKind::Floating,
            None,
            Pose::identity(),
            MassProperties::point_mass(1.0),
        );
        assert!(matches!(
            builder.finish(),
            Err(SimError::MalformedTree { .. })
        ));
    }

    #[test]
    fn rejects_limits_on_spherical_joint() {
        let mut builder = RobotBuilder::new("ball");
        let b = builder.add_body(
            "b",
            "j",
            JointKind::Spherical,
            None,
            Pose::identity(),
            MassProperties::point_mass(1.0),
        );
        builder.set_joint_limits(b, JointLimits::default());
        assert!(matches!(
            builder.finish(),
            Err(SimError::InvalidJoint { .. })
        ));
    }
}
