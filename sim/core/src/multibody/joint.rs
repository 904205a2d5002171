//! Joint kinds, per-kind state representation, and motion subspaces.
//!
//! The joint taxonomy is a closed sum type: the simulator supports a
//! fixed set of joint kinds and every per-kind behavior (integration,
//! dynamics contribution, motion subspace) is resolved by exhaustive
//! pattern matching. Adding a kind is a compile-time event.

use nalgebra::{Matrix6xX, Unit, UnitQuaternion, Vector3};
use strider_types::Pose;

use crate::dynamics::spatial::spatial;

/// The kind of motion a joint permits between its predecessor and
/// successor bodies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JointKind {
    /// Rigid attachment; zero degrees of freedom.
    Fixed,
    /// One rotational degree of freedom about `axis` (joint frame).
    Revolute {
        /// Rotation axis in the joint frame.
        axis: Unit<Vector3<f64>>,
    },
    /// One translational degree of freedom along `axis` (joint frame).
    Prismatic {
        /// Translation axis in the joint frame.
        axis: Unit<Vector3<f64>>,
    },
    /// Three rotational degrees of freedom (ball joint).
    Spherical,
    /// Translation in the joint-frame x/z plane plus rotation about the
    /// joint-frame y axis; three degrees of freedom.
    Planar,
    /// Unconstrained six-degree-of-freedom joint (floating base).
    Floating,
}

impl JointKind {
    /// Number of velocity degrees of freedom this kind contributes.
    #[must_use]
    pub fn dof(&self) -> usize {
        match self {
            Self::Fixed => 0,
            Self::Revolute { .. } | Self::Prismatic { .. } => 1,
            Self::Spherical | Self::Planar => 3,
            Self::Floating => 6,
        }
    }

    /// Neutral (zero) position for this kind.
    #[must_use]
    pub fn neutral_position(&self) -> JointPosition {
        match self {
            Self::Fixed => JointPosition::Empty,
            Self::Revolute { .. } | Self::Prismatic { .. } => JointPosition::Scalar(0.0),
            Self::Spherical => JointPosition::Orientation(UnitQuaternion::identity()),
            Self::Planar => JointPosition::Planar {
                x: 0.0,
                z: 0.0,
                pitch: 0.0,
            },
            Self::Floating => JointPosition::Pose(Pose::identity()),
        }
    }
}

/// Generalized position of one joint, with a kind-specific representation.
///
/// Orientation-bearing kinds store a unit quaternion rather than
/// generalized coordinates so the integrator can compose rotation-vector
/// increments without singularities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JointPosition {
    /// Fixed joints carry no position.
    Empty,
    /// Revolute angle (radians) or prismatic displacement (meters).
    Scalar(f64),
    /// Spherical joint orientation.
    Orientation(UnitQuaternion<f64>),
    /// Planar joint coordinates: x/z translation and pitch angle.
    Planar {
        /// Translation along the joint-frame x axis.
        x: f64,
        /// Translation along the joint-frame z axis.
        z: f64,
        /// Rotation about the joint-frame y axis.
        pitch: f64,
    },
    /// Floating joint pose relative to the frame before the joint.
    Pose(Pose),
}

impl JointPosition {
    /// True when every stored coordinate is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Scalar(q) => q.is_finite(),
            Self::Orientation(q) => q.coords.iter().all(|v| v.is_finite()),
            Self::Planar { x, z, pitch } => x.is_finite() && z.is_finite() && pitch.is_finite(),
            Self::Pose(pose) => {
                pose.translation.iter().all(|v| v.is_finite())
                    && pose.rotation.coords.iter().all(|v| v.is_finite())
            }
        }
    }
}

/// Scalar limits for 1-DoF joints.
///
/// Position limits become unilateral constraints in the impulse solver;
/// the effort limit clamps controller output at write time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointLimits {
    /// Lower position limit.
    pub position_lower: f64,
    /// Upper position limit.
    pub position_upper: f64,
    /// Symmetric velocity magnitude limit.
    pub velocity_max: f64,
    /// Symmetric effort magnitude limit.
    pub effort_max: f64,
}

impl Default for JointLimits {
    fn default() -> Self {
        Self {
            position_lower: f64::NEG_INFINITY,
            position_upper: f64::INFINITY,
            velocity_max: f64::INFINITY,
            effort_max: f64::INFINITY,
        }
    }
}

/// Pose displacement produced by a joint at the given position: maps the
/// frame after the joint into the frame before it.
#[must_use]
pub fn joint_motion(kind: &JointKind, position: &JointPosition) -> Pose {
    match (kind, position) {
        (JointKind::Fixed, _) => Pose::identity(),
        (JointKind::Revolute { axis }, JointPosition::Scalar(q)) => {
            Pose::from_rotation(UnitQuaternion::from_axis_angle(axis, *q))
        }
        (JointKind::Prismatic { axis }, JointPosition::Scalar(q)) => {
            Pose::from_translation(axis.into_inner() * *q)
        }
        (JointKind::Spherical, JointPosition::Orientation(q)) => Pose::from_rotation(*q),
        (JointKind::Planar, JointPosition::Planar { x, z, pitch }) => Pose::new(
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), *pitch),
            Vector3::new(*x, 0.0, *z),
        ),
        (JointKind::Floating, JointPosition::Pose(pose)) => *pose,
        // The builder pairs each joint with its kind's neutral position,
        // and the integrator preserves the representation, so a mismatch
        // cannot occur in a constructed robot.
        _ => unreachable!("joint position representation does not match joint kind"),
    }
}

/// Motion subspace of a joint in world-origin spatial coordinates.
///
/// Returns a 6×dof matrix whose columns map generalized velocities to
/// spatial velocity. `frame` is the world pose of the frame after the
/// joint; velocities of spherical and floating joints are expressed in
/// that frame, matching the integrator's convention.
#[must_use]
pub fn motion_subspace(kind: &JointKind, frame: &Pose) -> Matrix6xX<f64> {
    let p = frame.translation;
    let rot = |v: Vector3<f64>| frame.rotation * v;

    // A unit angular rate about a world-axis `a` through the point `p`
    // moves the body point at the world origin with velocity p × a.
    let angular_col = |a: Vector3<f64>| spatial(a, p.cross(&a));
    let linear_col = |a: Vector3<f64>| spatial(Vector3::zeros(), a);

    let cols: Vec<_> = match kind {
        JointKind::Fixed => Vec::new(),
        JointKind::Revolute { axis } => vec![angular_col(rot(axis.into_inner()))],
        JointKind::Prismatic { axis } => vec![linear_col(rot(axis.into_inner()))],
        JointKind::Spherical => (0..3)
            .map(|i| angular_col(rot(basis_vector(i))))
            .collect(),
        JointKind::Planar => vec![
            linear_col(rot(Vector3::x())),
            linear_col(rot(Vector3::z())),
            angular_col(rot(Vector3::y())),
        ],
        JointKind::Floating => (0..3)
            .map(|i| angular_col(rot(basis_vector(i))))
            .chain((0..3).map(|i| linear_col(rot(basis_vector(i)))))
            .collect(),
    };

    if cols.is_empty() {
        Matrix6xX::zeros(0)
    } else {
        Matrix6xX::from_columns(&cols)
    }
}

fn basis_vector(i: usize) -> Vector3<f64> {
    let mut v = Vector3::zeros();
    v[i] = 1.0;
    v
}
