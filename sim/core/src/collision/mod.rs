//! Collision detection: collidables, bounding volumes, and per-tick
//! contact generation.
//!
//! Contacts are recomputed from scratch every tick and never persisted;
//! the detector is a pure function of the current world geometry, which
//! keeps repeated evaluation on an unchanged world bit-identical. Pair
//! iteration follows collidable index order, so output ordering is
//! deterministic.

pub mod broad;
pub mod narrow;

use nalgebra::Vector3;
use strider_types::{BodyId, Pose};

use crate::multibody::RobotModel;
use broad::Aabb;

/// Geometric primitive used for contact detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    /// Sphere centered on the collidable frame origin.
    Sphere {
        /// Sphere radius.
        radius: f64,
    },
    /// Axis-aligned box in the collidable frame.
    Cuboid {
        /// Half extent along each local axis.
        half_extents: Vector3<f64>,
    },
    /// Capsule along the local z axis.
    Capsule {
        /// Radius of the cylindrical section and end caps.
        radius: f64,
        /// Half length of the cylindrical section.
        half_length: f64,
    },
    /// Half space filling local z ≤ 0 (outward normal +z).
    HalfSpace,
}

/// A shape rigidly attached to a body frame (or to the world, for
/// terrain). The collidable never owns its body; it refers back to it by
/// handle.
#[derive(Debug, Clone)]
pub struct Collidable {
    /// The attached shape.
    pub shape: Shape,
    /// Shape pose relative to the body frame (or world, for terrain).
    pub local_pose: Pose,
    /// Owning body, `None` for terrain collidables.
    pub body: Option<BodyId>,
}

/// A collidable resolved to world space for the current tick, with its
/// refreshed bounding volume.
#[derive(Debug, Clone)]
pub struct WorldCollidable {
    /// Owning robot's index in the engine's robot list; `None` = terrain.
    pub robot: Option<usize>,
    /// Owning body within that robot.
    pub body: Option<BodyId>,
    /// The shape.
    pub shape: Shape,
    /// World pose of the shape this tick.
    pub pose: Pose,
    /// World-space bounding volume this tick.
    pub aabb: Aabb,
}

impl WorldCollidable {
    /// Resolve a collidable to world space through its body pose.
    #[must_use]
    pub fn new(robot: Option<usize>, collidable: &Collidable, body_pose: &Pose) -> Self {
        let pose = body_pose.compose(&collidable.local_pose);
        Self {
            robot,
            body: collidable.body,
            shape: collidable.shape,
            aabb: Aabb::of_shape(&collidable.shape, &pose),
            pose,
        }
    }
}

/// A detected contact between two collidables. Lives for one tick.
#[derive(Debug, Clone)]
pub struct Contact {
    /// Index of the first collidable in this tick's world list.
    pub collidable_a: usize,
    /// Index of the second collidable.
    pub collidable_b: usize,
    /// Robot owning side A (`None` = terrain).
    pub robot_a: Option<usize>,
    /// Robot owning side B (`None` = terrain).
    pub robot_b: Option<usize>,
    /// Body on side A.
    pub body_a: Option<BodyId>,
    /// Body on side B.
    pub body_b: Option<BodyId>,
    /// Contact point in world space.
    pub point: Vector3<f64>,
    /// Unit normal pointing from A toward B.
    pub normal: Vector3<f64>,
    /// Penetration depth (positive = overlapping).
    pub depth: f64,
    /// First friction tangent; orthonormal with `tangent2` and `normal`.
    pub tangent1: Vector3<f64>,
    /// Second friction tangent.
    pub tangent2: Vector3<f64>,
}

/// Compute an orthonormal tangent frame from a contact normal.
///
/// Returns `(t1, t2)` such that `(t1, t2, n)` is right-handed. Degenerate
/// (zero or non-finite) normals get a default frame; the caller is
/// expected to have rejected such contacts already.
#[must_use]
pub fn tangent_frame(normal: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let norm = normal.norm();
    if !norm.is_finite() || norm < 1e-10 {
        return (Vector3::x(), Vector3::y());
    }
    let n = normal / norm;

    let reference = if n.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    let t1 = (reference - n * n.dot(&reference)).normalize();
    let t2 = n.cross(&t1);
    (t1, t2)
}

/// Detect all contacts among `collidables` with penetration of at least
/// `minimum_penetration`.
///
/// Pairs are skipped when both collidables sit on the same body, when
/// they belong to one robot that has self-collision disabled, when they
/// sit on bodies joined by a fixed joint, or when both are terrain.
#[must_use]
pub fn detect_contacts(
    collidables: &[WorldCollidable],
    robot_models: &[&RobotModel],
    minimum_penetration: f64,
) -> Vec<Contact> {
    let mut contacts = Vec::new();

    for (i, j) in broad::overlapping_pairs(collidables) {
        let a = &collidables[i];
        let b = &collidables[j];

        if !pair_admissible(a, b, robot_models) {
            continue;
        }

        let Some(geometry) = narrow::collide(&a.shape, &a.pose, &b.shape, &b.pose) else {
            continue;
        };
        if geometry.depth < minimum_penetration {
            continue;
        }

        let (tangent1, tangent2) = tangent_frame(&geometry.normal);
        contacts.push(Contact {
            collidable_a: i,
            collidable_b: j,
            robot_a: a.robot,
            robot_b: b.robot,
            body_a: a.body,
            body_b: b.body,
            point: geometry.point,
            normal: geometry.normal,
            depth: geometry.depth,
            tangent1,
            tangent2,
        });
    }

    contacts
}

fn pair_admissible(
    a: &WorldCollidable,
    b: &WorldCollidable,
    robot_models: &[&RobotModel],
) -> bool {
    match (a.robot, b.robot) {
        // Terrain never collides with terrain.
        (None, None) => false,
        (Some(ra), Some(rb)) if ra == rb => {
            let model = robot_models[ra];
            if !model.self_collision {
                return false;
            }
            match (a.body, b.body) {
                (Some(ba), Some(bb)) => ba != bb && !model.rigidly_attached(ba, bb),
                _ => false,
            }
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multibody::joint::JointKind;
    use crate::multibody::{RobotBuilder, RobotModel, RobotState};
    use approx::assert_relative_eq;
    use strider_types::MassProperties;

    fn two_body_robot(kind: JointKind) -> (RobotModel, RobotState) {
        let mut builder = RobotBuilder::new("pair").with_self_collision(true);
        let root = builder.add_body(
            "root",
            "base",
            JointKind::Floating,
            None,
            Pose::identity(),
            MassProperties::solid_sphere(1.0, 0.5),
        );
        builder.add_body(
            "tip",
            "link",
            kind,
            Some(root),
            Pose::from_translation(Vector3::new(0.6, 0.0, 0.0)),
            MassProperties::solid_sphere(1.0, 0.5),
        );
        builder.finish().expect("valid robot")
    }

    fn self_contacts(model: &RobotModel, state: &RobotState) -> Vec<Contact> {
        let sphere = |body: usize| Collidable {
            shape: Shape::Sphere { radius: 0.5 },
            local_pose: Pose::identity(),
            body: Some(BodyId::from(body)),
        };
        let world = vec![
            WorldCollidable::new(Some(0), &sphere(0), &state.body_poses[0]),
            WorldCollidable::new(Some(0), &sphere(1), &state.body_poses[1]),
        ];
        detect_contacts(&world, &[model], 5e-5)
    }

    #[test]
    fn fixed_joint_neighbors_never_collide() {
        let (model, state) = two_body_robot(JointKind::Fixed);
        assert!(self_contacts(&model, &state).is_empty());
    }

    #[test]
    fn articulated_neighbors_do_collide() {
        let (model, state) = two_body_robot(JointKind::Revolute {
            axis: Vector3::y_axis(),
        });
        let contacts = self_contacts(&model, &state);
        assert_eq!(contacts.len(), 1);
        assert_relative_eq!(contacts[0].depth, 0.4, epsilon = 1e-12);
    }

    #[test]
    fn tangent_frame_is_orthonormal() {
        for normal in [
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.6, -0.48, 0.64),
        ] {
            let (t1, t2) = tangent_frame(&normal);
            let n = normal.normalize();
            assert_relative_eq!(t1.norm(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(t2.norm(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(t1.dot(&n), 0.0, epsilon = 1e-12);
            assert_relative_eq!(t2.dot(&n), 0.0, epsilon = 1e-12);
            assert_relative_eq!(t1.cross(&t2), n, epsilon = 1e-12);
        }
    }

    #[test]
    fn tangent_frame_survives_degenerate_normal() {
        let (t1, t2) = tangent_frame(&Vector3::zeros());
        assert_relative_eq!(t1, Vector3::x(), epsilon = 1e-12);
        assert_relative_eq!(t2, Vector3::y(), epsilon = 1e-12);
    }
}
