//! Broad phase: axis-aligned bounding boxes and overlap pruning.

use nalgebra::Vector3;
use strider_types::Pose;

use super::{Shape, WorldCollidable};

/// World-axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vector3<f64>,
    /// Maximum corner.
    pub max: Vector3<f64>,
}

impl Aabb {
    /// Box from explicit corners.
    #[must_use]
    pub fn new(min: Vector3<f64>, max: Vector3<f64>) -> Self {
        Self { min, max }
    }

    /// Bounding box of a shape at a world pose.
    #[must_use]
    pub fn of_shape(shape: &Shape, pose: &Pose) -> Self {
        match *shape {
            Shape::Sphere { radius } => {
                let r = Vector3::repeat(radius);
                Self::new(pose.translation - r, pose.translation + r)
            }
            Shape::Cuboid { half_extents } => {
                // |R| * h bounds the rotated box along each world axis.
                let r = pose.rotation.to_rotation_matrix().into_inner().abs();
                let extent = r * half_extents;
                Self::new(pose.translation - extent, pose.translation + extent)
            }
            Shape::Capsule {
                radius,
                half_length,
            } => {
                let axis = pose.transform_vector(&Vector3::new(0.0, 0.0, half_length));
                let a = pose.translation + axis;
                let b = pose.translation - axis;
                let r = Vector3::repeat(radius);
                Self::new(a.inf(&b) - r, a.sup(&b) + r)
            }
            // Conservative: a half space can touch anything.
            Shape::HalfSpace => Self::new(
                Vector3::repeat(f64::NEG_INFINITY),
                Vector3::repeat(f64::INFINITY),
            ),
        }
    }

    /// Whether two boxes overlap (touching counts).
    #[must_use]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
            && self.min.z <= other.max.z
            && other.min.z <= self.max.z
    }
}

/// All index pairs `(i, j)` with `i < j` whose bounding boxes overlap.
///
/// Quadratic sweep in index order. Collidable counts per world are small
/// enough that the constant factor of a spatial structure is not worth
/// paying, and index order keeps the output deterministic.
#[must_use]
pub fn overlapping_pairs(collidables: &[WorldCollidable]) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for i in 0..collidables.len() {
        for j in (i + 1)..collidables.len() {
            if collidables[i].aabb.overlaps(&collidables[j].aabb) {
                pairs.push((i, j));
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;

    #[test]
    fn sphere_aabb_is_centered_cube() {
        let pose = Pose::from_translation(Vector3::new(1.0, 2.0, 3.0));
        let aabb = Aabb::of_shape(&Shape::Sphere { radius: 0.5 }, &pose);
        assert_relative_eq!(aabb.min, Vector3::new(0.5, 1.5, 2.5), epsilon = 1e-12);
        assert_relative_eq!(aabb.max, Vector3::new(1.5, 2.5, 3.5), epsilon = 1e-12);
    }

    #[test]
    fn rotated_cuboid_aabb_grows() {
        let pose = Pose::from_rotation(UnitQuaternion::from_axis_angle(
            &Vector3::z_axis(),
            std::f64::consts::FRAC_PI_4,
        ));
        let aabb = Aabb::of_shape(
            &Shape::Cuboid {
                half_extents: Vector3::new(1.0, 1.0, 0.1),
            },
            &pose,
        );
        let expected = 2.0_f64.sqrt();
        assert_relative_eq!(aabb.max.x, expected, epsilon = 1e-12);
        assert_relative_eq!(aabb.max.y, expected, epsilon = 1e-12);
        assert_relative_eq!(aabb.max.z, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn capsule_aabb_spans_both_caps() {
        let pose = Pose::identity();
        let aabb = Aabb::of_shape(
            &Shape::Capsule {
                radius: 0.2,
                half_length: 0.5,
            },
            &pose,
        );
        assert_relative_eq!(aabb.min.z, -0.7, epsilon = 1e-12);
        assert_relative_eq!(aabb.max.z, 0.7, epsilon = 1e-12);
        assert_relative_eq!(aabb.max.x, 0.2, epsilon = 1e-12);
    }

    #[test]
    fn disjoint_boxes_do_not_overlap() {
        let a = Aabb::new(Vector3::zeros(), Vector3::repeat(1.0));
        let b = Aabb::new(Vector3::repeat(2.0), Vector3::repeat(3.0));
        assert!(!a.overlaps(&b));
        let c = Aabb::new(Vector3::repeat(0.5), Vector3::repeat(3.0));
        assert!(a.overlaps(&c));
    }
}
