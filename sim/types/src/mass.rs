//! Rigid-body mass properties.

use nalgebra::{Matrix3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Mass, rotational inertia, and center-of-mass offset of a rigid body.
///
/// The inertia tensor is expressed about the center of mass in the body
/// frame. The offset locates the center of mass relative to the body
/// origin, in the body frame.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MassProperties {
    /// Body mass in kilograms. Must be strictly positive for any body
    /// that moves; validated at robot construction.
    pub mass: f64,
    /// Inertia tensor about the center of mass, body frame, kg·m².
    pub inertia: Matrix3<f64>,
    /// Center of mass relative to the body origin, body frame.
    pub com_offset: Vector3<f64>,
}

impl MassProperties {
    /// Uniform solid sphere.
    #[must_use]
    pub fn solid_sphere(mass: f64, radius: f64) -> Self {
        let i = 0.4 * mass * radius * radius;
        Self {
            mass,
            inertia: Matrix3::from_diagonal_element(i),
            com_offset: Vector3::zeros(),
        }
    }

    /// Uniform solid box with full extents (not half-extents).
    #[must_use]
    pub fn solid_box(mass: f64, extents: Vector3<f64>) -> Self {
        let c = mass / 12.0;
        let (x2, y2, z2) = (
            extents.x * extents.x,
            extents.y * extents.y,
            extents.z * extents.z,
        );
        Self {
            mass,
            inertia: Matrix3::from_diagonal(&Vector3::new(
                c * (y2 + z2),
                c * (x2 + z2),
                c * (x2 + y2),
            )),
            com_offset: Vector3::zeros(),
        }
    }

    /// Point mass at the body origin.
    #[must_use]
    pub fn point_mass(mass: f64) -> Self {
        Self {
            mass,
            inertia: Matrix3::zeros(),
            com_offset: Vector3::zeros(),
        }
    }

    /// Shift the center of mass away from the body origin.
    #[must_use]
    pub fn with_com_offset(mut self, offset: Vector3<f64>) -> Self {
        self.com_offset = offset;
        self
    }

    /// True when the mass is finite and strictly positive and the
    /// inertia tensor contains no non-finite entries.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.mass.is_finite()
            && self.mass > 0.0
            && self.inertia.iter().all(|v| v.is_finite())
            && self.com_offset.iter().all(|v| v.is_finite())
    }
}
