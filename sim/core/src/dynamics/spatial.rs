//! Spatial (6D) vector algebra for the dynamics recursions.
//!
//! All spatial quantities in this crate are expressed in world axes with
//! the world origin as reference point, ordering [angular (3), linear (3)].
//! Using one common coordinate frame removes every coordinate transform
//! from the articulated-body and composite-inertia recursions: propagating
//! a quantity from parent to child is a plain addition.
//!
//! Motion vectors are [ω, v_O] where v_O is the velocity of the body-fixed
//! point currently coincident with the world origin; the velocity of a
//! point p is `v_O + ω × p`. Force vectors are [τ_O, f].

use nalgebra::{Matrix3, Matrix6, Vector3, Vector6};

/// 6D spatial vector: [angular (3), linear (3)].
pub type SpatialVector = Vector6<f64>;

/// Angular (first) half of a spatial vector.
#[inline]
#[must_use]
pub fn angular(v: &SpatialVector) -> Vector3<f64> {
    Vector3::new(v[0], v[1], v[2])
}

/// Linear (second) half of a spatial vector.
#[inline]
#[must_use]
pub fn linear(v: &SpatialVector) -> Vector3<f64> {
    Vector3::new(v[3], v[4], v[5])
}

/// Assemble a spatial vector from its angular and linear parts.
#[inline]
#[must_use]
pub fn spatial(ang: Vector3<f64>, lin: Vector3<f64>) -> SpatialVector {
    SpatialVector::new(ang.x, ang.y, ang.z, lin.x, lin.y, lin.z)
}

/// Spatial cross product for motion vectors: `v ×ₘ s`.
#[inline]
#[must_use]
pub fn cross_motion(v: &SpatialVector, s: &SpatialVector) -> SpatialVector {
    let w = angular(v);
    let v_lin = linear(v);
    let s_ang = angular(s);
    let s_lin = linear(s);
    spatial(w.cross(&s_ang), w.cross(&s_lin) + v_lin.cross(&s_ang))
}

/// Spatial cross product for force vectors: `v ×𝒇 f`.
#[inline]
#[must_use]
pub fn cross_force(v: &SpatialVector, f: &SpatialVector) -> SpatialVector {
    let w = angular(v);
    let v_lin = linear(v);
    let f_ang = angular(f);
    let f_lin = linear(f);
    spatial(w.cross(&f_ang) + v_lin.cross(&f_lin), w.cross(&f_lin))
}

/// Skew-symmetric cross-product matrix of `v`.
#[inline]
#[must_use]
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Spatial inertia of a rigid body about the world origin, world axes.
///
/// Built from the body mass `m`, the rotational inertia about the center
/// of mass in world axes `i_com_world`, and the world position of the
/// center of mass `c` (the lever arm from the reference point):
///
/// ```text
/// I = [ I_com + m (c·c 𝟙 − c cᵀ)   m [c]×  ]
///     [ m [c]×ᵀ                    m 𝟙     ]
/// ```
#[must_use]
pub fn spatial_inertia_about_origin(
    m: f64,
    i_com_world: &Matrix3<f64>,
    c: &Vector3<f64>,
) -> Matrix6<f64> {
    let mut inertia = Matrix6::zeros();

    // Rotational block with parallel-axis shift from COM to origin.
    let c_dot_c = c.dot(c);
    for row in 0..3 {
        for col in 0..3 {
            let delta = if row == col { 1.0 } else { 0.0 };
            inertia[(row, col)] = i_com_world[(row, col)] + m * (c_dot_c * delta - c[row] * c[col]);
        }
    }

    // Translational block.
    inertia[(3, 3)] = m;
    inertia[(4, 4)] = m;
    inertia[(5, 5)] = m;

    // Coupling blocks: m [c]× and its transpose.
    let mc = skew(c) * m;
    for row in 0..3 {
        for col in 0..3 {
            inertia[(row, col + 3)] = mc[(row, col)];
            inertia[(row + 3, col)] = -mc[(row, col)];
        }
    }

    inertia
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cross_motion_matches_component_formula() {
        let v = spatial(Vector3::new(0.1, -0.2, 0.3), Vector3::new(1.0, 0.5, -0.4));
        let s = spatial(Vector3::new(-0.7, 0.2, 0.9), Vector3::new(0.3, -1.1, 0.6));
        let out = cross_motion(&v, &s);
        assert_relative_eq!(angular(&out), angular(&v).cross(&angular(&s)), epsilon = 1e-14);
        assert_relative_eq!(
            linear(&out),
            angular(&v).cross(&linear(&s)) + linear(&v).cross(&angular(&s)),
            epsilon = 1e-14
        );
    }

    #[test]
    fn cross_force_is_dual_of_cross_motion() {
        // <v ×ₘ s, f> = -<s, v ×𝒇 f> for all motion s and force f.
        let v = spatial(Vector3::new(0.4, 0.1, -0.6), Vector3::new(-0.2, 0.8, 0.5));
        let s = spatial(Vector3::new(0.9, -0.3, 0.2), Vector3::new(0.1, 0.1, -0.7));
        let f = spatial(Vector3::new(-0.5, 0.6, 0.3), Vector3::new(0.2, -0.9, 0.4));
        let lhs = cross_motion(&v, &s).dot(&f);
        let rhs = -s.dot(&cross_force(&v, &f));
        assert_relative_eq!(lhs, rhs, epsilon = 1e-12);
    }

    #[test]
    fn spatial_inertia_kinetic_energy_matches_point_mass() {
        // A point mass at c moving with pure angular velocity w about the
        // origin has kinetic energy 0.5 m |w × c|².
        let m = 2.0;
        let c = Vector3::new(0.3, -0.1, 0.8);
        let inertia = spatial_inertia_about_origin(m, &Matrix3::zeros(), &c);

        let w = Vector3::new(0.5, 1.0, -0.25);
        let v = spatial(w, Vector3::zeros());
        let energy = 0.5 * v.dot(&(inertia * v));
        let expected = 0.5 * m * w.cross(&c).norm_squared();
        assert_relative_eq!(energy, expected, epsilon = 1e-12);
    }

    #[test]
    fn spatial_inertia_is_symmetric() {
        let inertia = spatial_inertia_about_origin(
            1.5,
            &Matrix3::from_diagonal(&Vector3::new(0.1, 0.2, 0.3)),
            &Vector3::new(1.0, -2.0, 0.5),
        );
        assert_relative_eq!(inertia, inertia.transpose(), epsilon = 1e-14);
    }
}
