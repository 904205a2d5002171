//! Composite-rigid-body joint-space mass matrix.
//!
//! The impulse solver uses `M` (through its Cholesky factor) to map
//! contact and joint-limit impulses to joint velocity deltas:
//! `Δqd = M⁻¹ Jᵀ λ`.

use nalgebra::{DMatrix, Matrix6, Matrix6xX};

use crate::multibody::RobotModel;

/// Joint-space mass matrix via the composite-rigid-body algorithm.
///
/// `subspaces` and `inertias` come from [`super::motion_subspaces`] and
/// [`super::body_inertias`] evaluated at the current configuration. The
/// result is symmetric positive definite for any validated robot.
#[must_use]
pub fn mass_matrix(
    model: &RobotModel,
    subspaces: &[Matrix6xX<f64>],
    inertias: &[Matrix6<f64>],
) -> DMatrix<f64> {
    let nb = model.bodies.len();
    let mut m = DMatrix::zeros(model.nv, model.nv);

    // Inward sweep: composite inertia of each subtree.
    let mut composite = inertias.to_vec();
    for i in (0..nb).rev() {
        if let Some(parent) = model.joints[i].predecessor {
            let sub = composite[i];
            composite[parent.index()] += sub;
        }
    }

    for i in 0..nb {
        let dof_i = model.joints[i].kind.dof();
        if dof_i == 0 {
            continue;
        }
        let range_i = model.dof_range(i.into());
        let f = composite[i] * &subspaces[i];

        // Diagonal block.
        let block_ii = subspaces[i].transpose() * &f;
        m.view_mut((range_i.start, range_i.start), (dof_i, dof_i))
            .copy_from(&block_ii);

        // Off-diagonal blocks along the ancestor chain.
        let mut j = i;
        while let Some(parent) = model.joints[j].predecessor {
            j = parent.index();
            let dof_j = model.joints[j].kind.dof();
            if dof_j == 0 {
                continue;
            }
            let range_j = model.dof_range(j.into());
            let block_ji = subspaces[j].transpose() * &f;
            m.view_mut((range_j.start, range_i.start), (dof_j, dof_i))
                .copy_from(&block_ji);
            m.view_mut((range_i.start, range_j.start), (dof_i, dof_j))
                .copy_from(&block_ji.transpose());
        }
    }

    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::{body_inertias, motion_subspaces};
    use crate::multibody::joint::{JointKind, JointPosition};
    use crate::multibody::RobotBuilder;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use strider_types::{MassProperties, Pose};

    #[test]
    fn mass_matrix_is_symmetric_positive_definite() {
        let mut builder = RobotBuilder::new("chain");
        let a = builder.add_body(
            "a",
            "j0",
            JointKind::Revolute {
                axis: Vector3::y_axis(),
            },
            None,
            Pose::identity(),
            MassProperties::solid_sphere(1.0, 0.1)
                .with_com_offset(Vector3::new(0.0, 0.0, -0.4)),
        );
        let b = builder.add_body(
            "b",
            "j1",
            JointKind::Spherical,
            Some(a),
            Pose::from_translation(Vector3::new(0.0, 0.0, -0.8)),
            MassProperties::solid_sphere(0.7, 0.1)
                .with_com_offset(Vector3::new(0.0, 0.0, -0.3)),
        );
        builder.add_body(
            "c",
            "j2",
            JointKind::Prismatic {
                axis: Vector3::x_axis(),
            },
            Some(b),
            Pose::from_translation(Vector3::new(0.0, 0.0, -0.6)),
            MassProperties::point_mass(0.5),
        );
        let (model, mut state) = builder.finish().expect("valid robot");
        state.positions[0] = JointPosition::Scalar(0.5);
        state.update_frames(&model);

        let subspaces = motion_subspaces(&model, &state);
        let inertias = body_inertias(&model, &state);
        let m = mass_matrix(&model, &subspaces, &inertias);

        assert_eq!(m.nrows(), 5);
        assert_relative_eq!(m.clone(), m.transpose(), epsilon = 1e-10);
        assert!(
            nalgebra::Cholesky::new(m).is_some(),
            "mass matrix must be positive definite"
        );
    }

    #[test]
    fn single_prismatic_mass_matrix_is_the_mass() {
        let mut builder = RobotBuilder::new("slider");
        builder.add_body(
            "mass",
            "slide",
            JointKind::Prismatic {
                axis: Vector3::z_axis(),
            },
            None,
            Pose::identity(),
            MassProperties::point_mass(2.5),
        );
        let (model, state) = builder.finish().expect("valid robot");
        let subspaces = motion_subspaces(&model, &state);
        let inertias = body_inertias(&model, &state);
        let m = mass_matrix(&model, &subspaces, &inertias);
        assert_relative_eq!(m[(0, 0)], 2.5, epsilon = 1e-12);
    }
}
