//! Point Jacobians for contact and joint-limit constraints.

use nalgebra::{Matrix3xX, Matrix6xX, Vector3};

use strider_types::BodyId;

use crate::dynamics::spatial::{angular, linear};
use crate::multibody::RobotModel;

/// Linear-velocity Jacobian of a world-space point rigidly attached to
/// `body`: a 3×nv matrix with `v_point = J · qd`.
///
/// Only the joints on the path from the root to `body` contribute
/// columns; all other columns are zero.
#[must_use]
pub fn point_jacobian(
    model: &RobotModel,
    subspaces: &[Matrix6xX<f64>],
    body: BodyId,
    point: &Vector3<f64>,
) -> Matrix3xX<f64> {
    let mut jac = Matrix3xX::zeros(model.nv);

    let mut current = Some(body);
    while let Some(b) = current {
        let joint_index = b.index();
        let range = model.dof_range(joint_index.into());
        let s = &subspaces[joint_index];
        for (col, dof) in range.enumerate() {
            let s_col = s.column(col).into_owned();
            let contribution = linear(&s_col) + angular(&s_col).cross(point);
            jac.set_column(dof, &contribution);
        }
        current = model.joints[joint_index].predecessor;
    }

    jac
}
