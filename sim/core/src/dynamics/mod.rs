//! Forward dynamics and joint-space inertia computations.
//!
//! The centerpiece is a Featherstone articulated-body recursion
//! ([`forward_dynamics`]) that resolves unconstrained joint accelerations
//! from efforts, external wrenches, and gravity. The impulse solver
//! additionally needs the joint-space mass matrix ([`crba::mass_matrix`])
//! and contact-point Jacobians ([`jacobian::point_jacobian`]) to convert
//! impulses into joint velocity deltas.
//!
//! Everything here works in world-origin spatial coordinates (see
//! [`spatial`]), which reduces parent/child propagation to addition.

pub mod crba;
pub mod jacobian;
pub mod spatial;

use nalgebra::{Cholesky, Dyn, Matrix3, Matrix6, Matrix6xX, Vector3};

use crate::error::{SimError, SimResult};
use crate::multibody::{RobotModel, RobotState};
use spatial::{SpatialVector, cross_force, cross_motion, spatial, spatial_inertia_about_origin};

use crate::multibody::joint::motion_subspace;

/// Evaluate every joint's motion subspace at the current configuration.
///
/// Body poses must be current (see [`RobotState::update_frames`]).
#[must_use]
pub fn motion_subspaces(model: &RobotModel, state: &RobotState) -> Vec<Matrix6xX<f64>> {
    model
        .joints
        .iter()
        .map(|joint| motion_subspace(&joint.kind, &state.body_poses[joint.successor.index()]))
        .collect()
}

/// Spatial inertia of each body about the world origin at the current pose.
#[must_use]
pub fn body_inertias(model: &RobotModel, state: &RobotState) -> Vec<Matrix6<f64>> {
    model
        .bodies
        .iter()
        .zip(&state.body_poses)
        .map(|(body, pose)| {
            let r: Matrix3<f64> = pose.rotation.to_rotation_matrix().into_inner();
            let i_com_world = r * body.mass.inertia * r.transpose();
            let com_world = pose.transform_vector(&body.mass.com_offset) + pose.translation;
            spatial_inertia_about_origin(body.mass.mass, &i_com_world, &com_world)
        })
        .collect()
}

/// Articulated-body forward dynamics.
///
/// Computes unconstrained joint accelerations from the efforts and
/// external wrenches currently stored in `state`, under the given
/// gravity, and writes them to `state.qdd`. Three passes over the arena:
/// an outward velocity/bias pass, an inward articulated-inertia pass,
/// and an outward acceleration resolution pass.
///
/// Gravity enters as a bias acceleration of the world attachment, so the
/// returned accelerations already include free fall.
///
/// # Errors
///
/// [`SimError::SingularInertia`] when a joint's articulated-body inertia
/// is not positive definite (an underspecified branch of the tree).
pub fn forward_dynamics(
    model: &RobotModel,
    state: &mut RobotState,
    gravity: &Vector3<f64>,
) -> SimResult<()> {
    let nb = model.bodies.len();
    let subspaces = motion_subspaces(model, state);
    let inertias = body_inertias(model, state);

    // Outward pass: spatial velocities and velocity-product bias.
    let mut vel = vec![SpatialVector::zeros(); nb];
    let mut bias = vec![SpatialVector::zeros(); nb];
    for (i, joint) in model.joints.iter().enumerate() {
        let parent_vel = joint
            .predecessor
            .map_or_else(SpatialVector::zeros, |p| vel[p.index()]);
        let range = model.dof_range(joint.successor.index().into());
        let vj: SpatialVector = if range.is_empty() {
            SpatialVector::zeros()
        } else {
            &subspaces[i] * state.qd.rows(range.start, range.len())
        };
        vel[i] = parent_vel + vj;
        bias[i] = cross_motion(&vel[i], &vj);
    }

    // Inward pass: articulated inertias and bias forces.
    let mut ia = inertias;
    let mut pa: Vec<SpatialVector> = (0..nb)
        .map(|i| cross_force(&vel[i], &(ia[i] * vel[i])) - state.external_wrenches[i])
        .collect();

    struct JointFactor {
        u: Matrix6xX<f64>,
        chol: Cholesky<f64, Dyn>,
        rhs: nalgebra::DVector<f64>,
    }
    let mut factors: Vec<Option<JointFactor>> = (0..nb).map(|_| None).collect();

    for i in (0..nb).rev() {
        let joint = &model.joints[i];
        let dof = joint.kind.dof();
        let (ia_proj, pa_proj) = if dof == 0 {
            (ia[i], pa[i] + ia[i] * bias[i])
        } else {
            let s = &subspaces[i];
            let u = &ia[i] * s;
            let d = s.transpose() * &u;
            let chol = Cholesky::new(d).ok_or_else(|| SimError::SingularInertia {
                robot: model.name.clone(),
                joint: joint.name.clone(),
            })?;
            let range = model.dof_range(i.into());
            let rhs = state.efforts.rows(range.start, range.len()) - s.transpose() * pa[i];
            let dinv_ut = chol.solve(&u.transpose());
            let ia_proj = ia[i] - &u * &dinv_ut;
            let pa_proj = pa[i] + ia_proj * bias[i] + &u * chol.solve(&rhs);
            factors[i] = Some(JointFactor { u, chol, rhs });
            (ia_proj, pa_proj)
        };

        if let Some(parent) = joint.predecessor {
            ia[parent.index()] += ia_proj;
            pa[parent.index()] += pa_proj;
        }
    }

    // Outward pass: resolve accelerations. The world attachment carries
    // -g as bias acceleration, which bakes gravity into every branch.
    let gravity_bias = spatial(Vector3::zeros(), -gravity);
    let mut acc = vec![SpatialVector::zeros(); nb];
    for (i, joint) in model.joints.iter().enumerate() {
        let parent_acc = joint
            .predecessor
            .map_or(gravity_bias, |p| acc[p.index()]);
        let a_prime = parent_acc + bias[i];

        if let Some(factor) = &factors[i] {
            let qdd = factor
                .chol
                .solve(&(&factor.rhs - factor.u.transpose() * a_prime));
            let range = model.dof_range(i.into());
            state
                .qdd
                .rows_mut(range.start, range.len())
                .copy_from(&qdd);
            acc[i] = a_prime + &subspaces[i] * qdd;
        } else {
            acc[i] = a_prime;
        }
    }

    Ok(())
}
