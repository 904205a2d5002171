//! Iterative impulse solver: resolves one collision group's contacts and
//! joint limits into per-robot joint velocity deltas.
//!
//! The solver runs successive relaxation sweeps over all constraints of
//! a group. The relaxation factor starts at 1 and decays geometrically
//! toward `alpha_min`, which damps the oscillations that plain
//! accumulate-and-clamp iteration exhibits on strongly coupled contact
//! sets. Iteration stops when the largest impulse change of a sweep
//! drops below the tolerance or the iteration budget runs out; the
//! impulses accumulated so far are applied either way.

mod contact;
pub mod joint_limit;

use nalgebra::{Cholesky, DVector, Dyn, Matrix3xX, Matrix6xX, Vector3};
use smallvec::SmallVec;
use tracing::warn;

use strider_types::{ContactParameters, SolverParameters};

use crate::dynamics::crba::mass_matrix;
use crate::dynamics::jacobian::point_jacobian;
use crate::dynamics::{body_inertias, motion_subspaces};
use crate::error::{SimError, SimResult};
use crate::group::CollisionGroup;
use crate::multibody::{RobotModel, RobotState};
use contact::{ContactConstraint, ContactSide};
use joint_limit::{LimitCandidate, LimitConstraint};

/// Per-robot quantities the solver needs, computed once per tick after
/// forward dynamics and shared by every constraint touching the robot.
pub struct RobotResources {
    /// Motion subspaces at the current configuration.
    pub subspaces: Vec<Matrix6xX<f64>>,
    /// Cholesky factor of the joint-space mass matrix.
    pub mass_cholesky: Cholesky<f64, Dyn>,
    /// Free velocity of the tick: `qd + qdd·dt`.
    pub qd_free: DVector<f64>,
}

impl RobotResources {
    /// Compute the solver resources for one robot.
    ///
    /// # Errors
    ///
    /// [`SimError::SingularMassMatrix`] when the mass matrix fails to
    /// factor.
    pub fn compute(model: &RobotModel, state: &RobotState, dt: f64) -> SimResult<Self> {
        let subspaces = motion_subspaces(model, state);
        let inertias = body_inertias(model, state);
        let m = mass_matrix(model, &subspaces, &inertias);
        let mass_cholesky = Cholesky::new(m).ok_or_else(|| SimError::SingularMassMatrix {
            robot: model.name.clone(),
        })?;
        let qd_free = &state.qd + &state.qdd * dt;
        Ok(Self {
            subspaces,
            mass_cholesky,
            qd_free,
        })
    }
}

/// Result of solving one collision group.
pub struct GroupSolution {
    /// Engine indices of the robots in this group, ascending.
    pub robots: Vec<usize>,
    /// Joint velocity delta per robot, parallel to `robots`.
    pub delta_qd: Vec<DVector<f64>>,
    /// Accumulated contact-frame impulse `(λn, λt1, λt2)` per contact,
    /// in the group's contact order. Zero for skipped constraints.
    pub contact_impulses: Vec<Vector3<f64>>,
    /// Relaxation sweeps performed.
    pub iterations: usize,
    /// Whether the impulse change dropped below tolerance.
    pub converged: bool,
}

/// Resolve one collision group.
///
/// `models`, `resources`, `limit_candidates`, and `contact_overrides`
/// are indexed by engine robot index; every robot in the group must have
/// resources. A contact uses the first per-robot parameter override
/// among its endpoints, falling back to `contact_params`. The returned
/// velocity deltas are not applied to any state; the caller folds them
/// into integration.
#[must_use]
pub fn solve_group(
    group: &CollisionGroup,
    models: &[&RobotModel],
    resources: &[Option<RobotResources>],
    limit_candidates: &[Vec<LimitCandidate>],
    contact_overrides: &[Option<ContactParameters>],
    dt: f64,
    contact_params: &ContactParameters,
    solver_params: &SolverParameters,
) -> GroupSolution {
    let local_of = |robot: usize| -> usize {
        group
            .robots
            .binary_search(&robot)
            .unwrap_or_else(|_| unreachable!("contact references robot outside its group"))
    };
    let resource = |robot: usize| -> &RobotResources {
        resources[robot]
            .as_ref()
            .unwrap_or_else(|| unreachable!("grouped robot is missing solver resources"))
    };

    let mut delta_qd: Vec<DVector<f64>> = group
        .robots
        .iter()
        .map(|&r| DVector::zeros(models[r].nv))
        .collect();

    // Prepare contact constraints.
    let mut contact_constraints: Vec<Option<ContactConstraint>> =
        Vec::with_capacity(group.contacts.len());
    for contact_data in &group.contacts {
        let mut sides: SmallVec<[ContactSide; 2]> = SmallVec::new();
        let mut u_free = Vector3::zeros();

        let endpoints = [
            (contact_data.robot_a, contact_data.body_a, -1.0),
            (contact_data.robot_b, contact_data.body_b, 1.0),
        ];
        for (robot, body, sign) in endpoints {
            let (Some(robot), Some(body)) = (robot, body) else {
                continue;
            };
            let res = resource(robot);
            let jacobian: Matrix3xX<f64> =
                point_jacobian(models[robot], &res.subspaces, body, &contact_data.point) * sign;
            u_free += &jacobian * &res.qd_free;

            let local_robot = local_of(robot);
            if let Some(existing) = sides.iter_mut().find(|s| s.local_robot == local_robot) {
                // Same robot on both ends: merge into a relative Jacobian.
                existing.jacobian += jacobian;
            } else {
                sides.push(ContactSide {
                    local_robot,
                    jacobian,
                    inverse_mass_jt: nalgebra::MatrixXx3::zeros(0),
                });
            }
        }
        for side in &mut sides {
            let res = resource(group.robots[side.local_robot]);
            side.inverse_mass_jt = res.mass_cholesky.solve(&side.jacobian.transpose());
        }

        let params = contact_data
            .robot_a
            .and_then(|r| contact_overrides[r])
            .or_else(|| contact_data.robot_b.and_then(|r| contact_overrides[r]))
            .unwrap_or(*contact_params);
        let prepared = ContactConstraint::new(sides, contact_data, u_free, dt, &params);
        if prepared.is_none() {
            warn!(
                depth = contact_data.depth,
                "skipping contact with degenerate effective mass"
            );
        }
        contact_constraints.push(prepared);
    }

    // Prepare joint-limit constraints.
    let mut limit_constraints: Vec<LimitConstraint> = Vec::new();
    for (local_robot, &robot) in group.robots.iter().enumerate() {
        let res = resource(robot);
        for candidate in &limit_candidates[robot] {
            let mut unit = DVector::zeros(models[robot].nv);
            unit[candidate.dof] = 1.0;
            let response = res.mass_cholesky.solve(&unit);
            match LimitConstraint::new(
                local_robot,
                candidate,
                res.qd_free[candidate.dof],
                response,
            ) {
                Some(prepared) => limit_constraints.push(prepared),
                None => warn!(
                    robot = models[robot].name,
                    dof = candidate.dof,
                    "skipping joint limit with degenerate inverse mass"
                ),
            }
        }
    }

    // Relaxation sweeps.
    let mut alpha = 1.0;
    let mut iterations = 0;
    let mut converged = false;
    while iterations < solver_params.max_iterations {
        iterations += 1;
        let mut max_change = 0.0_f64;
        for constraint in contact_constraints.iter_mut().flatten() {
            max_change = max_change.max(constraint.relax(alpha, &mut delta_qd));
        }
        for constraint in &mut limit_constraints {
            max_change = max_change.max(constraint.relax(alpha, &mut delta_qd));
        }
        if max_change < solver_params.tolerance {
            converged = true;
            break;
        }
        alpha = solver_params.alpha_min + solver_params.gamma * (alpha - solver_params.alpha_min);
    }
    if !converged {
        warn!(
            iterations,
            robots = group.robots.len(),
            contacts = group.contacts.len(),
            "impulse solver hit the iteration budget before converging"
        );
    }

    let contact_impulses = contact_constraints
        .iter()
        .map(|c| c.as_ref().map_or_else(Vector3::zeros, ContactConstraint::impulse))
        .collect();

    GroupSolution {
        robots: group.robots.clone(),
        delta_qd,
        contact_impulses,
        iterations,
        converged,
    }
}
