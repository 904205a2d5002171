//! Joint position and velocity limits enforced as unilateral scalar
//! impulses, in the same relaxation loop as contacts.

use nalgebra::DVector;
use strider_types::ConstraintParameters;

use crate::multibody::joint::JointPosition;
use crate::multibody::{RobotModel, RobotState};

/// A 1-DoF joint predicted to exceed a limit this tick.
///
/// The constraint reads `direction · qd ≥ target_velocity` after the
/// impulse: for a lower position limit `direction` is `+1` and the
/// target is the error-reduction push-back; for an upper limit the signs
/// flip; for a velocity limit the target is the (directed) bound itself.
#[derive(Debug, Clone, Copy)]
pub struct LimitCandidate {
    /// Velocity-vector index of the limited degree of freedom.
    pub dof: usize,
    /// Sign applied to the joint velocity in the constraint.
    pub direction: f64,
    /// Required directed post-impulse velocity.
    pub target_velocity: f64,
}

/// Scan a robot for joints whose free motion would cross a position or
/// velocity limit this tick.
///
/// `qd_free` is the tick's free velocity `qd + qdd·dt`; a position limit
/// activates when `q + qd_free·dt` lands outside its bounds, a velocity
/// limit when `qd_free` itself does.
#[must_use]
pub fn detect_limit_candidates(
    model: &RobotModel,
    state: &RobotState,
    qd_free: &DVector<f64>,
    dt: f64,
    params: &ConstraintParameters,
) -> Vec<LimitCandidate> {
    let mut candidates = Vec::new();
    for (i, joint) in model.joints.iter().enumerate() {
        let Some(limits) = &joint.limits else {
            continue;
        };
        let JointPosition::Scalar(q) = state.positions[i] else {
            continue;
        };
        let dof = model.dof_offsets[i];
        let predicted = q + qd_free[dof] * dt;
        if predicted < limits.position_lower {
            candidates.push(LimitCandidate {
                dof,
                direction: 1.0,
                target_velocity: params.error_reduction_parameter
                    * (limits.position_lower - predicted)
                    / dt,
            });
        } else if predicted > limits.position_upper {
            candidates.push(LimitCandidate {
                dof,
                direction: -1.0,
                target_velocity: params.error_reduction_parameter
                    * (predicted - limits.position_upper)
                    / dt,
            });
        }
        let vmax = limits.velocity_max;
        if vmax.is_finite() && qd_free[dof].abs() > vmax {
            // Pull the speed back down to the bound.
            candidates.push(LimitCandidate {
                dof,
                direction: -qd_free[dof].signum(),
                target_velocity: -vmax,
            });
        }
    }
    candidates
}

/// A prepared joint-limit constraint, iterated by the group solver.
pub(super) struct LimitConstraint {
    local_robot: usize,
    dof: usize,
    direction: f64,
    target_velocity: f64,
    /// Directed pre-impulse velocity of the limited DoF.
    u_free: f64,
    /// Effective inverse mass `(M⁻¹)[dof, dof]`.
    w: f64,
    /// `M⁻¹ e_dof`: velocity delta per unit impulse.
    response: DVector<f64>,
    impulse: f64,
}

impl LimitConstraint {
    /// Prepare a limit candidate for iteration. Returns `None` when the
    /// diagonal inverse mass is degenerate.
    pub(super) fn new(
        local_robot: usize,
        candidate: &LimitCandidate,
        u_free: f64,
        response: DVector<f64>,
    ) -> Option<Self> {
        let w = response[candidate.dof];
        if !(w.is_finite() && w > 0.0) {
            return None;
        }
        Some(Self {
            local_robot,
            dof: candidate.dof,
            direction: candidate.direction,
            target_velocity: candidate.target_velocity,
            u_free: candidate.direction * u_free,
            w,
            response,
            impulse: 0.0,
        })
    }

    /// One relaxation sweep; returns the magnitude of the applied
    /// impulse change.
    pub(super) fn relax(&mut self, alpha: f64, delta_qd: &mut [DVector<f64>]) -> f64 {
        let v = self.u_free + self.direction * delta_qd[self.local_robot][self.dof];
        let candidate = self.impulse + alpha * (self.target_velocity - v) / self.w;
        let projected = candidate.max(0.0);
        let applied = projected - self.impulse;
        self.impulse = projected;

        if applied == 0.0 {
            return 0.0;
        }
        let directed = self.direction * applied;
        delta_qd[self.local_robot].axpy(directed, &self.response, 1.0);
        applied.abs()
    }
}
