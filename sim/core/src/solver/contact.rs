//! Per-contact impulse calculator: a unilateral normal impulse with
//! restitution and penetration correction, coupled to a friction-circle
//! tangential impulse.

use nalgebra::{DVector, Matrix3, Matrix3xX, MatrixXx3, Vector3};
use smallvec::SmallVec;
use strider_types::ContactParameters;

use crate::collision::Contact;

/// One robot's coupling into a contact constraint.
///
/// The Jacobian is already sign-weighted (negative for side A, positive
/// for side B); when both sides of the contact sit on the same robot the
/// two contributions are merged into a single relative Jacobian, which
/// keeps the effective-mass computation exact for self-collision.
pub(super) struct ContactSide {
    /// Position of the robot within the group's local arrays.
    pub local_robot: usize,
    /// Sign-weighted 3×nv point Jacobian (world frame).
    pub jacobian: Matrix3xX<f64>,
    /// `M⁻¹ Jᵀ`: maps a world impulse to a joint velocity delta.
    pub inverse_mass_jt: MatrixXx3<f64>,
}

/// A fully prepared contact constraint, iterated by the group solver.
pub(super) struct ContactConstraint {
    sides: SmallVec<[ContactSide; 2]>,
    /// Columns `(n, t1, t2)`; maps contact-frame impulses to world.
    frame: Matrix3<f64>,
    /// Inverse effective mass in the contact frame.
    w_inverse: Matrix3<f64>,
    /// Pre-impulse relative velocity at the contact point (world frame).
    u_free: Vector3<f64>,
    /// Desired post-impulse normal velocity: restitution and penetration
    /// correction, whichever demands more separation.
    target_normal_velocity: f64,
    coefficient_of_friction: f64,
    /// Accumulated impulse in the contact frame `(λn, λt1, λt2)`.
    impulse: Vector3<f64>,
}

impl ContactConstraint {
    /// Prepare a contact for iteration.
    ///
    /// `u_free` is the pre-impulse relative velocity of B with respect to
    /// A at the contact point, evaluated on the free velocities
    /// `qd + qdd·dt`. Returns `None` when the effective mass is
    /// degenerate and no impulse can be produced.
    pub(super) fn new(
        sides: SmallVec<[ContactSide; 2]>,
        contact: &Contact,
        u_free: Vector3<f64>,
        dt: f64,
        params: &ContactParameters,
    ) -> Option<Self> {
        let frame = Matrix3::from_columns(&[contact.normal, contact.tangent1, contact.tangent2]);

        let mut w_world = Matrix3::zeros();
        for side in &sides {
            w_world += &side.jacobian * &side.inverse_mass_jt;
        }
        let w_frame = frame.transpose() * w_world * frame;
        let w_inverse = w_frame.try_inverse()?;
        if !w_inverse.iter().all(|v| v.is_finite()) {
            return None;
        }

        // Normal velocity before any impulse; negative = approaching.
        let approach = -contact.normal.dot(&u_free);
        let restitution = if approach > params.restitution_threshold {
            params.coefficient_of_restitution * approach
        } else {
            0.0
        };
        let bias = params.error_reduction_parameter * contact.depth / dt;
        let target_normal_velocity = restitution.max(bias);

        Some(Self {
            sides,
            frame,
            w_inverse,
            u_free,
            target_normal_velocity,
            coefficient_of_friction: params.coefficient_of_friction,
            impulse: Vector3::zeros(),
        })
    }

    /// One relaxation sweep over this contact.
    ///
    /// Solves the 3×3 block for the impulse change that would hit the
    /// velocity targets, relaxes it by `alpha`, projects the accumulated
    /// impulse onto the friction cone, and applies the admissible change
    /// to the per-robot velocity deltas. Returns the magnitude of the
    /// applied change.
    pub(super) fn relax(&mut self, alpha: f64, delta_qd: &mut [DVector<f64>]) -> f64 {
        let mut u = self.u_free;
        for side in &self.sides {
            u += &side.jacobian * &delta_qd[side.local_robot];
        }
        let u_frame = self.frame.transpose() * u;

        let residual = Vector3::new(
            self.target_normal_velocity - u_frame.x,
            -u_frame.y,
            -u_frame.z,
        );
        let candidate = self.impulse + self.w_inverse * residual * alpha;
        let projected = self.project(candidate);
        let applied = projected - self.impulse;
        self.impulse = projected;

        if applied == Vector3::zeros() {
            return 0.0;
        }
        let world_impulse = self.frame * applied;
        for side in &self.sides {
            delta_qd[side.local_robot] += &side.inverse_mass_jt * world_impulse;
        }
        applied.norm()
    }

    fn project(&self, impulse: Vector3<f64>) -> Vector3<f64> {
        if impulse.x <= 0.0 {
            return Vector3::zeros();
        }
        let tangential = (impulse.y * impulse.y + impulse.z * impulse.z).sqrt();
        let bound = self.coefficient_of_friction * impulse.x;
        if tangential <= bound {
            impulse
        } else {
            let scale = bound / tangential;
            Vector3::new(impulse.x, impulse.y * scale, impulse.z * scale)
        }
    }

    /// Accumulated contact-frame impulse `(λn, λt1, λt2)`.
    pub(super) fn impulse(&self) -> Vector3<f64> {
        self.impulse
    }
}
