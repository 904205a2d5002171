//! Contact, constraint, and solver parameter structs.
//!
//! These are pure configuration values, read-only during a solve. The
//! engine keeps optional global overrides; otherwise each contact uses
//! the defaults below. Callers that mutate a parameter mid-run simply
//! pass the new struct on the next tick; there is no change-listener
//! machinery in the kernel.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parameters governing a single contact constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactParameters {
    /// Coulomb friction coefficient (cone aperture), ≥ 0.
    pub coefficient_of_friction: f64,
    /// Fraction of the pre-impulse normal speed restored post-impact,
    /// in [0, 1]. 0 is perfectly inelastic.
    pub coefficient_of_restitution: f64,
    /// Pre-impulse normal speed below which restitution is treated as
    /// zero, so resting contacts do not jitter.
    pub restitution_threshold: f64,
    /// Fraction of the penetration depth corrected per tick, in [0, 1].
    /// Values near 1 are numerically unstable; residual interpenetration
    /// is meant to be recovered over several ticks.
    pub error_reduction_parameter: f64,
    /// Contacts shallower than this are discarded by detection.
    pub minimum_penetration: f64,
}

impl Default for ContactParameters {
    fn default() -> Self {
        Self {
            coefficient_of_friction: 0.7,
            coefficient_of_restitution: 0.0,
            restitution_threshold: 0.15,
            error_reduction_parameter: 0.1,
            minimum_penetration: 5.0e-5,
        }
    }
}

/// Parameters governing joint-limit constraints.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstraintParameters {
    /// Fraction of the limit violation corrected per tick, in [0, 1].
    pub error_reduction_parameter: f64,
}

impl Default for ConstraintParameters {
    fn default() -> Self {
        Self {
            error_reduction_parameter: 0.2,
        }
    }
}

/// Successive over-relaxation schedule for the per-group impulse solver.
///
/// The relaxation factor starts at 1 and decays toward `alpha_min` by a
/// factor of `gamma` each sweep. The iteration budget is fixed: hitting
/// `max_iterations` is expected steady-state behavior under dense
/// contact, not a failure.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverParameters {
    /// Floor of the relaxation factor.
    pub alpha_min: f64,
    /// Per-sweep decay of the relaxation factor toward `alpha_min`.
    pub gamma: f64,
    /// Sweep terminates early once the largest impulse update magnitude
    /// falls below this.
    pub tolerance: f64,
    /// Fixed sweep budget.
    pub max_iterations: usize,
}

impl Default for SolverParameters {
    fn default() -> Self {
        Self {
            alpha_min: 0.7,
            gamma: 0.99,
            tolerance: 1.0e-6,
            max_iterations: 100,
        }
    }
}
