//! Stable index handles for simulation entities.
//!
//! Bodies and joints live in arenas owned by their robot; handles are
//! plain indices into those arenas. The tree structure is encoded once,
//! at construction, so neither side of the body/joint pairing holds an
//! owning pointer to the other.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub struct $name(pub u32);

        impl $name {
            /// Arena index of this handle.
            #[must_use]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl From<usize> for $name {
            #[allow(clippy::cast_possible_truncation)]
            fn from(index: usize) -> Self {
                Self(index as u32)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

define_id!(
    /// Handle to a robot owned by the physics engine.
    RobotId
);
define_id!(
    /// Handle to a rigid body within one robot's arena.
    BodyId
);
define_id!(
    /// Handle to a joint within one robot's arena.
    JointId
);
