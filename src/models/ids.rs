//! Typed surrogate identifiers.
//!
//! Every tier has its own id space, so a raw material and a formula can both
//! have id `1`. Wrapping the integer in a per-tier newtype keeps the two from
//! being mixed up at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw row id.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw row id.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

entity_id!(
    /// Identifier of a [`RawMaterial`](super::RawMaterial).
    RawMaterialId
);
entity_id!(
    /// Identifier of an [`Intermediate`](super::Intermediate).
    IntermediateId
);
entity_id!(
    /// Identifier of a [`Formula`](super::Formula).
    FormulaId
);
entity_id!(
    /// Identifier of a [`Performance`](super::Performance) test record.
    PerformanceId
);
entity_id!(
    /// Identifier of an [`Ingredient`](super::Ingredient) row (raw material in an intermediate).
    IngredientId
);
entity_id!(
    /// Identifier of a [`FormulaComponent`](super::FormulaComponent) row.
    ComponentId
);
