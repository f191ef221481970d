//! Closed vocabularies used by the entity tiers.
//!
//! Each choice has a stable wire value (used in JSON, bundles and the
//! database) and a human-readable label (used in visualization payloads).

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! choice {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => ($wire:literal, $label:literal), )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            /// Returns all variants in declaration order.
            #[must_use]
            pub const fn all() -> &'static [Self] {
                &[$(Self::$variant),+]
            }

            /// Returns the wire value.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }

            /// Returns the human-readable label.
            #[must_use]
            pub const fn label(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }

            /// Parses a wire value (case-insensitive).
            #[must_use]
            pub fn parse(s: &str) -> Option<Self> {
                let s = s.trim();
                Self::all()
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s).ok_or_else(|| {
                    crate::Error::InvalidInput(format!(concat!("unknown ", $kind, ": {}"), s))
                })
            }
        }
    };
}

choice!(
    /// Classification of a raw material.
    MaterialType, "material type" {
        /// Base polymer.
        Polymer => ("polymer", "Polymer"),
        /// Additive such as a coupling agent.
        Additive => ("additive", "Additive"),
        /// Reinforcing or extending filler.
        Filler => ("filler", "Filler"),
        /// Catalyst.
        Catalyst => ("catalyst", "Catalyst"),
        /// Solvent or diluent.
        Solvent => ("solvent", "Solvent"),
        /// Anything else.
        #[default]
        Other => ("other", "Other"),
    }
);

choice!(
    /// Classification of an intermediate.
    IntermediateType, "intermediate type" {
        /// Prepolymer.
        Prepolymer => ("prepolymer", "Prepolymer"),
        /// Resin.
        Resin => ("resin", "Resin"),
        /// Compound.
        Compound => ("compound", "Compound"),
        /// Physical mixture.
        Mixture => ("mixture", "Mixture"),
        /// Anything else.
        #[default]
        Other => ("other", "Other"),
    }
);

choice!(
    /// Lifecycle status of a formula. Transitions are unrestricted.
    FormulaStatus, "formula status" {
        /// Being written.
        #[default]
        Draft => ("draft", "Draft"),
        /// Under lab testing.
        Testing => ("testing", "Testing"),
        /// Test results accepted; eligible for recommendation.
        Validated => ("validated", "Validated"),
        /// In production use.
        Production => ("production", "In Production"),
        /// Retired.
        Archived => ("archived", "Archived"),
    }
);

choice!(
    /// Intended application of a formula.
    ApplicationType, "application type" {
        /// Sealant.
        Sealant => ("sealant", "Sealant"),
        /// Adhesive.
        Adhesive => ("adhesive", "Adhesive"),
        /// Coating.
        Coating => ("coating", "Coating"),
        /// Composite material.
        Composite => ("composite", "Composite"),
        /// Anything else.
        #[default]
        Other => ("other", "Other"),
    }
);

choice!(
    /// Standard a performance test followed.
    TestMethod, "test method" {
        /// Chinese national standard.
        Gb => ("GB", "GB National Standard"),
        /// ISO standard.
        Iso => ("ISO", "ISO Standard"),
        /// ASTM standard.
        Astm => ("ASTM", "ASTM Standard"),
        /// In-house procedure.
        #[default]
        Internal => ("internal", "Internal Standard"),
        /// Anything else.
        Other => ("other", "Other"),
    }
);

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("polymer", Some(MaterialType::Polymer))]
    #[test_case("FILLER", Some(MaterialType::Filler))]
    #[test_case(" solvent ", Some(MaterialType::Solvent))]
    #[test_case("metal", None)]
    fn test_material_type_parse(input: &str, expected: Option<MaterialType>) {
        assert_eq!(MaterialType::parse(input), expected);
    }

    #[test]
    fn test_wire_values_round_trip() {
        for status in FormulaStatus::all() {
            assert_eq!(FormulaStatus::parse(status.as_str()), Some(*status));
        }
        for method in TestMethod::all() {
            assert_eq!(TestMethod::parse(method.as_str()), Some(*method));
        }
    }

    #[test]
    fn test_serde_uses_wire_value() {
        let json = serde_json::to_string(&TestMethod::Astm).ok();
        assert_eq!(json.as_deref(), Some("\"ASTM\""));
        let parsed: Option<ApplicationType> = serde_json::from_str("\"sealant\"").ok();
        assert_eq!(parsed, Some(ApplicationType::Sealant));
    }

    #[test]
    fn test_from_str_reports_kind() {
        let err = "bogus".parse::<IntermediateType>().err();
        assert_eq!(
            err.map(|e| e.to_string()).as_deref(),
            Some("invalid input: unknown intermediate type: bogus")
        );
    }

    #[test]
    fn test_defaults() {
        assert_eq!(FormulaStatus::default(), FormulaStatus::Draft);
        assert_eq!(MaterialType::default(), MaterialType::Other);
    }
}
