// diag.rs — Configuration-violation error kinds
//
// Fatal errors surfaced to the caller when a program description or a
// reconstructed plan breaks an optimizer contract. Solver failure is NOT an
// error kind: a missing solution file leaves the plan without a tiling, and
// callers observe that through the absent artifact.
//
// Preconditions: none (types only).
// Postconditions: none.
// Failure modes: none.
// Side effects: none.

use std::fmt;

use crate::program::Axis;

/// A fatal violation of the optimizer's input or plan contracts.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// An access bounding box exceeds the program halo widths.
    HaloOverflow {
        stencil: String,
        array: String,
    },
    /// A tiled subdomain collapses to zero extent along an axis.
    ZeroSubdomain {
        axis: Axis,
        level: &'static str,
    },
    /// The sequence is not a permutation of the stencil set.
    SequenceMismatch,
    /// A stencil appears before one of its stencil-inputs.
    SequenceOrder {
        stencil: String,
        input: String,
    },
    /// A stencil is neither a program output nor consumed by a later stencil;
    /// its store cost is undefined.
    UnconsumedStencil {
        stencil: String,
    },
    /// Stencils fused into one group disagree on their tile counts.
    TileCountMismatch {
        group: u32,
        axis: Axis,
    },
    /// A constraint or output references a name with no stencil definition.
    UnknownStencil {
        name: String,
    },
    /// The solver assignment lacks a variable the reconstruction needs.
    MissingVariable {
        variable: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::HaloOverflow { stencil, array } => write!(
                f,
                "stencil '{stencil}' accesses '{array}' outside the halo widths"
            ),
            ConfigError::ZeroSubdomain { axis, level } => write!(
                f,
                "{} size not large enough for {level} decomposition",
                axis.letter()
            ),
            ConfigError::SequenceMismatch => {
                write!(f, "sequence is not a permutation of the stencil set")
            }
            ConfigError::SequenceOrder { stencil, input } => write!(
                f,
                "sequence places stencil '{stencil}' before its input '{input}'"
            ),
            ConfigError::UnconsumedStencil { stencil } => write!(
                f,
                "stencil '{stencil}' is neither an output nor consumed by a later stencil"
            ),
            ConfigError::TileCountMismatch { group, axis } => write!(
                f,
                "group {group} stencils disagree on the {} tile count",
                axis.letter()
            ),
            ConfigError::UnknownStencil { name } => {
                write!(f, "name '{name}' does not refer to a stencil")
            }
            ConfigError::MissingVariable { variable } => {
                write!(f, "solver assignment is missing variable '{variable}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_offender() {
        let e = ConfigError::HaloOverflow {
            stencil: "ulap".into(),
            array: "uin".into(),
        };
        assert_eq!(
            format!("{e}"),
            "stencil 'ulap' accesses 'uin' outside the halo widths"
        );
    }

    #[test]
    fn display_zero_subdomain_names_axis_and_level() {
        let e = ConfigError::ZeroSubdomain {
            axis: Axis::Y,
            level: "cache tile",
        };
        assert_eq!(
            format!("{e}"),
            "y size not large enough for cache tile decomposition"
        );
    }
}
