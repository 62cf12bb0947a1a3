// program.rs — Stencil program description data model
//
// The caller-facing description of one stencil program: named operator
// bodies, output list, domain geometry, machine description, performance
// coefficients, and optional search-space constraints. Deserialized from a
// JSON description file; immutable once loaded (pass artifacts are computed
// beside it, never written back into it).
//
// Preconditions: produced by serde from a description file or built in tests.
// Postconditions: `validate` checks referential integrity and domain extents.
// Failure modes: `validate` returns ConfigError on broken references.
// Side effects: none.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::diag::ConfigError;

/// Grid values are double precision; footprint capacity is counted in values.
pub const SIZE_OF_VALUE: u64 = 8;

// ── Axes ──────────────────────────────────────────────────────────────────

/// A spatial axis of the 3D domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Lower-case axis letter as used in LP variable names.
    pub fn letter(self) -> char {
        match self {
            Axis::X => 'x',
            Axis::Y => 'y',
            Axis::Z => 'z',
        }
    }

    /// Index into `[x, y, z]` triples.
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

// ── Machine and coefficients ──────────────────────────────────────────────

/// Target node: core count and last-level cache capacity in bytes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Machine {
    pub cores: u32,
    pub capacity: u64,
}

/// Memory-model coefficients in seconds per byte×streamwidth unit.
/// Signed — fitted coefficients can be negative.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MemoryCoeffs {
    pub rw_body: f64,
    pub st_body: f64,
    pub rw_peel: f64,
    pub st_peel: f64,
}

/// Cache-model coefficients for interior and boundary-plane work.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheCoeffs {
    pub body: f64,
    pub peel: f64,
}

/// Search slack: tolerated domain enlargement and idle-slot fraction.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Slack {
    pub size: f64,
    pub cores: f64,
}

// ── External constraints ──────────────────────────────────────────────────

/// Pin one stencil to a fusion group index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupPin {
    pub stencil: String,
    pub group: u32,
}

/// Bound a stencil's tile count along one axis. A positive value forces
/// `n ≥ value + 1`; a non-positive value forces `n ≤ −value − 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileBound {
    pub axis: Axis,
    pub stencil: String,
    pub value: i64,
}

/// Optional caller-supplied search-space restrictions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    pub groups: Vec<GroupPin>,
    pub tiling: Vec<TileBound>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.tiling.is_empty()
    }
}

// ── Program description ───────────────────────────────────────────────────

fn default_halo() -> [u32; 3] {
    [3, 3, 3]
}

fn default_overlap() -> f64 {
    1.0
}

/// A complete stencil program description.
///
/// `stencils` maps operator names to opaque body expressions; only the grid
/// accesses inside the bodies are interpreted here, the rest is carried
/// through for downstream code generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramSpec {
    pub name: String,
    pub stencils: BTreeMap<String, String>,
    pub outputs: Vec<String>,
    #[serde(default)]
    pub constants: Vec<String>,
    /// Domain extents `(X, Y, Z)`.
    pub domain: [u32; 3],
    /// Halo widths `(HX, HY, HZ)`.
    #[serde(default = "default_halo")]
    pub halo: [u32; 3],
    pub machine: Machine,
    pub memory: MemoryCoeffs,
    pub cache: CacheCoeffs,
    /// Fraction of memory/cache time hidden when both are active.
    #[serde(default = "default_overlap")]
    pub overlap: f64,
    #[serde(default)]
    pub slack: Slack,
    #[serde(default)]
    pub constraints: Constraints,
    /// Optional predefined stencil order; derived when absent.
    #[serde(default)]
    pub sequence: Option<Vec<String>>,
}

impl ProgramSpec {
    /// Parse a description from JSON text.
    pub fn from_json(text: &str) -> Result<ProgramSpec, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Number of binary digits needed for the tile count along `axis`:
    /// `⌊log2 D⌋ + 1`, at least 1.
    pub fn digits(&self, axis: Axis) -> u32 {
        let extent = self.domain[axis.index()].max(1);
        32 - extent.leading_zeros()
    }

    /// Check referential integrity of outputs, constraints, and domain.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for axis in Axis::ALL {
            if self.domain[axis.index()] == 0 {
                return Err(ConfigError::ZeroSubdomain {
                    axis,
                    level: "domain",
                });
            }
        }
        for output in &self.outputs {
            if !self.stencils.contains_key(output) {
                return Err(ConfigError::UnknownStencil {
                    name: output.clone(),
                });
            }
        }
        for pin in &self.constraints.groups {
            if !self.stencils.contains_key(&pin.stencil) {
                return Err(ConfigError::UnknownStencil {
                    name: pin.stencil.clone(),
                });
            }
        }
        for bound in &self.constraints.tiling {
            if !self.stencils.contains_key(&bound.stencil) {
                return Err(ConfigError::UnknownStencil {
                    name: bound.stencil.clone(),
                });
            }
        }
        if let Some(sequence) = &self.sequence {
            for name in sequence {
                if !self.stencils.contains_key(name) {
                    return Err(ConfigError::UnknownStencil { name: name.clone() });
                }
            }
        }
        Ok(())
    }
}
