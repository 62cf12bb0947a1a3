// plan.rs — Execution-plan tree and reconstruction from the MILP assignment
//
// The plan is a two-level tiling tree: a single outer subdomain per process
// holding one outer group per fusion group, each wrapping one cache-tile
// group with the solved `(NX, NY, NZ)` tile counts and its member stencils.
// Dataflow, boundary, and schedule analysis fill in the remaining fields
// after reconstruction.
//
// Preconditions: the assignment stems from an LP encoded over `sequence`.
// Postconditions: groups partition the sequence in order; tile counts agree
//                 within each group.
// Failure modes: ConfigError::{MissingVariable, TileCountMismatch,
//                ZeroSubdomain}.
// Side effects: none.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::bounds::{Box3, Halo};
use crate::deps::DependencyMap;
use crate::diag::ConfigError;
use crate::pass::StageCert;
use crate::pipeline::Provenance;
use crate::program::{Axis, ProgramSpec};
use crate::schedule::Event;
use crate::sequence::Sequence;
use crate::solver::Assignment;

// ── Plan tree ──────────────────────────────────────────────────────────────

/// Data-flow and boundary results shared by every nesting level.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Flow {
    pub inputs: BTreeSet<String>,
    pub outputs: BTreeSet<String>,
    pub temporaries: BTreeSet<String>,
    /// Redundant-compute extent per member stencil.
    pub loops: BTreeMap<String, Box3>,
    /// Required halo exchange per group output; empty halos are dropped.
    pub halos: BTreeMap<String, Halo>,
}

/// One stencil instance inside a tile group, with its body carried through
/// for downstream code generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StencilInst {
    pub name: String,
    pub body: String,
    /// Access bounding box per referenced array.
    pub offsets: BTreeMap<String, Box3>,
}

/// A cache-tile group: fused stencils sharing one tile geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileGroup {
    pub id: u32,
    /// Tile counts `(NX, NY, NZ)` inside the outer subdomain.
    pub counts: [u32; 3],
    pub stencils: Vec<StencilInst>,
    #[serde(default)]
    pub flow: Flow,
}

/// An outer group: the halo-exchange granularity of the plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OuterGroup {
    pub id: u32,
    pub tiles: Vec<TileGroup>,
    #[serde(default)]
    pub flow: Flow,
}

/// The two-level tiling tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tiling {
    /// Outer subdomain counts; a single subdomain per process.
    pub counts: [u32; 3],
    pub groups: Vec<OuterGroup>,
    #[serde(default)]
    pub flow: Flow,
}

/// The optimizer's product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub tiling: Tiling,
    /// Solver cost estimate in milliseconds; absent when no solution exists.
    pub objective: Option<f64>,
    #[serde(default)]
    pub schedule: Vec<Event>,
    pub provenance: Option<Provenance>,
}

/// Ceiling-divided extent of one tile along an axis.
pub fn tile_size(extent: u32, count: u32) -> u32 {
    (extent + count - 1) / count
}

// ── Reconstruction ─────────────────────────────────────────────────────────

/// Rebuild the tiling tree from the solved group indexes and tile counts.
pub fn reconstruct(
    spec: &ProgramSpec,
    deps: &DependencyMap,
    sequence: &Sequence,
    assignment: &Assignment,
) -> Result<Tiling, ConfigError> {
    let mut indexes = Vec::with_capacity(sequence.len());
    for position in 0..sequence.len() {
        indexes.push(assignment.require(&format!("g%{position}"))?.max(0) as usize);
    }
    let group_count = indexes.iter().max().map_or(0, |&last| last + 1);

    let mut groups: Vec<TileGroup> = (0..group_count)
        .map(|id| TileGroup {
            id: id as u32,
            counts: [0; 3],
            stencils: Vec::new(),
            flow: Flow::default(),
        })
        .collect();

    for (position, &group) in indexes.iter().enumerate() {
        let name = sequence.at(position);
        let mut counts = [0u32; 3];
        for axis in Axis::ALL {
            let variable = format!("n%{}{position}", axis.letter());
            counts[axis.index()] = assignment.require(&variable)?.max(0) as u32;
        }
        let bucket = &mut groups[group];
        if bucket.stencils.is_empty() {
            bucket.counts = counts;
        } else {
            for axis in Axis::ALL {
                if bucket.counts[axis.index()] != counts[axis.index()] {
                    return Err(ConfigError::TileCountMismatch {
                        group: group as u32,
                        axis,
                    });
                }
            }
        }
        bucket.stencils.push(StencilInst {
            name: name.to_string(),
            body: spec.stencils[name].clone(),
            offsets: deps[name].bounds.clone(),
        });
    }

    Ok(Tiling {
        counts: [1, 1, 1],
        groups: groups
            .into_iter()
            .map(|tile| OuterGroup {
                id: 0,
                tiles: vec![tile],
                flow: Flow::default(),
            })
            .collect(),
        flow: Flow::default(),
    })
}

/// Check that no nesting level decomposes the domain into zero-size pieces.
pub fn verify_sizes(spec: &ProgramSpec, tiling: &Tiling) -> Result<(), ConfigError> {
    let mut subdomain = [0u32; 3];
    for axis in Axis::ALL {
        let index = axis.index();
        subdomain[index] = tile_size(spec.domain[index], tiling.counts[index].max(1));
        if subdomain[index] == 0 {
            return Err(ConfigError::ZeroSubdomain {
                axis,
                level: "subdomain",
            });
        }
    }
    for group in &tiling.groups {
        for tile in &group.tiles {
            for axis in Axis::ALL {
                let index = axis.index();
                if tile_size(subdomain[index], tile.counts[index].max(1)) == 0 {
                    return Err(ConfigError::ZeroSubdomain {
                        axis,
                        level: "cache tile",
                    });
                }
            }
        }
    }
    Ok(())
}

// ── Verification ───────────────────────────────────────────────────────────

/// Machine-checkable evidence for reconstruction postconditions (P1-P4).
#[derive(Debug, Clone)]
pub struct PlanCert {
    /// P1: every tile count is a power of two within `[1, D]`.
    pub p1_counts_are_powers_of_two: bool,
    /// P2: every tile group provides at least `cores` tiles.
    pub p2_tiles_cover_cores: bool,
    /// P3: groups partition the sequence in order.
    pub p3_groups_partition_sequence: bool,
    /// P4: all tile groups of one outer group share their counts.
    pub p4_counts_agree_within_groups: bool,
}

impl StageCert for PlanCert {
    fn all_pass(&self) -> bool {
        self.p1_counts_are_powers_of_two
            && self.p2_tiles_cover_cores
            && self.p3_groups_partition_sequence
            && self.p4_counts_agree_within_groups
    }

    fn obligations(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("P1_counts_are_powers_of_two", self.p1_counts_are_powers_of_two),
            ("P2_tiles_cover_cores", self.p2_tiles_cover_cores),
            ("P3_groups_partition_sequence", self.p3_groups_partition_sequence),
            ("P4_counts_agree_within_groups", self.p4_counts_agree_within_groups),
        ]
    }
}

/// Verify reconstruction postconditions against the description and sequence.
pub fn verify_plan(spec: &ProgramSpec, sequence: &Sequence, tiling: &Tiling) -> PlanCert {
    let tile_groups: Vec<&TileGroup> = tiling
        .groups
        .iter()
        .flat_map(|group| group.tiles.iter())
        .filter(|tile| !tile.stencils.is_empty())
        .collect();

    let p1 = tile_groups.iter().all(|tile| {
        Axis::ALL.iter().all(|axis| {
            let count = tile.counts[axis.index()];
            count.is_power_of_two() && count <= spec.domain[axis.index()]
        })
    });

    let p2 = tile_groups
        .iter()
        .all(|tile| tile.counts.iter().product::<u32>() >= spec.machine.cores);

    let flattened: Vec<&str> = tile_groups
        .iter()
        .flat_map(|tile| tile.stencils.iter().map(|s| s.name.as_str()))
        .collect();
    let p3 = flattened.len() == sequence.len()
        && flattened
            .iter()
            .enumerate()
            .all(|(position, name)| sequence.at(position) == *name);

    let p4 = tiling.groups.iter().all(|group| {
        group
            .tiles
            .windows(2)
            .all(|pair| pair[0].counts == pair[1].counts)
    });

    PlanCert {
        p1_counts_are_powers_of_two: p1,
        p2_tiles_cover_cores: p2,
        p3_groups_partition_sequence: p3,
        p4_counts_agree_within_groups: p4,
    }
}
