// pass.rs — Pass descriptor module: metadata, dependency resolution, certs
//
// Declares the optimizer's 9 passes, their dependency edges, and the
// artifacts they produce. The pipeline runner uses the descriptors to compute
// minimal pass subsets, e.g. a solver-free analysis run stops at Encode.

use std::collections::HashSet;

// ── Pass and Artifact identifiers ──────────────────────────────────────────

/// Identifies each optimizer pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassId {
    Analyze,
    Sequence,
    Utilization,
    Encode,
    Solve,
    Reconstruct,
    Dataflow,
    Boundary,
    Schedule,
}

/// Machine-readable artifact identifiers. Each maps to a concrete type in
/// the optimizer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactId {
    Deps,        // DependencyMap
    Sequence,    // Sequence
    Utilization, // Utilization
    Lp,          // String (LP text)
    Assignment,  // Option<Assignment>
    Tiling,      // Option<Tiling>
    Flow,        // Tiling with data-flow sets
    Boundaries,  // Tiling with loops/halos and the dummy group
    Schedule,    // Vec<Event>
}

// ── Pass descriptor ────────────────────────────────────────────────────────

/// Static metadata about an optimizer pass.
pub struct PassDescriptor {
    /// Human-readable name for verbose output.
    pub name: &'static str,
    /// Pass dependencies (other passes whose outputs this pass consumes).
    pub inputs: &'static [PassId],
    /// Artifacts this pass produces.
    pub outputs: &'static [ArtifactId],
    /// Pre/post conditions (documentation only).
    pub invariants: &'static str,
}

/// Return the static descriptor for a given pass.
pub fn descriptor(id: PassId) -> PassDescriptor {
    match id {
        PassId::Analyze => PassDescriptor {
            name: "analyze",
            inputs: &[],
            outputs: &[ArtifactId::Deps],
            invariants: "all access boxes within the halo widths",
        },
        PassId::Sequence => PassDescriptor {
            name: "sequence",
            inputs: &[PassId::Analyze],
            outputs: &[ArtifactId::Sequence],
            invariants: "verified permutation respecting dependencies",
        },
        PassId::Utilization => PassDescriptor {
            name: "utilization",
            inputs: &[PassId::Sequence],
            outputs: &[ArtifactId::Utilization],
            invariants: "live-set sizes defined for all suffix windows",
        },
        PassId::Encode => PassDescriptor {
            name: "encode",
            inputs: &[PassId::Utilization],
            outputs: &[ArtifactId::Lp],
            invariants: "complete LP with canonical signs",
        },
        PassId::Solve => PassDescriptor {
            name: "solve",
            inputs: &[PassId::Encode],
            outputs: &[ArtifactId::Assignment],
            invariants: "assignment present iff the solver wrote a solution",
        },
        PassId::Reconstruct => PassDescriptor {
            name: "reconstruct",
            inputs: &[PassId::Solve],
            outputs: &[ArtifactId::Tiling],
            invariants: "P1-P4 obligations verified",
        },
        PassId::Dataflow => PassDescriptor {
            name: "dataflow",
            inputs: &[PassId::Reconstruct],
            outputs: &[ArtifactId::Flow],
            invariants: "inputs, outputs, temporaries disjoint per group",
        },
        PassId::Boundary => PassDescriptor {
            name: "boundary",
            inputs: &[PassId::Dataflow],
            outputs: &[ArtifactId::Boundaries],
            invariants: "loop extents within the halo, dummy group prepended",
        },
        PassId::Schedule => PassDescriptor {
            name: "schedule",
            inputs: &[PassId::Boundary],
            outputs: &[ArtifactId::Schedule],
            invariants: "S1-S3 obligations verified",
        },
    }
}

// ── Dependency resolution ──────────────────────────────────────────────────

/// All 9 pass IDs in declaration order (used for iteration).
pub const ALL_PASSES: [PassId; 9] = [
    PassId::Analyze,
    PassId::Sequence,
    PassId::Utilization,
    PassId::Encode,
    PassId::Solve,
    PassId::Reconstruct,
    PassId::Dataflow,
    PassId::Boundary,
    PassId::Schedule,
];

/// Compute the minimal ordered set of passes needed to produce `terminal`.
/// Returns passes in topological (execution) order.
pub fn required_passes(terminal: PassId) -> Vec<PassId> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    visit(terminal, &mut visited, &mut order);
    order
}

fn visit(id: PassId, visited: &mut HashSet<PassId>, order: &mut Vec<PassId>) {
    if !visited.insert(id) {
        return;
    }
    for &dep in descriptor(id).inputs {
        visit(dep, visited, order);
    }
    order.push(id);
}

// ── Stage certificates ─────────────────────────────────────────────────────

/// Machine-checkable evidence that a pass met its postconditions.
pub trait StageCert {
    fn all_pass(&self) -> bool;
    fn obligations(&self) -> Vec<(&'static str, bool)>;
}

// ── Tests ──────────────────────────────────────────────────────────────────
