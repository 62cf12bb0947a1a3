// dataflow.rs — Data-flow and boundary analysis over the plan tree
//
// Two bottom-up walks over the reconstructed tiling. The data-flow walk
// classifies every accessed name per (sub)group as input, output, or
// temporary, against the set of names the enclosing scope still needs. The
// boundary walk grows per-array requirement boxes backwards through each
// group (outward-max closure of downstream consumers), yielding the
// redundant-compute extent per stencil and the halo exchanges per group
// output. A name that is not a stencil of the program is external by
// definition — that is the only producer/constant disambiguation.
//
// Preconditions: `tiling` was reconstructed over a verified sequence.
// Postconditions: every group carries disjoint input/output/temporary sets,
//                 loop extents within the halo, and non-empty halos only;
//                 the dummy group (ID 0, empty loops) leads the outer level.
// Failure modes: ConfigError::{HaloOverflow, UnconsumedStencil}.
// Side effects: mutates the plan tree in place.

use std::collections::{BTreeMap, BTreeSet};

use crate::bounds::{Box3, Halo};
use crate::diag::ConfigError;
use crate::plan::{Flow, OuterGroup, StencilInst, Tiling};
use crate::program::ProgramSpec;

// ── Data flow ──────────────────────────────────────────────────────────────

/// Reads/writes of one scope member, from a stencil or a nested group.
type FlowPair = (BTreeSet<String>, BTreeSet<String>);

/// Fill the input/output/temporary sets at every nesting level.
pub fn compute_dataflow(tiling: &mut Tiling, spec: &ProgramSpec) {
    let program_outputs: BTreeSet<String> = spec.outputs.iter().cloned().collect();
    let mut outer_deps = program_outputs.clone();
    for group in tiling.groups.iter_mut().rev() {
        let mut tile_deps = outer_deps.clone();
        for tile in group.tiles.iter_mut().rev() {
            let pairs: Vec<FlowPair> = tile.stencils.iter().map(stencil_pair).collect();
            tile_deps = classify(&mut tile.flow, &pairs, &tile_deps);
        }
        let pairs: Vec<FlowPair> = group
            .tiles
            .iter()
            .map(|tile| (tile.flow.inputs.clone(), tile.flow.outputs.clone()))
            .collect();
        outer_deps = classify(&mut group.flow, &pairs, &outer_deps);
    }
    let pairs: Vec<FlowPair> = tiling
        .groups
        .iter()
        .map(|group| (group.flow.inputs.clone(), group.flow.outputs.clone()))
        .collect();
    classify(&mut tiling.flow, &pairs, &program_outputs);
}

fn stencil_pair(stencil: &StencilInst) -> FlowPair {
    let reads = stencil.offsets.keys().cloned().collect();
    let writes = [stencil.name.clone()].into_iter().collect();
    (reads, writes)
}

/// Classify one scope: a write still needed outside is an output, any other
/// write is a temporary, and whatever is read but not produced is an input.
/// Returns the enclosing scope's dependency set extended by the inputs.
fn classify(flow: &mut Flow, pairs: &[FlowPair], dependencies: &BTreeSet<String>) -> BTreeSet<String> {
    let mut local: BTreeSet<String> = BTreeSet::new();
    let mut outputs: BTreeSet<String> = BTreeSet::new();
    let mut temporaries: BTreeSet<String> = BTreeSet::new();
    for (reads, writes) in pairs.iter().rev() {
        local.extend(reads.iter().cloned());
        for write in writes {
            if dependencies.contains(write) {
                outputs.insert(write.clone());
            } else {
                temporaries.insert(write.clone());
            }
        }
    }
    let inputs: BTreeSet<String> = local
        .difference(&outputs)
        .cloned()
        .collect::<BTreeSet<String>>()
        .difference(&temporaries)
        .cloned()
        .collect();
    let mut extended = dependencies.clone();
    extended.extend(inputs.iter().cloned());
    flow.inputs = inputs;
    flow.outputs = outputs;
    flow.temporaries = temporaries;
    extended
}

// ── Boundary analysis ──────────────────────────────────────────────────────

/// Requirement boxes per array name, propagated down from enclosing scopes.
type Requirements = BTreeMap<String, Box3>;

/// Compute redundant-compute extents and halos, prepend the dummy group,
/// and number the groups at both nesting levels.
pub fn compute_boundaries(tiling: &mut Tiling, spec: &ProgramSpec) -> Result<(), ConfigError> {
    let mut outer_reqs: Requirements = spec
        .outputs
        .iter()
        .map(|name| (name.clone(), Box3::ZERO))
        .collect();
    for group in tiling.groups.iter_mut().rev() {
        let mut tile_reqs: Requirements = group
            .flow
            .outputs
            .iter()
            .map(|name| (name.clone(), Box3::ZERO))
            .collect();
        let mut members: Vec<StencilInst> = Vec::new();
        for tile in group.tiles.iter_mut().rev() {
            tile_reqs = analyze_boundary(&mut tile.flow, &tile.stencils, tile_reqs, spec)?;
            members.splice(0..0, tile.stencils.iter().cloned());
        }
        outer_reqs = analyze_boundary(&mut group.flow, &members, outer_reqs, spec)?;
    }

    // the dummy group carries the halo requirements of the program inputs so
    // the schedule starts with a PUT for boundary data
    let mut dummy = OuterGroup {
        id: 0,
        tiles: Vec::new(),
        flow: Flow::default(),
    };
    for name in &tiling.flow.inputs {
        if let Some(&remote) = outer_reqs.get(name) {
            let halo = Halo::between(remote, Box3::ZERO);
            if !halo.is_empty() {
                dummy.flow.halos.insert(name.clone(), halo);
            }
        }
    }
    tiling.groups.insert(0, dummy);

    let mut outer_id = 0;
    let mut tile_id = 0;
    for group in &mut tiling.groups {
        group.id = outer_id;
        outer_id += 1;
        for tile in &mut group.tiles {
            tile.id = tile_id;
            tile_id += 1;
        }
    }
    Ok(())
}

/// Walk one scope's stencils in reverse, growing the per-array requirement
/// boxes, then derive loop extents and output halos.
fn analyze_boundary(
    flow: &mut Flow,
    stencils: &[StencilInst],
    mut requirements: Requirements,
    spec: &ProgramSpec,
) -> Result<Requirements, ConfigError> {
    let mut accesses: Requirements = flow
        .outputs
        .iter()
        .map(|name| (name.clone(), Box3::ZERO))
        .collect();
    for stencil in stencils.iter().rev() {
        let base = *accesses
            .get(&stencil.name)
            .ok_or(ConfigError::UnconsumedStencil {
                stencil: stencil.name.clone(),
            })?;
        for (name, &offsets) in &stencil.offsets {
            let grown = offsets.sum(base);
            let required = accesses
                .entry(name.clone())
                .and_modify(|existing| *existing = existing.outward_max(grown))
                .or_insert(grown);
            if !required.within(spec.halo) {
                return Err(ConfigError::HaloOverflow {
                    stencil: stencil.name.clone(),
                    array: name.clone(),
                });
            }
        }
    }

    flow.loops = stencils
        .iter()
        .map(|stencil| (stencil.name.clone(), accesses[&stencil.name]))
        .collect();
    flow.halos = flow
        .outputs
        .iter()
        .filter_map(|name| {
            let halo = Halo::between(requirements[name], accesses[name]);
            (!halo.is_empty()).then(|| (name.clone(), halo))
        })
        .collect();

    for name in &flow.inputs {
        let grown = accesses[name];
        requirements
            .entry(name.clone())
            .and_modify(|existing| *existing = existing.outward_max(grown))
            .or_insert(grown);
    }
    Ok(requirements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deps::analyze;
    use crate::plan::reconstruct;
    use crate::program::{CacheCoeffs, Machine, MemoryCoeffs};
    use crate::sequence::Sequence;
    use crate::solver::Assignment;

    fn spec_with(stencils: &[(&str, &str)], outputs: &[&str]) -> ProgramSpec {
        ProgramSpec {
            name: "unit".into(),
            stencils: stencils
                .iter()
                .map(|(n, b)| (n.to_string(), b.to_string()))
                .collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            constants: Vec::new(),
            domain: [64, 64, 60],
            halo: [3, 3, 3],
            machine: Machine {
                cores: 4,
                capacity: 85 * 1024,
            },
            memory: MemoryCoeffs {
                rw_body: -2.23e-7,
                st_body: 5.71e-7,
                rw_peel: -1.25e-6,
                st_peel: 5.25e-6,
            },
            cache: CacheCoeffs {
                body: 9.44e-8,
                peel: 9.95e-7,
            },
            overlap: 1.0,
            slack: Default::default(),
            constraints: Default::default(),
            sequence: Some(stencils.iter().map(|(n, _)| n.to_string()).collect()),
        }
    }

    /// Tiling with the given group split, all tile counts (1, 1, 4).
    fn build_tiling(spec: &ProgramSpec, groups: &[i64]) -> Tiling {
        let deps = analyze(spec).unwrap();
        let sequence = Sequence::derive(spec, &deps, 0).unwrap();
        let mut assignment = Assignment::default();
        for (position, &group) in groups.iter().enumerate() {
            assignment.values.insert(format!("g%{position}"), group);
            assignment.values.insert(format!("n%x{position}"), 1);
            assignment.values.insert(format!("n%y{position}"), 1);
            assignment.values.insert(format!("n%z{position}"), 4);
        }
        reconstruct(spec, &deps, &sequence, &assignment).unwrap()
    }

    #[test]
    fn pipeline_internal_names_become_temporaries() {
        let spec = spec_with(
            &[
                ("alap", "auto res = ain(i+1,j,k) + ain(i-1,j,k);"),
                ("aout", "auto res = alap(i,j,k);"),
                ("blap", "auto res = bin(i,j+1,k) + bin(i,j-1,k);"),
                ("bout", "auto res = blap(i,j,k);"),
            ],
            &["aout", "bout"],
        );
        let mut tiling = build_tiling(&spec, &[0, 0, 1, 1]);
        compute_dataflow(&mut tiling, &spec);
        let first = &tiling.groups[0].tiles[0].flow;
        assert!(first.temporaries.contains("alap"));
        assert!(!first.outputs.contains("alap"));
        assert_eq!(
            first.outputs.iter().collect::<Vec<_>>(),
            vec![&"aout".to_string()]
        );
        assert_eq!(
            first.inputs.iter().collect::<Vec<_>>(),
            vec![&"ain".to_string()]
        );
        let root = &tiling.flow;
        assert!(root.inputs.contains("ain") && root.inputs.contains("bin"));
        assert!(root.outputs.contains("aout") && root.outputs.contains("bout"));
        assert!(root.temporaries.is_empty());
    }

    #[test]
    fn split_producer_becomes_group_output() {
        let spec = spec_with(
            &[
                ("lap", "auto res = uin(i+1,j,k) + uin(i-1,j,k);"),
                ("out", "auto res = lap(i-1,j,k) + lap(i,j,k);"),
            ],
            &["out"],
        );
        let mut tiling = build_tiling(&spec, &[0, 1]);
        compute_dataflow(&mut tiling, &spec);
        let first = &tiling.groups[0].tiles[0].flow;
        assert!(first.outputs.contains("lap"));
        assert!(first.temporaries.is_empty());
        let second = &tiling.groups[1].tiles[0].flow;
        assert!(second.inputs.contains("lap"));
    }

    #[test]
    fn fused_chain_grows_loop_extents_backwards() {
        let spec = spec_with(
            &[
                ("lap", "auto res = uin(i+1,j,k) + uin(i-1,j,k);"),
                ("out", "auto res = lap(i-1,j,k) + lap(i,j,k);"),
            ],
            &["out"],
        );
        let mut tiling = build_tiling(&spec, &[0, 0]);
        compute_dataflow(&mut tiling, &spec);
        compute_boundaries(&mut tiling, &spec).unwrap();
        // dummy group leads; the fused group follows
        let fused = &tiling.groups[1].tiles[0].flow;
        assert_eq!(fused.loops["out"], Box3::ZERO);
        assert_eq!(fused.loops["lap"].x, (-1, 0));
        assert_eq!(fused.loops["lap"].y, (0, 0));
    }

    #[test]
    fn dummy_group_carries_input_halos() {
        let spec = spec_with(
            &[
                ("lap", "auto res = uin(i+1,j,k) + uin(i-1,j,k);"),
                ("out", "auto res = lap(i-1,j,k) + lap(i,j,k);"),
            ],
            &["out"],
        );
        let mut tiling = build_tiling(&spec, &[0, 0]);
        compute_dataflow(&mut tiling, &spec);
        compute_boundaries(&mut tiling, &spec).unwrap();
        let dummy = &tiling.groups[0];
        assert_eq!(dummy.id, 0);
        assert!(dummy.flow.loops.is_empty());
        assert!(dummy.tiles.is_empty());
        let halo = &dummy.flow.halos["uin"];
        assert_eq!(halo.outer.x, (-2, 1));
        assert_eq!(halo.inner, Box3::ZERO);
        // group ids are monotone after the dummy
        assert_eq!(tiling.groups[1].id, 1);
    }

    #[test]
    fn final_outputs_have_no_halos() {
        let spec = spec_with(
            &[
                ("lap", "auto res = uin(i+1,j,k) + uin(i-1,j,k);"),
                ("out", "auto res = lap(i-1,j,k) + lap(i,j,k);"),
            ],
            &["out"],
        );
        let mut tiling = build_tiling(&spec, &[0, 0]);
        compute_dataflow(&mut tiling, &spec);
        compute_boundaries(&mut tiling, &spec).unwrap();
        assert!(tiling.groups[1].flow.halos.is_empty());
    }

    #[test]
    fn split_groups_exchange_halos_on_the_cut() {
        let spec = spec_with(
            &[
                ("lap", "auto res = uin(i+1,j,k) + uin(i-1,j,k);"),
                ("out", "auto res = lap(i-1,j,k) + lap(i+1,j,k);"),
            ],
            &["out"],
        );
        let mut tiling = build_tiling(&spec, &[0, 1]);
        compute_dataflow(&mut tiling, &spec);
        compute_boundaries(&mut tiling, &spec).unwrap();
        // producer group must exchange lap: the consumer needs (−1, +1)
        let producer = &tiling.groups[1];
        let halo = &producer.flow.halos["lap"];
        assert_eq!(halo.outer.x, (-1, 1));
        assert_eq!(halo.inner, Box3::ZERO);
    }

    #[test]
    fn halo_overflow_names_the_growing_stencil() {
        // fusing the whole chain pushes the first stencil's input box to
        // x(-4,-4), one past the halo width
        let spec = spec_with(
            &[
                ("s0", "auto res = in0(i-1,j,k);"),
                ("s1", "auto res = s0(i-1,j,k);"),
                ("s2", "auto res = s1(i-1,j,k);"),
                ("s3", "auto res = s2(i-1,j,k);"),
            ],
            &["s3"],
        );
        let mut tiling = build_tiling(&spec, &[0, 0, 0, 0]);
        compute_dataflow(&mut tiling, &spec);
        assert_eq!(
            compute_boundaries(&mut tiling, &spec).unwrap_err(),
            ConfigError::HaloOverflow {
                stencil: "s0".into(),
                array: "in0".into(),
            }
        );
    }

    #[test]
    fn disjoint_flow_sets_at_every_level() {
        let spec = spec_with(
            &[
                ("lap", "auto res = uin(i+1,j,k) + uin(i-1,j,k);"),
                ("flx", "auto res = lap(i+1,j,k) - lap(i,j,k);"),
                ("out", "auto res = uin(i,j,k) - flx(i,j,k) + flx(i-1,j,k);"),
            ],
            &["out"],
        );
        let mut tiling = build_tiling(&spec, &[0, 0, 0]);
        compute_dataflow(&mut tiling, &spec);
        for group in &tiling.groups {
            for flow in std::iter::once(&group.flow).chain(group.tiles.iter().map(|t| &t.flow)) {
                assert!(flow.inputs.is_disjoint(&flow.outputs));
                assert!(flow.inputs.is_disjoint(&flow.temporaries));
                assert!(flow.outputs.is_disjoint(&flow.temporaries));
            }
        }
    }
}
