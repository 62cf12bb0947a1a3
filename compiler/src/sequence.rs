// sequence.rs — Stencil sequencing
//
// Produces a total order of the stencils consistent with their data
// dependencies. When the description supplies no order, one is sampled
// uniformly at random from the ready set, driven by a caller-provided seed so
// identical inputs reproduce identical plans.
//
// Preconditions: `deps` covers every stencil of `spec`.
// Postconditions: the order is a verified permutation respecting all
//                 stencil-input dependencies.
// Failure modes: ConfigError::{SequenceMismatch, SequenceOrder}.
// Side effects: none.

use std::collections::{BTreeMap, BTreeSet};

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::deps::DependencyMap;
use crate::diag::ConfigError;
use crate::program::ProgramSpec;

/// A verified total order of the program's stencils.
#[derive(Debug, Clone)]
pub struct Sequence {
    order: Vec<String>,
    position: BTreeMap<String, usize>,
}

impl Sequence {
    /// Use the supplied order if present, otherwise sample one; verify either.
    pub fn derive(
        spec: &ProgramSpec,
        deps: &DependencyMap,
        seed: u64,
    ) -> Result<Sequence, ConfigError> {
        let order = match &spec.sequence {
            Some(order) => order.clone(),
            None => sample_order(spec, deps, seed),
        };
        verify_order(&order, spec, deps)?;
        let position = order
            .iter()
            .enumerate()
            .map(|(index, name)| (name.clone(), index))
            .collect();
        Ok(Sequence { order, position })
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn at(&self, index: usize) -> &str {
        &self.order[index]
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.position.get(name).copied()
    }
}

/// Repeatedly pick a random stencil whose stencil-inputs are all placed.
fn sample_order(spec: &ProgramSpec, deps: &DependencyMap, seed: u64) -> Vec<String> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut order: Vec<String> = Vec::with_capacity(spec.stencils.len());
    let mut placed: BTreeSet<&str> = BTreeSet::new();
    while order.len() < spec.stencils.len() {
        let candidates: Vec<&str> = spec
            .stencils
            .keys()
            .map(String::as_str)
            .filter(|name| !placed.contains(name))
            .filter(|name| {
                deps[*name]
                    .stencil_inputs(spec)
                    .all(|input| input == *name || placed.contains(input))
            })
            .collect();
        // A DAG always has a ready candidate; cycles would surface here.
        let pick = candidates
            .choose(&mut rng)
            .expect("dependency cycle: no ready stencil");
        placed.insert(pick);
        order.push(pick.to_string());
    }
    order
}

/// Check the order is a permutation and respects every stencil dependency.
fn verify_order(
    order: &[String],
    spec: &ProgramSpec,
    deps: &DependencyMap,
) -> Result<(), ConfigError> {
    if order.len() != spec.stencils.len() {
        return Err(ConfigError::SequenceMismatch);
    }
    let positions: BTreeMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(index, name)| (name.as_str(), index))
        .collect();
    if positions.len() != spec.stencils.len()
        || !spec.stencils.keys().all(|name| positions.contains_key(name.as_str()))
    {
        return Err(ConfigError::SequenceMismatch);
    }
    for (index, name) in order.iter().enumerate() {
        for input in deps[name].stencil_inputs(spec) {
            if positions[input] >= index {
                return Err(ConfigError::SequenceOrder {
                    stencil: name.clone(),
                    input: input.to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deps::analyze;
    use crate::program::{CacheCoeffs, Machine, MemoryCoeffs};

    fn chain_spec() -> ProgramSpec {
        let stencils = [
            ("s0", "auto res = in0(i,j,k);"),
            ("s1", "auto res = s0(i-1,j,k);"),
            ("s2", "auto res = s1(i-1,j,k);"),
            ("s3", "auto res = s2(i-1,j,k);"),
        ];
        ProgramSpec {
            name: "chain".into(),
            stencils: stencils
                .iter()
                .map(|(n, b)| (n.to_string(), b.to_string()))
                .collect(),
            outputs: vec!["s3".into()],
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
            sequence: None,
        }
    }

    #[test]
    fn chain_has_unique_order() {
        let spec = chain_spec();
        let deps = analyze(&spec).unwrap();
        let seq = Sequence::derive(&spec, &deps, 7).unwrap();
        assert_eq!(seq.names(), ["s0", "s1", "s2", "s3"]);
        assert_eq!(seq.position("s2"), Some(2));
    }

    #[test]
    fn same_seed_same_order() {
        let mut spec = chain_spec();
        // break the chain so several orders are legal
        spec.stencils
            .insert("t0".into(), "auto res = in1(i,j,k);".into());
        spec.stencils
            .insert("t1".into(), "auto res = t0(i,j,k);".into());
        let deps = analyze(&spec).unwrap();
        let a = Sequence::derive(&spec, &deps, 42).unwrap();
        let b = Sequence::derive(&spec, &deps, 42).unwrap();
        assert_eq!(a.names(), b.names());
    }

    #[test]
    fn supplied_sequence_is_verified() {
        let mut spec = chain_spec();
        spec.sequence = Some(vec!["s1".into(), "s0".into(), "s2".into(), "s3".into()]);
        let deps = analyze(&spec).unwrap();
        assert_eq!(
            Sequence::derive(&spec, &deps, 0).unwrap_err(),
            ConfigError::SequenceOrder {
                stencil: "s1".into(),
                input: "s0".into(),
            }
        );
    }

    #[test]
    fn non_permutation_is_rejected() {
        let mut spec = chain_spec();
        spec.sequence = Some(vec!["s0".into(), "s0".into(), "s1".into(), "s2".into()]);
        let deps = analyze(&spec).unwrap();
        assert_eq!(
            Sequence::derive(&spec, &deps, 0).unwrap_err(),
            ConfigError::SequenceMismatch
        );
    }

    #[test]
    fn self_reference_is_rejected() {
        let mut spec = chain_spec();
        spec.stencils
            .insert("s3".into(), "auto res = s3(i-1,j,k);".into());
        spec.sequence = Some(vec!["s0".into(), "s1".into(), "s2".into(), "s3".into()]);
        let deps = analyze(&spec).unwrap();
        assert!(matches!(
            Sequence::derive(&spec, &deps, 0),
            Err(ConfigError::SequenceOrder { .. })
        ));
    }
}
