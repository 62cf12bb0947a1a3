// deps.rs — Per-stencil dependency analysis
//
// Derives, for every operator in the program, the offset sets and bounding
// boxes of its grid accesses plus the operand fetch count used by the cache
// cost model. Accesses wider than the program halo cannot be satisfied by
// redundant computation and are rejected here, at the first component
// boundary that sees them.
//
// Preconditions: `spec` passed `ProgramSpec::validate`.
// Postconditions: every stencil has an entry; all bounding boxes fit the halo.
// Failure modes: ConfigError::HaloOverflow.
// Side effects: none.

use std::collections::BTreeMap;

use crate::access::{extract_accesses, AccessMap};
use crate::bounds::Box3;
use crate::diag::ConfigError;
use crate::program::ProgramSpec;

/// Derived access information for one stencil.
#[derive(Debug, Clone, PartialEq)]
pub struct StencilInfo {
    /// Distinct offsets per referenced array.
    pub offsets: AccessMap,
    /// Bounding box per referenced array.
    pub bounds: BTreeMap<String, Box3>,
    /// 1 write + one fetch per distinct input offset.
    pub fetches: u32,
}

impl StencilInfo {
    fn from_body(body: &str) -> StencilInfo {
        let offsets = extract_accesses(body);
        let bounds = offsets
            .iter()
            .map(|(name, set)| (name.clone(), Box3::from_offsets(set.iter())))
            .collect();
        let fetches = 1 + offsets.values().map(|set| set.len() as u32).sum::<u32>();
        StencilInfo {
            offsets,
            bounds,
            fetches,
        }
    }

    /// Referenced arrays that are themselves stencils of `spec`.
    pub fn stencil_inputs<'a>(&'a self, spec: &'a ProgramSpec) -> impl Iterator<Item = &'a str> {
        self.offsets
            .keys()
            .filter(|name| spec.stencils.contains_key(*name))
            .map(String::as_str)
    }
}

/// Access information for every stencil, keyed by name.
pub type DependencyMap = BTreeMap<String, StencilInfo>;

/// Analyze all operator bodies and check access widths against the halo.
pub fn analyze(spec: &ProgramSpec) -> Result<DependencyMap, ConfigError> {
    let mut map = DependencyMap::new();
    for (name, body) in &spec.stencils {
        let info = StencilInfo::from_body(body);
        for (array, bounds) in &info.bounds {
            if !bounds.within(spec.halo) {
                return Err(ConfigError::HaloOverflow {
                    stencil: name.clone(),
                    array: array.clone(),
                });
            }
        }
        map.insert(name.clone(), info);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{CacheCoeffs, Machine, MemoryCoeffs};

    fn spec_with(stencils: &[(&str, &str)]) -> ProgramSpec {
        ProgramSpec {
            name: "unit".into(),
            stencils: stencils
                .iter()
                .map(|(n, b)| (n.to_string(), b.to_string()))
                .collect(),
            outputs: vec![stencils.last().unwrap().0.to_string()],
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
    fn laplacian_bounds_and_fetches() {
        let spec = spec_with(&[(
            "ulap",
            "auto res = -4.0 * uin(i,j,k) + uin(i+1,j,k) + uin(i-1,j,k) \
             + uin(i,j+1,k) + uin(i,j-1,k);",
        )]);
        let deps = analyze(&spec).unwrap();
        let info = &deps["ulap"];
        assert_eq!(info.bounds["uin"].x, (-1, 1));
        assert_eq!(info.bounds["uin"].y, (-1, 1));
        assert_eq!(info.bounds["uin"].z, (0, 0));
        assert_eq!(info.fetches, 6); // 1 write + 5 distinct reads
    }

    #[test]
    fn fetches_sum_over_arrays() {
        let spec = spec_with(&[(
            "flux",
            "auto res = lap(i+1,j,k) - lap(i,j,k) + wgt(i,j,k);",
        )]);
        let deps = analyze(&spec).unwrap();
        assert_eq!(deps["flux"].fetches, 4); // 1 + 2 + 1
    }

    #[test]
    fn constant_stencil_has_single_fetch() {
        let spec = spec_with(&[("init", "auto res = 1.0;")]);
        let deps = analyze(&spec).unwrap();
        assert!(deps["init"].bounds.is_empty());
        assert_eq!(deps["init"].fetches, 1);
    }

    #[test]
    fn halo_overflow_is_fatal() {
        let mut spec = spec_with(&[("wide", "auto res = in0(i+4,j,k);")]);
        spec.halo = [3, 3, 3];
        assert_eq!(
            analyze(&spec),
            Err(ConfigError::HaloOverflow {
                stencil: "wide".into(),
                array: "in0".into(),
            })
        );
    }

    #[test]
    fn stencil_inputs_filter_out_constants() {
        let spec = spec_with(&[
            ("lap", "auto res = uin(i,j,k);"),
            ("out", "auto res = lap(i,j,k) + mask(i,j,k);"),
        ]);
        let deps = analyze(&spec).unwrap();
        let inputs: Vec<&str> = deps["out"].stencil_inputs(&spec).collect();
        assert_eq!(inputs, vec!["lap"]);
    }
}
