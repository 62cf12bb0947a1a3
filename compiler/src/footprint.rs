// footprint.rs — Cache-utilization model
//
// For every stencil position `h` and every window start `l ≤ h`, the number
// of distinct arrays live when positions `l..=h` are fused into one cache
// tile: the union of each member's inputs plus its own output. A lower bound
// on the tile footprint, consumed by the MILP cache-capacity constraints.
//
// Preconditions: `sequence` is verified against `deps`.
// Postconditions: `window(h, l)` is defined for all `l ≤ h < len`.
// Failure modes: none.
// Side effects: none.

use std::collections::BTreeSet;

use crate::deps::DependencyMap;
use crate::sequence::Sequence;

/// Live-set cardinalities for all suffix windows ending at each position.
#[derive(Debug, Clone)]
pub struct Utilization {
    /// `windows[h][l]` = |∪ access sets of positions l..=h|.
    windows: Vec<Vec<u32>>,
}

impl Utilization {
    pub fn compute(sequence: &Sequence, deps: &DependencyMap) -> Utilization {
        let access_sets: Vec<BTreeSet<&str>> = sequence
            .names()
            .iter()
            .map(|name| {
                let mut set: BTreeSet<&str> = deps[name]
                    .offsets
                    .keys()
                    .map(String::as_str)
                    .collect();
                set.insert(name);
                set
            })
            .collect();

        let mut windows = Vec::with_capacity(access_sets.len());
        for high in 0..access_sets.len() {
            let mut live: BTreeSet<&str> = BTreeSet::new();
            let mut column = vec![0u32; high + 1];
            for low in (0..=high).rev() {
                live.extend(access_sets[low].iter().copied());
                column[low] = live.len() as u32;
            }
            windows.push(column);
        }
        Utilization { windows }
    }

    /// Distinct live arrays when positions `low..=high` share one tile.
    pub fn window(&self, high: usize, low: usize) -> u32 {
        self.windows[high][low]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deps::analyze;
    use crate::program::{CacheCoeffs, Machine, MemoryCoeffs, ProgramSpec};

    fn spec() -> ProgramSpec {
        let stencils = [
            ("lap", "auto res = uin(i+1,j,k) + uin(i-1,j,k);"),
            ("flx", "auto res = lap(i+1,j,k) - lap(i,j,k);"),
            ("out", "auto res = uin(i,j,k) + flx(i,j,k) - flx(i-1,j,k);"),
        ];
        ProgramSpec {
            name: "unit".into(),
            stencils: stencils
                .iter()
                .map(|(n, b)| (n.to_string(), b.to_string()))
                .collect(),
            outputs: vec!["out".into()],
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
            sequence: Some(vec!["lap".into(), "flx".into(), "out".into()]),
        }
    }

    #[test]
    fn singleton_windows_count_inputs_plus_self() {
        let spec = spec();
        let deps = analyze(&spec).unwrap();
        let sequence = Sequence::derive(&spec, &deps, 0).unwrap();
        let utilization = Utilization::compute(&sequence, &deps);
        assert_eq!(utilization.window(0, 0), 2); // {uin, lap}
        assert_eq!(utilization.window(1, 1), 2); // {lap, flx}
        assert_eq!(utilization.window(2, 2), 3); // {uin, flx, out}
    }

    #[test]
    fn wider_windows_union_the_live_sets() {
        let spec = spec();
        let deps = analyze(&spec).unwrap();
        let sequence = Sequence::derive(&spec, &deps, 0).unwrap();
        let utilization = Utilization::compute(&sequence, &deps);
        assert_eq!(utilization.window(1, 0), 3); // {uin, lap, flx}
        assert_eq!(utilization.window(2, 0), 4); // {uin, lap, flx, out}
        assert_eq!(utilization.window(2, 1), 4); // {uin, lap, flx, out}
    }
}
