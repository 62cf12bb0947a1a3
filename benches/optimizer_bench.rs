use criterion::{black_box, criterion_group, criterion_main, Criterion};

use stopt::deps::analyze;
use stopt::encode::encode;
use stopt::footprint::Utilization;
use stopt::pass::PassId;
use stopt::pipeline::{run_pipeline, OptimizeOptions, OptimizeState};
use stopt::program::{CacheCoeffs, Machine, MemoryCoeffs, ProgramSpec};
use stopt::sequence::Sequence;
use stopt::solver::Assignment;

/// A diffusion-shaped program: `pipelines` independent four-stencil
/// sub-pipelines (laplacian, two fluxes, output), one output each.
fn diffusion_like(pipelines: usize) -> ProgramSpec {
    let mut stencils = std::collections::BTreeMap::new();
    let mut outputs = Vec::new();
    for p in 0..pipelines {
        let input = format!("f{p}in");
        stencils.insert(
            format!("f{p}lap"),
            format!(
                "auto res = -4.0 * {input}(i,j,k) + {input}(i+1,j,k) + {input}(i-1,j,k) \
                 + {input}(i,j+1,k) + {input}(i,j-1,k);"
            ),
        );
        stencils.insert(
            format!("f{p}fli"),
            format!("auto res = f{p}lap(i+1,j,k) - f{p}lap(i,j,k);"),
        );
        stencils.insert(
            format!("f{p}flj"),
            format!("auto res = f{p}lap(i,j+1,k) - f{p}lap(i,j,k);"),
        );
        stencils.insert(
            format!("f{p}out"),
            format!(
                "auto res = {input}(i,j,k) + mask(i,j,k) \
                 * (f{p}fli(i-1,j,k) - f{p}fli(i,j,k) + f{p}flj(i,j-1,k) - f{p}flj(i,j,k));"
            ),
        );
        outputs.push(format!("f{p}out"));
    }
    let sequence = (0..pipelines)
        .flat_map(|p| {
            ["lap", "fli", "flj", "out"]
                .iter()
                .map(move |stage| format!("f{p}{stage}"))
        })
        .collect();
    ProgramSpec {
        name: "bench".into(),
        stencils,
        outputs,
        constants: vec!["mask".into()],
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
        sequence: Some(sequence),
    }
}

fn bench_analyze(c: &mut Criterion) {
    let spec = diffusion_like(4);
    c.bench_function("analyze_16_stencils", |b| {
        b.iter(|| analyze(black_box(&spec)).unwrap())
    });
}

fn bench_encode(c: &mut Criterion) {
    let spec = diffusion_like(4);
    let deps = analyze(&spec).unwrap();
    let sequence = Sequence::derive(&spec, &deps, 0).unwrap();
    let utilization = Utilization::compute(&sequence, &deps);
    c.bench_function("encode_16_stencils", |b| {
        b.iter(|| encode(black_box(&spec), &deps, &sequence, &utilization).unwrap())
    });
}

fn bench_plan_analysis(c: &mut Criterion) {
    let spec = diffusion_like(4);
    let mut assignment = Assignment {
        objective: 1.0,
        ..Default::default()
    };
    for position in 0..16 {
        assignment
            .values
            .insert(format!("g%{position}"), (position / 4) as i64);
        assignment.values.insert(format!("n%x{position}"), 1);
        assignment.values.insert(format!("n%y{position}"), 1);
        assignment.values.insert(format!("n%z{position}"), 4);
    }
    let options = OptimizeOptions::default();
    c.bench_function("plan_analysis_4_groups", |b| {
        b.iter(|| {
            let mut state = OptimizeState::new(spec.clone());
            state.assignment = Some(assignment.clone());
            run_pipeline(&mut state, PassId::Schedule, &options).unwrap();
            black_box(state.build_plan(&options))
        })
    });
}

criterion_group!(benches, bench_analyze, bench_encode, bench_plan_analysis);
criterion_main!(benches);
