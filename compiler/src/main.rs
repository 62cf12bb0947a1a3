use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::Command;

use stopt::pass::PassId;
use stopt::pipeline::{run_pipeline, OptimizeOptions, OptimizeState, PipelineError};
use stopt::plan::Plan;
use stopt::program::{Constraints, GroupPin, ProgramSpec};
use stopt::report::render_report;
use stopt::results::{parse_log, write_table};
use stopt::solver::Assignment;

const EXIT_OK: i32 = 0;
const EXIT_CONFIG_ERROR: i32 = 1;
const EXIT_USAGE_ERROR: i32 = 2;
const EXIT_SYSTEM_ERROR: i32 = 3;

#[derive(Parser, Debug)]
#[command(
    name = "stopt",
    version,
    about = "Stencil Tuning Optimizer — compiles 3D stencil program DAGs to tiled execution plans"
)]
struct Cli {
    /// Program description JSON file
    source: Option<PathBuf>,

    /// Run the MILP optimizer and write the tiled plan
    #[arg(short = 'o', long)]
    optimize: bool,

    /// Solve the free, fully-fused, and fully-split variants and compare
    #[arg(short = 'e', long)]
    explore: bool,

    /// Enumerate power-of-two tiling variants without the solver
    #[arg(short = 'a', long)]
    auto: bool,

    /// Run dataflow, boundary, and schedule analysis; write the full plan
    #[arg(short = 'g', long)]
    generate: bool,

    /// Run make in the working folder
    #[arg(short = 'b', long)]
    build: bool,

    /// Parse a benchmark run log into a CSV table
    #[arg(short = 'p', long)]
    parse: Option<PathBuf>,

    /// Working folder for LP, solution, and plan files
    #[arg(short = 'f', long, default_value = ".")]
    folder: PathBuf,

    /// Seed for the random stencil sequencing
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Solver command
    #[arg(long, default_value = "cplex")]
    solver: String,

    /// Print per-pass timing
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    if let Some(log_path) = &cli.parse {
        if let Err(code) = parse_results(log_path) {
            std::process::exit(code);
        }
    }

    let needs_source = cli.optimize || cli.explore || cli.auto || cli.generate;
    let spec = if needs_source {
        match &cli.source {
            Some(path) => Some(load_spec(path)),
            None => {
                eprintln!("error: a program description is required");
                std::process::exit(EXIT_USAGE_ERROR);
            }
        }
    } else {
        None
    };

    let options = OptimizeOptions {
        seed: cli.seed,
        solver: cli.solver.clone(),
        folder: cli.folder.clone(),
        verbose: cli.verbose,
    };

    let mut state = spec.map(OptimizeState::new);

    if cli.optimize {
        optimize(state.as_mut().unwrap(), &options);
    }
    if cli.explore {
        explore(state.as_ref().unwrap().spec.clone(), &options);
    }
    if cli.auto {
        auto_variants(state.as_ref().unwrap().spec.clone(), &options);
    }
    if cli.generate {
        generate(state.as_mut().unwrap(), &options);
    }
    if cli.build {
        build(&cli.folder);
    }

    std::process::exit(EXIT_OK);
}

fn load_spec(path: &Path) -> ProgramSpec {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("error: {}: {e}", path.display());
            std::process::exit(EXIT_SYSTEM_ERROR);
        }
    };
    match ProgramSpec::from_json(&text) {
        Ok(spec) => spec,
        Err(e) => {
            eprintln!("error: {}: {e}", path.display());
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    }
}

fn exit_on(err: PipelineError) -> ! {
    let code = match &err {
        PipelineError::Io(_) => EXIT_SYSTEM_ERROR,
        _ => EXIT_CONFIG_ERROR,
    };
    eprintln!("error: {err}");
    std::process::exit(code);
}

/// Run the optimizer through plan reconstruction and report the solution.
fn optimize(state: &mut OptimizeState, options: &OptimizeOptions) {
    if let Err(err) = run_pipeline(state, PassId::Reconstruct, options) {
        exit_on(err);
    }
    let Some(assignment) = &state.assignment else {
        eprintln!(
            "stopt: solver produced no solution, leaving '{}' untiled",
            state.spec.name
        );
        return;
    };
    let report = render_report(
        &state.spec,
        state.deps.as_ref().unwrap(),
        state.sequence.as_ref().unwrap(),
        assignment,
    );
    print!("{report}");
    if let Some(plan) = state.build_plan(options) {
        write_plan(&plan, &state.spec.name, &options.folder);
    }
}

/// Run dataflow, boundary, and schedule analysis; write the complete plan.
fn generate(state: &mut OptimizeState, options: &OptimizeOptions) {
    if state.tiling.is_none() {
        // resume from a previously written plan
        let path = plan_path(&state.spec.name, &options.folder);
        let plan = match read_plan(&path) {
            Ok(plan) => plan,
            Err(e) => {
                eprintln!("error: {}: {e}", path.display());
                std::process::exit(EXIT_SYSTEM_ERROR);
            }
        };
        let mut tiling = plan.tiling;
        // strip the dummy group from an already-analyzed plan
        if tiling
            .groups
            .first()
            .is_some_and(|group| group.tiles.is_empty())
        {
            tiling.groups.remove(0);
        }
        state.tiling = Some(tiling);
        state.assignment = Some(Assignment {
            objective: plan.objective.unwrap_or(0.0),
            ..Default::default()
        });
    }
    if let Err(err) = run_pipeline(state, PassId::Schedule, options) {
        exit_on(err);
    }
    if let Some(plan) = state.build_plan(options) {
        write_plan(&plan, &state.spec.name, &options.folder);
        for event in &plan.schedule {
            println!("{event}");
        }
    }
}

/// Solve the free problem plus the fully-fused and fully-split pins.
fn explore(spec: ProgramSpec, options: &OptimizeOptions) {
    // derive the sequence once so the pinned variants agree on positions
    let mut base = OptimizeState::new(spec.clone());
    if let Err(err) = run_pipeline(&mut base, PassId::Sequence, options) {
        exit_on(err);
    }
    let order: Vec<String> = base.sequence.as_ref().unwrap().names().to_vec();

    let fused: Vec<GroupPin> = order
        .iter()
        .map(|stencil| GroupPin {
            stencil: stencil.clone(),
            group: 0,
        })
        .collect();
    let split: Vec<GroupPin> = order
        .iter()
        .enumerate()
        .map(|(index, stencil)| GroupPin {
            stencil: stencil.clone(),
            group: index as u32,
        })
        .collect();

    let variants: [(&str, Option<Vec<GroupPin>>); 3] =
        [("free", None), ("fused", Some(fused)), ("split", Some(split))];
    for (label, pins) in variants {
        let mut variant = spec.clone();
        variant.name = format!("{}-{label}", spec.name);
        variant.sequence = Some(order.clone());
        if let Some(groups) = pins {
            variant.constraints = Constraints {
                groups,
                tiling: spec.constraints.tiling.clone(),
            };
        }
        let mut state = OptimizeState::new(variant);
        if let Err(err) = run_pipeline(&mut state, PassId::Reconstruct, options) {
            exit_on(err);
        }
        match &state.assignment {
            Some(assignment) => println!(
                "{label}\t-> objective {}\t-> groups {}",
                assignment.objective,
                state.tiling.as_ref().map_or(0, |t| t.groups.len())
            ),
            None => println!("{label}\t-> no solution"),
        }
    }
}

/// Enumerate single-group power-of-two tilings and write one plan each.
fn auto_variants(spec: ProgramSpec, options: &OptimizeOptions) {
    let mut base = OptimizeState::new(spec.clone());
    if let Err(err) = run_pipeline(&mut base, PassId::Sequence, options) {
        exit_on(err);
    }
    let order: Vec<String> = base.sequence.as_ref().unwrap().names().to_vec();
    let cores = spec.machine.cores;

    for nx in powers_up_to(spec.domain[0]) {
        for ny in powers_up_to(spec.domain[1]) {
            for nz in powers_up_to(spec.domain[2]) {
                if nx * ny * nz < cores {
                    continue;
                }
                let mut assignment = Assignment::default();
                for position in 0..order.len() {
                    assignment.values.insert(format!("g%{position}"), 0);
                    assignment.values.insert(format!("n%x{position}"), i64::from(nx));
                    assignment.values.insert(format!("n%y{position}"), i64::from(ny));
                    assignment.values.insert(format!("n%z{position}"), i64::from(nz));
                }
                let mut variant = spec.clone();
                variant.name = format!("{}-{nx}-{ny}-{nz}", spec.name);
                variant.sequence = Some(order.clone());
                let mut state = OptimizeState::new(variant);
                state.assignment = Some(assignment);
                if let Err(err) = run_pipeline(&mut state, PassId::Schedule, options) {
                    exit_on(err);
                }
                if let Some(plan) = state.build_plan(options) {
                    write_plan(&plan, &state.spec.name, &options.folder);
                }
            }
        }
    }
}

fn powers_up_to(extent: u32) -> impl Iterator<Item = u32> {
    (0..32).map(|shift| 1u32 << shift).take_while(move |&n| n <= extent)
}

fn build(folder: &Path) {
    match Command::new("make").current_dir(folder).status() {
        Ok(status) if status.success() => {}
        Ok(status) => {
            eprintln!("error: make exited with {status}");
            std::process::exit(EXIT_SYSTEM_ERROR);
        }
        Err(e) => {
            eprintln!("error: make: {e}");
            std::process::exit(EXIT_SYSTEM_ERROR);
        }
    }
}

fn parse_results(log_path: &Path) -> Result<(), i32> {
    let text = std::fs::read_to_string(log_path).map_err(|e| {
        eprintln!("error: {}: {e}", log_path.display());
        EXIT_SYSTEM_ERROR
    })?;
    let rows = parse_log(&text);
    let table = log_path.with_extension("csv");
    write_table(&rows, &table).map_err(|e| {
        eprintln!("error: {}: {e}", table.display());
        EXIT_SYSTEM_ERROR
    })?;
    println!("-> writing results to {}", table.display());
    Ok(())
}

fn plan_path(name: &str, folder: &Path) -> PathBuf {
    folder.join(format!("{name}.plan.json"))
}

fn read_plan(path: &Path) -> Result<Plan, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn write_plan(plan: &Plan, name: &str, folder: &Path) {
    let path = plan_path(name, folder);
    let json = match serde_json::to_string_pretty(plan) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(EXIT_SYSTEM_ERROR);
        }
    };
    if let Err(e) = std::fs::write(&path, json) {
        eprintln!("error: {}: {e}", path.display());
        std::process::exit(EXIT_SYSTEM_ERROR);
    }
    if let Some(objective) = plan.objective {
        println!(
            "-> plan {} with estimated execution time [ms] {objective}",
            path.display()
        );
    } else {
        println!("-> plan {}", path.display());
    }
}
