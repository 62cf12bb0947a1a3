// report.rs — Post-solve cost-model report
//
// Renders the solved variable assignment as a human-readable breakdown:
// group indexes, tile geometry with slack usage, cache footprints, and the
// per-stencil cache/memory body and peel times recomputed from the model.
// The recomputation mirrors the LP cost terms, so a mismatch between the
// reported total and the solver objective points at an encoding bug.
//
// Preconditions: `assignment` stems from an LP over the same sequence.
// Postconditions: returns a complete report string.
// Failure modes: none (missing variables report as 0).
// Side effects: none.

use std::fmt::Write;

use crate::deps::DependencyMap;
use crate::program::{Axis, ProgramSpec, SIZE_OF_VALUE};
use crate::sequence::Sequence;
use crate::solver::Assignment;

/// Render the full report for one solved program.
pub fn render_report(
    spec: &ProgramSpec,
    deps: &DependencyMap,
    sequence: &Sequence,
    assignment: &Assignment,
) -> String {
    let mut buf = String::new();
    let value = |name: String| assignment.get(&name).unwrap_or(0);
    let [x, y, z] = spec.domain.map(f64::from);
    let cores = i64::from(spec.machine.cores);

    // group indexes
    writeln!(buf, "group indexes:").unwrap();
    for (index, stencil) in sequence.names().iter().enumerate() {
        writeln!(buf, "{stencil}\t-> value {}", value(format!("g%{index}"))).unwrap();
    }

    // tile geometry
    let mut tile_counts: Vec<[i64; 3]> = Vec::with_capacity(sequence.len());
    for index in 0..sequence.len() {
        writeln!(buf, "tiles stencil {index}:").unwrap();
        let mut counts = [1i64; 3];
        for axis in Axis::ALL {
            let count = value(format!("n%{}{index}", axis.letter())).max(1);
            let extent = i64::from(spec.domain[axis.index()]);
            let size = (extent + count - 1) / count;
            counts[axis.index()] = count;
            writeln!(
                buf,
                "{}\t-> value {count}\t-> size {size}\t-> total {}",
                axis.letter(),
                size * count
            )
            .unwrap();
        }
        let total: i64 = counts.iter().product();
        let loops = value(format!("x%{index}"));
        writeln!(buf, "slack\t-> loops {loops}\t-> idle {}", loops * cores - total).unwrap();
        writeln!(buf, " ==> count {total}").unwrap();
        tile_counts.push(counts);
    }

    // cache footprints
    writeln!(buf, "stencil cache utilization:").unwrap();
    for (index, stencil) in sequence.names().iter().enumerate() {
        let count = value(format!("f%{index}"));
        let tile: i64 = Axis::ALL
            .iter()
            .map(|axis| {
                let extent = i64::from(spec.domain[axis.index()]);
                let n = tile_counts[index][axis.index()];
                (extent + n - 1) / n
            })
            .product();
        let footprint = count * tile * SIZE_OF_VALUE as i64 / 1024;
        writeln!(buf, "{stencil}\t-> count {count}\t-> footprint {footprint} kB").unwrap();
    }
    writeln!(
        buf,
        " ==> estimated execution time [ms] {}",
        assignment.objective
    )
    .unwrap();

    // cache model
    let mut cache_body = Vec::with_capacity(sequence.len());
    let mut cache_peel = Vec::with_capacity(sequence.len());
    writeln!(buf, "cache model:").unwrap();
    for (index, stencil) in sequence.names().iter().enumerate() {
        let fetches = f64::from(deps[stencil].fetches);
        let [nx, ny, nz] = tile_counts[index].map(|n| n as f64);
        let ex = value(format!("e%x{index}")) as f64;
        let ey = value(format!("e%y{index}")) as f64;
        let ez = value(format!("e%z{index}")) as f64;
        let body = (x * y * z + ex * y * z * nx + ey * x * z * ny + ez * x * y * nz)
            * fetches
            * spec.cache.body;
        let peel = (y * z + ey * z * ny + ez * y * nz) * nx * fetches * spec.cache.peel;
        writeln!(
            buf,
            "{stencil}\t-> interior {}\t-> boundary ({ex}, {ey}, {ez})\t-> peel {peel:.4}\t-> body {body:.4}",
            deps[stencil].fetches
        )
        .unwrap();
        cache_body.push(body);
        cache_peel.push(peel);
    }

    // memory model
    let mut memory_body = Vec::with_capacity(sequence.len());
    let mut memory_peel = Vec::with_capacity(sequence.len());
    writeln!(buf, "memory model:").unwrap();
    for (index, stencil) in sequence.names().iter().enumerate() {
        let reads = value(format!("r%{index}"));
        let writes = value(format!("w%{index}"));
        let base = value(format!("rw%{index}"));
        let streams = value(format!("s%{index}"));
        let [nx, ny, nz] = tile_counts[index];
        let [reads_x, reads_y, reads_z] =
            ['x', 'y', 'z'].map(|d| value(format!("r%n{d}{index}")));
        let [base_x, base_y, base_z] =
            ['x', 'y', 'z'].map(|d| value(format!("rw%n{d}{index}")));
        let [streams_x, streams_y, streams_z] =
            ['x', 'y', 'z'].map(|d| value(format!("s%n{d}{index}")));
        let body = spec.memory.rw_body
            * (x * y * z * base as f64
                + y * z * base_x as f64
                + x * z * base_y as f64
                + x * y * base_z as f64)
            + spec.memory.st_body
                * (x * y * z * streams as f64
                    + y * z * streams_x as f64
                    + x * z * streams_y as f64
                    + x * y * streams_z as f64);
        let peel = spec.memory.rw_peel
            * (y * z * base as f64 + y * base_z as f64 + z * base_y as f64)
            + spec.memory.st_peel
                * (y * z * streams as f64 + y * streams_z as f64 + z * streams_y as f64);
        writeln!(
            buf,
            "{stencil}\t-> reads {reads} ({}, {}, {})\t-> writes {writes}\t-> streams {streams} ({}, {}, {})\t-> read/write {base} ({}, {}, {})\t-> peel {peel:.4}\t-> body {body:.4}",
            reads_x / nx,
            reads_y / ny,
            reads_z / nz,
            streams_x / nx,
            streams_y / ny,
            streams_z / nz,
            base_x / nx,
            base_y / ny,
            base_z / nz,
        )
        .unwrap();
        memory_body.push(body);
        memory_peel.push(peel);
    }

    // model totals
    let peel: f64 = memory_peel
        .iter()
        .zip(&cache_peel)
        .map(|(m, c)| m.max(*c))
        .sum();
    let overlapped: f64 = memory_body
        .iter()
        .zip(&cache_body)
        .map(|(m, c)| m.max(*c))
        .sum();
    let serial: f64 = memory_body
        .iter()
        .zip(&cache_body)
        .map(|(m, c)| m + c)
        .sum();
    let body = spec.overlap * overlapped + (1.0 - spec.overlap) * serial;
    let overhead = 6.0 * (spec.memory.rw_body + spec.memory.st_body);
    let extra: f64 = tile_counts
        .iter()
        .map(|counts| counts.iter().product::<i64>() as f64 * overhead)
        .sum();
    writeln!(buf, " ==> peel time: {peel}").unwrap();
    writeln!(buf, " ==> body time: {body}").unwrap();
    writeln!(buf, " ==> extra time: {extra}").unwrap();
    writeln!(buf, " ==> total time: {}", peel + body + extra).unwrap();
    buf
}
