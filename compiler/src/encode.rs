// encode.rs — MILP encoding of the fusion and tiling search space
//
// Compiles (sequence, machine, halo, constraints) into one linear program in
// the classic LP text format: group assignment as a monotone integer chain
// with pairwise difference flags, per-axis tile counts as binary expansions,
// integer products through the big-M digit decomposition, boundary extents
// propagated along dependency edges with halo-budget escape terms, and a
// per-stencil time model combining memory and cache body/peel costs.
//
// Emission is canonical: negative coefficients render with a single sign and
// zero coefficients are dropped, so the output never needs textual cleanup.
//
// Preconditions: `sequence` verified; `utilization` computed over it.
// Postconditions: returns a complete LP (Minimize/Subject To/General/Binary/End).
// Failure modes: ConfigError::UnconsumedStencil for a stencil with no
//                consumer and no output role.
// Side effects: none.

use std::fmt::Write;

use crate::deps::DependencyMap;
use crate::diag::ConfigError;
use crate::footprint::Utilization;
use crate::program::{Axis, ProgramSpec, SIZE_OF_VALUE};
use crate::sequence::Sequence;

/// Encode the complete linear program for one stencil sequence.
pub fn encode(
    spec: &ProgramSpec,
    deps: &DependencyMap,
    sequence: &Sequence,
    utilization: &Utilization,
) -> Result<String, ConfigError> {
    let mut enc = Encoder {
        spec,
        deps,
        sequence,
        utilization,
        buf: String::new(),
    };
    enc.objective();
    enc.buf.push_str("Subject To\n");
    enc.groups();
    enc.memory()?;
    enc.tiles();
    enc.boundaries();
    enc.footprint();
    enc.planes();
    enc.costs();
    enc.pins();
    enc.general();
    enc.binary();
    enc.buf.push_str("End\n");
    Ok(enc.buf)
}

// ── Number and term formatting ─────────────────────────────────────────────

/// Integral values print without a decimal point; everything else uses the
/// shortest round-tripping decimal form.
fn num(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// One constraint (or objective) line under construction.
struct Line<'b> {
    buf: &'b mut String,
    any: bool,
}

impl Line<'_> {
    /// Append `coef · var` with canonical sign; zero coefficients vanish.
    fn term(mut self, coef: f64, var: impl AsRef<str>) -> Self {
        if coef == 0.0 {
            return self;
        }
        match (self.any, coef < 0.0) {
            (false, false) => {}
            (false, true) => self.buf.push_str("- "),
            (true, false) => self.buf.push_str(" + "),
            (true, true) => self.buf.push_str(" - "),
        }
        let magnitude = coef.abs();
        if magnitude != 1.0 {
            self.buf.push_str(&num(magnitude));
            self.buf.push(' ');
        }
        self.buf.push_str(var.as_ref());
        self.any = true;
        self
    }

    /// Close the line as a constraint `lhs op rhs`.
    fn cmp(self, op: &str, rhs: f64) {
        let _ = writeln!(self.buf, " {} {}", op, num(rhs));
    }

    /// Close the line without a relation (objective).
    fn end(self) {
        self.buf.push('\n');
    }
}

// ── Encoder ────────────────────────────────────────────────────────────────

struct Encoder<'a> {
    spec: &'a ProgramSpec,
    deps: &'a DependencyMap,
    sequence: &'a Sequence,
    utilization: &'a Utilization,
    buf: String,
}

impl Encoder<'_> {
    fn line(&mut self) -> Line<'_> {
        Line {
            buf: &mut self.buf,
            any: false,
        }
    }

    fn comment(&mut self, text: &str) {
        let _ = writeln!(self.buf, "\\ {text}");
    }

    /// Space-separated variable list line; empty lists emit nothing.
    fn list(&mut self, vars: impl Iterator<Item = String>) {
        let joined = vars.collect::<Vec<_>>().join(" ");
        if !joined.is_empty() {
            self.buf.push_str(&joined);
            self.buf.push('\n');
        }
    }

    fn len(&self) -> usize {
        self.sequence.len()
    }

    fn extent(&self, axis: Axis) -> f64 {
        f64::from(self.spec.domain[axis.index()])
    }

    fn halo(&self, axis: Axis) -> f64 {
        f64::from(self.spec.halo[axis.index()])
    }

    fn digits(&self, axis: Axis) -> u32 {
        self.spec.digits(axis)
    }

    /// Referenced array names of the stencil at `index`, in stable order.
    fn arrays(&self, index: usize) -> impl Iterator<Item = &str> {
        self.deps[self.sequence.at(index)]
            .offsets
            .keys()
            .map(String::as_str)
    }

    fn array_count(&self, index: usize) -> f64 {
        self.deps[self.sequence.at(index)].offsets.len() as f64
    }

    // ── Shared big-M product linearization ────────────────────────────────
    //
    // Encodes `res = val · mul` where `mul = Σ 2^b mul_b` with binary digits
    // and `0 ≤ val ≤ limit`:
    //   res_b − limit·mul_b ≤ 0
    //   res_b − val ≤ 0
    //   res_b − val − limit·mul_b ≥ −limit
    //   res − Σ 2^b res_b = 0

    fn product(
        &mut self,
        res: &str,
        val: &str,
        mul: &str,
        digits: u32,
        limit: f64,
    ) {
        for digit in 0..digits {
            let part = format!("{res}_{digit}");
            let mul_digit = format!("{mul}_{digit}");
            self.line().term(1.0, &part).term(-limit, &mul_digit).cmp("<=", 0.0);
            self.line().term(1.0, &part).term(-1.0, val).cmp("<=", 0.0);
            self.line()
                .term(1.0, &part)
                .term(-1.0, val)
                .term(-limit, &mul_digit)
                .cmp(">=", -limit);
        }
        self.expansion_sum(res, digits);
    }

    /// `total = Σ 2^b total_b` over the binary digit variables.
    fn expansion_sum(&mut self, total: &str, digits: u32) {
        let mut line = self.line().term(1.0, total);
        for digit in 0..digits {
            line = line.term(-f64::from(1u32 << digit), format!("{total}_{digit}"));
        }
        line.cmp("=", 0.0);
    }

    // ── Objective ─────────────────────────────────────────────────────────

    /// Minimize Σ tᵢ + k·Σ n_xyzᵢ with a fixed per-tile launch overhead k.
    fn objective(&mut self) {
        self.buf.push_str("Minimize\n");
        let overhead = 6.0 * (self.spec.memory.rw_body + self.spec.memory.st_body);
        let len = self.len();
        let mut line = self.line();
        for index in 0..len {
            line = line.term(1.0, format!("t%{index}"));
        }
        for index in 0..len {
            line = line.term(overhead, format!("n%xyz{index}"));
        }
        line.end();
    }

    // ── Group indexes ─────────────────────────────────────────────────────

    fn groups(&mut self) {
        self.comment("constrain the group indexes");
        self.line().term(1.0, "g%0").cmp("=", 0.0);
        for index in 1..self.len() {
            self.line()
                .term(1.0, format!("g%{index}"))
                .term(-1.0, format!("g%{}", index - 1))
                .cmp("<=", 1.0);
            self.line()
                .term(1.0, format!("g%{index}"))
                .term(-1.0, format!("g%{}", index - 1))
                .cmp(">=", 0.0);
        }
        // flags forced to one whenever the group indexes differ
        let limit = self.len() as f64;
        for high in 0..self.len() {
            for low in 0..high {
                self.line()
                    .term(-limit, format!("g%{low}#{high}"))
                    .term(1.0, format!("g%{high}"))
                    .term(-1.0, format!("g%{low}"))
                    .cmp("<=", 0.0);
            }
        }
    }

    // ── Memory operation counting ─────────────────────────────────────────

    fn memory(&mut self) -> Result<(), ConfigError> {
        self.comment("compute the memory cost");
        for index in 0..self.len() {
            let stencil = self.sequence.at(index).to_string();
            // loads: one binary per input, forced when the last touch of the
            // array (as producer or consumer) was in another group
            let arrays: Vec<String> = self.arrays(index).map(str::to_string).collect();
            for name in &arrays {
                let last = (0..index).rev().find(|&pos| {
                    let earlier = self.sequence.at(pos);
                    earlier == name || self.deps[earlier].offsets.contains_key(name)
                });
                match last {
                    Some(last) => self
                        .line()
                        .term(1.0, format!("r%{index}_{name}"))
                        .term(-1.0, format!("g%{last}#{index}"))
                        .cmp(">=", 0.0),
                    None => self
                        .line()
                        .term(1.0, format!("r%{index}_{name}"))
                        .cmp("=", 1.0),
                }
            }
            let mut sum = self.line().term(1.0, format!("r%{index}"));
            for name in &arrays {
                sum = sum.term(-1.0, format!("r%{index}_{name}"));
            }
            sum.cmp("=", 0.0);
            // stores: outputs always hit memory, everything else only when
            // the last consumer sits in another group
            if self.spec.outputs.contains(&stencil) {
                self.line().term(1.0, format!("w%{index}")).cmp("=", 1.0);
            } else {
                let last = (index + 1..self.len())
                    .rev()
                    .find(|&pos| {
                        self.deps[self.sequence.at(pos)]
                            .offsets
                            .contains_key(&stencil)
                    })
                    .ok_or(ConfigError::UnconsumedStencil {
                        stencil: stencil.clone(),
                    })?;
                self.line()
                    .term(1.0, format!("w%{index}"))
                    .term(-1.0, format!("g%{index}#{last}"))
                    .cmp(">=", 0.0);
            }
            let limit = arrays.len() as f64 + 1.0;
            self.line()
                .term(limit, format!("rw%{index}"))
                .term(-1.0, format!("r%{index}"))
                .term(-1.0, format!("w%{index}"))
                .cmp(">=", 0.0);
            self.line()
                .term(1.0, format!("s%{index}"))
                .term(-1.0, format!("r%{index}"))
                .term(-1.0, format!("w%{index}"))
                .cmp(">=", 0.0);
        }
        Ok(())
    }

    // ── Tile counts, sizes, and core utilization ──────────────────────────

    fn tiles(&mut self) {
        self.comment("constrain the tile count per dimension");
        for index in 0..self.len() {
            for axis in Axis::ALL {
                let d = axis.letter();
                let digits = self.digits(axis);
                self.expansion_sum(&format!("n%{d}{index}"), digits);
            }
        }
        for index in 0..self.len() {
            for axis in Axis::ALL {
                let d = axis.letter();
                let extent = self.extent(axis);
                self.line().term(1.0, format!("n%{d}{index}")).cmp(">=", 1.0);
                self.line()
                    .term(1.0, format!("n%{d}{index}"))
                    .cmp("<=", extent);
            }
        }

        self.comment("compute the total tile count");
        for index in 0..self.len() {
            let digits_y = self.digits(Axis::Y);
            let digits_z = self.digits(Axis::Z);
            let limit_x = self.extent(Axis::X);
            let limit_xy = self.extent(Axis::X) * self.extent(Axis::Y);
            self.product(
                &format!("n%xy{index}"),
                &format!("n%x{index}"),
                &format!("n%y{index}"),
                digits_y,
                limit_x,
            );
            self.product(
                &format!("n%xyz{index}"),
                &format!("n%xy{index}"),
                &format!("n%z{index}"),
                digits_z,
                limit_xy,
            );
        }

        self.comment("compute the domain sizes as the product of tile count and size");
        for index in 0..self.len() {
            for axis in Axis::ALL {
                let d = axis.letter();
                let digits = self.digits(axis);
                let limit = self.extent(axis);
                self.product(
                    &format!("d%{d}{index}"),
                    &format!("y%{d}{index}"),
                    &format!("n%{d}{index}"),
                    digits,
                    limit,
                );
            }
        }

        self.comment("constrain the domain size using the size slack");
        let scale = 1.0 - self.spec.slack.size;
        for index in 0..self.len() {
            for axis in Axis::ALL {
                let d = axis.letter();
                let extent = self.extent(axis);
                self.line()
                    .term(1.0, format!("d%{d}{index}"))
                    .cmp(">=", extent);
                self.line()
                    .term(scale, format!("d%{d}{index}"))
                    .cmp("<=", extent);
            }
        }

        self.comment("constrain the tile count using the cores slack");
        let cores = f64::from(self.spec.machine.cores);
        for index in 0..self.len() {
            self.line()
                .term(1.0, format!("n%xyz{index}"))
                .cmp(">=", cores);
        }
        for index in 0..self.len() {
            let minimum = (1.0 - self.spec.slack.cores) * cores;
            self.line()
                .term(minimum, format!("x%{index}"))
                .term(-1.0, format!("n%xyz{index}"))
                .cmp("<=", 0.0);
            self.line()
                .term(cores, format!("x%{index}"))
                .term(-1.0, format!("n%xyz{index}"))
                .cmp(">=", 0.0);
        }

        self.comment("enforce tile count equality within a group");
        for high in 1..self.len() {
            let low = high - 1;
            for axis in Axis::ALL {
                let d = axis.letter();
                for digit in 0..self.digits(axis) {
                    self.line()
                        .term(1.0, format!("n%{d}{high}_{digit}"))
                        .term(-1.0, format!("n%{d}{low}_{digit}"))
                        .term(1.0, format!("g%{high}"))
                        .term(-1.0, format!("g%{low}"))
                        .cmp(">=", 0.0);
                    self.line()
                        .term(1.0, format!("n%{d}{high}_{digit}"))
                        .term(-1.0, format!("n%{d}{low}_{digit}"))
                        .term(1.0, format!("g%{low}"))
                        .term(-1.0, format!("g%{high}"))
                        .cmp("<=", 0.0);
                }
            }
        }
    }

    // ── Evaluation and access boundaries ──────────────────────────────────

    fn boundaries(&mut self) {
        // evaluation extents propagate along edges between stencils of the
        // sequence; the halo-budget terms release them across group borders
        self.comment("compute the evaluation domains");
        for consumer in 0..self.len() {
            let arrays: Vec<String> = self.arrays(consumer).map(str::to_string).collect();
            for name in &arrays {
                let Some(producer) = self.sequence.position(name) else {
                    continue;
                };
                let bounds = self.deps[self.sequence.at(consumer)].bounds[name];
                for (axis, (lo, hi)) in Axis::ALL.iter().zip(bounds.axes()) {
                    let halo = self.halo(*axis);
                    for (dir, offset) in [('m', lo), ('p', hi)] {
                        let d = axis.letter();
                        self.line()
                            .term(1.0, format!("e%{d}{dir}{producer}"))
                            .term(-1.0, format!("e%{d}{dir}{consumer}"))
                            .term(halo, format!("g%{consumer}"))
                            .term(-halo, format!("g%{producer}"))
                            .cmp(">=", f64::from(offset.abs()));
                    }
                }
            }
        }
        for index in 0..self.len() {
            for axis in Axis::ALL {
                let d = axis.letter();
                self.line()
                    .term(1.0, format!("e%{d}{index}"))
                    .term(-1.0, format!("e%{d}m{index}"))
                    .term(-1.0, format!("e%{d}p{index}"))
                    .cmp("=", 0.0);
            }
        }

        self.comment("compute the access boundaries");
        for index in 0..self.len() {
            let arrays: Vec<String> = self.arrays(index).map(str::to_string).collect();
            for name in &arrays {
                let bounds = self.deps[self.sequence.at(index)].bounds[name];
                let producer = self.sequence.position(name);
                for (axis, (lo, hi)) in Axis::ALL.iter().zip(bounds.axes()) {
                    let halo = self.halo(*axis);
                    for (dir, offset) in [('m', lo), ('p', hi)] {
                        let d = axis.letter();
                        let line = self
                            .line()
                            .term(1.0, format!("a%{d}{dir}{index}_{name}"))
                            .term(-1.0, format!("e%{d}{dir}{index}"));
                        match producer {
                            Some(pos) => line
                                .term(-halo, format!("g%{pos}#{index}"))
                                .cmp(">=", f64::from(offset.abs()) - halo),
                            None => line.cmp(">=", f64::from(offset.abs())),
                        }
                    }
                }
            }
        }

        // boundary reads refill the cache either fully (group border) or by
        // the growth over the last same-group consumer of the array
        self.comment("compute the boundary accesses");
        for index in 0..self.len() {
            let arrays: Vec<String> = self.arrays(index).map(str::to_string).collect();
            for name in &arrays {
                let last = (0..index).rev().find(|&pos| {
                    self.deps[self.sequence.at(pos)].offsets.contains_key(name)
                });
                for axis in Axis::ALL {
                    let d = axis.letter();
                    let halo = self.halo(axis);
                    for dir in ['m', 'p'] {
                        let read = format!("r%{d}{dir}{index}_{name}");
                        let access = format!("a%{d}{dir}{index}_{name}");
                        match last {
                            None => {
                                self.line()
                                    .term(1.0, &read)
                                    .term(-1.0, &access)
                                    .cmp("=", 0.0);
                            }
                            Some(last) => {
                                let previous = format!("a%{d}{dir}{last}_{name}");
                                self.line()
                                    .term(1.0, &read)
                                    .term(-1.0, &access)
                                    .term(-halo, format!("g%{last}#{index}"))
                                    .cmp(">=", -halo);
                                self.line()
                                    .term(1.0, &access)
                                    .term(-1.0, &previous)
                                    .term(halo, format!("g%{index}"))
                                    .term(-halo, format!("g%{last}"))
                                    .cmp(">=", 0.0);
                                self.line()
                                    .term(1.0, &read)
                                    .term(-1.0, &access)
                                    .term(1.0, &previous)
                                    .term(halo, format!("g%{index}"))
                                    .term(-halo, format!("g%{last}"))
                                    .cmp(">=", 0.0);
                            }
                        }
                    }
                }
            }
        }
        for index in 0..self.len() {
            let arrays: Vec<String> = self.arrays(index).map(str::to_string).collect();
            for axis in Axis::ALL {
                let d = axis.letter();
                let mut sum = self.line().term(1.0, format!("r%{d}{index}"));
                for dir in ['m', 'p'] {
                    for name in &arrays {
                        sum = sum.term(-1.0, format!("r%{d}{dir}{index}_{name}"));
                    }
                }
                sum.cmp("=", 0.0);
            }
        }
    }

    // ── Cache footprint ───────────────────────────────────────────────────

    fn footprint(&mut self) {
        self.comment("compute the cache footprint of the individual stencils");
        for high in 0..self.len() {
            let live = f64::from(self.utilization.window(high, high));
            self.line()
                .term(1.0, format!("f%{high}"))
                .cmp(">=", live);
            for low in 0..high {
                let live = f64::from(self.utilization.window(high, low));
                self.line()
                    .term(1.0, format!("f%{high}"))
                    .term(live, format!("g%{high}"))
                    .term(-live, format!("g%{low}"))
                    .cmp(">=", live);
            }
        }
        self.comment("constrain the cache footprint");
        let values = (self.spec.machine.capacity / SIZE_OF_VALUE) as f64;
        let volume =
            self.extent(Axis::X) * self.extent(Axis::Y) * self.extent(Axis::Z);
        for index in 0..self.len() {
            self.line()
                .term(values, format!("n%xyz{index}"))
                .term(-volume, format!("f%{index}"))
                .cmp(">=", 0.0);
        }
    }

    // ── Boundary planes ───────────────────────────────────────────────────

    fn planes(&mut self) {
        self.comment("multiply the boundary cost by the number of planes");
        for index in 0..self.len() {
            let streams = self.array_count(index);
            for axis in Axis::ALL {
                let d = axis.letter();
                let digits = self.digits(axis);
                let limit = 2.0 * self.halo(axis) * streams;
                self.product(
                    &format!("r%n{d}{index}"),
                    &format!("r%{d}{index}"),
                    &format!("n%{d}{index}"),
                    digits,
                    limit,
                );
            }
        }
        for index in 0..self.len() {
            for axis in Axis::ALL {
                let d = axis.letter();
                let digits = self.digits(axis);
                let limit = 2.0 * self.halo(axis);
                self.product(
                    &format!("e%n{d}{index}"),
                    &format!("e%{d}{index}"),
                    &format!("n%{d}{index}"),
                    digits,
                    limit,
                );
            }
        }
        // the rw/write/stream plane counts copy the flag scaled to the full
        // boundary width when the stencil touches memory at all
        for index in 0..self.len() {
            for axis in Axis::ALL {
                let d = axis.letter();
                let width = 2.0 * self.halo(axis) * self.extent(axis);
                self.line()
                    .term(1.0, format!("rw%n{d}{index}"))
                    .term(-1.0, format!("e%n{d}{index}"))
                    .term(-width, format!("rw%{index}"))
                    .cmp(">=", -width);
            }
        }
        for index in 0..self.len() {
            for axis in Axis::ALL {
                let d = axis.letter();
                let width = 2.0 * self.halo(axis) * self.extent(axis);
                self.line()
                    .term(1.0, format!("w%n{d}{index}"))
                    .term(-1.0, format!("e%n{d}{index}"))
                    .term(-width, format!("w%{index}"))
                    .cmp(">=", -width);
            }
        }
        for index in 0..self.len() {
            for axis in Axis::ALL {
                let d = axis.letter();
                self.line()
                    .term(1.0, format!("s%n{d}{index}"))
                    .term(-1.0, format!("w%n{d}{index}"))
                    .term(-1.0, format!("r%n{d}{index}"))
                    .cmp(">=", 0.0);
            }
        }
    }

    // ── Cost model ────────────────────────────────────────────────────────

    fn costs(&mut self) {
        self.comment("evaluate the cost model");
        let [x, y, z] = [
            self.extent(Axis::X),
            self.extent(Axis::Y),
            self.extent(Axis::Z),
        ];
        let [hy, hz] = [self.halo(Axis::Y), self.halo(Axis::Z)];
        let memory = self.spec.memory;
        let overlap = self.spec.overlap;
        for index in 0..self.len() {
            let fetches = f64::from(self.deps[self.sequence.at(index)].fetches);
            let streams = self.array_count(index);

            // memory body time
            self.line()
                .term(1.0, format!("b%m{index}"))
                .term(-memory.rw_body * x * y * z, format!("rw%{index}"))
                .term(-memory.rw_body * y * z, format!("rw%nx{index}"))
                .term(-memory.rw_body * x * z, format!("rw%ny{index}"))
                .term(-memory.rw_body * x * y, format!("rw%nz{index}"))
                .term(-memory.st_body * x * y * z, format!("s%{index}"))
                .term(-memory.st_body * y * z, format!("s%nx{index}"))
                .term(-memory.st_body * x * z, format!("s%ny{index}"))
                .term(-memory.st_body * x * y, format!("s%nz{index}"))
                .cmp(">=", 0.0);

            // cache body time
            let body = fetches * self.spec.cache.body;
            self.line()
                .term(1.0, format!("b%c{index}"))
                .term(-body * y * z, format!("e%nx{index}"))
                .term(-body * x * z, format!("e%ny{index}"))
                .term(-body * x * y, format!("e%nz{index}"))
                .cmp(">=", body * x * y * z);

            // body time is the max of the memory and cache bounds
            self.line()
                .term(1.0, format!("b%{index}"))
                .term(-1.0, format!("b%m{index}"))
                .cmp(">=", 0.0);
            self.line()
                .term(1.0, format!("b%{index}"))
                .term(-1.0, format!("b%c{index}"))
                .cmp(">=", 0.0);

            // memory peel time
            self.line()
                .term(1.0, format!("p%{index}"))
                .term(-memory.rw_peel * y * z, format!("rw%{index}"))
                .term(-memory.rw_peel * y, format!("rw%nz{index}"))
                .term(-memory.rw_peel * z, format!("rw%ny{index}"))
                .term(-memory.st_peel * y * z, format!("s%{index}"))
                .term(-memory.st_peel * y, format!("s%nz{index}"))
                .term(-memory.st_peel * z, format!("s%ny{index}"))
                .cmp(">=", 0.0);
            let memory_limit = memory.rw_peel * y * z
                + memory.rw_peel * y * (2.0 * hz * z)
                + memory.rw_peel * z * (2.0 * hy * y)
                + memory.st_peel * y * z * streams
                + memory.st_peel * y * streams * (2.0 * hz * z)
                + memory.st_peel * z * streams * (2.0 * hy * y);

            // cache peel time
            let peel = fetches * self.spec.cache.peel;
            self.line()
                .term(1.0, format!("p%{index}"))
                .term(-peel * y, format!("e%nz{index}"))
                .term(-peel * z, format!("e%ny{index}"))
                .cmp(">=", peel * y * z);
            let cache_limit =
                peel * y * z + peel * y * (2.0 * hz * z) + peel * z * (2.0 * hy * y);

            // the peel runs once per x tile
            let limit = memory_limit.max(cache_limit);
            let digits = self.digits(Axis::X);
            self.product(
                &format!("p%n{index}"),
                &format!("p%{index}"),
                &format!("n%x{index}"),
                digits,
                limit,
            );

            // total time under memory/cache overlap
            self.line()
                .term(1.0, format!("t%{index}"))
                .term(-overlap, format!("b%{index}"))
                .term(-(1.0 - overlap), format!("b%m{index}"))
                .term(-(1.0 - overlap), format!("b%c{index}"))
                .term(-1.0, format!("p%n{index}"))
                .cmp("=", 0.0);
        }
    }

    // ── External search constraints ───────────────────────────────────────

    fn pins(&mut self) {
        if self.spec.constraints.is_empty() {
            return;
        }
        self.comment("apply the external search constraints");
        let pins = self.spec.constraints.clone();
        for pin in &pins.groups {
            if let Some(index) = self.sequence.position(&pin.stencil) {
                self.line()
                    .term(1.0, format!("g%{index}"))
                    .cmp("=", f64::from(pin.group));
            }
        }
        for bound in &pins.tiling {
            let Some(index) = self.sequence.position(&bound.stencil) else {
                continue;
            };
            let d = bound.axis.letter();
            if bound.value > 0 {
                self.line()
                    .term(1.0, format!("n%{d}{index}"))
                    .cmp(">=", (bound.value + 1) as f64);
            } else {
                self.line()
                    .term(1.0, format!("n%{d}{index}"))
                    .cmp("<=", (-bound.value - 1) as f64);
            }
        }
    }

    // ── Variable declarations ─────────────────────────────────────────────

    fn general(&mut self) {
        self.buf.push_str("General\n");
        let len = self.len();
        self.list((0..len).map(|i| format!("g%{i}")));
        for d in ['x', 'y', 'z'] {
            for dir in ['m', 'p'] {
                self.list((0..len).map(|i| format!("e%{d}{dir}{i}")));
            }
        }
        for index in 0..len {
            let arrays: Vec<String> = self.arrays(index).map(str::to_string).collect();
            for d in ['x', 'y', 'z'] {
                for dir in ['m', 'p'] {
                    self.list(arrays.iter().map(|name| format!("a%{d}{dir}{index}_{name}")));
                }
            }
        }
        for d in ['x', 'y', 'z'] {
            self.list((0..len).map(|i| format!("n%{d}{i}")));
        }
        self.list((0..len).map(|i| format!("n%xy{i}")));
        self.list((0..len).map(|i| format!("n%xyz{i}")));
        self.list((0..len).map(|i| format!("x%{i}")));
        for d in ['x', 'y', 'z'] {
            self.list((0..len).map(|i| format!("y%{d}{i}")));
        }
        for d in ['x', 'y', 'z'] {
            self.list((0..len).map(|i| format!("d%{d}{i}")));
        }
        for index in 0..len {
            for axis in Axis::ALL {
                let d = axis.letter();
                let digits = self.digits(axis);
                self.list((0..digits).map(|b| format!("d%{d}{index}_{b}")));
            }
        }
        for index in 0..len {
            let digits = self.digits(Axis::Y);
            self.list((0..digits).map(|b| format!("n%xy{index}_{b}")));
        }
        for index in 0..len {
            let digits = self.digits(Axis::Z);
            self.list((0..digits).map(|b| format!("n%xyz{index}_{b}")));
        }
        self.list((0..len).map(|i| format!("f%{i}")));
        for d in ['x', 'y', 'z'] {
            self.list((0..len).map(|i| format!("e%{d}{i}")));
        }
        for index in 0..len {
            for axis in Axis::ALL {
                let d = axis.letter();
                let digits = self.digits(axis);
                self.list((0..digits).map(|b| format!("e%n{d}{index}_{b}")));
            }
        }
        for d in ['x', 'y', 'z'] {
            self.list((0..len).map(|i| format!("e%n{d}{i}")));
        }
        self.list((0..len).map(|i| format!("r%{i}")));
        self.list((0..len).map(|i| format!("w%{i}")));
        self.list((0..len).map(|i| format!("s%{i}")));
        for index in 0..len {
            let arrays: Vec<String> = self.arrays(index).map(str::to_string).collect();
            for d in ['x', 'y', 'z'] {
                for dir in ['m', 'p'] {
                    self.list(arrays.iter().map(|name| format!("r%{d}{dir}{index}_{name}")));
                }
            }
        }
        for d in ['x', 'y', 'z'] {
            self.list((0..len).map(|i| format!("r%{d}{i}")));
        }
        for index in 0..len {
            for axis in Axis::ALL {
                let d = axis.letter();
                let digits = self.digits(axis);
                self.list((0..digits).map(|b| format!("r%n{d}{index}_{b}")));
            }
        }
        for d in ['x', 'y', 'z'] {
            self.list((0..len).map(|i| format!("r%n{d}{i}")));
        }
        for d in ['x', 'y', 'z'] {
            self.list((0..len).map(|i| format!("w%n{d}{i}")));
        }
        for d in ['x', 'y', 'z'] {
            self.list((0..len).map(|i| format!("s%n{d}{i}")));
        }
        for d in ['x', 'y', 'z'] {
            self.list((0..len).map(|i| format!("rw%n{d}{i}")));
        }
    }

    fn binary(&mut self) {
        self.buf.push_str("Binary\n");
        let len = self.len();
        for high in 1..len {
            self.list((0..high).map(|low| format!("g%{low}#{high}")));
        }
        for index in 0..len {
            for axis in Axis::ALL {
                let d = axis.letter();
                let digits = self.digits(axis);
                self.list((0..digits).map(|b| format!("n%{d}{index}_{b}")));
            }
        }
        for index in 0..len {
            let arrays: Vec<String> = self.arrays(index).map(str::to_string).collect();
            self.list(arrays.iter().map(|name| format!("r%{index}_{name}")));
        }
        self.list((0..len).map(|i| format!("rw%{i}")));
    }
}
