// stopt — Stencil Tuning Optimizer
//
// Library root. Optimizer passes live here as modules; the binary wires
// them to the CLI.

pub mod access;
pub mod bounds;
pub mod dataflow;
pub mod deps;
pub mod diag;
pub mod encode;
pub mod footprint;
pub mod pass;
pub mod pipeline;
pub mod plan;
pub mod program;
pub mod report;
pub mod results;
pub mod schedule;
pub mod sequence;
pub mod solver;
