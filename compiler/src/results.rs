// results.rs — Benchmark run-log parsing and CSV emission
//
// Parses the timing lines printed by benchmark runs and collects one table
// row per measured variant: `[variant, X, Y, Z, total, halo]` with the
// median of each min/median/max triple.
//
// Preconditions: none.
// Postconditions: rows appear in log order; incomplete records are dropped.
// Failure modes: IO and CSV errors propagate from `write_table`.
// Side effects: `write_table` creates the output file.

use std::path::Path;

/// One measured variant.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub variant: String,
    pub domain: [u32; 3],
    /// Median total time in milliseconds.
    pub total: f64,
    /// Median halo-exchange time in milliseconds.
    pub halo: f64,
}

/// Parse a benchmark run log into result rows.
///
/// A row completes when its halo-time line arrives; the preceding domain,
/// variant, and total-time lines set the pending record. Lines outside the
/// expected shapes are ignored.
pub fn parse_log(text: &str) -> Vec<ResultRow> {
    let mut rows = Vec::new();
    let mut domain: Option<[u32; 3]> = None;
    let mut variant: Option<String> = None;
    let mut total: Option<f64> = None;
    for line in text.lines() {
        let line = line.trim_start();
        if let Some(rest) = line.strip_prefix("- domain ") {
            domain = parse_domain(rest);
        } else if let Some(rest) = line.strip_prefix("- variant ") {
            variant = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("- total time (min/median/max) [ms]: ") {
            total = parse_median(rest);
        } else if let Some(rest) = line.strip_prefix("- halo time (min/median/max) [ms]: ") {
            if let (Some(domain), Some(variant), Some(total), Some(halo)) =
                (domain, variant.clone(), total, parse_median(rest))
            {
                rows.push(ResultRow {
                    variant,
                    domain,
                    total,
                    halo,
                });
            }
        }
    }
    rows
}

fn parse_domain(rest: &str) -> Option<[u32; 3]> {
    let mut parts = rest.split(", ").map(|part| part.trim().parse::<u32>());
    match (parts.next(), parts.next(), parts.next()) {
        (Some(Ok(x)), Some(Ok(y)), Some(Ok(z))) => Some([x, y, z]),
        _ => None,
    }
}

/// The middle value of an `a/b/c` triple.
fn parse_median(rest: &str) -> Option<f64> {
    let values: Vec<f64> = rest
        .trim()
        .split('/')
        .filter_map(|part| part.parse().ok())
        .collect();
    (values.len() == 3).then(|| values[1])
}

/// Write the rows as a CSV table with a fixed header.
pub fn write_table(rows: &[ResultRow], path: &Path) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["VAR", "X", "Y", "Z", "TOTAL", "HALO"])?;
    for row in rows {
        writer.write_record([
            row.variant.clone(),
            row.domain[0].to_string(),
            row.domain[1].to_string(),
            row.domain[2].to_string(),
            row.total.to_string(),
            row.halo.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
