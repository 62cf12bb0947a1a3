// solver.rs — External MILP solver driver
//
// Thin IO shell around the solver binary: feeds the interactive command
// script over stdin, blocks on exit, and reads the XML solution file back.
// The solution format is stable attribute-per-element XML, so it is scanned
// at the text level; no XML machinery is involved.
//
// Preconditions: the LP file exists at `lp_path`.
// Postconditions: a stale solution file is removed before the run; the
//                 returned assignment has all values rounded to integers.
// Failure modes: process spawn and IO errors propagate unmasked. A solver
//                that exits without writing a solution yields Ok(None) from
//                `read_solution` — the caller leaves the plan untiled.
// Side effects: deletes and creates files, spawns a child process.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use crate::diag::ConfigError;

/// Integer variable assignment extracted from a solver run.
#[derive(Debug, Clone, Default)]
pub struct Assignment {
    pub objective: f64,
    pub values: HashMap<String, i64>,
}

impl Assignment {
    pub fn get(&self, name: &str) -> Option<i64> {
        self.values.get(name).copied()
    }

    /// Look up a variable the reconstruction cannot proceed without.
    pub fn require(&self, name: &str) -> Result<i64, ConfigError> {
        self.get(name).ok_or_else(|| ConfigError::MissingVariable {
            variable: name.to_string(),
        })
    }
}

/// Run the solver on `lp_path`, asking it to write `sol_path`.
///
/// Issues `read / mipopt / write / quit` on the solver's stdin and waits for
/// it to exit. The exit status is not interpreted: the observable signal of
/// a failed run is the absent solution file.
pub fn run_solver(command: &str, lp_path: &Path, sol_path: &Path) -> io::Result<()> {
    if sol_path.exists() {
        fs::remove_file(sol_path)?;
    }
    let mut child = Command::new(command)
        .stdin(Stdio::piped())
        .spawn()?;
    {
        let stdin = child.stdin.as_mut().expect("stdin was piped");
        write!(
            stdin,
            "read {}\nmipopt\nwrite {}\nquit\n",
            lp_path.display(),
            sol_path.display()
        )?;
    }
    child.wait()?;
    Ok(())
}

/// Read the solver's XML solution file, if it exists.
pub fn read_solution(sol_path: &Path) -> io::Result<Option<Assignment>> {
    if !sol_path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(sol_path)?;
    Ok(Some(parse_solution(&text)))
}

/// Extract the objective and variable values from XML solution text.
///
/// The format has one `<header … objectiveValue="…"/>` and one
/// `<variable … name="…" value="…"/>` per assigned variable; only those
/// attributes are read.
pub fn parse_solution(text: &str) -> Assignment {
    let mut assignment = Assignment::default();
    if let Some(fragment) = element(text, "<header") {
        if let Some(value) = attribute(fragment, "objectiveValue") {
            assignment.objective = value.parse().unwrap_or(0.0);
        }
    }
    let mut rest = text;
    while let Some(start) = rest.find("<variable") {
        rest = &rest[start..];
        let fragment = match rest.find('>') {
            Some(end) => &rest[..end],
            None => break,
        };
        if let (Some(name), Some(value)) =
            (attribute(fragment, "name"), attribute(fragment, "value"))
        {
            if let Ok(value) = value.parse::<f64>() {
                assignment
                    .values
                    .insert(name.to_string(), value.round() as i64);
            }
        }
        rest = &rest[fragment.len()..];
    }
    assignment
}

/// The element fragment from its opening tag to the closing `>`.
fn element<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let start = text.find(tag)?;
    let rest = &text[start..];
    let end = rest.find('>')?;
    Some(&rest[..end])
}

/// The value of `key="…"` inside an element fragment.
fn attribute<'a>(fragment: &'a str, key: &str) -> Option<&'a str> {
    let pattern = format!("{key}=\"");
    let start = fragment.find(&pattern)? + pattern.len();
    let rest = &fragment[start..];
    let end = rest.find('"')?;
    Some(&rest[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOLUTION: &str = r#"<?xml version = "1.0" encoding="UTF-8" standalone="yes"?>
<CPLEXSolution version="1.2">
 <header
   problemName="unit.lp"
   solutionName="incumbent"
   objectiveValue="4.0813051"
   solutionTypeValue="3"/>
 <variables>
  <variable name="g%0" index="0" value="0"/>
  <variable name="g%1" index="1" value="0.9999999999"/>
  <variable name="n%x0" index="2" value="2"/>
  <variable name="n%z0" index="3" value="1.9999999"/>
 </variables>
</CPLEXSolution>
"#;

    #[test]
    fn parses_objective_and_rounded_values() {
        let assignment = parse_solution(SOLUTION);
        assert!((assignment.objective - 4.0813051).abs() < 1e-12);
        assert_eq!(assignment.get("g%0"), Some(0));
        assert_eq!(assignment.get("g%1"), Some(1));
        assert_eq!(assignment.get("n%x0"), Some(2));
        assert_eq!(assignment.get("n%z0"), Some(2));
    }

    #[test]
    fn require_reports_the_missing_variable() {
        let assignment = parse_solution(SOLUTION);
        assert_eq!(
            assignment.require("n%y0").unwrap_err(),
            ConfigError::MissingVariable {
                variable: "n%y0".into()
            }
        );
    }

    #[test]
    fn missing_file_yields_none() {
        let absent = Path::new("definitely/not/here.sol");
        assert!(read_solution(absent).unwrap().is_none());
    }

    #[test]
    fn garbage_text_yields_empty_assignment() {
        let assignment = parse_solution("not xml at all");
        assert_eq!(assignment.objective, 0.0);
        assert!(assignment.values.is_empty());
    }
}
