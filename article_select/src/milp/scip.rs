//! Out-of-process solve through the SCIP command line.
//!
//! The model is written as an LP file into a scratch directory, SCIP is fed
//! a command script on stdin and the written `.sol` file is parsed back.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::milp::builder::Model;
use crate::milp::solver::{MilpSolver, SolveResult, SolveStatus};

#[derive(Debug, Error)]
enum ScipError {
    #[error("failed to run `{bin}`: {source}")]
    Spawn { bin: String, source: std::io::Error },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("SCIP exited with {0}")]
    Exit(std::process::ExitStatus),
}

/// Parsed content of a SCIP `.sol` file.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScipSolution {
    pub(crate) status: SolveStatus,
    pub(crate) objective: Option<f64>,
    pub(crate) values: HashMap<String, f64>,
}

#[derive(Debug, Clone)]
pub struct ScipCliSolver {
    bin: String,
}

impl ScipCliSolver {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    /// Binary from `SCIP_BIN`, falling back to `scip` on the `PATH`.
    pub fn from_env() -> Self {
        Self::new(std::env::var("SCIP_BIN").unwrap_or_else(|_| "scip".to_string()))
    }

    fn run(&self, model: &Model) -> Result<ScipSolution, ScipError> {
        let dir = tempfile::tempdir()?;
        let lp_path = dir.path().join("model.lp");
        let sol_path = dir.path().join("model.sol");
        std::fs::write(&lp_path, model.to_lp_string())?;

        let mut child = Command::new(&self.bin)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ScipError::Spawn {
                bin: self.bin.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(script(&lp_path, &sol_path).as_bytes())?;
        }
        let out = child.wait_with_output()?;
        if !out.status.success() {
            debug!(stderr = %String::from_utf8_lossy(&out.stderr), "scip stderr");
            return Err(ScipError::Exit(out.status));
        }

        let sol = std::fs::read_to_string(&sol_path)?;
        Ok(parse_scip_sol(&sol))
    }
}

impl MilpSolver for ScipCliSolver {
    fn solve(&self, model: &Model) -> SolveResult {
        let sol = match self.run(model) {
            Ok(sol) => sol,
            Err(e) => {
                warn!(model = model.name(), error = %e, "scip run failed");
                return SolveResult::with_status(SolveStatus::NotSolved);
            }
        };
        if sol.status != SolveStatus::Optimal {
            warn!(model = model.name(), status = %sol.status, "no optimal solution");
            return SolveResult::with_status(sol.status);
        }

        let mut values = BTreeMap::new();
        for (name, v) in sol.values {
            match model.var_by_name(&name) {
                Some(id) => {
                    values.insert(id, v);
                }
                None => debug!(var = %name, "ignoring unknown variable in solution"),
            }
        }
        info!(model = model.name(), objective = ?sol.objective, "optimal solution found");
        SolveResult {
            status: SolveStatus::Optimal,
            objective_value: sol.objective,
            values,
        }
    }
}

fn script(lp_path: &Path, sol_path: &Path) -> String {
    format!(
        "read {}\nset write printzeros TRUE\noptimize\nwrite solution {}\nquit\n",
        lp_path.display(),
        sol_path.display()
    )
}

/// Parse a SCIP `.sol` file:
/// - `solution status: ...` gives the status
/// - `objective value: ...` gives the objective
/// - remaining `<var> <value> ...` lines are assignments
pub(crate) fn parse_scip_sol(sol: &str) -> ScipSolution {
    let mut status = SolveStatus::NotSolved;
    let mut objective = None;
    let mut values = HashMap::new();

    for line in sol.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("solution status:") {
            status = status_from_text(rest.trim());
            continue;
        }
        if let Some(rest) = line.strip_prefix("objective value:") {
            objective = rest.trim().parse::<f64>().ok();
            continue;
        }
        if line.starts_with("no solution available") {
            continue;
        }

        let mut it = line.split_whitespace();
        let (Some(name), Some(val)) = (it.next(), it.next()) else {
            continue;
        };
        if let Ok(v) = val.parse::<f64>() {
            values.insert(name.to_string(), v);
        }
    }

    ScipSolution {
        status,
        objective,
        values,
    }
}

fn status_from_text(s: &str) -> SolveStatus {
    let s = s.to_ascii_lowercase();
    if s.contains("infeasible or unbounded") {
        SolveStatus::NotSolved
    } else if s.contains("optimal") {
        SolveStatus::Optimal
    } else if s.contains("infeasible") {
        SolveStatus::Infeasible
    } else if s.contains("unbounded") {
        SolveStatus::Unbounded
    } else {
        SolveStatus::NotSolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::milp::build_model;
    use crate::{Catalog, ItemRecord, SelectionConfig};

    #[test]
    fn test_parse_optimal_solution() {
        let sol = "solution status: optimal solution found\n\
                   objective value:                                   20\n\
                   sel_0_A1                                            1 \t(obj:10)\n\
                   ovf_0_X                                             0 \t(obj:100)\n";
        let parsed = parse_scip_sol(sol);
        assert_eq!(parsed.status, SolveStatus::Optimal);
        assert_eq!(parsed.objective, Some(20.0));
        assert_eq!(parsed.values["sel_0_A1"], 1.0);
        assert_eq!(parsed.values["ovf_0_X"], 0.0);
    }

    #[test]
    fn test_parse_terminal_statuses() {
        let sol = "solution status: infeasible\nno solution available\n";
        let parsed = parse_scip_sol(sol);
        assert_eq!(parsed.status, SolveStatus::Infeasible);
        assert!(parsed.values.is_empty());

        assert_eq!(status_from_text("unbounded"), SolveStatus::Unbounded);
        assert_eq!(status_from_text("infeasible or unbounded"), SolveStatus::NotSolved);
        assert_eq!(status_from_text("time limit reached"), SolveStatus::NotSolved);
        assert_eq!(parse_scip_sol("").status, SolveStatus::NotSolved);
    }

    #[test]
    fn test_script_commands() {
        let s = script(Path::new("/tmp/m.lp"), Path::new("/tmp/m.sol"));
        assert_eq!(
            s,
            "read /tmp/m.lp\nset write printzeros TRUE\noptimize\nwrite solution /tmp/m.sol\nquit\n"
        );
    }

    /// Shell script standing in for SCIP: drains stdin, exits 0, writes nothing.
    #[cfg(unix)]
    fn silent_scip(dir: &Path) -> String {
        use std::os::unix::fs::PermissionsExt;

        let bin = dir.join("scip");
        std::fs::write(&bin, "#!/bin/sh\ncat > /dev/null\nexit 0\n").unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();
        bin.display().to_string()
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_solution_file_is_not_solved() {
        let dir = tempfile::tempdir().unwrap();
        let cat = Catalog::new(vec![ItemRecord::new("A1", "X", "P", 1.0, 1)]).unwrap();
        let model = build_model(&cat, &SelectionConfig::new(1)).unwrap();

        let solver = ScipCliSolver::new(silent_scip(dir.path()));
        assert!(matches!(solver.run(&model), Err(ScipError::Io(_))));
        let res = solver.solve(&model);
        assert_eq!(res.status, SolveStatus::NotSolved);
        assert_eq!(res.objective_value, None);
        assert!(res.values.is_empty());
    }

    #[test]
    fn test_missing_binary_is_not_solved() {
        let cat = Catalog::new(vec![ItemRecord::new("A1", "X", "P", 1.0, 1)]).unwrap();
        let model = build_model(&cat, &SelectionConfig::new(1)).unwrap();
        let res = ScipCliSolver::new("/nonexistent/scip-binary").solve(&model);
        assert_eq!(res.status, SolveStatus::NotSolved);
        assert!(res.values.is_empty());
    }
}
