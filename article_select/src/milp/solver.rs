use std::collections::BTreeMap;
use std::fmt;

use good_lp::solvers::microlp::microlp;
use good_lp::{variable, Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::milp::builder::{Model, VarDomain};
use crate::milp::linear::{LinearExpr, Sense, VarId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    NotSolved,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SolveStatus::Optimal => "Optimal",
            SolveStatus::Infeasible => "Infeasible",
            SolveStatus::Unbounded => "Unbounded",
            SolveStatus::NotSolved => "Not Solved",
        };
        f.write_str(s)
    }
}

/// Answer of a solver for one model. Values are present only for a solved model.
#[derive(Clone, Debug, PartialEq)]
pub struct SolveResult {
    pub status: SolveStatus,
    pub objective_value: Option<f64>,
    pub values: BTreeMap<VarId, f64>,
}

impl SolveResult {
    /// Result carrying only a terminal status.
    pub fn with_status(status: SolveStatus) -> Self {
        Self {
            status,
            objective_value: None,
            values: BTreeMap::new(),
        }
    }

    pub fn value(&self, v: VarId) -> Option<f64> {
        self.values.get(&v).copied()
    }
}

/// Opaque MILP solve. Blocking; any status other than `Optimal` is final.
pub trait MilpSolver {
    fn solve(&self, model: &Model) -> SolveResult;
}

/// In-process branch-and-bound through `good_lp`'s pure-Rust microlp backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct MicroLpSolver;

impl MilpSolver for MicroLpSolver {
    fn solve(&self, model: &Model) -> SolveResult {
        let mut pb = ProblemVariables::new();
        let handles: Vec<Variable> = model
            .vars()
            .map(|(_, decl)| match decl.domain() {
                VarDomain::Binary => pb.add(variable().binary()),
                VarDomain::NonNegInteger => pb.add(variable().integer().min(0)),
            })
            .collect();

        let mut problem = pb.minimise(to_expression(model.objective(), &handles)).using(microlp);
        for c in model.constraints() {
            let lhs = to_expression(c.expr(), &handles);
            problem = problem.with(match c.sense() {
                Sense::Le => lhs.leq(c.rhs()),
                Sense::Ge => lhs.geq(c.rhs()),
                Sense::Eq => lhs.eq(c.rhs()),
            });
        }
        debug!(
            model = model.name(),
            vars = model.var_count(),
            constraints = model.constraints().len(),
            "solving with microlp"
        );

        match problem.solve() {
            Ok(solution) => {
                let values: BTreeMap<VarId, f64> = handles
                    .iter()
                    .enumerate()
                    .map(|(i, &h)| (VarId(i), solution.value(h)))
                    .collect();
                let objective = model
                    .objective()
                    .evaluate(|v| values.get(&v).copied().unwrap_or(0.0));
                info!(model = model.name(), objective, "optimal solution found");
                SolveResult {
                    status: SolveStatus::Optimal,
                    objective_value: Some(objective),
                    values,
                }
            }
            Err(e) => {
                let status = status_of(&e);
                warn!(model = model.name(), %status, error = %e, "no optimal solution");
                SolveResult::with_status(status)
            }
        }
    }
}

fn status_of(e: &ResolutionError) -> SolveStatus {
    match e {
        ResolutionError::Infeasible => SolveStatus::Infeasible,
        ResolutionError::Unbounded => SolveStatus::Unbounded,
        _ => SolveStatus::NotSolved,
    }
}

fn to_expression(e: &LinearExpr, handles: &[Variable]) -> Expression {
    let mut out = Expression::with_capacity(e.terms.len());
    for (v, c) in e.terms() {
        out.add_mul(c, handles[v.0]);
    }
    out
}
