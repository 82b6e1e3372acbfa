mod builder;
mod constraints;
mod error;
mod extract;
mod linear;
mod lp;
mod objective;
mod scip;
mod solver;

pub use builder::{Model, ModelBuilder, VarDecl, VarDomain, VarFamily};
pub use constraints::{ConstraintGenerator, SelectionVars};
pub use error::{ExtractionError, ModelError, SelectionError};
pub use extract::{extract_selection, SelectionReport};
pub use linear::{Constraint, LinearExpr, Relation, Sense, VarId};
pub use objective::assemble_objective;
pub use scip::ScipCliSolver;
pub use solver::{MicroLpSolver, MilpSolver, SolveResult, SolveStatus};

use tracing::info;

use crate::catalog::Catalog;
use crate::{ItemRecord, SelectionConfig};

/// Build the selection MILP for a loaded catalog.
pub fn build_model(catalog: &Catalog, config: &SelectionConfig) -> Result<Model, ModelError> {
    let mut builder = ModelBuilder::new("article_selection");

    // 1) one variable per item, reporter and type
    let vars = SelectionVars::create(&mut builder, catalog)?;

    // 2) the six constraint families
    ConstraintGenerator::new(catalog, &vars).generate_all(&mut builder, config.target_clicks)?;

    // 3) penalized cost
    builder.set_objective(assemble_objective(catalog, &vars, config))?;

    builder.build()
}

/// Entry point: validate records, build and solve the model, extract the selection.
pub fn select_articles(
    records: impl IntoIterator<Item = ItemRecord>,
    config: &SelectionConfig,
    solver: &impl MilpSolver,
) -> Result<SelectionReport, SelectionError> {
    let catalog = Catalog::new(records)?;
    let model = build_model(&catalog, config)?;
    let result = solver.solve(&model);
    info!(status = %result.status, objective = ?result.objective_value, "solve finished");
    Ok(extract_selection(&catalog, &model, &result)?)
}
