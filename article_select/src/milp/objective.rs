use crate::catalog::Catalog;
use crate::milp::constraints::SelectionVars;
use crate::milp::linear::LinearExpr;
use crate::SelectionConfig;

/// Cost of the selection, plus the overflow penalty per extra article of a
/// reporter, minus the repetition reward per repeated type. Minimized.
pub fn assemble_objective(catalog: &Catalog, vars: &SelectionVars, config: &SelectionConfig) -> LinearExpr {
    let cost = LinearExpr::weighted_sum(
        catalog
            .items()
            .iter()
            .zip(&vars.select)
            .map(|(item, &v)| (v, item.cost)),
    );
    let overflow = LinearExpr::weighted_sum(vars.overflow.iter().map(|&v| (v, config.overflow_penalty)));
    let repeat = LinearExpr::weighted_sum(vars.repeat.iter().map(|&v| (v, config.repetition_reward)));
    cost.add(overflow).sub(repeat)
}
