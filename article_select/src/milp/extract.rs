use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::Catalog;
use crate::milp::builder::{Model, VarFamily};
use crate::milp::error::ExtractionError;
use crate::milp::linear::VarId;
use crate::milp::solver::{SolveResult, SolveStatus};
use crate::Item;

/// Integrality and feasibility tolerance applied to solver values.
const TOL: f64 = 1e-6;

/// Selection in domain terms, as handed to the reporting layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionReport {
    pub status: SolveStatus,
    pub objective_value: Option<f64>,
    /// catalog order
    pub selected_items: Vec<Item>,
    pub total_cost: f64,
    pub total_clicks: u64,
    /// selected articles beyond the first, per reporter
    pub overflow: BTreeMap<String, u64>,
    /// types with two or more selected articles
    pub repeated_types: Vec<String>,
}

impl SelectionReport {
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Map an optimal solver answer back to selected articles.
///
/// The answer is checked, never repaired: a missing or fractional value, or a
/// violated constraint, is an error.
pub fn extract_selection(
    catalog: &Catalog,
    model: &Model,
    result: &SolveResult,
) -> Result<SelectionReport, ExtractionError> {
    if result.status != SolveStatus::Optimal {
        return Err(ExtractionError::NotOptimal(result.status));
    }
    for (family, expected) in [
        (VarFamily::Select, catalog.len()),
        (VarFamily::Overflow, catalog.reporters().len()),
        (VarFamily::Repeat, catalog.types().len()),
    ] {
        let found = model.family(family).len();
        if found != expected {
            return Err(ExtractionError::CatalogMismatch(family.as_str(), expected, found));
        }
    }

    let mut resolved: BTreeMap<VarId, i64> = BTreeMap::new();
    for (id, decl) in model.vars() {
        let v = result
            .value(id)
            .ok_or_else(|| ExtractionError::MissingValue(decl.name().to_string()))?;
        let n = resolve_integral(v).ok_or_else(|| ExtractionError::NonIntegral(decl.name().to_string()))?;
        resolved.insert(id, n);
    }
    let value = |v: VarId| resolved.get(&v).copied().unwrap_or(0) as f64;
    if let Some(name) = model.violated_constraints(value, TOL).first() {
        return Err(ExtractionError::ConstraintViolated(name.to_string()));
    }

    let selected_items: Vec<Item> = catalog
        .items()
        .iter()
        .zip(model.family(VarFamily::Select))
        .filter(|(_, v)| resolved.get(*v) == Some(&1))
        .map(|(item, _)| item.clone())
        .collect();

    let overflow = catalog
        .reporters()
        .iter()
        .zip(model.family(VarFamily::Overflow))
        .map(|(r, v)| (r.clone(), resolved.get(v).copied().unwrap_or(0).max(0) as u64))
        .collect();

    let repeated_types = catalog
        .types()
        .iter()
        .zip(model.family(VarFamily::Repeat))
        .filter(|(_, v)| resolved.get(*v) == Some(&1))
        .map(|(t, _)| t.clone())
        .collect();

    debug!(selected = selected_items.len(), "selection extracted");

    Ok(SelectionReport {
        status: result.status,
        objective_value: result.objective_value,
        total_cost: selected_items.iter().map(|i| i.cost).sum(),
        total_clicks: selected_items.iter().map(|i| i.clicks).sum(),
        selected_items,
        overflow,
        repeated_types,
    })
}

/// Nearest integer, if `v` lies within tolerance of one.
pub(crate) fn resolve_integral(v: f64) -> Option<i64> {
    let r = v.round();
    ((v - r).abs() <= TOL).then_some(r as i64)
}
