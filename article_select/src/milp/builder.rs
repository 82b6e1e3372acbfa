use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::milp::error::ModelError;
use crate::milp::linear::{Constraint, LinearExpr, Relation, VarId};
use crate::Item;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarDomain {
    Binary,
    /// integer, lower bound 0, no upper bound
    NonNegInteger,
}

/// The three decision-variable families of the selection model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VarFamily {
    /// `select[item]`: item chosen
    Select,
    /// `overflow[reporter]`: selected items of the reporter beyond the first
    Overflow,
    /// `repeat[type]`: type has two or more selected items
    Repeat,
}

impl VarFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            VarFamily::Select => "selection",
            VarFamily::Overflow => "overflow",
            VarFamily::Repeat => "repetition",
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            VarFamily::Select => "sel",
            VarFamily::Overflow => "ovf",
            VarFamily::Repeat => "rep",
        }
    }

    pub fn domain(&self) -> VarDomain {
        match self {
            VarFamily::Select | VarFamily::Repeat => VarDomain::Binary,
            VarFamily::Overflow => VarDomain::NonNegInteger,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VarDecl {
    pub(crate) name: String,
    pub(crate) family: VarFamily,
    pub(crate) domain: VarDomain,
}

impl VarDecl {
    /// LP-safe unique name, e.g. `sel_0_A1`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn family(&self) -> VarFamily {
        self.family
    }

    pub fn domain(&self) -> VarDomain {
        self.domain
    }
}

/// Single-use accumulator of variables, constraints and the objective.
///
/// Phases run in order: create the variable families, add constraints, set
/// the objective, then `build` (which consumes the builder).
#[derive(Debug)]
pub struct ModelBuilder {
    name: String,
    vars: Vec<VarDecl>,
    families: BTreeMap<VarFamily, Vec<VarId>>,
    constraints: Vec<Constraint>,
    constraint_names: HashSet<String>,
    objective: Option<LinearExpr>,
}

impl ModelBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vars: vec![],
            families: BTreeMap::new(),
            constraints: vec![],
            constraint_names: HashSet::new(),
            objective: None,
        }
    }

    pub fn create_selection_variables(&mut self, items: &[Item]) -> Result<Vec<VarId>, ModelError> {
        self.create_family(VarFamily::Select, items.iter().map(|i| i.id.as_str()))
    }

    pub fn create_overflow_variables(&mut self, reporters: &[String]) -> Result<Vec<VarId>, ModelError> {
        self.create_family(VarFamily::Overflow, reporters.iter().map(String::as_str))
    }

    pub fn create_repetition_variables(&mut self, types: &[String]) -> Result<Vec<VarId>, ModelError> {
        self.create_family(VarFamily::Repeat, types.iter().map(String::as_str))
    }

    fn create_family<'a>(
        &mut self,
        family: VarFamily,
        keys: impl Iterator<Item = &'a str>,
    ) -> Result<Vec<VarId>, ModelError> {
        if self.families.contains_key(&family) {
            return Err(ModelError::FamilyAlreadyCreated(family.as_str()));
        }
        let ids: Vec<VarId> = keys
            .enumerate()
            .map(|(i, key)| {
                let id = VarId(self.vars.len());
                self.vars.push(VarDecl {
                    name: format!("{}_{}_{}", family.prefix(), i, sanitize(key)),
                    family,
                    domain: family.domain(),
                });
                id
            })
            .collect();
        debug!(family = family.as_str(), count = ids.len(), "variables created");
        self.families.insert(family, ids.clone());
        Ok(ids)
    }

    /// Variables of `family`, if the family was created.
    pub fn family(&self, family: VarFamily) -> Option<&[VarId]> {
        self.families.get(&family).map(Vec::as_slice)
    }

    pub fn add_constraint(&mut self, rel: Relation, name: impl Into<String>) -> Result<(), ModelError> {
        let name = name.into();
        if !self.constraint_names.insert(name.clone()) {
            return Err(ModelError::DuplicateConstraint(name));
        }
        self.constraints.push(Constraint {
            name,
            expr: rel.expr,
            sense: rel.sense,
            rhs: rel.rhs,
        });
        Ok(())
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    pub fn set_objective(&mut self, expr: LinearExpr) -> Result<(), ModelError> {
        if self.objective.is_some() {
            return Err(ModelError::ObjectiveAlreadySet);
        }
        self.objective = Some(expr);
        Ok(())
    }

    pub fn build(self) -> Result<Model, ModelError> {
        let mut objective = self.objective.ok_or(ModelError::ObjectiveUnset)?;
        // constant offsets do not move the optimum
        objective.constant = 0.0;

        let known = self.vars.len();
        let dangling = |e: &LinearExpr| e.terms().map(|(v, _)| v).find(|v| v.0 >= known);
        for c in &self.constraints {
            if let Some(v) = dangling(&c.expr) {
                return Err(ModelError::UnknownVariable(v.0, c.name.clone()));
            }
        }
        if let Some(v) = dangling(&objective) {
            return Err(ModelError::UnknownVariable(v.0, "objective".to_string()));
        }

        debug!(
            model = %self.name,
            vars = self.vars.len(),
            constraints = self.constraints.len(),
            "model built"
        );

        let by_name = self
            .vars
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.clone(), VarId(i)))
            .collect();

        Ok(Model {
            name: self.name,
            vars: self.vars,
            by_name,
            families: self.families,
            constraints: self.constraints,
            objective,
        })
    }
}

/// Finished minimization model handed to a solver.
#[derive(Clone, Debug)]
pub struct Model {
    name: String,
    vars: Vec<VarDecl>,
    by_name: HashMap<String, VarId>,
    families: BTreeMap<VarFamily, Vec<VarId>>,
    constraints: Vec<Constraint>,
    objective: LinearExpr,
}

impl Model {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vars(&self) -> impl Iterator<Item = (VarId, &VarDecl)> {
        self.vars.iter().enumerate().map(|(i, d)| (VarId(i), d))
    }

    pub fn var(&self, id: VarId) -> &VarDecl {
        &self.vars[id.0]
    }

    pub fn var_count(&self) -> usize {
        self.vars.len()
    }

    pub fn var_by_name(&self, name: &str) -> Option<VarId> {
        self.by_name.get(name).copied()
    }

    /// Variables of `family` in creation order; empty if never created.
    pub fn family(&self, family: VarFamily) -> &[VarId] {
        self.families.get(&family).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn constraint(&self, name: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.name == name)
    }

    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    /// Names of the constraints the assignment violates beyond `tol`.
    pub fn violated_constraints(&self, value: impl Fn(VarId) -> f64, tol: f64) -> Vec<&str> {
        self.constraints
            .iter()
            .filter(|c| !c.holds(&value, tol))
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// Restrict names to the LP-file identifier alphabet.
pub(crate) fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::milp::linear::Sense;

    fn item(id: &str) -> Item {
        Item {
            id: id.into(),
            reporter: "X".into(),
            kind: "P".into(),
            cost: 1.0,
            clicks: 1,
        }
    }

    #[test]
    fn test_variable_families_and_domains() {
        let mut b = ModelBuilder::new("m");
        let sel = b.create_selection_variables(&[item("A 1"), item("A-1")]).unwrap();
        let ovf = b.create_overflow_variables(&["X".into()]).unwrap();
        let rep = b.create_repetition_variables(&["P".into()]).unwrap();
        b.set_objective(LinearExpr::from_var(sel[0], 1.0)).unwrap();
        let m = b.build().unwrap();

        assert_eq!(m.var(sel[0]).name(), "sel_0_A_1");
        assert_eq!(m.var(sel[1]).name(), "sel_1_A_1");
        assert_eq!(m.var(ovf[0]).domain(), VarDomain::NonNegInteger);
        assert_eq!(m.var(rep[0]).domain(), VarDomain::Binary);
        assert_eq!(m.var(rep[0]).family(), VarFamily::Repeat);
        assert_eq!(m.family(VarFamily::Overflow), ovf.as_slice());
        assert_eq!(m.var_by_name("rep_0_P"), Some(rep[0]));
    }

    #[test]
    fn test_family_created_once() {
        let mut b = ModelBuilder::new("m");
        b.create_overflow_variables(&["X".into()]).unwrap();
        assert_eq!(
            b.create_overflow_variables(&["Y".into()]).unwrap_err(),
            ModelError::FamilyAlreadyCreated("overflow")
        );
    }

    #[test]
    fn test_build_requires_objective() {
        let mut b = ModelBuilder::new("m");
        b.create_selection_variables(&[item("A")]).unwrap();
        assert_eq!(b.build().unwrap_err(), ModelError::ObjectiveUnset);
    }

    #[test]
    fn test_objective_set_once() {
        let mut b = ModelBuilder::new("m");
        b.set_objective(LinearExpr::zero()).unwrap();
        assert_eq!(
            b.set_objective(LinearExpr::zero()).unwrap_err(),
            ModelError::ObjectiveAlreadySet
        );
    }

    #[test]
    fn test_build_rejects_dangling_variable() {
        let mut b = ModelBuilder::new("m");
        let sel = b.create_selection_variables(&[item("A")]).unwrap();
        b.add_constraint(LinearExpr::from_var(VarId(7), 1.0).geq(1.0), "c").unwrap();
        b.set_objective(LinearExpr::from_var(sel[0], 1.0)).unwrap();
        assert_eq!(
            b.build().unwrap_err(),
            ModelError::UnknownVariable(7, "c".into())
        );

        let mut b = ModelBuilder::new("m");
        b.set_objective(LinearExpr::from_var(VarId(0), 1.0)).unwrap();
        assert_eq!(
            b.build().unwrap_err(),
            ModelError::UnknownVariable(0, "objective".into())
        );
    }

    #[test]
    fn test_duplicate_constraint_name() {
        let mut b = ModelBuilder::new("m");
        let sel = b.create_selection_variables(&[item("A")]).unwrap();
        b.add_constraint(LinearExpr::from_var(sel[0], 1.0).geq(1.0), "c").unwrap();
        assert_eq!(
            b.add_constraint(LinearExpr::from_var(sel[0], 1.0).leq(1.0), "c").unwrap_err(),
            ModelError::DuplicateConstraint("c".into())
        );
        assert_eq!(b.constraint_count(), 1);
    }

    #[test]
    fn test_violated_constraints() {
        let mut b = ModelBuilder::new("m");
        let sel = b.create_selection_variables(&[item("A"), item("B")]).unwrap();
        b.add_constraint(
            LinearExpr::weighted_sum([(sel[0], 1.0), (sel[1], 1.0)]).geq(1.0),
            "cover",
        )
        .unwrap();
        b.add_constraint(LinearExpr::from_var(sel[1], 1.0).equals(0.0), "off").unwrap();
        b.set_objective(LinearExpr::zero()).unwrap();
        let m = b.build().unwrap();

        assert_eq!(m.constraint("off").unwrap().sense(), Sense::Eq);
        assert!(m.violated_constraints(|v| if v == sel[0] { 1.0 } else { 0.0 }, 1e-9).is_empty());
        assert_eq!(m.violated_constraints(|_| 0.0, 1e-9), vec!["cover"]);
        assert_eq!(m.violated_constraints(|_| 1.0, 1e-9), vec!["off"]);
    }
}
