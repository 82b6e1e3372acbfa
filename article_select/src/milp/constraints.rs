//! The six constraint families of the selection model.
//!
//! With `S_t` the number of selected items of type `t` and `N` the catalog
//! size:
//!
//! | family | per      | relation                                   |
//! |--------|----------|--------------------------------------------|
//! | C1     | reporter | selected(r) >= 1                           |
//! | C2     | -        | sum(clicks * select) >= target             |
//! | C3     | type     | S_t >= 1                                   |
//! | C4     | type     | selected - 2 S_t >= 0                      |
//! | C5     | reporter | selected(r) - overflow[r] = 1              |
//! | C6.1   | type     | S_t - (N-1) repeat[t] <= 1                 |
//! | C6.2   | type     | S_t - 2 repeat[t] >= 0                     |
//!
//! C5 relies on C1: without `selected(r) >= 1` the equality would force a
//! negative overflow. C6.1 and C6.2 together pin `repeat[t] = 1` exactly
//! when `S_t >= 2`.

use tracing::debug;

use crate::catalog::{Catalog, IncidenceMatrix};
use crate::milp::builder::{sanitize, ModelBuilder, VarFamily};
use crate::milp::error::ModelError;
use crate::milp::linear::{LinearExpr, VarId};

/// Handles of the three variable families, indexed like the catalog's
/// items, reporters and types.
#[derive(Clone, Debug)]
pub struct SelectionVars {
    pub select: Vec<VarId>,
    pub overflow: Vec<VarId>,
    pub repeat: Vec<VarId>,
}

impl SelectionVars {
    pub fn create(builder: &mut ModelBuilder, catalog: &Catalog) -> Result<Self, ModelError> {
        Ok(Self {
            select: builder.create_selection_variables(catalog.items())?,
            overflow: builder.create_overflow_variables(catalog.reporters())?,
            repeat: builder.create_repetition_variables(catalog.types())?,
        })
    }
}

pub struct ConstraintGenerator<'a> {
    catalog: &'a Catalog,
    vars: &'a SelectionVars,
}

impl<'a> ConstraintGenerator<'a> {
    pub fn new(catalog: &'a Catalog, vars: &'a SelectionVars) -> Self {
        Self { catalog, vars }
    }

    pub fn generate_all(&self, b: &mut ModelBuilder, target_clicks: u64) -> Result<(), ModelError> {
        let before = b.constraint_count();
        self.coverage_per_reporter(b)?;
        self.total_click_volume(b, target_clicks)?;
        self.coverage_per_type(b)?;
        self.diversity_floor_per_type(b)?;
        self.overflow_accounting(b)?;
        self.repetition_linearization(b)?;
        debug!(added = b.constraint_count() - before, "constraints generated");
        Ok(())
    }

    /// C1: every reporter has at least one selected item.
    pub fn coverage_per_reporter(&self, b: &mut ModelBuilder) -> Result<(), ModelError> {
        self.check_family(b, VarFamily::Select)?;
        let inc = self.catalog.by_reporter();
        for (r, name) in inc.categories().iter().enumerate() {
            b.add_constraint(self.selected_in(inc, r).geq(1.0), cname("C1", r, name))?;
        }
        Ok(())
    }

    /// C2: selected clicks reach the target.
    pub fn total_click_volume(&self, b: &mut ModelBuilder, target_clicks: u64) -> Result<(), ModelError> {
        self.check_family(b, VarFamily::Select)?;
        let expr = LinearExpr::weighted_sum(
            self.catalog
                .items()
                .iter()
                .zip(&self.vars.select)
                .map(|(item, &v)| (v, item.clicks as f64)),
        );
        b.add_constraint(expr.geq(target_clicks as f64), "C2")
    }

    /// C3: every type has at least one selected item.
    pub fn coverage_per_type(&self, b: &mut ModelBuilder) -> Result<(), ModelError> {
        self.check_family(b, VarFamily::Select)?;
        let inc = self.catalog.by_type();
        for (t, name) in inc.categories().iter().enumerate() {
            b.add_constraint(self.selected_in(inc, t).geq(1.0), cname("C3", t, name))?;
        }
        Ok(())
    }

    /// C4: no type makes up more than half of the selection.
    pub fn diversity_floor_per_type(&self, b: &mut ModelBuilder) -> Result<(), ModelError> {
        self.check_family(b, VarFamily::Select)?;
        let inc = self.catalog.by_type();
        for (t, name) in inc.categories().iter().enumerate() {
            let expr = self.total_selected().sub(self.selected_in(inc, t).scale(2.0));
            b.add_constraint(expr.geq(0.0), cname("C4", t, name))?;
        }
        Ok(())
    }

    /// C5: overflow[r] equals the reporter's selected items minus one.
    pub fn overflow_accounting(&self, b: &mut ModelBuilder) -> Result<(), ModelError> {
        self.check_family(b, VarFamily::Select)?;
        self.check_family(b, VarFamily::Overflow)?;
        let inc = self.catalog.by_reporter();
        for (r, name) in inc.categories().iter().enumerate() {
            let expr = self
                .selected_in(inc, r)
                .sub(LinearExpr::from_var(self.vars.overflow[r], 1.0));
            b.add_constraint(expr.equals(1.0), cname("C5", r, name))?;
        }
        Ok(())
    }

    /// C6.1/C6.2: big-M linearization of `repeat[t] = 1 <=> S_t >= 2`.
    ///
    /// `N - 1` is the smallest M that keeps C6.1 inactive for `repeat = 1`,
    /// since `S_t <= N`.
    pub fn repetition_linearization(&self, b: &mut ModelBuilder) -> Result<(), ModelError> {
        self.check_family(b, VarFamily::Select)?;
        self.check_family(b, VarFamily::Repeat)?;
        let big_m = self.catalog.len() as f64 - 1.0;
        let inc = self.catalog.by_type();
        for (t, name) in inc.categories().iter().enumerate() {
            let repeat = self.vars.repeat[t];
            let upper = self
                .selected_in(inc, t)
                .sub(LinearExpr::from_var(repeat, big_m));
            b.add_constraint(upper.leq(1.0), cname("C6.1", t, name))?;

            let lower = self
                .selected_in(inc, t)
                .sub(LinearExpr::from_var(repeat, 2.0));
            b.add_constraint(lower.geq(0.0), cname("C6.2", t, name))?;
        }
        Ok(())
    }

    /// Sum of `incidence[i, category] * select[i]` over the category's members.
    fn selected_in(&self, inc: &IncidenceMatrix, category: usize) -> LinearExpr {
        LinearExpr::weighted_sum(inc.members(category).iter().map(|&i| (self.vars.select[i], 1.0)))
    }

    fn total_selected(&self) -> LinearExpr {
        LinearExpr::weighted_sum(self.vars.select.iter().map(|&v| (v, 1.0)))
    }

    /// Fails unless `family` was created in `b` with one variable per entity.
    fn check_family(&self, b: &ModelBuilder, family: VarFamily) -> Result<(), ModelError> {
        let (created, expected) = match family {
            VarFamily::Select => (&self.vars.select, self.catalog.len()),
            VarFamily::Overflow => (&self.vars.overflow, self.catalog.reporters().len()),
            VarFamily::Repeat => (&self.vars.repeat, self.catalog.types().len()),
        };
        match b.family(family) {
            Some(known) if known == created.as_slice() && known.len() == expected => Ok(()),
            _ => Err(ModelError::MissingFamily(family.as_str())),
        }
    }
}

/// Constraint name: family, category index and LP-safe category value.
fn cname(family: &str, idx: usize, value: &str) -> String {
    format!("{family}_{idx}_{}", sanitize(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::milp::builder::Model;
    use crate::milp::linear::Sense;
    use crate::ItemRecord;
    use rstest::rstest;

    /// Item `i` gets reporter `R{i % 2}` and type `types[i]`.
    fn catalog_of(types: &[&str]) -> Catalog {
        Catalog::new(types.iter().enumerate().map(|(i, t)| {
            ItemRecord::new(&format!("a{i}"), &format!("R{}", i % 2), t, 1.0 + i as f64, 10)
        }))
        .unwrap()
    }

    fn generated(cat: &Catalog, target: u64) -> (Model, SelectionVars) {
        let mut b = ModelBuilder::new("t");
        let vars = SelectionVars::create(&mut b, cat).unwrap();
        ConstraintGenerator::new(cat, &vars).generate_all(&mut b, target).unwrap();
        b.set_objective(LinearExpr::zero()).unwrap();
        (b.build().unwrap(), vars)
    }

    #[test]
    fn test_family_sizes_and_names() {
        let cat = catalog_of(&["P", "P", "Q", "Q"]);
        let (m, _) = generated(&cat, 300);
        // 2 reporters, 2 types: C1 + C5 per reporter, C3 + C4 + C6.1 + C6.2 per type, one C2
        assert_eq!(m.constraints().len(), 2 * 2 + 4 * 2 + 1);
        for name in ["C1_0_R0", "C1_1_R1", "C2", "C3_1_Q", "C4_0_P", "C5_1_R1", "C6.1_0_P", "C6.2_1_Q"] {
            assert!(m.constraint(name).is_some(), "missing {name}");
        }
        let c2 = m.constraint("C2").unwrap();
        assert_eq!(c2.sense(), Sense::Ge);
        assert_eq!(c2.rhs(), 300.0);
    }

    #[test]
    fn test_coverage_uses_incidence() {
        let cat = catalog_of(&["P", "Q", "P"]);
        let (m, vars) = generated(&cat, 0);
        let c3 = m.constraint("C3_0_P").unwrap();
        assert_eq!(c3.expr().coeff(vars.select[0]), 1.0);
        assert_eq!(c3.expr().coeff(vars.select[1]), 0.0);
        assert_eq!(c3.expr().coeff(vars.select[2]), 1.0);
        assert_eq!((c3.sense(), c3.rhs()), (Sense::Ge, 1.0));

        let c1 = m.constraint("C1_1_R1").unwrap();
        assert_eq!(c1.expr().terms().count(), 1);
        assert_eq!(c1.expr().coeff(vars.select[1]), 1.0);
    }

    #[test]
    fn test_diversity_floor_coefficients() {
        let cat = catalog_of(&["P", "Q", "P", "Q"]);
        let (m, vars) = generated(&cat, 0);
        let c4 = m.constraint("C4_0_P").unwrap();
        assert_eq!(c4.expr().coeff(vars.select[0]), -1.0);
        assert_eq!(c4.expr().coeff(vars.select[1]), 1.0);
        assert_eq!((c4.sense(), c4.rhs()), (Sense::Ge, 0.0));
        // three of type P out of four breaks the floor
        let value = |v: VarId| if vars.select.contains(&v) && v != vars.select[3] { 1.0 } else { 0.0 };
        assert!(!c4.holds(value, 1e-9));
    }

    #[rstest]
    fn test_overflow_accounting_tracks_count(#[values(0usize, 1, 2, 3)] picked: usize) {
        let cat = catalog_of(&["P", "Q", "P", "Q", "P", "Q"]);
        let (m, vars) = generated(&cat, 0);
        let c5 = m.constraint("C5_0_R0").unwrap();
        assert_eq!((c5.sense(), c5.rhs()), (Sense::Eq, 1.0));

        // reporter R0 owns items 0, 2, 4
        let chosen: Vec<VarId> = [0, 2, 4][..picked].iter().map(|&i| vars.select[i]).collect();
        let (chosen, overflow) = (&chosen, vars.overflow[0]);
        let with_overflow = |ovf: f64| {
            move |v: VarId| {
                if v == overflow {
                    ovf
                } else if chosen.contains(&v) {
                    1.0
                } else {
                    0.0
                }
            }
        };
        let exact = picked as f64 - 1.0;
        assert!(c5.holds(with_overflow(exact), 1e-9));
        assert!(!c5.holds(with_overflow(exact + 1.0), 1e-9));
        // with nothing picked only a negative overflow satisfies C5, which C1 rules out
        assert_eq!(exact < 0.0, picked == 0);
    }

    #[rstest]
    fn test_repetition_truth_table(#[values(1usize, 2, 3, 4, 6)] n: usize) {
        let cat = catalog_of(&vec!["P"; n]);
        let (m, vars) = generated(&cat, 0);
        let upper = m.constraint("C6.1_0_P").unwrap();
        let lower = m.constraint("C6.2_0_P").unwrap();
        assert_eq!(upper.expr().coeff(vars.repeat[0]), -(n as f64 - 1.0));
        assert_eq!(lower.expr().coeff(vars.repeat[0]), -2.0);

        for s in 0..=n {
            for repeat in [0.0, 1.0] {
                let value = |v: VarId| {
                    if v == vars.repeat[0] {
                        repeat
                    } else if vars.select[..s].contains(&v) {
                        1.0
                    } else {
                        0.0
                    }
                };
                let feasible = upper.holds(&value, 1e-9) && lower.holds(&value, 1e-9);
                assert_eq!(
                    feasible,
                    (repeat == 1.0) == (s >= 2),
                    "n={n} s={s} repeat={repeat}"
                );
            }
        }
    }

    #[test]
    fn test_missing_family_is_rejected() {
        let cat = catalog_of(&["P", "Q"]);
        let mut b = ModelBuilder::new("t");
        let select = b.create_selection_variables(cat.items()).unwrap();
        let vars = SelectionVars {
            select,
            overflow: vec![],
            repeat: vec![],
        };
        let gen = ConstraintGenerator::new(&cat, &vars);
        gen.coverage_per_reporter(&mut b).unwrap();
        assert_eq!(
            gen.overflow_accounting(&mut b).unwrap_err(),
            ModelError::MissingFamily("overflow")
        );
        assert_eq!(
            gen.repetition_linearization(&mut b).unwrap_err(),
            ModelError::MissingFamily("repetition")
        );
    }
}
