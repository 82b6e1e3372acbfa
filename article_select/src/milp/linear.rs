use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Coefficients at or below this magnitude are dropped from an expression.
const ZERO_EPS: f64 = 1e-12;

/// Handle of a decision variable inside one model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VarId(pub(crate) usize);

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinearExpr {
    pub(crate) terms: BTreeMap<VarId, f64>,
    pub(crate) constant: f64,
}

impl LinearExpr {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_const(v: f64) -> Self {
        Self {
            terms: BTreeMap::new(),
            constant: v,
        }
    }

    pub fn from_var(v: VarId, c: f64) -> Self {
        let mut e = Self::zero();
        e.add_term(v, c);
        e
    }

    /// Sum of `coeff * var` over the given pairs.
    pub fn weighted_sum(pairs: impl IntoIterator<Item = (VarId, f64)>) -> Self {
        let mut e = Self::zero();
        for (v, c) in pairs {
            e.add_term(v, c);
        }
        e
    }

    /// Add `c * v`. Only the touched entry is inspected, so a coefficient
    /// that cancels to zero disappears without rescanning the expression.
    pub fn add_term(&mut self, v: VarId, c: f64) {
        match self.terms.entry(v) {
            Entry::Vacant(slot) => {
                if c.abs() > ZERO_EPS {
                    slot.insert(c);
                }
            }
            Entry::Occupied(mut slot) => {
                *slot.get_mut() += c;
                if slot.get().abs() <= ZERO_EPS {
                    slot.remove();
                }
            }
        }
    }

    /// `self += sign * other`.
    fn merge(&mut self, other: &LinearExpr, sign: f64) {
        self.constant += sign * other.constant;
        for (&v, &c) in &other.terms {
            self.add_term(v, sign * c);
        }
    }

    pub fn scale(&self, k: f64) -> Self {
        let mut e = Self::from_const(self.constant * k);
        for (&v, &c) in &self.terms {
            e.add_term(v, c * k);
        }
        e
    }

    pub fn add(mut self, other: LinearExpr) -> LinearExpr {
        self.merge(&other, 1.0);
        self
    }

    pub fn sub(mut self, other: LinearExpr) -> LinearExpr {
        self.merge(&other, -1.0);
        self
    }

    pub fn coeff(&self, v: VarId) -> f64 {
        self.terms.get(&v).copied().unwrap_or(0.0)
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn terms(&self) -> impl Iterator<Item = (VarId, f64)> + '_ {
        self.terms.iter().map(|(v, c)| (*v, *c))
    }

    /// Value of the expression under an assignment.
    pub fn evaluate(&self, value: impl Fn(VarId) -> f64) -> f64 {
        self.terms
            .iter()
            .fold(self.constant, |acc, (v, c)| acc + c * value(*v))
    }

    pub fn leq(self, rhs: f64) -> Relation {
        Relation::new(self, Sense::Le, rhs)
    }

    pub fn geq(self, rhs: f64) -> Relation {
        Relation::new(self, Sense::Ge, rhs)
    }

    pub fn equals(self, rhs: f64) -> Relation {
        Relation::new(self, Sense::Eq, rhs)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sense {
    Le,
    Ge,
    Eq,
}

/// `expr <sense> rhs`, with every constant of `expr` already moved to `rhs`.
#[derive(Clone, Debug, PartialEq)]
pub struct Relation {
    pub(crate) expr: LinearExpr,
    pub(crate) sense: Sense,
    pub(crate) rhs: f64,
}

impl Relation {
    fn new(mut expr: LinearExpr, sense: Sense, rhs: f64) -> Self {
        let rhs = rhs - expr.constant;
        expr.constant = 0.0;
        Self { expr, sense, rhs }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    pub(crate) name: String,
    pub(crate) expr: LinearExpr,
    pub(crate) sense: Sense,
    pub(crate) rhs: f64,
}

impl Constraint {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expr(&self) -> &LinearExpr {
        &self.expr
    }

    pub fn sense(&self) -> Sense {
        self.sense
    }

    pub fn rhs(&self) -> f64 {
        self.rhs
    }

    /// Whether the assignment satisfies the constraint within `tol`.
    pub fn holds(&self, value: impl Fn(VarId) -> f64, tol: f64) -> bool {
        let lhs = self.expr.evaluate(value);
        match self.sense {
            Sense::Le => lhs <= self.rhs + tol,
            Sense::Ge => lhs >= self.rhs - tol,
            Sense::Eq => (lhs - self.rhs).abs() <= tol,
        }
    }
}
