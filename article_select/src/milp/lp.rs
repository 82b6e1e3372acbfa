//! CPLEX-LP rendering of a built model (readable by SCIP, CBC, HiGHS).

use std::fmt::Write;

use crate::milp::builder::{Model, VarDomain};
use crate::milp::linear::{LinearExpr, Sense};

impl Sense {
    fn lp_symbol(self) -> &'static str {
        match self {
            Sense::Le => "<=",
            Sense::Ge => ">=",
            Sense::Eq => "=",
        }
    }
}

impl Model {
    pub fn to_lp_string(&self) -> String {
        let mut out = format!("Minimize\n obj: {}\nSubject To\n", self.lp_terms(self.objective()));
        // writing into a String cannot fail
        for c in self.constraints() {
            let _ = writeln!(
                out,
                " {}: {} {} {}",
                c.name(),
                self.lp_terms(c.expr()),
                c.sense().lp_symbol(),
                lp_number(c.rhs(), false)
            );
        }
        for (header, domain) in [("Binary", VarDomain::Binary), ("General", VarDomain::NonNegInteger)] {
            out.push_str(header);
            out.push('\n');
            for (_, d) in self.vars().filter(|(_, d)| d.domain() == domain) {
                let _ = writeln!(out, " {}", d.name());
            }
        }
        out.push_str("End\n");
        out
    }

    /// `+c name` pairs; an empty expression renders as `+0`.
    fn lp_terms(&self, e: &LinearExpr) -> String {
        let rendered: Vec<String> = e
            .terms()
            .map(|(v, c)| format!("{} {}", lp_number(c, true), self.var(v).name()))
            .collect();
        if rendered.is_empty() {
            "+0".to_string()
        } else {
            rendered.join(" ")
        }
    }
}

/// Integral values print without decimals; `signed` forces a leading `+`.
fn lp_number(v: f64, signed: bool) -> String {
    let integral = (v - v.round()).abs() < 1e-9;
    match (integral, signed) {
        (true, true) => format!("{:+}", v.round() as i64),
        (true, false) => format!("{}", v.round() as i64),
        (false, true) => format!("{:+.6}", v),
        (false, false) => format!("{:.6}", v),
    }
}
