//! Fuzzy tree evaluator.
//!
//! Conditions return a degree of truth in `[0, 1]` instead of a boolean:
//! equalities evaluate a butterfly around zero, inequalities a call
//! spread, with widths taken from the comparison's domain-derived bounds
//! (discrete case) or its epsilon (continuous case, falling back to the
//! evaluator default). `NOT` complements, `AND` multiplies, `OR` is the
//! probabilistic sum; both sides always evaluate.
//!
//! An `IF` whose degree of truth is strictly between the cutoffs runs both
//! branches and linearly blends every affected variable. The nested-if
//! depth from the if-scope analyzer sizes the per-level save slots.

use crate::script::ast::{CompInfo, Cond, CondKind, Statement};
use crate::script::evaluator::{eval_expr, PathEvaluator, Scalar};
use crate::script::scenario::SimulData;

const EPS: f64 = 1.0e-12;
const ONE_MINUS_EPS: f64 = 1.0 - 1.0e-12;

#[derive(Debug, Clone)]
pub struct FuzzyEvaluator<T> {
    variables: Vec<T>,
    /// Default smoothing width for comparisons without their own epsilon.
    def_eps: f64,
    /// Pre-if variable snapshots, `[nest_level][var_index]`.
    var_store0: Vec<Vec<T>>,
    /// Post-then variable snapshots, same layout.
    var_store1: Vec<Vec<T>>,
    nested_lvl: usize,
}

impl<T: Scalar> FuzzyEvaluator<T> {
    /// `max_nested_ifs` comes from the if-scope analyzer; a blended if at
    /// depth `d` uses save-slot row `d - 1`.
    pub fn new(num_vars: usize, max_nested_ifs: usize, def_eps: f64) -> Self {
        Self {
            variables: vec![T::from_f64(0.0); num_vars],
            def_eps,
            var_store0: vec![vec![T::from_f64(0.0); num_vars]; max_nested_ifs],
            var_store1: vec![vec![T::from_f64(0.0); num_vars]; max_nested_ifs],
            nested_lvl: 0,
        }
    }

    pub fn set_def_eps(&mut self, def_eps: f64) {
        self.def_eps = def_eps;
    }

    fn statement(&mut self, stmt: &Statement, data: &SimulData<T>) {
        match stmt {
            Statement::Assign { lhs, rhs } => {
                self.variables[lhs.index] = eval_expr(rhs, &self.variables, data);
            }
            Statement::Pays { lhs, rhs } => {
                let value = eval_expr(rhs, &self.variables, data);
                self.variables[lhs.index] += value / data.numeraire;
            }
            Statement::If(block) => self.eval_if(block, data),
            Statement::Collect(stmts) => {
                for s in stmts {
                    self.statement(s, data);
                }
            }
        }
    }

    fn eval_if(&mut self, block: &crate::script::ast::IfBlock, data: &SimulData<T>) {
        self.nested_lvl += 1;
        let dt = self.cond_dt(&block.cond, data);

        if dt.val() > ONE_MINUS_EPS {
            for s in &block.then_branch {
                self.statement(s, data);
            }
        } else if dt.val() < EPS {
            if let Some(else_branch) = &block.else_branch {
                for s in else_branch {
                    self.statement(s, data);
                }
            }
        } else {
            let level = self.nested_lvl - 1;

            for &idx in &block.affected_vars {
                self.var_store0[level][idx] = self.variables[idx];
            }

            for s in &block.then_branch {
                self.statement(s, data);
            }

            for &idx in &block.affected_vars {
                self.var_store1[level][idx] = self.variables[idx];
                self.variables[idx] = self.var_store0[level][idx];
            }

            if let Some(else_branch) = &block.else_branch {
                for s in else_branch {
                    self.statement(s, data);
                }
            }

            let one = T::from_f64(1.0);
            for &idx in &block.affected_vars {
                self.variables[idx] =
                    dt * self.var_store1[level][idx] + (one - dt) * self.variables[idx];
            }
        }

        self.nested_lvl -= 1;
    }

    fn cond_dt(&mut self, cond: &Cond, data: &SimulData<T>) -> T {
        match &cond.kind {
            CondKind::True => T::from_f64(1.0),
            CondKind::False => T::from_f64(0.0),
            CondKind::Not(inner) => T::from_f64(1.0) - self.cond_dt(inner, data),
            CondKind::And(a, b) => {
                let da = self.cond_dt(a, data);
                let db = self.cond_dt(b, data);
                da * db
            }
            CondKind::Or(a, b) => {
                let da = self.cond_dt(a, data);
                let db = self.cond_dt(b, data);
                da + db - da * db
            }
            CondKind::Equal(e, info) => {
                let x = eval_expr(e, &self.variables, data);
                if info.discrete {
                    b_fly_bounds(x, info.lb, info.rb)
                } else {
                    b_fly(x, self.effective_eps(info))
                }
            }
            CondKind::Sup(e, info) | CondKind::SupEqual(e, info) => {
                let x = eval_expr(e, &self.variables, data);
                if info.discrete {
                    c_spr_bounds(x, info.lb, info.rb)
                } else {
                    c_spr(x, self.effective_eps(info))
                }
            }
        }
    }

    fn effective_eps(&self, info: &CompInfo) -> f64 {
        if info.eps < 0.0 {
            self.def_eps
        } else {
            info.eps
        }
    }
}

impl<T: Scalar> PathEvaluator<T> for FuzzyEvaluator<T> {
    fn init(&mut self) {
        for v in &mut self.variables {
            *v = T::from_f64(0.0);
        }
        self.nested_lvl = 0;
    }

    fn eval_event(&mut self, statements: &[Statement], data: &SimulData<T>) {
        for stmt in statements {
            self.statement(stmt, data);
        }
    }

    fn var_vals(&self) -> &[T] {
        &self.variables
    }
}

/// Call spread over `(-eps/2, +eps/2)`.
fn c_spr<T: Scalar>(x: T, eps: f64) -> T {
    let half_eps = 0.5 * eps;
    if x.val() < -half_eps {
        T::from_f64(0.0)
    } else if x.val() > half_eps {
        T::from_f64(1.0)
    } else {
        (x + T::from_f64(half_eps)) / T::from_f64(eps)
    }
}

/// Call spread over `(lb, rb)`.
fn c_spr_bounds<T: Scalar>(x: T, lb: f64, rb: f64) -> T {
    if x.val() < lb {
        T::from_f64(0.0)
    } else if x.val() > rb {
        T::from_f64(1.0)
    } else {
        (x - T::from_f64(lb)) / T::from_f64(rb - lb)
    }
}

/// Butterfly over `(-eps/2, +eps/2)`, peaking at 1 in zero.
fn b_fly<T: Scalar>(x: T, eps: f64) -> T {
    let half_eps = 0.5 * eps;
    if x.val() < -half_eps || x.val() > half_eps {
        T::from_f64(0.0)
    } else if x.val() < 0.0 {
        T::from_f64(1.0) + x / T::from_f64(half_eps)
    } else {
        T::from_f64(1.0) - x / T::from_f64(half_eps)
    }
}

/// Butterfly over `(lb, 0, rb)`.
fn b_fly_bounds<T: Scalar>(x: T, lb: f64, rb: f64) -> T {
    if x.val() < lb || x.val() > rb {
        T::from_f64(0.0)
    } else if x.val() < 0.0 {
        T::from_f64(1.0) - x / T::from_f64(lb)
    } else {
        T::from_f64(1.0) - x / T::from_f64(rb)
    }
}
