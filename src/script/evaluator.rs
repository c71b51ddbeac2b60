//! Sharp tree evaluator.
//!
//! Direct match-dispatch walk over the statement trees for one path.
//! Conditions produce plain booleans; `AND`/`OR` short-circuit left to
//! right. Evaluation is total: out-of-domain math follows IEEE semantics
//! and propagates through the accumulated variables.

use crate::script::ast::{Cond, CondKind, Expr, ExprKind, Statement};
use crate::script::scenario::SimulData;

/// Arithmetic scalar the evaluators run on. `f64` is the stock
/// instantiation; an AD number type can implement this to differentiate
/// through a script, exposing its primal via [`Scalar::val`] for
/// branching decisions.
pub trait Scalar:
    Copy
    + PartialOrd
    + std::ops::Add<Output = Self>
    + std::ops::Sub<Output = Self>
    + std::ops::Mul<Output = Self>
    + std::ops::Div<Output = Self>
    + std::ops::Neg<Output = Self>
    + std::ops::AddAssign
    + std::ops::SubAssign
    + std::ops::MulAssign
    + std::ops::DivAssign
{
    fn from_f64(x: f64) -> Self;
    /// Primal value, used wherever control flow needs a plain number.
    fn val(self) -> f64;
    fn ln(self) -> Self;
    fn sqrt(self) -> Self;
    fn powf(self, exponent: Self) -> Self;

    fn max(self, other: Self) -> Self {
        if self.val() < other.val() {
            other
        } else {
            self
        }
    }

    fn min(self, other: Self) -> Self {
        if self.val() > other.val() {
            other
        } else {
            self
        }
    }
}

impl Scalar for f64 {
    #[inline]
    fn from_f64(x: f64) -> Self {
        x
    }

    #[inline]
    fn val(self) -> f64 {
        self
    }

    #[inline]
    fn ln(self) -> Self {
        f64::ln(self)
    }

    #[inline]
    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }

    #[inline]
    fn powf(self, exponent: Self) -> Self {
        f64::powf(self, exponent)
    }
}

/// Per-path evaluator over one event's statements; implemented by the
/// sharp and fuzzy tree walkers so the product can drive either.
pub trait PathEvaluator<T: Scalar> {
    /// Reset variables to zero before a new scenario.
    fn init(&mut self);
    /// Execute one event's statements against that date's market data.
    fn eval_event(&mut self, statements: &[Statement], data: &SimulData<T>);
    /// Variable values after evaluation, in index order.
    fn var_vals(&self) -> &[T];
}

/// Sharp (non-fuzzy) evaluator.
#[derive(Debug, Clone)]
pub struct Evaluator<T> {
    variables: Vec<T>,
}

impl<T: Scalar> Evaluator<T> {
    pub fn new(num_vars: usize) -> Self {
        Self { variables: vec![T::from_f64(0.0); num_vars] }
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
            Statement::If(block) => {
                if eval_cond(&block.cond, &self.variables, data) {
                    for s in &block.then_branch {
                        self.statement(s, data);
                    }
                } else if let Some(else_branch) = &block.else_branch {
                    for s in else_branch {
                        self.statement(s, data);
                    }
                }
            }
            Statement::Collect(stmts) => {
                for s in stmts {
                    self.statement(s, data);
                }
            }
        }
    }
}

impl<T: Scalar> PathEvaluator<T> for Evaluator<T> {
    fn init(&mut self) {
        for v in &mut self.variables {
            *v = T::from_f64(0.0);
        }
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

/// Shared expression walk, also used by the fuzzy evaluator.
pub(crate) fn eval_expr<T: Scalar>(expr: &Expr, vars: &[T], data: &SimulData<T>) -> T {
    match &expr.kind {
        ExprKind::Add(a, b) => eval_expr(a, vars, data) + eval_expr(b, vars, data),
        ExprKind::Sub(a, b) => eval_expr(a, vars, data) - eval_expr(b, vars, data),
        ExprKind::Mult(a, b) => eval_expr(a, vars, data) * eval_expr(b, vars, data),
        ExprKind::Div(a, b) => eval_expr(a, vars, data) / eval_expr(b, vars, data),
        ExprKind::Pow(a, b) => eval_expr(a, vars, data).powf(eval_expr(b, vars, data)),
        ExprKind::Max(a, b) => eval_expr(a, vars, data).max(eval_expr(b, vars, data)),
        ExprKind::Min(a, b) => eval_expr(a, vars, data).min(eval_expr(b, vars, data)),
        ExprKind::Uplus(a) => eval_expr(a, vars, data),
        ExprKind::Uminus(a) => -eval_expr(a, vars, data),
        ExprKind::Log(a) => eval_expr(a, vars, data).ln(),
        ExprKind::Sqrt(a) => eval_expr(a, vars, data).sqrt(),
        ExprKind::Smooth { x, v_pos, v_neg, eps } => {
            let x = eval_expr(x, vars, data);
            let half_eps = T::from_f64(0.5) * eval_expr(eps, vars, data);

            // Evaluate only the branch the condition lands in; both only
            // inside the smoothing band.
            if x.val() < -half_eps.val() {
                eval_expr(v_neg, vars, data)
            } else if x.val() > half_eps.val() {
                eval_expr(v_pos, vars, data)
            } else {
                let pos = eval_expr(v_pos, vars, data);
                let neg = eval_expr(v_neg, vars, data);
                neg + T::from_f64(0.5) * (pos - neg) * (x + half_eps) / half_eps
            }
        }
        ExprKind::Spot => data.spot,
        ExprKind::Var(v) => vars[v.index],
        ExprKind::Const(value) => T::from_f64(*value),
    }
}

fn eval_cond<T: Scalar>(cond: &Cond, vars: &[T], data: &SimulData<T>) -> bool {
    match &cond.kind {
        CondKind::True => true,
        CondKind::False => false,
        CondKind::Not(inner) => !eval_cond(inner, vars, data),
        CondKind::And(a, b) => eval_cond(a, vars, data) && eval_cond(b, vars, data),
        CondKind::Or(a, b) => eval_cond(a, vars, data) || eval_cond(b, vars, data),
        CondKind::Equal(e, _) => eval_expr(e, vars, data).val() == 0.0,
        CondKind::Sup(e, _) => eval_expr(e, vars, data).val() > 0.0,
        CondKind::SupEqual(e, _) => eval_expr(e, vars, data).val() >= 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parser::parse_event;

    fn eval_one(src: &str, spot: f64, numeraire: f64) -> Vec<f64> {
        let mut events = vec![parse_event(src).unwrap()];
        let names = crate::script::indexer::index_variables(&mut events);
        let mut eval: Evaluator<f64> = Evaluator::new(names.len());
        eval.init();
        eval.eval_event(&events[0], &SimulData { spot, numeraire });
        eval.var_vals().to_vec()
    }

    #[test]
    fn assign_and_arithmetic() {
        let vals = eval_one("x = 2 * spot + 1", 100.0, 1.0);
        assert_eq!(vals, [201.0]);
    }

    #[test]
    fn pays_accumulates_discounted() {
        let vals = eval_one("x PAYS 10 x PAYS 10", 0.0, 2.0);
        assert_eq!(vals, [10.0]);
    }

    #[test]
    fn if_else_branches() {
        let vals = eval_one("if spot > 100 then x = 1 else x = 2 endif", 150.0, 1.0);
        assert_eq!(vals, [1.0]);
        let vals = eval_one("if spot > 100 then x = 1 else x = 2 endif", 50.0, 1.0);
        assert_eq!(vals, [2.0]);
    }

    #[test]
    fn boundary_comparisons() {
        // `>` is strict, `>=` is not.
        let vals = eval_one("if spot > 100 then x = 1 endif", 100.0, 1.0);
        assert_eq!(vals, [0.0]);
        let vals = eval_one("if spot >= 100 then x = 1 endif", 100.0, 1.0);
        assert_eq!(vals, [1.0]);
    }

    #[test]
    fn and_or_not() {
        let src = "if spot > 50 and not (spot > 150) then x = 1 endif";
        assert_eq!(eval_one(src, 100.0, 1.0), [1.0]);
        assert_eq!(eval_one(src, 200.0, 1.0), [0.0]);
    }

    #[test]
    fn min_max_pow() {
        let vals = eval_one("x = max(spot - 100, 0) y = min(spot, 120) z = 2 ^ 3", 130.0, 1.0);
        assert_eq!(vals, [30.0, 120.0, 8.0]);
    }

    #[test]
    fn division_by_zero_is_ieee() {
        let vals = eval_one("x = 1 / 0", 0.0, 1.0);
        assert!(vals[0].is_infinite());
        let vals = eval_one("x = log(0 - 1)", 0.0, 1.0);
        assert!(vals[0].is_nan());
    }

    #[test]
    fn smooth_blends_inside_band() {
        // x = 0 is mid-band: halfway between v_neg and v_pos.
        let vals = eval_one("x = smooth(spot - 100, 10, 20, 2)", 100.0, 1.0);
        assert_eq!(vals, [15.0]);
        let vals = eval_one("x = smooth(spot - 100, 10, 20, 2)", 105.0, 1.0);
        assert_eq!(vals, [10.0]);
        let vals = eval_one("x = smooth(spot - 100, 10, 20, 2)", 95.0, 1.0);
        assert_eq!(vals, [20.0]);
    }

    #[test]
    fn variables_persist_across_statements() {
        let vals = eval_one("k = 5 x = k * 2 k = x + k", 0.0, 1.0);
        assert_eq!(vals, [15.0, 10.0]);
    }
}
