//! Constant folder.
//!
//! Bottom-up pass marking every expression that provably evaluates to the
//! same value on every path, so the compiler can collapse it to a single
//! constant load. Variables start as constants with value 0; an assignment
//! outside any `IF` with a constant right-hand side keeps the variable
//! constant. Anything else makes it non-constant from then on: a
//! conditional assignment, or a payment, whose numeraire is stochastic.
//!
//! Boolean nodes are left alone; dead conditions are the domain
//! processor's job.

use crate::script::ast::{Event, Expr, ExprKind, Statement};

pub fn const_process(events: &mut [Event], num_vars: usize) {
    let mut proc = ConstProcessor {
        var_const: vec![true; num_vars],
        var_const_val: vec![0.0; num_vars],
        in_conditional: false,
    };
    for event in events {
        for stmt in event {
            proc.statement(stmt);
        }
    }
}

struct ConstProcessor {
    var_const: Vec<bool>,
    var_const_val: Vec<f64>,
    in_conditional: bool,
}

impl ConstProcessor {
    fn statement(&mut self, stmt: &mut Statement) {
        match stmt {
            Statement::Assign { lhs, rhs } => {
                self.expr(rhs);
                if !self.in_conditional {
                    match rhs.const_val {
                        Some(v) => {
                            self.var_const[lhs.index] = true;
                            self.var_const_val[lhs.index] = v;
                        }
                        None => self.var_const[lhs.index] = false,
                    }
                } else {
                    self.var_const[lhs.index] = false;
                }
            }
            Statement::Pays { lhs, rhs } => {
                self.var_const[lhs.index] = false;
                self.expr(rhs);
            }
            Statement::If(block) => {
                let nested = self.in_conditional;
                self.in_conditional = true;

                self.cond_exprs(&mut block.cond);
                for s in &mut block.then_branch {
                    self.statement(s);
                }
                if let Some(else_branch) = &mut block.else_branch {
                    for s in else_branch {
                        self.statement(s);
                    }
                }

                self.in_conditional = nested;
            }
            Statement::Collect(stmts) => {
                for s in stmts {
                    self.statement(s);
                }
            }
        }
    }

    /// Comparison arguments are expressions too and fold the same way.
    fn cond_exprs(&mut self, cond: &mut crate::script::ast::Cond) {
        use crate::script::ast::CondKind;
        match &mut cond.kind {
            CondKind::True | CondKind::False => {}
            CondKind::Not(inner) => self.cond_exprs(inner),
            CondKind::And(a, b) | CondKind::Or(a, b) => {
                self.cond_exprs(a);
                self.cond_exprs(b);
            }
            CondKind::Equal(e, _) | CondKind::Sup(e, _) | CondKind::SupEqual(e, _) => {
                self.expr(e);
            }
        }
    }

    fn expr(&mut self, expr: &mut Expr) {
        expr.const_val = match &mut expr.kind {
            ExprKind::Add(a, b) => self.binary(a, b, |x, y| x + y),
            ExprKind::Sub(a, b) => self.binary(a, b, |x, y| x - y),
            ExprKind::Mult(a, b) => self.binary(a, b, |x, y| x * y),
            ExprKind::Div(a, b) => self.binary(a, b, |x, y| x / y),
            ExprKind::Pow(a, b) => self.binary(a, b, f64::powf),
            ExprKind::Max(a, b) => self.binary(a, b, f64::max),
            ExprKind::Min(a, b) => self.binary(a, b, f64::min),
            ExprKind::Uplus(a) => self.unary(a, |x| x),
            ExprKind::Uminus(a) => self.unary(a, |x| -x),
            ExprKind::Log(a) => self.unary(a, f64::ln),
            ExprKind::Sqrt(a) => self.unary(a, f64::sqrt),
            ExprKind::Smooth { x, v_pos, v_neg, eps } => {
                self.expr(x);
                self.expr(v_pos);
                self.expr(v_neg);
                self.expr(eps);
                match (x.const_val, v_pos.const_val, v_neg.const_val, eps.const_val) {
                    (Some(x), Some(pos), Some(neg), Some(eps)) => {
                        Some(smooth_value(x, pos, neg, eps))
                    }
                    _ => None,
                }
            }
            ExprKind::Spot => None,
            ExprKind::Var(v) => {
                if self.var_const[v.index] {
                    Some(self.var_const_val[v.index])
                } else {
                    None
                }
            }
            ExprKind::Const(value) => Some(*value),
        };
    }

    fn binary(&mut self, a: &mut Expr, b: &mut Expr, op: impl Fn(f64, f64) -> f64) -> Option<f64> {
        self.expr(a);
        self.expr(b);
        match (a.const_val, b.const_val) {
            (Some(x), Some(y)) => Some(op(x, y)),
            _ => None,
        }
    }

    fn unary(&mut self, a: &mut Expr, op: impl Fn(f64) -> f64) -> Option<f64> {
        self.expr(a);
        a.const_val.map(op)
    }
}

/// Closed-form value of the fuzzy blend for constant arguments.
pub(crate) fn smooth_value(x: f64, v_pos: f64, v_neg: f64, eps: f64) -> f64 {
    let half_eps = 0.5 * eps;
    if x < -half_eps {
        v_neg
    } else if x > half_eps {
        v_pos
    } else {
        v_neg + 0.5 * (v_pos - v_neg) * (x + half_eps) / half_eps
    }
}
