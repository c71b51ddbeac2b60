//! If-scope analyzer.
//!
//! Computes, for every `IF` block, the set of variables it can touch:
//! left-hand sides of assignments and payments in either branch, nested
//! ifs included, plus variables read by the condition. Also surfaces the
//! maximum nesting depth. The fuzzy evaluator preallocates one save slot
//! per variable per nesting level from these results.
//!
//! The variable indexer must have run first.

use std::collections::BTreeSet;

use crate::script::ast::{Cond, CondKind, Event, Expr, ExprKind, Statement};

/// Annotate every `IfBlock` with its `affected_vars` and return the maximum
/// nesting depth observed across all events.
pub fn if_process(events: &mut [Event]) -> usize {
    let mut proc = IfProcessor { var_stack: Vec::new(), max_nested: 0 };
    for event in events {
        for stmt in event {
            proc.statement(stmt);
        }
    }
    proc.max_nested
}

struct IfProcessor {
    /// Top entry collects the variables touched by the innermost open `IF`.
    var_stack: Vec<BTreeSet<usize>>,
    max_nested: usize,
}

impl IfProcessor {
    fn in_if(&self) -> bool {
        !self.var_stack.is_empty()
    }

    fn record(&mut self, index: usize) {
        if let Some(top) = self.var_stack.last_mut() {
            top.insert(index);
        }
    }

    fn statement(&mut self, stmt: &mut Statement) {
        match stmt {
            Statement::Assign { lhs, .. } | Statement::Pays { lhs, .. } => {
                // Only the written variable matters; right-hand-side reads
                // need no save slot.
                if self.in_if() {
                    self.record(lhs.index);
                }
            }
            Statement::If(block) => {
                self.var_stack.push(BTreeSet::new());
                self.max_nested = self.max_nested.max(self.var_stack.len());

                self.cond(&block.cond);
                for s in &mut block.then_branch {
                    self.statement(s);
                }
                if let Some(else_branch) = &mut block.else_branch {
                    for s in else_branch {
                        self.statement(s);
                    }
                }

                let touched = self.var_stack.pop().expect("pushed above");
                block.affected_vars = touched.iter().copied().collect();

                // A nested if's variables are also touched by the if around it.
                if let Some(outer) = self.var_stack.last_mut() {
                    outer.extend(touched);
                }
            }
            Statement::Collect(stmts) => {
                for s in stmts {
                    self.statement(s);
                }
            }
        }
    }

    fn cond(&mut self, cond: &Cond) {
        if !self.in_if() {
            return;
        }
        match &cond.kind {
            CondKind::True | CondKind::False => {}
            CondKind::Not(inner) => self.cond(inner),
            CondKind::And(a, b) | CondKind::Or(a, b) => {
                self.cond(a);
                self.cond(b);
            }
            CondKind::Equal(e, _) | CondKind::Sup(e, _) | CondKind::SupEqual(e, _) => {
                self.expr_vars(e);
            }
        }
    }

    fn expr_vars(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Var(v) => self.record(v.index),
            ExprKind::Add(a, b)
            | ExprKind::Sub(a, b)
            | ExprKind::Mult(a, b)
            | ExprKind::Div(a, b)
            | ExprKind::Pow(a, b)
            | ExprKind::Max(a, b)
            | ExprKind::Min(a, b) => {
                self.expr_vars(a);
                self.expr_vars(b);
            }
            ExprKind::Uplus(a) | ExprKind::Uminus(a) | ExprKind::Log(a) | ExprKind::Sqrt(a) => {
                self.expr_vars(a);
            }
            ExprKind::Smooth { x, v_pos, v_neg, eps } => {
                self.expr_vars(x);
                self.expr_vars(v_pos);
                self.expr_vars(v_neg);
                self.expr_vars(eps);
            }
            ExprKind::Spot | ExprKind::Const(_) => {}
        }
    }
}
