//! Variable indexer.
//!
//! Walks every statement of every event in document order and assigns a
//! dense integer index to each distinct variable name at first occurrence.
//! The returned `var_names` vector is the inverse mapping, so
//! `var_names[v.index] == v.name` for every variable node afterwards.

use std::collections::HashMap;

use crate::script::ast::{Cond, CondKind, Event, Expr, ExprKind, Statement, VarRef};

pub fn index_variables(events: &mut [Event]) -> Vec<String> {
    let mut indexer = Indexer { map: HashMap::new(), names: Vec::new() };
    for event in events {
        for stmt in event {
            indexer.statement(stmt);
        }
    }
    indexer.names
}

struct Indexer {
    map: HashMap<String, usize>,
    names: Vec<String>,
}

impl Indexer {
    fn var(&mut self, var: &mut VarRef) {
        match self.map.get(&var.name) {
            Some(&idx) => var.index = idx,
            None => {
                let idx = self.names.len();
                self.map.insert(var.name.clone(), idx);
                self.names.push(var.name.clone());
                var.index = idx;
            }
        }
    }

    fn statement(&mut self, stmt: &mut Statement) {
        match stmt {
            Statement::Assign { lhs, rhs } | Statement::Pays { lhs, rhs } => {
                self.var(lhs);
                self.expr(rhs);
            }
            Statement::If(block) => {
                self.cond(&mut block.cond);
                for s in &mut block.then_branch {
                    self.statement(s);
                }
                if let Some(else_branch) = &mut block.else_branch {
                    for s in else_branch {
                        self.statement(s);
                    }
                }
            }
            Statement::Collect(stmts) => {
                for s in stmts {
                    self.statement(s);
                }
            }
        }
    }

    fn cond(&mut self, cond: &mut Cond) {
        match &mut cond.kind {
            CondKind::True | CondKind::False => {}
            CondKind::Not(inner) => self.cond(inner),
            CondKind::And(a, b) | CondKind::Or(a, b) => {
                self.cond(a);
                self.cond(b);
            }
            CondKind::Equal(e, _) | CondKind::Sup(e, _) | CondKind::SupEqual(e, _) => {
                self.expr(e);
            }
        }
    }

    fn expr(&mut self, expr: &mut Expr) {
        match &mut expr.kind {
            ExprKind::Var(v) => self.var(v),
            ExprKind::Add(a, b)
            | ExprKind::Sub(a, b)
            | ExprKind::Mult(a, b)
            | ExprKind::Div(a, b)
            | ExprKind::Pow(a, b)
            | ExprKind::Max(a, b)
            | ExprKind::Min(a, b) => {
                self.expr(a);
                self.expr(b);
            }
            ExprKind::Uplus(a) | ExprKind::Uminus(a) | ExprKind::Log(a) | ExprKind::Sqrt(a) => {
                self.expr(a);
            }
            ExprKind::Smooth { x, v_pos, v_neg, eps } => {
                self.expr(x);
                self.expr(v_pos);
                self.expr(v_neg);
                self.expr(eps);
            }
            ExprKind::Spot | ExprKind::Const(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parser::parse_event;

    #[test]
    fn first_occurrence_order() {
        let mut events = vec![
            parse_event("y = 1 x = y + 1").unwrap(),
            parse_event("z PAYS x + y").unwrap(),
        ];
        let names = index_variables(&mut events);
        assert_eq!(names, ["Y", "X", "Z"]);
    }

    #[test]
    fn repeated_names_share_an_index() {
        let mut events = vec![parse_event("x = 1 x = x + 1").unwrap()];
        let names = index_variables(&mut events);
        assert_eq!(names, ["X"]);

        let Statement::Assign { lhs, .. } = &events[0][1] else { panic!() };
        assert_eq!(lhs.index, 0);
        let Statement::Assign { rhs, .. } = &events[0][1] else { panic!() };
        let ExprKind::Add(a, _) = &rhs.kind else { panic!() };
        let ExprKind::Var(v) = &a.kind else { panic!() };
        assert_eq!(v.index, 0);
    }

    #[test]
    fn condition_variables_are_indexed() {
        let mut events = vec![parse_event("if alive > 0 then x = 1 endif").unwrap()];
        let names = index_variables(&mut events);
        assert_eq!(names, ["ALIVE", "X"]);
    }
}
