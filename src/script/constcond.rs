//! Const-condition eliminator.
//!
//! Rewrites the tree in place after domain processing: conditions proven
//! always true or always false become `TRUE`/`FALSE` literals, and an `IF`
//! with a proven condition is replaced by a [`Statement::Collect`] of the
//! branch that survives (possibly empty). Rewriting owns the statement
//! slot, so the replacement installs a new subtree and recursion continues
//! inside it.

use crate::script::ast::{Cond, CondKind, Event, Statement};

/// Remove every always-true/false condition and `IF` across all events.
pub fn const_cond_process(events: &mut [Event]) {
    for event in events {
        for stmt in event.iter_mut() {
            process_statement(stmt);
        }
    }
}

fn process_statement(stmt: &mut Statement) {
    match stmt {
        Statement::Assign { .. } | Statement::Pays { .. } => {}
        Statement::Collect(stmts) => {
            for s in stmts {
                process_statement(s);
            }
        }
        Statement::If(block) => match block.fixed {
            Some(true) => {
                let kept = std::mem::take(&mut block.then_branch);
                *stmt = Statement::Collect(kept);
                process_statement(stmt);
            }
            Some(false) => {
                let kept = block.else_branch.take().unwrap_or_default();
                *stmt = Statement::Collect(kept);
                process_statement(stmt);
            }
            None => {
                process_cond(&mut block.cond);
                for s in &mut block.then_branch {
                    process_statement(s);
                }
                if let Some(else_branch) = &mut block.else_branch {
                    for s in else_branch {
                        process_statement(s);
                    }
                }
            }
        },
    }
}

fn process_cond(cond: &mut Cond) {
    match cond.fixed {
        Some(value) => *cond = Cond::truth(value),
        None => match &mut cond.kind {
            CondKind::Not(inner) => process_cond(inner),
            CondKind::And(a, b) | CondKind::Or(a, b) => {
                process_cond(a);
                process_cond(b);
            }
            CondKind::True
            | CondKind::False
            | CondKind::Equal(..)
            | CondKind::Sup(..)
            | CondKind::SupEqual(..) => {}
        },
    }
}
