//! Domain processor.
//!
//! Abstract interpretation over the [`Domain`] algebra: infers the
//! reachable value-set of every expression and variable, marks conditions
//! that are always true or always false, and, in fuzzy mode, classifies
//! each comparison as continuous or discrete and computes its
//! interpolation bounds around zero.
//!
//! The goal is to tell singletons apart from continuous ranges, not to
//! compute tight ranges: `{0} * (-inf, +inf)` is `{0}`, but two full-line
//! operands widen to the full line even if they happen to be equal.
//!
//! Variable indexer and if-scope analyzer must have run first.

use tracing::debug;

use crate::core::{ScriptError, ScriptResult};
use crate::domain::{Bound, Domain, Interval};
use crate::script::ast::{CompInfo, Cond, CondKind, Event, Expr, ExprKind, Statement};

/// Truth verdict for a condition, as far as domains can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CondProp {
    AlwaysTrue,
    AlwaysFalse,
    Either,
}

/// Run domain inference over all events. `fuzzy` additionally fills the
/// comparison smoothing metadata.
pub fn domain_process(events: &mut [Event], num_vars: usize, fuzzy: bool) -> ScriptResult<()> {
    let mut proc = DomainProcessor {
        fuzzy,
        // Every variable starts as the singleton {0}.
        var_domains: vec![Domain::singleton(0.0); num_vars],
    };
    for event in events {
        for stmt in event {
            proc.statement(stmt)?;
        }
    }
    Ok(())
}

struct DomainProcessor {
    fuzzy: bool,
    var_domains: Vec<Domain>,
}

impl DomainProcessor {
    fn expr_domain(&self, expr: &Expr) -> ScriptResult<Domain> {
        let dom = match &expr.kind {
            ExprKind::Add(a, b) => &self.expr_domain(a)? + &self.expr_domain(b)?,
            ExprKind::Sub(a, b) => &self.expr_domain(a)? - &self.expr_domain(b)?,
            ExprKind::Mult(a, b) => &self.expr_domain(a)? * &self.expr_domain(b)?,
            ExprKind::Div(a, b) => &self.expr_domain(a)? / &self.expr_domain(b)?,
            ExprKind::Pow(a, b) => self.expr_domain(a)?.apply_fn2(
                f64::powf,
                &self.expr_domain(b)?,
                Interval::real_line(),
            ),
            ExprKind::Uplus(a) => self.expr_domain(a)?,
            ExprKind::Uminus(a) => -&self.expr_domain(a)?,
            ExprKind::Log(a) => self.expr_domain(a)?.apply_fn(f64::ln, Interval::real_line()),
            ExprKind::Sqrt(a) => {
                self.expr_domain(a)?.apply_fn(f64::sqrt, Interval::non_negative())
            }
            ExprKind::Max(a, b) => self.expr_domain(a)?.dmax(&self.expr_domain(b)?),
            ExprKind::Min(a, b) => self.expr_domain(a)?.dmin(&self.expr_domain(b)?),
            ExprKind::Smooth { x, v_pos, v_neg, eps } => {
                let x_dom = self.expr_domain(x)?;
                if x_dom.is_discrete() {
                    return Err(ScriptError::Domain(
                        "SMOOTH called with discrete condition expression".to_string(),
                    ));
                }
                let pos_dom = self.expr_domain(v_pos)?;
                let neg_dom = self.expr_domain(v_neg)?;
                // The epsilon's domain never shows in the result.
                let _ = self.expr_domain(eps)?;

                let lo = min_left(neg_dom.min_bound(), pos_dom.min_bound());
                let hi = max_right(neg_dom.max_bound(), pos_dom.max_bound());
                Domain::from_interval(Interval::new(lo, hi))
            }
            ExprKind::Spot => Domain::real_line(),
            ExprKind::Var(v) => self.var_domains[v.index].clone(),
            ExprKind::Const(value) => Domain::singleton(*value),
        };
        Ok(dom)
    }

    fn cond_prop(&mut self, cond: &mut Cond) -> ScriptResult<CondProp> {
        let prop = match &mut cond.kind {
            CondKind::True => CondProp::AlwaysTrue,
            CondKind::False => CondProp::AlwaysFalse,
            CondKind::Not(inner) => match self.cond_prop(inner)? {
                CondProp::AlwaysTrue => CondProp::AlwaysFalse,
                CondProp::AlwaysFalse => CondProp::AlwaysTrue,
                CondProp::Either => CondProp::Either,
            },
            CondKind::And(a, b) => {
                let pa = self.cond_prop(a)?;
                let pb = self.cond_prop(b)?;
                if pa == CondProp::AlwaysTrue && pb == CondProp::AlwaysTrue {
                    CondProp::AlwaysTrue
                } else if pa == CondProp::AlwaysFalse || pb == CondProp::AlwaysFalse {
                    CondProp::AlwaysFalse
                } else {
                    CondProp::Either
                }
            }
            CondKind::Or(a, b) => {
                let pa = self.cond_prop(a)?;
                let pb = self.cond_prop(b)?;
                if pa == CondProp::AlwaysTrue || pb == CondProp::AlwaysTrue {
                    CondProp::AlwaysTrue
                } else if pa == CondProp::AlwaysFalse && pb == CondProp::AlwaysFalse {
                    CondProp::AlwaysFalse
                } else {
                    CondProp::Either
                }
            }
            CondKind::Equal(arg, info) => {
                let dom = self.expr_domain(arg)?;
                let prop = if !dom.can_be_zero() {
                    CondProp::AlwaysFalse
                } else if !dom.can_be_nonzero() {
                    CondProp::AlwaysTrue
                } else {
                    if self.fuzzy {
                        info.discrete = dom.zero_is_discrete();
                        if info.discrete {
                            info.rb = dom.smallest_pos_lb(true).unwrap_or(0.5);
                            info.lb = dom.biggest_neg_rb(true).unwrap_or(-0.5);
                        }
                    }
                    CondProp::Either
                };
                debug!(domain = %dom, discrete = info.discrete, "equality");
                prop
            }
            CondKind::Sup(arg, info) => {
                let dom = self.expr_domain(arg)?;
                let prop = self.sup_prop(&dom, info, true);
                debug!(domain = %dom, discrete = info.discrete, "strict inequality");
                prop
            }
            CondKind::SupEqual(arg, info) => {
                let dom = self.expr_domain(arg)?;
                let prop = self.sup_prop(&dom, info, false);
                debug!(domain = %dom, discrete = info.discrete, "inequality");
                prop
            }
        };

        cond.fixed = match prop {
            CondProp::AlwaysTrue => Some(true),
            CondProp::AlwaysFalse => Some(false),
            CondProp::Either => None,
        };
        Ok(prop)
    }

    /// Shared classification for `>` (`strict`) and `>=`.
    fn sup_prop(&self, dom: &Domain, info: &mut CompInfo, strict: bool) -> CondProp {
        if !dom.can_be_positive(strict) {
            return CondProp::AlwaysFalse;
        }
        if !dom.can_be_negative(!strict) {
            return CondProp::AlwaysTrue;
        }

        if self.fuzzy {
            info.discrete = !dom.can_be_zero() || dom.zero_is_discrete();
            if info.discrete {
                if !dom.can_be_zero() {
                    // Subdomains exist on both sides of zero, otherwise the
                    // condition would have been always true or false.
                    info.rb = dom.smallest_pos_lb(true).unwrap_or(0.5);
                    info.lb = dom.biggest_neg_rb(true).unwrap_or(-0.5);
                } else if strict {
                    // {0} is a singleton: pin the false side to zero.
                    info.lb = 0.0;
                    info.rb = dom.smallest_pos_lb(true).unwrap_or(0.5);
                } else {
                    info.rb = 0.0;
                    info.lb = dom.biggest_neg_rb(true).unwrap_or(-0.5);
                }
            }
        }
        CondProp::Either
    }

    fn statement(&mut self, stmt: &mut Statement) -> ScriptResult<()> {
        match stmt {
            Statement::Assign { lhs, rhs } => {
                // Assignment overwrites the variable's domain.
                self.var_domains[lhs.index] = self.expr_domain(rhs)?;
            }
            Statement::Pays { lhs, rhs } => {
                // A payment accumulates rhs normalized by the numeraire,
                // whose domain is (0, +inf).
                let pay = &self.expr_domain(rhs)? / &Domain::positive();
                self.var_domains[lhs.index].add_domain(&pay);
            }
            Statement::If(block) => {
                let prop = self.cond_prop(&mut block.cond)?;
                block.fixed = match prop {
                    CondProp::AlwaysTrue => Some(true),
                    CondProp::AlwaysFalse => Some(false),
                    CondProp::Either => None,
                };
                match prop {
                    CondProp::AlwaysTrue => {
                        for s in &mut block.then_branch {
                            self.statement(s)?;
                        }
                    }
                    CondProp::AlwaysFalse => {
                        if let Some(else_branch) = &mut block.else_branch {
                            for s in else_branch {
                                self.statement(s)?;
                            }
                        }
                    }
                    CondProp::Either => {
                        // Snapshot the affected variables, run the then
                        // branch, snapshot again, restore, run the else
                        // branch, then union both outcomes.
                        let before: Vec<Domain> = block
                            .affected_vars
                            .iter()
                            .map(|&i| self.var_domains[i].clone())
                            .collect();

                        for s in &mut block.then_branch {
                            self.statement(s)?;
                        }

                        let after_then: Vec<Domain> = block
                            .affected_vars
                            .iter()
                            .map(|&i| self.var_domains[i].clone())
                            .collect();
                        for (k, &i) in block.affected_vars.iter().enumerate() {
                            self.var_domains[i] = before[k].clone();
                        }

                        if let Some(else_branch) = &mut block.else_branch {
                            for s in else_branch {
                                self.statement(s)?;
                            }
                        }

                        for (k, &i) in block.affected_vars.iter().enumerate() {
                            self.var_domains[i].add_domain(&after_then[k]);
                        }
                    }
                }
            }
            Statement::Collect(stmts) => {
                for s in stmts {
                    self.statement(s)?;
                }
            }
        }
        Ok(())
    }
}

fn min_left(a: Bound, b: Bound) -> Bound {
    if a.cmp_as_left(b).is_le() {
        a
    } else {
        b
    }
}

fn max_right(a: Bound, b: Bound) -> Bound {
    if a.cmp_as_right(b).is_ge() {
        a
    } else {
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::ifproc::if_process;
    use crate::script::indexer::index_variables;
    use crate::script::parser::parse_event;

    fn run(src: &str, fuzzy: bool) -> Vec<Event> {
        let mut events = vec![parse_event(src).unwrap()];
        let n = index_variables(&mut events).len();
        if_process(&mut events);
        domain_process(&mut events, n, fuzzy).unwrap();
        events
    }

    fn first_if(events: &[Event]) -> &crate::script::ast::IfBlock {
        for stmt in &events[0] {
            if let Statement::If(block) = stmt {
                return block;
            }
        }
        panic!("no if in event");
    }

    #[test]
    fn constant_condition_is_always_true() {
        let events = run("if 1 > 0 then x = spot endif", false);
        assert_eq!(first_if(&events).fixed, Some(true));
    }

    #[test]
    fn constant_condition_is_always_false() {
        let events = run("if 0 > 1 then x = spot endif", false);
        assert_eq!(first_if(&events).fixed, Some(false));
    }

    #[test]
    fn spot_condition_stays_open() {
        let events = run("if spot > 100 then x = 1 endif", false);
        assert_eq!(first_if(&events).fixed, None);
    }

    #[test]
    fn variable_assigned_both_branches_keeps_union() {
        // After the if, DIG is {0, 1}; DIG = 1 can hold, so the second
        // condition stays open.
        let events = run(
            "if spot > 100 then dig = 1 else dig = 0 endif \
             if dig = 1 then x = 1 endif",
            false,
        );
        let Statement::If(second) = &events[0][1] else { panic!() };
        assert_eq!(second.fixed, None);
    }

    #[test]
    fn unreachable_value_is_pruned() {
        // DIG is only ever 0 or 1, so DIG = 2 is impossible.
        let events = run(
            "if spot > 100 then dig = 1 else dig = 0 endif \
             if dig = 2 then x = 1 endif",
            false,
        );
        let Statement::If(second) = &events[0][1] else { panic!() };
        assert_eq!(second.fixed, Some(false));
    }

    #[test]
    fn continuous_comparison_is_not_discrete() {
        let events = run("if spot > 100 then x = 1 endif", true);
        let CondKind::Sup(_, info) = &first_if(&events).cond.kind else { panic!() };
        assert!(!info.discrete);
    }

    #[test]
    fn digital_variable_comparison_is_discrete_with_bounds() {
        let events = run(
            "if spot > 100 then dig = 1 else dig = 0 endif \
             if dig > 0 then x = 1 endif",
            true,
        );
        let Statement::If(second) = &events[0][1] else { panic!() };
        let CondKind::Sup(_, info) = &second.cond.kind else { panic!() };
        assert!(info.discrete);
        // dig - 0 has domain {0, 1}: zero singleton pins lb, rb is the
        // nearest positive subdomain.
        assert_eq!(info.lb, 0.0);
        assert_eq!(info.rb, 1.0);
    }

    #[test]
    fn smooth_with_discrete_x_fails() {
        let mut events =
            vec![parse_event("x = 1 y = smooth(x, 1, 0, 0.5)").unwrap()];
        let n = index_variables(&mut events).len();
        if_process(&mut events);
        let err = domain_process(&mut events, n, false).unwrap_err();
        assert!(matches!(err, ScriptError::Domain(_)), "{err}");
    }

    #[test]
    fn smooth_with_continuous_x_passes() {
        let events = run("y = smooth(spot - 100, 1, 0, 0.5)", false);
        drop(events);
    }

    #[test]
    fn log_of_spot_is_fine_sqrt_of_negative_falls_back() {
        // Both fall back to wide domains rather than failing; evaluation
        // semantics are IEEE.
        let _ = run("x = log(spot) y = sqrt(0 - 1)", false);
    }

    #[test]
    fn pays_accumulates_domain() {
        // After PAYS, X covers positive values; X > 0 cannot be pruned.
        let events = run(
            "x PAYS max(spot - 100, 0) if x > 0 then y = 1 endif",
            false,
        );
        let Statement::If(block) = &events[0][1] else { panic!() };
        assert_eq!(block.fixed, None);
    }

    #[test]
    fn not_flips_fixed_conditions() {
        let events = run("if 1 != 1 then x = 1 endif", false);
        // 1 != 1 is Not(Equal(0)) where Equal(0) is always true.
        assert_eq!(first_if(&events).fixed, Some(false));
    }
}
