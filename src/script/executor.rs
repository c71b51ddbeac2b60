//! Stack machine for compiled events.
//!
//! Two stacks: data values and booleans. A well-formed stream from the
//! compiler leaves both empty after a full run, and stack underflow is
//! structurally impossible, so instruction dispatch does no checking of
//! its own.

use crate::script::compiler::{CompiledEvent, Instr};
use crate::script::evaluator::Scalar;
use crate::script::scenario::SimulData;

/// Mutable per-path state for the compiled regime: the variable vector and
/// both working stacks. Reset between paths keeps capacity.
#[derive(Debug, Clone)]
pub struct EvalState<T> {
    pub variables: Vec<T>,
    dstack: Vec<T>,
    bstack: Vec<bool>,
}

impl<T: Scalar> EvalState<T> {
    pub fn new(num_vars: usize) -> Self {
        Self { variables: vec![T::from_f64(0.0); num_vars], dstack: Vec::new(), bstack: Vec::new() }
    }

    pub fn init(&mut self) {
        for v in &mut self.variables {
            *v = T::from_f64(0.0);
        }
        self.dstack.clear();
        self.bstack.clear();
    }

    /// Both stacks drained; holds after executing any well-formed stream.
    pub fn stacks_empty(&self) -> bool {
        self.dstack.is_empty() && self.bstack.is_empty()
    }
}

/// Execute one compiled event against one date's market data.
pub fn eval_compiled<T: Scalar>(
    event: &CompiledEvent,
    data: &SimulData<T>,
    state: &mut EvalState<T>,
) {
    eval_range(event, data, state, 0, event.node_stream.len());
}

fn eval_range<T: Scalar>(
    event: &CompiledEvent,
    data: &SimulData<T>,
    state: &mut EvalState<T>,
    first: usize,
    last: usize,
) {
    let code = &event.node_stream;
    let consts = &event.const_stream;
    let mut i = first;

    macro_rules! konst {
        ($idx:expr) => {
            T::from_f64(consts[$idx as usize])
        };
    }

    while i < last {
        match code[i] {
            Instr::Add => {
                let top = state.dstack.pop().expect("well-formed stream");
                *state.dstack.last_mut().unwrap() += top;
            }
            Instr::AddConst(idx) => {
                *state.dstack.last_mut().unwrap() += konst!(idx);
            }
            Instr::Sub => {
                let top = state.dstack.pop().unwrap();
                *state.dstack.last_mut().unwrap() -= top;
            }
            Instr::SubConst(idx) => {
                *state.dstack.last_mut().unwrap() -= konst!(idx);
            }
            Instr::ConstSub(idx) => {
                let top = state.dstack.last_mut().unwrap();
                *top = konst!(idx) - *top;
            }
            Instr::Mult => {
                let top = state.dstack.pop().unwrap();
                *state.dstack.last_mut().unwrap() *= top;
            }
            Instr::MultConst(idx) => {
                *state.dstack.last_mut().unwrap() *= konst!(idx);
            }
            Instr::Div => {
                let top = state.dstack.pop().unwrap();
                *state.dstack.last_mut().unwrap() /= top;
            }
            Instr::DivConst(idx) => {
                *state.dstack.last_mut().unwrap() /= konst!(idx);
            }
            Instr::ConstDiv(idx) => {
                let top = state.dstack.last_mut().unwrap();
                *top = konst!(idx) / *top;
            }
            Instr::Pow => {
                let top = state.dstack.pop().unwrap();
                let lhs = state.dstack.last_mut().unwrap();
                *lhs = lhs.powf(top);
            }
            Instr::PowConst(idx) => {
                let top = state.dstack.last_mut().unwrap();
                *top = top.powf(konst!(idx));
            }
            Instr::ConstPow(idx) => {
                let top = state.dstack.last_mut().unwrap();
                *top = konst!(idx).powf(*top);
            }
            Instr::Max2 => {
                let top = state.dstack.pop().unwrap();
                let lhs = state.dstack.last_mut().unwrap();
                *lhs = lhs.max(top);
            }
            Instr::Max2Const(idx) => {
                let top = state.dstack.last_mut().unwrap();
                *top = top.max(konst!(idx));
            }
            Instr::Min2 => {
                let top = state.dstack.pop().unwrap();
                let lhs = state.dstack.last_mut().unwrap();
                *lhs = lhs.min(top);
            }
            Instr::Min2Const(idx) => {
                let top = state.dstack.last_mut().unwrap();
                *top = top.min(konst!(idx));
            }

            Instr::Uminus => {
                let top = state.dstack.last_mut().unwrap();
                *top = -*top;
            }
            Instr::Log => {
                let top = state.dstack.last_mut().unwrap();
                *top = top.ln();
            }
            Instr::Sqrt => {
                let top = state.dstack.last_mut().unwrap();
                *top = top.sqrt();
            }

            Instr::Spot => state.dstack.push(data.spot),
            Instr::Var(idx) => state.dstack.push(state.variables[idx as usize]),
            Instr::Const(idx) => state.dstack.push(konst!(idx)),
            Instr::True => state.bstack.push(true),
            Instr::False => state.bstack.push(false),

            Instr::Assign(idx) => {
                state.variables[idx as usize] = state.dstack.pop().unwrap();
            }
            Instr::AssignConst { konst, var } => {
                state.variables[var as usize] = konst!(konst);
            }
            Instr::Pays(idx) => {
                let value = state.dstack.pop().unwrap();
                state.variables[idx as usize] += value / data.numeraire;
            }
            Instr::PaysConst { konst, var } => {
                state.variables[var as usize] += konst!(konst) / data.numeraire;
            }

            Instr::If { end_true } => {
                let taken = state.bstack.pop().unwrap();
                if !taken {
                    i = end_true as usize;
                    continue;
                }
            }
            Instr::IfElse { end_true, end_false } => {
                let taken = state.bstack.pop().unwrap();
                if taken {
                    eval_range(event, data, state, i + 1, end_true as usize);
                    i = end_false as usize;
                } else {
                    i = end_true as usize;
                }
                continue;
            }

            Instr::Equal => {
                let top = state.dstack.pop().unwrap();
                state.bstack.push(top.val() == 0.0);
            }
            Instr::Sup => {
                let top = state.dstack.pop().unwrap();
                state.bstack.push(top.val() > 0.0);
            }
            Instr::SupEqual => {
                let top = state.dstack.pop().unwrap();
                state.bstack.push(top.val() >= 0.0);
            }
            Instr::And => {
                let top = state.bstack.pop().unwrap();
                let lhs = state.bstack.last_mut().unwrap();
                *lhs = *lhs && top;
            }
            Instr::Or => {
                let top = state.bstack.pop().unwrap();
                let lhs = state.bstack.last_mut().unwrap();
                *lhs = *lhs || top;
            }
            Instr::Not => {
                let top = state.bstack.last_mut().unwrap();
                *top = !*top;
            }

            Instr::Smooth => {
                let eps = state.dstack.pop().unwrap();
                let v_neg = state.dstack.pop().unwrap();
                let v_pos = state.dstack.pop().unwrap();
                let x = state.dstack.last_mut().unwrap();
                let half_eps = T::from_f64(0.5) * eps;
                *x = if x.val() < -half_eps.val() {
                    v_neg
                } else if x.val() > half_eps.val() {
                    v_pos
                } else {
                    v_neg + T::from_f64(0.5) * (v_pos - v_neg) * (*x + half_eps) / half_eps
                };
            }
        }

        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::compiler::compile_events;
    use crate::script::constproc::const_process;
    use crate::script::indexer::index_variables;
    use crate::script::parser::parse_event;

    fn run(src: &str, spot: f64, numeraire: f64) -> (Vec<f64>, bool) {
        let mut events = vec![parse_event(src).unwrap()];
        let n = index_variables(&mut events).len();
        const_process(&mut events, n);
        let compiled = compile_events(&events);

        let mut state: EvalState<f64> = EvalState::new(n);
        state.init();
        eval_compiled(&compiled[0], &SimulData { spot, numeraire }, &mut state);
        let empty = state.stacks_empty();
        (state.variables, empty)
    }

    #[test]
    fn arithmetic_and_fused_consts() {
        let (vals, empty) = run("x = 2 * spot + 1 y = 100 - spot z = 100 / spot", 50.0, 1.0);
        assert_eq!(vals, [101.0, 50.0, 2.0]);
        assert!(empty);
    }

    #[test]
    fn pays_divides_by_numeraire_and_accumulates() {
        let (vals, _) = run("x PAYS 10 x PAYS spot", 6.0, 2.0);
        assert_eq!(vals, [8.0]);
    }

    #[test]
    fn if_skips_untaken_branch() {
        let (vals, empty) = run("if spot > 100 then x = 1 endif y = 2", 50.0, 1.0);
        assert_eq!(vals, [0.0, 2.0]);
        assert!(empty);

        let (vals, _) = run("if spot > 100 then x = 1 endif y = 2", 150.0, 1.0);
        assert_eq!(vals, [1.0, 2.0]);
    }

    #[test]
    fn if_else_takes_exactly_one_branch() {
        let src = "if spot >= 100 then x = 1 else x = 2 endif z = x * 10";
        let (vals, empty) = run(src, 100.0, 1.0);
        assert_eq!(vals, [1.0, 10.0]);
        assert!(empty);

        let (vals, _) = run(src, 99.0, 1.0);
        assert_eq!(vals, [2.0, 20.0]);
    }

    #[test]
    fn nested_if_inside_else() {
        let src = "if spot > 100 then x = 1 else if spot > 50 then x = 2 else x = 3 endif endif";
        assert_eq!(run(src, 150.0, 1.0).0, [1.0]);
        assert_eq!(run(src, 75.0, 1.0).0, [2.0]);
        assert_eq!(run(src, 25.0, 1.0).0, [3.0]);
    }

    #[test]
    fn logic_ops_combine() {
        let src = "if spot > 50 and spot > 100 or spot = 1 then x = 1 endif";
        assert_eq!(run(src, 150.0, 1.0).0, [1.0]);
        assert_eq!(run(src, 75.0, 1.0).0, [0.0]);
        assert_eq!(run(src, 1.0, 1.0).0, [1.0]);
    }

    #[test]
    fn smooth_three_cases() {
        let src = "x = smooth(spot - 100, 10, 20, 2)";
        assert_eq!(run(src, 105.0, 1.0).0, [10.0]);
        assert_eq!(run(src, 95.0, 1.0).0, [20.0]);
        assert_eq!(run(src, 100.0, 1.0).0, [15.0]);
    }

    #[test]
    fn stacks_empty_after_every_shape() {
        for src in [
            "x = spot",
            "x PAYS max(spot - 100, 0)",
            "if spot > 100 then x = 1 else x = 2 endif",
            "if spot > 1 and not(spot > 2) then x = smooth(spot, 1, 2, 0.5) endif",
            "if 1 > 0 then x = spot endif",
        ] {
            for spot in [0.5, 1.5, 2.5, 150.0] {
                let (_, empty) = run(src, spot, 1.0);
                assert!(empty, "stacks not drained for {src} at {spot}");
            }
        }
    }

    #[test]
    fn matches_tree_evaluator() {
        use crate::script::evaluator::{Evaluator, PathEvaluator};

        let srcs = [
            "x = 2 * spot + 1 y PAYS max(spot - 100, 0)",
            "if spot > 100 then x = 1 else x = 0 endif v PAYS x * spot",
            "k = 100 c PAYS max(spot - k, 0) if c > 10 then rich = 1 endif",
        ];
        for src in srcs {
            for spot in [40.0, 100.0, 160.0] {
                let mut events = vec![parse_event(src).unwrap()];
                let n = index_variables(&mut events).len();
                const_process(&mut events, n);
                let compiled = compile_events(&events);
                let data = SimulData { spot, numeraire: 1.07 };

                let mut state: EvalState<f64> = EvalState::new(n);
                state.init();
                eval_compiled(&compiled[0], &data, &mut state);

                let mut tree: Evaluator<f64> = Evaluator::new(n);
                tree.init();
                tree.eval_event(&events[0], &data);

                assert_eq!(state.variables, tree.var_vals(), "{src} at {spot}");
            }
        }
    }
}
