//! Bytecode compiler.
//!
//! Flattens the (const-annotated) statement trees of one event into a
//! linear instruction stream for the stack machine in
//! [`executor`](crate::script::executor). Constant subtrees collapse to a
//! single load from the constant table; binaries with one constant operand
//! use a fused `*Const` instruction; comparisons whose argument folded to
//! a constant become `True`/`False` outright. `If`/`IfElse` carry patched
//! jump targets past their branches.
//!
//! The const processor must have run first.

use serde::{Deserialize, Serialize};

use crate::script::ast::{Cond, CondKind, Event, Expr, ExprKind, Statement};

/// Comparison tolerance when folding a constant condition argument.
const FOLD_EPS: f64 = 1.0e-12;

/// One stack-machine instruction. Operand-carrying variants hold indices
/// into the constant table (`konst`), the variable vector (`var`), or the
/// instruction stream itself (jump targets).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Instr {
    // Binary arithmetic; the `*Const` forms fuse a constant operand.
    Add,
    AddConst(u32),
    Sub,
    /// `top - konst`.
    SubConst(u32),
    /// `konst - top`.
    ConstSub(u32),
    Mult,
    MultConst(u32),
    Div,
    /// `top / konst`.
    DivConst(u32),
    /// `konst / top`.
    ConstDiv(u32),
    Pow,
    /// `top ^ konst`.
    PowConst(u32),
    /// `konst ^ top`.
    ConstPow(u32),
    Max2,
    Max2Const(u32),
    Min2,
    Min2Const(u32),

    // Unaries.
    Uminus,
    Log,
    Sqrt,

    // Leaves.
    Spot,
    Var(u32),
    Const(u32),
    True,
    False,

    // Statements.
    Assign(u32),
    AssignConst { konst: u32, var: u32 },
    Pays(u32),
    PaysConst { konst: u32, var: u32 },

    // Control. Targets are instruction indices one past the guarded block.
    If { end_true: u32 },
    IfElse { end_true: u32, end_false: u32 },

    // Logic.
    Equal,
    Sup,
    SupEqual,
    And,
    Or,
    Not,

    Smooth,
}

/// One event's compiled streams.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompiledEvent {
    pub node_stream: Vec<Instr>,
    pub const_stream: Vec<f64>,
    /// Reserved side-channel, one slot per logic instruction; not consumed
    /// by the executor.
    pub data_stream: Vec<u32>,
}

/// Compile every event into its instruction streams.
pub fn compile_events(events: &[Event]) -> Vec<CompiledEvent> {
    events
        .iter()
        .map(|event| {
            let mut compiler = Compiler::default();
            for stmt in event {
                compiler.statement(stmt);
            }
            compiler.finish()
        })
        .collect()
}

#[derive(Default)]
struct Compiler {
    node: Vec<Instr>,
    consts: Vec<f64>,
    data: Vec<u32>,
}

impl Compiler {
    fn finish(self) -> CompiledEvent {
        CompiledEvent {
            node_stream: self.node,
            const_stream: self.consts,
            data_stream: self.data,
        }
    }

    fn push_const(&mut self, value: f64) -> u32 {
        let idx = self.consts.len() as u32;
        self.consts.push(value);
        idx
    }

    fn emit_const_load(&mut self, value: f64) {
        let idx = self.push_const(value);
        self.node.push(Instr::Const(idx));
    }

    // --- expressions ---

    fn expr(&mut self, expr: &Expr) {
        if let Some(value) = expr.const_val {
            self.emit_const_load(value);
            return;
        }

        match &expr.kind {
            ExprKind::Add(a, b) => self.binary(a, b, Instr::Add, Instr::AddConst, Instr::AddConst),
            ExprKind::Sub(a, b) => self.binary(a, b, Instr::Sub, Instr::ConstSub, Instr::SubConst),
            ExprKind::Mult(a, b) => {
                self.binary(a, b, Instr::Mult, Instr::MultConst, Instr::MultConst)
            }
            ExprKind::Div(a, b) => self.binary(a, b, Instr::Div, Instr::ConstDiv, Instr::DivConst),
            ExprKind::Pow(a, b) => self.binary(a, b, Instr::Pow, Instr::ConstPow, Instr::PowConst),
            ExprKind::Max(a, b) => {
                self.binary(a, b, Instr::Max2, Instr::Max2Const, Instr::Max2Const)
            }
            ExprKind::Min(a, b) => {
                self.binary(a, b, Instr::Min2, Instr::Min2Const, Instr::Min2Const)
            }
            ExprKind::Uplus(a) => self.expr(a),
            ExprKind::Uminus(a) => {
                self.expr(a);
                self.node.push(Instr::Uminus);
            }
            ExprKind::Log(a) => {
                self.expr(a);
                self.node.push(Instr::Log);
            }
            ExprKind::Sqrt(a) => {
                self.expr(a);
                self.node.push(Instr::Sqrt);
            }
            ExprKind::Smooth { x, v_pos, v_neg, eps } => {
                self.expr(x);
                self.expr(v_pos);
                self.expr(v_neg);
                self.expr(eps);
                self.node.push(Instr::Smooth);
            }
            ExprKind::Spot => self.node.push(Instr::Spot),
            ExprKind::Var(v) => self.node.push(Instr::Var(v.index as u32)),
            // A literal always carries const_val and is handled above.
            ExprKind::Const(value) => self.emit_const_load(*value),
        }
    }

    fn binary(
        &mut self,
        a: &Expr,
        b: &Expr,
        plain: Instr,
        const_left: fn(u32) -> Instr,
        const_right: fn(u32) -> Instr,
    ) {
        if let Some(value) = a.const_val {
            self.expr(b);
            let idx = self.push_const(value);
            self.node.push(const_left(idx));
        } else if let Some(value) = b.const_val {
            self.expr(a);
            let idx = self.push_const(value);
            self.node.push(const_right(idx));
        } else {
            self.expr(a);
            self.expr(b);
            self.node.push(plain);
        }
    }

    // --- conditions ---

    fn cond(&mut self, cond: &Cond) {
        match &cond.kind {
            CondKind::True => self.node.push(Instr::True),
            CondKind::False => self.node.push(Instr::False),
            CondKind::Not(inner) => {
                self.cond(inner);
                self.node.push(Instr::Not);
                self.data.push(0);
            }
            CondKind::And(a, b) => {
                self.cond(a);
                self.cond(b);
                self.node.push(Instr::And);
                self.data.push(0);
            }
            CondKind::Or(a, b) => {
                self.cond(a);
                self.cond(b);
                self.node.push(Instr::Or);
                self.data.push(0);
            }
            CondKind::Equal(arg, _) => self.comparison(arg, Instr::Equal, |x| x.abs() < FOLD_EPS),
            CondKind::Sup(arg, _) => self.comparison(arg, Instr::Sup, |x| x > FOLD_EPS),
            CondKind::SupEqual(arg, _) => {
                self.comparison(arg, Instr::SupEqual, |x| x > -FOLD_EPS)
            }
        }
    }

    fn comparison(&mut self, arg: &Expr, instr: Instr, fold: impl Fn(f64) -> bool) {
        match arg.const_val {
            Some(value) => {
                self.node.push(if fold(value) { Instr::True } else { Instr::False });
            }
            None => {
                self.expr(arg);
                self.node.push(instr);
            }
        }
    }

    // --- statements ---

    fn statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Assign { lhs, rhs } => match rhs.const_val {
                Some(value) => {
                    let konst = self.push_const(value);
                    self.node.push(Instr::AssignConst { konst, var: lhs.index as u32 });
                }
                None => {
                    self.expr(rhs);
                    self.node.push(Instr::Assign(lhs.index as u32));
                }
            },
            Statement::Pays { lhs, rhs } => match rhs.const_val {
                Some(value) => {
                    let konst = self.push_const(value);
                    self.node.push(Instr::PaysConst { konst, var: lhs.index as u32 });
                }
                None => {
                    self.expr(rhs);
                    self.node.push(Instr::Pays(lhs.index as u32));
                }
            },
            Statement::If(block) => {
                self.cond(&block.cond);

                let patch_at = self.node.len();
                // Placeholder targets, patched once the branch sizes are known.
                if block.else_branch.is_some() {
                    self.node.push(Instr::IfElse { end_true: 0, end_false: 0 });
                } else {
                    self.node.push(Instr::If { end_true: 0 });
                }

                for s in &block.then_branch {
                    self.statement(s);
                }
                let end_true = self.node.len() as u32;

                match &block.else_branch {
                    Some(else_branch) => {
                        for s in else_branch {
                            self.statement(s);
                        }
                        let end_false = self.node.len() as u32;
                        self.node[patch_at] = Instr::IfElse { end_true, end_false };
                    }
                    None => {
                        self.node[patch_at] = Instr::If { end_true };
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::constproc::const_process;
    use crate::script::indexer::index_variables;
    use crate::script::parser::parse_event;

    fn compile_str(src: &str) -> CompiledEvent {
        let mut events = vec![parse_event(src).unwrap()];
        let n = index_variables(&mut events).len();
        const_process(&mut events, n);
        compile_events(&events).remove(0)
    }

    #[test]
    fn const_subtree_collapses_to_one_load() {
        let ev = compile_str("x = 2 * 3 + 4");
        assert_eq!(
            ev.node_stream,
            vec![Instr::AssignConst { konst: 0, var: 0 }],
        );
        assert_eq!(ev.const_stream, vec![10.0]);
    }

    #[test]
    fn const_operand_fuses() {
        let ev = compile_str("x = spot - 100");
        assert_eq!(
            ev.node_stream,
            vec![Instr::Spot, Instr::SubConst(0), Instr::Assign(0)],
        );
        assert_eq!(ev.const_stream, vec![100.0]);

        // Swapped side picks the mirrored instruction.
        let ev = compile_str("x = 100 - spot");
        assert_eq!(
            ev.node_stream,
            vec![Instr::Spot, Instr::ConstSub(0), Instr::Assign(0)],
        );
    }

    #[test]
    fn plain_binary_when_nothing_is_const() {
        let ev = compile_str("x = spot * spot");
        assert_eq!(
            ev.node_stream,
            vec![Instr::Spot, Instr::Spot, Instr::Mult, Instr::Assign(0)],
        );
    }

    #[test]
    fn const_indices_stay_in_range() {
        let ev = compile_str(
            "x = spot - 100 y = 2 * spot z PAYS max(spot - 90, 0) / 1.05",
        );
        for instr in &ev.node_stream {
            let idx = match *instr {
                Instr::Const(i)
                | Instr::AddConst(i)
                | Instr::SubConst(i)
                | Instr::ConstSub(i)
                | Instr::MultConst(i)
                | Instr::DivConst(i)
                | Instr::ConstDiv(i)
                | Instr::PowConst(i)
                | Instr::ConstPow(i)
                | Instr::Max2Const(i)
                | Instr::Min2Const(i) => i,
                Instr::AssignConst { konst, .. } | Instr::PaysConst { konst, .. } => konst,
                _ => continue,
            };
            assert!((idx as usize) < ev.const_stream.len());
        }
    }

    #[test]
    fn if_patches_jump_past_then_branch() {
        let ev = compile_str("if spot > 100 then x = 1 endif");
        // Spot, SubConst, Sup, If, AssignConst.
        assert_eq!(ev.node_stream.len(), 5);
        let Instr::If { end_true } = ev.node_stream[3] else {
            panic!("expected If, got {:?}", ev.node_stream[3])
        };
        assert_eq!(end_true, 5);
    }

    #[test]
    fn if_else_patches_both_targets() {
        let ev = compile_str("if spot > 100 then x = 1 else x = 2 x = 3 endif");
        let Instr::IfElse { end_true, end_false } = ev.node_stream[3] else {
            panic!("expected IfElse")
        };
        assert_eq!(end_true, 5, "then branch is one AssignConst");
        assert_eq!(end_false, 7, "else branch is two more");
        assert_eq!(end_false as usize, ev.node_stream.len());
    }

    #[test]
    fn const_comparison_folds_to_literal_truth() {
        let ev = compile_str("if 1 > 0 then x = spot endif");
        assert_eq!(ev.node_stream[0], Instr::True);

        let ev = compile_str("if 0 > 1 then x = spot endif");
        assert_eq!(ev.node_stream[0], Instr::False);
    }

    #[test]
    fn logic_ops_reserve_data_slots() {
        let ev = compile_str("if spot > 1 and spot > 2 or not(spot > 3) then x = 1 endif");
        assert_eq!(ev.data_stream.len(), 3);
    }

    #[test]
    fn uplus_is_a_no_op() {
        let ev = compile_str("x = +spot");
        assert_eq!(ev.node_stream, vec![Instr::Spot, Instr::Assign(0)]);
    }
}
