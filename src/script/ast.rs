//! Abstract syntax trees for event scripts.
//!
//! Three node families, one tagged enum each: expressions produce a number,
//! conditions produce a truth value, statements perform an action. Analysis
//! passes write their findings into the annotation fields (`const_val`,
//! `fixed`, [`CompInfo`], [`IfBlock::affected_vars`]) which start out
//! unset after parsing.

/// A named variable occurrence. `index` is assigned by the variable indexer;
/// until then it holds [`VarRef::UNINDEXED`].
#[derive(Debug, Clone, PartialEq)]
pub struct VarRef {
    pub name: String,
    pub index: usize,
}

impl VarRef {
    pub const UNINDEXED: usize = usize::MAX;

    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), index: Self::UNINDEXED }
    }
}

/// Expression node with its constant-folding annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    /// `Some(v)` once a pass has proven this subtree always evaluates to `v`.
    pub const_val: Option<f64>,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self { kind, const_val: None }
    }

    /// Literal constant, const-annotated from birth.
    pub fn constant(value: f64) -> Self {
        Self { kind: ExprKind::Const(value), const_val: Some(value) }
    }

    pub fn is_const(&self) -> bool {
        self.const_val.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mult(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    /// Binary after parse-time canonicalization of n-ary MAX calls.
    Max(Box<Expr>, Box<Expr>),
    /// Binary after parse-time canonicalization of n-ary MIN calls.
    Min(Box<Expr>, Box<Expr>),
    Uplus(Box<Expr>),
    Uminus(Box<Expr>),
    Log(Box<Expr>),
    Sqrt(Box<Expr>),
    /// `SMOOTH(x, v_pos, v_neg, eps)`: explicit fuzzy blend.
    Smooth {
        x: Box<Expr>,
        v_pos: Box<Expr>,
        v_neg: Box<Expr>,
        eps: Box<Expr>,
    },
    /// The simulated underlying at the current event date.
    Spot,
    Var(VarRef),
    Const(f64),
}

/// Fuzzy-smoothing metadata carried by comparison nodes, filled in by the
/// domain processor when fuzzy mode is on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompInfo {
    /// Zero is isolated in (or absent from) the compared expression's domain.
    pub discrete: bool,
    /// Per-node smoothing width; negative means use the evaluator default.
    pub eps: f64,
    /// Discrete interpolation bounds around zero.
    pub lb: f64,
    pub rb: f64,
}

impl CompInfo {
    pub fn with_eps(eps: f64) -> Self {
        Self { discrete: false, eps, lb: -0.5, rb: 0.5 }
    }
}

impl Default for CompInfo {
    fn default() -> Self {
        Self::with_eps(-1.0)
    }
}

/// Condition node with its constant-condition annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Cond {
    pub kind: CondKind,
    /// `Some(true)` = always true, `Some(false)` = always false, per the
    /// domain processor. At most one holds by construction.
    pub fixed: Option<bool>,
}

impl Cond {
    pub fn new(kind: CondKind) -> Self {
        Self { kind, fixed: None }
    }

    pub fn truth(value: bool) -> Self {
        Self {
            kind: if value { CondKind::True } else { CondKind::False },
            fixed: Some(value),
        }
    }
}

/// Comparisons hold the single folded argument `lhs - rhs`; the parser
/// builds the subtraction. `!=` is `Not(Equal)`, `<`/`<=` swap operands
/// onto `Sup`/`SupEqual`.
#[derive(Debug, Clone, PartialEq)]
pub enum CondKind {
    True,
    False,
    Not(Box<Cond>),
    And(Box<Cond>, Box<Cond>),
    Or(Box<Cond>, Box<Cond>),
    Equal(Box<Expr>, CompInfo),
    Sup(Box<Expr>, CompInfo),
    SupEqual(Box<Expr>, CompInfo),
}

/// Conditional statement block with the annotations the fuzzy evaluator
/// and the const-condition eliminator need.
#[derive(Debug, Clone, PartialEq)]
pub struct IfBlock {
    pub cond: Cond,
    pub then_branch: Vec<Statement>,
    pub else_branch: Option<Vec<Statement>>,
    /// Indices of variables written in either branch, nested ifs included;
    /// sorted ascending. Filled by the if-scope analyzer.
    pub affected_vars: Vec<usize>,
    /// Always-true/false verdict from the domain processor.
    pub fixed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `V = expr`
    Assign { lhs: VarRef, rhs: Expr },
    /// `V PAYS expr`: accumulate `expr / numeraire` into `V`.
    Pays { lhs: VarRef, rhs: Expr },
    If(IfBlock),
    /// Flat group of statements; produced by const-condition elimination.
    Collect(Vec<Statement>),
}

/// One event's statements, in source order.
pub type Event = Vec<Statement>;

// --- debug dump ---

impl Statement {
    /// Indented textual dump of the statement tree.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(0, &mut out);
        out
    }

    fn dump_into(&self, depth: usize, out: &mut String) {
        use std::fmt::Write;
        let pad = "  ".repeat(depth);
        match self {
            Statement::Assign { lhs, rhs } => {
                let _ = writeln!(out, "{pad}ASSIGN {} <- {}", lhs.name, dump_expr(rhs));
            }
            Statement::Pays { lhs, rhs } => {
                let _ = writeln!(out, "{pad}PAYS {} <- {}", lhs.name, dump_expr(rhs));
            }
            Statement::If(block) => {
                let _ = writeln!(out, "{pad}IF {}", dump_cond(&block.cond));
                for s in &block.then_branch {
                    s.dump_into(depth + 1, out);
                }
                if let Some(else_branch) = &block.else_branch {
                    let _ = writeln!(out, "{pad}ELSE");
                    for s in else_branch {
                        s.dump_into(depth + 1, out);
                    }
                }
                let _ = writeln!(out, "{pad}ENDIF");
            }
            Statement::Collect(stmts) => {
                let _ = writeln!(out, "{pad}COLLECT");
                for s in stmts {
                    s.dump_into(depth + 1, out);
                }
            }
        }
    }
}

fn dump_expr(e: &Expr) -> String {
    match &e.kind {
        ExprKind::Add(a, b) => format!("({} + {})", dump_expr(a), dump_expr(b)),
        ExprKind::Sub(a, b) => format!("({} - {})", dump_expr(a), dump_expr(b)),
        ExprKind::Mult(a, b) => format!("({} * {})", dump_expr(a), dump_expr(b)),
        ExprKind::Div(a, b) => format!("({} / {})", dump_expr(a), dump_expr(b)),
        ExprKind::Pow(a, b) => format!("({} ^ {})", dump_expr(a), dump_expr(b)),
        ExprKind::Max(a, b) => format!("MAX({}, {})", dump_expr(a), dump_expr(b)),
        ExprKind::Min(a, b) => format!("MIN({}, {})", dump_expr(a), dump_expr(b)),
        ExprKind::Uplus(a) => format!("+{}", dump_expr(a)),
        ExprKind::Uminus(a) => format!("-{}", dump_expr(a)),
        ExprKind::Log(a) => format!("LOG({})", dump_expr(a)),
        ExprKind::Sqrt(a) => format!("SQRT({})", dump_expr(a)),
        ExprKind::Smooth { x, v_pos, v_neg, eps } => format!(
            "SMOOTH({}, {}, {}, {})",
            dump_expr(x),
            dump_expr(v_pos),
            dump_expr(v_neg),
            dump_expr(eps)
        ),
        ExprKind::Spot => "SPOT".to_string(),
        ExprKind::Var(v) => v.name.clone(),
        ExprKind::Const(v) => format!("{v}"),
    }
}

fn dump_cond(c: &Cond) -> String {
    match &c.kind {
        CondKind::True => "TRUE".to_string(),
        CondKind::False => "FALSE".to_string(),
        CondKind::Not(inner) => format!("NOT({})", dump_cond(inner)),
        CondKind::And(a, b) => format!("({} AND {})", dump_cond(a), dump_cond(b)),
        CondKind::Or(a, b) => format!("({} OR {})", dump_cond(a), dump_cond(b)),
        CondKind::Equal(e, _) => format!("{} = 0", dump_expr(e)),
        CondKind::Sup(e, _) => format!("{} > 0", dump_expr(e)),
        CondKind::SupEqual(e, _) => format!("{} >= 0", dump_expr(e)),
    }
}
