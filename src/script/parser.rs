//! Recursive-descent parser for event scripts.
//!
//! Grammar, with left-to-right precedence levels:
//!
//! ```text
//! Statement := 'IF' Cond 'THEN' Stmt* ('ELSE' Stmt*)? 'ENDIF'
//!            | Var '=' Expr
//!            | Var 'PAYS' Expr
//! Cond      := CondAnd ('OR' CondAnd)*
//! CondAnd   := CondElem ('AND' CondElem)*
//! CondElem  := '(' Cond ')' | Expr CMP Expr ((';'|':') eps)*
//! Expr      := Term (('+'|'-') Term)*
//! Term      := Factor (('*'|'/') Factor)*
//! Factor    := Unary ('^' Unary)*
//! Unary     := ('+'|'-') Unary | Atom
//! Atom      := '(' Expr ')' | Number | FuncCall | Var
//! ```
//!
//! Comparisons fold into a single `lhs - rhs` argument; `!=` becomes
//! `NOT(=)`, `<` and `<=` swap operands onto `>` and `>=`. N-ary `MIN` and
//! `MAX` calls canonicalize to left-deep binary trees so every downstream
//! pass sees exactly two children.

use crate::core::{ScriptError, ScriptResult};
use crate::script::ast::*;
use crate::script::lexer::{tokenize, Token};

/// Parse one event's source text into its statement list.
pub fn parse_event(source: &str) -> ScriptResult<Event> {
    let tokens = tokenize(source);
    let mut parser = Parser::new(&tokens, source.len());
    let mut statements = Vec::new();
    while !parser.at_end() {
        statements.push(parser.parse_statement()?);
    }
    Ok(statements)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    end_pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token], end_pos: usize) -> Self {
        Self { tokens, pos: 0, end_pos }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_text(&self) -> Option<&'a str> {
        self.peek().map(|t| t.text.as_str())
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn cur_pos(&self) -> usize {
        self.peek().map_or(self.end_pos, |t| t.pos)
    }

    fn error(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::Parse { message: message.into(), pos: self.cur_pos() }
    }

    fn expect_more(&self) -> ScriptResult<&'a Token> {
        self.peek().ok_or_else(|| self.error("unexpected end of statement"))
    }

    fn expect(&mut self, text: &str) -> ScriptResult<()> {
        match self.peek_text() {
            Some(t) if t == text => {
                self.pos += 1;
                Ok(())
            }
            Some(t) => Err(self.error(format!("expected '{text}', got '{t}'"))),
            None => Err(self.error(format!("expected '{text}', got end of statement"))),
        }
    }

    // --- statements ---

    fn parse_statement(&mut self) -> ScriptResult<Statement> {
        if self.peek_text() == Some("IF") {
            return self.parse_if();
        }

        let lhs = self.parse_var_ref()?;
        match self.peek_text() {
            Some("=") => {
                self.advance();
                self.expect_more()?;
                let rhs = self.parse_expr()?;
                Ok(Statement::Assign { lhs, rhs })
            }
            Some("PAYS") => {
                self.advance();
                self.expect_more()?;
                let rhs = self.parse_expr()?;
                Ok(Statement::Pays { lhs, rhs })
            }
            _ => Err(self.error("statement without an instruction")),
        }
    }

    fn parse_if(&mut self) -> ScriptResult<Statement> {
        self.advance(); // over IF
        self.expect_more()?;
        let cond = self.parse_cond()?;

        if self.peek_text() != Some("THEN") {
            return Err(self.error("'IF' is not followed by 'THEN'"));
        }
        self.advance();

        let mut then_branch = Vec::new();
        while !matches!(self.peek_text(), Some("ELSE") | Some("ENDIF") | None) {
            then_branch.push(self.parse_statement()?);
        }
        if self.at_end() {
            return Err(self.error("'IF/THEN' is not followed by 'ELSE' or 'ENDIF'"));
        }

        let mut else_branch = None;
        if self.peek_text() == Some("ELSE") {
            self.advance();
            let mut stmts = Vec::new();
            while !matches!(self.peek_text(), Some("ENDIF") | None) {
                stmts.push(self.parse_statement()?);
            }
            if self.at_end() {
                return Err(self.error("'IF/THEN/ELSE' is not followed by 'ENDIF'"));
            }
            else_branch = Some(stmts);
        }

        self.advance(); // over ENDIF

        Ok(Statement::If(IfBlock {
            cond,
            then_branch,
            else_branch,
            affected_vars: Vec::new(),
            fixed: None,
        }))
    }

    // --- conditions ---

    fn parse_cond(&mut self) -> ScriptResult<Cond> {
        let mut lhs = self.parse_cond_and()?;
        while self.peek_text() == Some("OR") {
            self.advance();
            self.expect_more()?;
            let rhs = self.parse_cond_and()?;
            lhs = Cond::new(CondKind::Or(Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_cond_and(&mut self) -> ScriptResult<Cond> {
        let mut lhs = self.parse_cond_atom()?;
        while self.peek_text() == Some("AND") {
            self.advance();
            self.expect_more()?;
            let rhs = self.parse_cond_atom()?;
            lhs = Cond::new(CondKind::And(Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    /// At the condition level an opening parenthesis always opens a nested
    /// condition, never a parenthesized arithmetic operand.
    fn parse_cond_atom(&mut self) -> ScriptResult<Cond> {
        if self.peek_text() == Some("(") {
            self.advance();
            let cond = self.parse_cond()?;
            self.expect(")")?;
            return Ok(cond);
        }
        self.parse_cond_elem()
    }

    fn parse_cond_elem(&mut self) -> ScriptResult<Cond> {
        let lhs = self.parse_expr()?;

        let cmp_tok = self.expect_more()?;
        let comparator = cmp_tok.text.clone();
        let cmp_pos = cmp_tok.pos;
        self.advance();
        self.expect_more()?;

        let rhs = self.parse_expr()?;
        let eps = self.parse_cond_optionals()?;

        let diff = |lhs: Expr, rhs: Expr| {
            Box::new(Expr::new(ExprKind::Sub(Box::new(lhs), Box::new(rhs))))
        };
        let info = CompInfo::with_eps(eps);

        let cond = match comparator.as_str() {
            "=" => CondKind::Equal(diff(lhs, rhs), info),
            "!=" => CondKind::Not(Box::new(Cond::new(CondKind::Equal(diff(lhs, rhs), info)))),
            ">" => CondKind::Sup(diff(lhs, rhs), info),
            "<" => CondKind::Sup(diff(rhs, lhs), info),
            ">=" => CondKind::SupEqual(diff(lhs, rhs), info),
            "<=" => CondKind::SupEqual(diff(rhs, lhs), info),
            other => {
                return Err(ScriptError::Parse {
                    message: format!("'{other}' is not a valid comparator"),
                    pos: cmp_pos,
                });
            }
        };
        Ok(Cond::new(cond))
    }

    /// Optional fuzzy epsilon suffix: `; 0.01` or `: 0.01`. Negative default
    /// means "use the evaluator's epsilon".
    fn parse_cond_optionals(&mut self) -> ScriptResult<f64> {
        let mut eps = -1.0;
        while matches!(self.peek_text(), Some(";") | Some(":")) {
            self.advance();
            let tok = self.expect_more()?;
            eps = parse_number(tok)?;
            self.advance();
        }
        Ok(eps)
    }

    // --- expressions ---

    fn parse_expr(&mut self) -> ScriptResult<Expr> {
        let mut lhs = self.parse_term()?;
        while let Some(op @ ("+" | "-")) = self.peek_text() {
            self.advance();
            self.expect_more()?;
            let rhs = self.parse_term()?;
            let kind = if op == "+" {
                ExprKind::Add(Box::new(lhs), Box::new(rhs))
            } else {
                ExprKind::Sub(Box::new(lhs), Box::new(rhs))
            };
            lhs = Expr::new(kind);
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> ScriptResult<Expr> {
        let mut lhs = self.parse_factor()?;
        while let Some(op @ ("*" | "/")) = self.peek_text() {
            self.advance();
            self.expect_more()?;
            let rhs = self.parse_factor()?;
            let kind = if op == "*" {
                ExprKind::Mult(Box::new(lhs), Box::new(rhs))
            } else {
                ExprKind::Div(Box::new(lhs), Box::new(rhs))
            };
            lhs = Expr::new(kind);
        }
        Ok(lhs)
    }

    fn parse_factor(&mut self) -> ScriptResult<Expr> {
        let mut lhs = self.parse_unary()?;
        while self.peek_text() == Some("^") {
            self.advance();
            self.expect_more()?;
            let rhs = self.parse_unary()?;
            lhs = Expr::new(ExprKind::Pow(Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> ScriptResult<Expr> {
        if let Some(op @ ("+" | "-")) = self.peek_text() {
            self.advance();
            self.expect_more()?;
            let operand = self.parse_unary()?;
            let kind = if op == "+" {
                ExprKind::Uplus(Box::new(operand))
            } else {
                ExprKind::Uminus(Box::new(operand))
            };
            return Ok(Expr::new(kind));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> ScriptResult<Expr> {
        let tok = self.expect_more()?;

        if tok.text == "(" {
            self.advance();
            let expr = self.parse_expr()?;
            self.expect(")")?;
            return Ok(expr);
        }

        let first = tok.text.as_bytes()[0];
        if first.is_ascii_digit() || first == b'.' {
            let value = parse_number(tok)?;
            self.advance();
            return Ok(Expr::constant(value));
        }

        // Function call or variable.
        let name = tok.text.clone();
        let name_pos = tok.pos;
        let is_call = self.tokens.get(self.pos + 1).map(|t| t.text.as_str()) == Some("(");

        if is_call {
            return self.parse_func_call(&name, name_pos);
        }

        // SPOT is nullary market access and reads fine without parentheses;
        // every other function name requires them.
        match name.as_str() {
            "SPOT" => {
                self.advance();
                Ok(Expr::new(ExprKind::Spot))
            }
            "LOG" | "SQRT" | "MIN" | "MAX" | "SMOOTH" => Err(ScriptError::Parse {
                message: format!("no opening ( following function name '{name}'"),
                pos: name_pos,
            }),
            _ => self.parse_var_ref().map(|v| Expr::new(ExprKind::Var(v))),
        }
    }

    fn parse_func_call(&mut self, name: &str, name_pos: usize) -> ScriptResult<Expr> {
        let (min_args, max_args) = match name {
            "SPOT" => (0, 0),
            "LOG" | "SQRT" => (1, 1),
            "MIN" | "MAX" => (2, usize::MAX),
            "SMOOTH" => (4, 4),
            _ => {
                return Err(ScriptError::UnknownFunction {
                    name: name.to_string(),
                    pos: name_pos,
                });
            }
        };

        self.advance(); // over name
        let mut args = self.parse_func_args()?;
        if args.len() < min_args || args.len() > max_args {
            return Err(ScriptError::Arity {
                name: name.to_string(),
                got: args.len(),
                pos: name_pos,
            });
        }

        let expr = match name {
            "SPOT" => Expr::new(ExprKind::Spot),
            "LOG" => Expr::new(ExprKind::Log(Box::new(args.pop().unwrap()))),
            "SQRT" => Expr::new(ExprKind::Sqrt(Box::new(args.pop().unwrap()))),
            "MIN" => fold_left_deep(args, |a, b| ExprKind::Min(Box::new(a), Box::new(b))),
            "MAX" => fold_left_deep(args, |a, b| ExprKind::Max(Box::new(a), Box::new(b))),
            "SMOOTH" => {
                let eps = args.pop().unwrap();
                let v_neg = args.pop().unwrap();
                let v_pos = args.pop().unwrap();
                let x = args.pop().unwrap();
                Expr::new(ExprKind::Smooth {
                    x: Box::new(x),
                    v_pos: Box::new(v_pos),
                    v_neg: Box::new(v_neg),
                    eps: Box::new(eps),
                })
            }
            _ => unreachable!(),
        };
        Ok(expr)
    }

    fn parse_func_args(&mut self) -> ScriptResult<Vec<Expr>> {
        self.expect("(")?;
        let mut args = Vec::new();
        if self.peek_text() == Some(")") {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            match self.peek_text() {
                Some(",") => {
                    self.advance();
                }
                Some(")") => {
                    self.advance();
                    return Ok(args);
                }
                _ => return Err(self.error("arguments must be separated by commas")),
            }
        }
    }

    fn parse_var_ref(&mut self) -> ScriptResult<VarRef> {
        let tok = self.expect_more()?;
        let first = tok.text.as_bytes()[0];
        if !first.is_ascii_uppercase() {
            return Err(ScriptError::Parse {
                message: format!("variable name '{}' is invalid", tok.text),
                pos: tok.pos,
            });
        }
        let var = VarRef::new(tok.text.clone());
        self.advance();
        Ok(var)
    }
}

fn parse_number(tok: &Token) -> ScriptResult<f64> {
    tok.text.parse::<f64>().map_err(|_| ScriptError::Parse {
        message: format!("invalid number literal '{}'", tok.text),
        pos: tok.pos,
    })
}

fn fold_left_deep(args: Vec<Expr>, mk: impl Fn(Expr, Expr) -> ExprKind) -> Expr {
    let mut it = args.into_iter();
    let first = it.next().expect("arity checked");
    it.fold(first, |acc, next| Expr::new(mk(acc, next)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_assignment() {
        let event = parse_event("x = spot + 1").unwrap();
        assert_eq!(event.len(), 1);
        match &event[0] {
            Statement::Assign { lhs, rhs } => {
                assert_eq!(lhs.name, "X");
                assert!(matches!(rhs.kind, ExprKind::Add(_, _)));
            }
            other => panic!("expected assign, got {other:?}"),
        }
    }

    #[test]
    fn parse_pays() {
        let event = parse_event("opt PAYS MAX(spot - 100, 0)").unwrap();
        match &event[0] {
            Statement::Pays { lhs, rhs } => {
                assert_eq!(lhs.name, "OPT");
                assert!(matches!(rhs.kind, ExprKind::Max(_, _)));
            }
            other => panic!("expected pays, got {other:?}"),
        }
    }

    #[test]
    fn precedence_is_mult_before_add() {
        let event = parse_event("x = 1 + 2 * 3").unwrap();
        let Statement::Assign { rhs, .. } = &event[0] else { panic!() };
        let ExprKind::Add(lhs, rhs) = &rhs.kind else {
            panic!("expected top-level add")
        };
        assert!(matches!(lhs.kind, ExprKind::Const(_)));
        assert!(matches!(rhs.kind, ExprKind::Mult(_, _)));
    }

    #[test]
    fn unary_minus_stacks() {
        let event = parse_event("x = --3").unwrap();
        let Statement::Assign { rhs, .. } = &event[0] else { panic!() };
        let ExprKind::Uminus(inner) = &rhs.kind else { panic!() };
        assert!(matches!(inner.kind, ExprKind::Uminus(_)));
    }

    #[test]
    fn if_with_else() {
        let event =
            parse_event("if spot > 100 then x = 1 else x = 0 y = 2 endif").unwrap();
        let Statement::If(block) = &event[0] else { panic!() };
        assert!(matches!(block.cond.kind, CondKind::Sup(_, _)));
        assert_eq!(block.then_branch.len(), 1);
        assert_eq!(block.else_branch.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn comparison_desugaring() {
        // `a < b` becomes Sup(b - a).
        let event = parse_event("if x < 5 then y = 1 endif").unwrap();
        let Statement::If(block) = &event[0] else { panic!() };
        let CondKind::Sup(arg, _) = &block.cond.kind else {
            panic!("expected Sup, got {:?}", block.cond.kind)
        };
        let ExprKind::Sub(lhs, _) = &arg.kind else { panic!() };
        assert!(matches!(lhs.kind, ExprKind::Const(_)), "operands must swap");

        // `a != b` becomes Not(Equal(a - b)).
        let event = parse_event("if x != 5 then y = 1 endif").unwrap();
        let Statement::If(block) = &event[0] else { panic!() };
        assert!(matches!(block.cond.kind, CondKind::Not(_)));
    }

    #[test]
    fn fuzzy_eps_attaches_to_comparison() {
        let event = parse_event("if spot > 100 ; 0.5 then x = 1 endif").unwrap();
        let Statement::If(block) = &event[0] else { panic!() };
        let CondKind::Sup(_, info) = &block.cond.kind else { panic!() };
        assert_eq!(info.eps, 0.5);
    }

    #[test]
    fn nary_max_canonicalizes_left_deep() {
        let event = parse_event("x = MAX(1, 2, 3, 4)").unwrap();
        let Statement::Assign { rhs, .. } = &event[0] else { panic!() };
        let ExprKind::Max(lhs, _) = &rhs.kind else { panic!() };
        let ExprKind::Max(inner, _) = &lhs.kind else { panic!() };
        assert!(matches!(inner.kind, ExprKind::Max(_, _)));
    }

    #[test]
    fn and_or_precedence() {
        // AND binds tighter than OR.
        let event =
            parse_event("if x > 1 or y > 2 and z > 3 then w = 1 endif").unwrap();
        let Statement::If(block) = &event[0] else { panic!() };
        let CondKind::Or(_, rhs) = &block.cond.kind else {
            panic!("expected top-level OR")
        };
        assert!(matches!(rhs.kind, CondKind::And(_, _)));
    }

    #[test]
    fn errors_carry_positions() {
        let err = parse_event("if spot > 100 then x = 1").unwrap_err();
        assert!(matches!(err, ScriptError::Parse { .. }), "missing ENDIF: {err}");

        let err = parse_event("x = log(1, 2)").unwrap_err();
        assert!(matches!(err, ScriptError::Arity { got: 2, .. }));

        let err = parse_event("x = frobnicate(1)").unwrap_err();
        assert!(matches!(err, ScriptError::UnknownFunction { .. }));

        let err = parse_event("2 = 3").unwrap_err();
        assert!(matches!(err, ScriptError::Parse { .. }));

        let err = parse_event("x = (1 + 2").unwrap_err();
        assert!(matches!(err, ScriptError::Parse { .. }));
    }

    #[test]
    fn smooth_requires_four_args() {
        assert!(parse_event("x = smooth(spot - 100, 1, 0, 0.5)").is_ok());
        assert!(matches!(
            parse_event("x = smooth(spot - 100, 1, 0)"),
            Err(ScriptError::Arity { .. })
        ));
    }
}
