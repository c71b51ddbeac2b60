//! Payoff-script processing pipeline.
//!
//! Event scripts go through a fixed chain of stages:
//!
//! ```text
//! text ── lexer/parser ──> AST
//!     ── indexer ────────> dense variable indices + names
//!     ── ifproc ─────────> per-IF affected variables, max nesting
//!     ── domainproc ─────> domains, always-true/false, fuzzy bounds
//!     ── constcond ──────> dead conditions and branches removed
//!     ── constproc ──────> constant subtrees marked
//!     ── compiler ───────> linear instruction streams per event
//! ```
//!
//! and are then evaluated per Monte-Carlo path by the sharp tree walker,
//! the fuzzy tree walker, or the bytecode executor. [`Product`] drives the
//! whole chain; the individual passes are public for tooling and tests.

pub mod ast;
pub mod compiler;
pub mod constcond;
pub mod constproc;
pub mod domainproc;
pub mod evaluator;
pub mod executor;
pub mod fuzzy;
pub mod ifproc;
pub mod indexer;
pub mod lexer;
pub mod parser;
pub mod product;
pub mod scenario;

pub use ast::{CompInfo, Cond, CondKind, Event, Expr, ExprKind, IfBlock, Statement, VarRef};
pub use compiler::{CompiledEvent, Instr};
pub use evaluator::{Evaluator, PathEvaluator, Scalar};
pub use executor::EvalState;
pub use fuzzy::FuzzyEvaluator;
pub use product::Product;
pub use scenario::{Scenario, SimulData};
