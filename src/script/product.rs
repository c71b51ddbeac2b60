//! Scripted product: the top-level API for the pipeline.
//!
//! A product is an ordered set of dated events. Client code parses the
//! event texts, runs `pre_process`, optionally `compile`s, and then
//! evaluates the product against one scenario per Monte-Carlo path:
//!
//! ```text
//! text -> parse -> index -> ifProcess -> domainProcess -> constCondProcess
//!      -> (constProcess + compile) -> evaluate(scenario) -> accumulate
//! ```

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::core::{ScriptError, ScriptResult};
use crate::script::ast::Event;
use crate::script::compiler::{compile_events, CompiledEvent};
use crate::script::constcond::const_cond_process;
use crate::script::constproc::const_process;
use crate::script::domainproc::domain_process;
use crate::script::evaluator::{Evaluator, PathEvaluator, Scalar};
use crate::script::executor::{eval_compiled, EvalState};
use crate::script::fuzzy::FuzzyEvaluator;
use crate::script::ifproc::if_process;
use crate::script::indexer::index_variables;
use crate::script::parser::parse_event;
use crate::script::scenario::{Scenario, SimulData};

/// A parsed scripted product, with its analysis results and (optionally)
/// compiled event streams. Immutable once preprocessed, so it can be
/// shared by reference across worker threads.
#[derive(Debug, Clone)]
pub struct Product {
    event_dates: Vec<NaiveDate>,
    events: Vec<Event>,
    var_names: Vec<String>,
    max_nested_ifs: usize,
    compiled: Vec<CompiledEvent>,
}

impl Product {
    /// Build a product from `(date, event text)` pairs. Texts sharing a
    /// date concatenate into a single event, and events are ordered by
    /// date regardless of input order.
    pub fn new<I, S>(events: I) -> ScriptResult<Self>
    where
        I: IntoIterator<Item = (NaiveDate, S)>,
        S: AsRef<str>,
    {
        let mut by_date: BTreeMap<NaiveDate, String> = BTreeMap::new();
        for (date, text) in events {
            let slot = by_date.entry(date).or_default();
            if !slot.is_empty() {
                slot.push(' ');
            }
            slot.push_str(text.as_ref());
        }

        if by_date.is_empty() {
            return Err(ScriptError::EmptyProduct);
        }

        let mut event_dates = Vec::with_capacity(by_date.len());
        let mut parsed = Vec::with_capacity(by_date.len());
        for (date, text) in by_date {
            event_dates.push(date);
            parsed.push(parse_event(&text)?);
        }

        Ok(Self {
            event_dates,
            events: parsed,
            var_names: Vec::new(),
            max_nested_ifs: 0,
            compiled: Vec::new(),
        })
    }

    // --- accessors ---

    pub fn event_dates(&self) -> &[NaiveDate] {
        &self.event_dates
    }

    /// Variable names in index order; empty before `index_variables`.
    pub fn var_names(&self) -> &[String] {
        &self.var_names
    }

    pub fn num_vars(&self) -> usize {
        self.var_names.len()
    }

    /// Statement trees per event, for tooling and tests.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn max_nested_ifs(&self) -> usize {
        self.max_nested_ifs
    }

    pub fn compiled_events(&self) -> &[CompiledEvent] {
        &self.compiled
    }

    pub fn is_compiled(&self) -> bool {
        !self.compiled.is_empty()
    }

    /// Indented dump of every event's statement trees.
    pub fn debug_dump(&self) -> String {
        use std::fmt::Write;
        let mut out = String::new();
        for (v, name) in self.var_names.iter().enumerate() {
            let _ = writeln!(out, "var[{v}] = {name}");
        }
        for (date, event) in self.event_dates.iter().zip(&self.events) {
            let _ = writeln!(out, "event {date}");
            for stmt in event {
                out.push_str(&stmt.dump());
            }
        }
        out
    }

    // --- processors ---

    /// Assign dense indices to all variables and record their names.
    pub fn index_variables(&mut self) {
        self.var_names = index_variables(&mut self.events);
    }

    /// Compute per-`IF` affected variables and the maximum nesting depth.
    pub fn if_process(&mut self) -> usize {
        self.max_nested_ifs = if_process(&mut self.events);
        self.max_nested_ifs
    }

    /// Infer domains and mark constant conditions; `fuzzy` also fills the
    /// comparison smoothing metadata.
    pub fn domain_process(&mut self, fuzzy: bool) -> ScriptResult<()> {
        domain_process(&mut self.events, self.var_names.len(), fuzzy)
    }

    /// Eliminate conditions proven always true or always false.
    pub fn const_cond_process(&mut self) {
        const_cond_process(&mut self.events);
    }

    /// Mark constant expressions bottom-up.
    pub fn const_process(&mut self) {
        const_process(&mut self.events, self.var_names.len());
    }

    /// Constant-fold and emit the per-event instruction streams.
    pub fn compile(&mut self) {
        self.const_process();
        self.compiled = compile_events(&self.events);
    }

    /// Full preprocessing: variable indexing always; if/domain/const-cond
    /// analysis unless skipped (fuzzy mode never skips, it needs the
    /// smoothing metadata). Returns the maximum nested-if depth.
    pub fn pre_process(&mut self, fuzzy: bool, skip_domains: bool) -> ScriptResult<usize> {
        self.index_variables();

        if fuzzy || !skip_domains {
            self.if_process();
            self.domain_process(fuzzy)?;
            self.const_cond_process();
        }

        Ok(self.max_nested_ifs)
    }

    // --- factories ---

    pub fn build_evaluator<T: Scalar>(&self) -> Evaluator<T> {
        Evaluator::new(self.var_names.len())
    }

    pub fn build_fuzzy_evaluator<T: Scalar>(&self, def_eps: f64) -> FuzzyEvaluator<T> {
        FuzzyEvaluator::new(self.var_names.len(), self.max_nested_ifs, def_eps)
    }

    pub fn build_eval_state<T: Scalar>(&self) -> EvalState<T> {
        EvalState::new(self.var_names.len())
    }

    /// A zeroed scenario buffer of the right length (numeraires start
    /// at 1 so an unfilled buffer cannot divide by zero).
    pub fn build_scenario<T: Scalar>(&self) -> Scenario<T> {
        vec![
            SimulData { spot: T::from_f64(0.0), numeraire: T::from_f64(1.0) };
            self.event_dates.len()
        ]
    }

    // --- evaluation ---

    /// Evaluate the product in one scenario with a tree evaluator (sharp
    /// or fuzzy). Statements run strictly in event-date order, and in
    /// source order within an event.
    pub fn evaluate<T: Scalar, E: PathEvaluator<T>>(&self, scenario: &Scenario<T>, eval: &mut E) {
        debug_assert_eq!(scenario.len(), self.events.len());
        eval.init();
        for (event, data) in self.events.iter().zip(scenario) {
            eval.eval_event(event, data);
        }
    }

    /// Evaluate the compiled streams in one scenario.
    pub fn evaluate_compiled<T: Scalar>(&self, scenario: &Scenario<T>, state: &mut EvalState<T>) {
        debug_assert_eq!(scenario.len(), self.compiled.len());
        state.init();
        for (event, data) in self.compiled.iter().zip(scenario) {
            eval_compiled(event, data, state);
        }
    }
}
