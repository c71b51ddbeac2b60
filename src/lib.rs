//! PayScript is a scripting engine for financial payoffs: users describe a
//! product as dated events in a small expression language, and the engine
//! parses, analyzes, compiles and values the scripts by Monte-Carlo
//! simulation.
//!
//! The pipeline runs parsing, variable indexing, if-scope analysis,
//! interval-arithmetic domain inference, constant-condition elimination,
//! constant folding and bytecode compilation, then evaluates paths with a
//! sharp tree walker, a fuzzy (smoothed) tree walker, or a two-stack
//! bytecode executor.
//!
//! References:
//! - Andreasen and Savine, *Modern Computational Finance: Scripting for
//!   Derivatives and XVA*, for the scripting architecture.
//! - Moore et al., *Introduction to Interval Analysis*, for the domain
//!   algebra underlying dead-branch elimination.
//!
//! # Quick Start
//!
//! Value a vanilla call written as a script:
//!
//! ```rust
//! use chrono::NaiveDate;
//! use payscript::engines::ScriptEngine;
//! use payscript::models::BlackScholes;
//! use payscript::script::Product;
//!
//! let today = NaiveDate::from_ymd_opt(2027, 1, 1).unwrap();
//! let expiry = NaiveDate::from_ymd_opt(2028, 1, 1).unwrap();
//!
//! let mut product = Product::new([(expiry, "opt PAYS MAX(SPOT - 100, 0)")]).unwrap();
//! product.pre_process(false, false).unwrap();
//!
//! let mut model = BlackScholes::new(100.0, 0.20, 0.0);
//! let engine = ScriptEngine::new(20_000, 42);
//! let value = engine.value(today, &mut model, &product).unwrap();
//!
//! assert_eq!(value.var_names, ["OPT"]);
//! assert!(value.var_vals[0] > 6.0 && value.var_vals[0] < 10.0);
//! ```
//!
//! Inspect the preprocessed tree:
//!
//! ```rust
//! use chrono::NaiveDate;
//! use payscript::script::Product;
//!
//! let date = NaiveDate::from_ymd_opt(2028, 1, 1).unwrap();
//! let mut product = Product::new([(date, "IF 1 > 0 THEN X = SPOT ENDIF")]).unwrap();
//! product.pre_process(false, false).unwrap();
//!
//! // The constant condition is gone after preprocessing.
//! assert!(!product.debug_dump().contains("IF"));
//! ```

pub mod core;
pub mod domain;
pub mod engines;
pub mod math;
pub mod models;
pub mod script;

/// Common imports for ergonomic usage.
pub mod prelude {
    pub use crate::core::{ScriptError, ScriptResult};
    pub use crate::domain::{Bound, Domain, Interval};
    pub use crate::engines::{EvalRegime, ScriptEngine, ScriptValue};
    pub use crate::models::{Bachelier, BlackScholes, SimulModel};
    pub use crate::script::{Evaluator, FuzzyEvaluator, PathEvaluator, Product, Scalar};
}
