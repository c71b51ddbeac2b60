//! Valuation engines driving the script pipeline over simulated paths.

pub mod monte_carlo;

pub use monte_carlo::{
    BasicRanGen, EvalRegime, FastRanGen, RandomGen, ScriptEngine, ScriptValue,
};
