//! Stochastic simulation models feeding the script evaluators.
//!
//! A model turns a vector of independent Gaussians into one path of
//! `(spot, numeraire)` observations, one per event date. Both stock models
//! discount with the deterministic money-market account `exp(r t)`.

mod bachelier;
mod black_scholes;

pub use bachelier::Bachelier;
pub use black_scholes::BlackScholes;

use chrono::NaiveDate;

/// Act/365 year fraction between two dates.
pub(crate) fn year_fraction(from: NaiveDate, to: NaiveDate) -> f64 {
    (to - from).num_days() as f64 / 365.0
}

/// Model interface for Monte-Carlo simulation over a product's event dates.
pub trait SimulModel: Send + Sync {
    /// Precompute the time grid. Must be called before `apply_sde`.
    fn init_sim_dates(&mut self, today: NaiveDate, dates: &[NaiveDate]);

    /// Number of Gaussian draws one path consumes.
    fn dim(&self) -> usize;

    /// Map `gauss` (length `dim()`) onto spots and numeraires per event
    /// date (length = number of dates).
    fn apply_sde(&self, gauss: &[f64], spots: &mut [f64], numeraires: &mut [f64]);
}
