//! Simulated market data consumed by the evaluators.

/// One event date's market observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulData<T> {
    /// Simulated underlying price.
    pub spot: T,
    /// Discounting denominator; always positive.
    pub numeraire: T,
}

/// One path: a `SimulData` per event date, in the product's date order.
pub type Scenario<T> = Vec<SimulData<T>>;
