//! Lognormal (Black-Scholes) simulation model.

use chrono::NaiveDate;

use crate::models::{year_fraction, SimulModel};

/// Constant-volatility lognormal dynamics with a flat rate:
/// `dS/S = r dt + v dW`, simulated exactly on the event-date grid.
#[derive(Debug, Clone)]
pub struct BlackScholes {
    spot: f64,
    vol: f64,
    rate: f64,
    /// `r - v^2/2`, the drift of `log S`.
    drift: f64,

    // Time grid, set by `init_sim_dates`.
    time0: bool,
    times: Vec<f64>,
    dt: Vec<f64>,
    sqrt_dt: Vec<f64>,
}

impl BlackScholes {
    pub fn new(spot: f64, vol: f64, rate: f64) -> Self {
        Self {
            spot,
            vol,
            rate,
            drift: rate - 0.5 * vol * vol,
            time0: false,
            times: Vec::new(),
            dt: Vec::new(),
            sqrt_dt: Vec::new(),
        }
    }

    pub fn spot(&self) -> f64 {
        self.spot
    }

    pub fn vol(&self) -> f64 {
        self.vol
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl SimulModel for BlackScholes {
    fn init_sim_dates(&mut self, today: NaiveDate, dates: &[NaiveDate]) {
        self.time0 = dates.first() == Some(&today);
        self.times = dates.iter().map(|&d| year_fraction(today, d)).collect();

        self.dt.clear();
        self.dt.push(self.times[0]);
        for i in 1..self.times.len() {
            self.dt.push(self.times[i] - self.times[i - 1]);
        }
        self.sqrt_dt = self.dt.iter().map(|&dt| dt.sqrt()).collect();
    }

    fn dim(&self) -> usize {
        self.times.len() - usize::from(self.time0)
    }

    fn apply_sde(&self, gauss: &[f64], spots: &mut [f64], numeraires: &mut [f64]) {
        for (num, &t) in numeraires.iter_mut().zip(&self.times) {
            *num = (self.rate * t).exp();
        }

        let mut step = 0;
        spots[0] = if self.time0 {
            self.spot
        } else {
            let g = gauss[step];
            step += 1;
            self.spot * (self.drift * self.dt[0] + self.vol * self.sqrt_dt[0] * g).exp()
        };

        for i in 1..self.times.len() {
            let g = gauss[step];
            step += 1;
            spots[i] =
                spots[i - 1] * (self.drift * self.dt[i] + self.vol * self.sqrt_dt[i] * g).exp();
        }
    }
}
