//! Normal (Bachelier) simulation model.

use chrono::NaiveDate;

use crate::models::{year_fraction, SimulModel};

/// Arithmetic Brownian dynamics `dS = r S dt + v dW` with a flat rate.
/// Near-zero rates use the driftless exact scheme; otherwise the
/// mean-reverting-free OU-style exact variance applies.
#[derive(Debug, Clone)]
pub struct Bachelier {
    spot: f64,
    vol: f64,
    rate: f64,

    time0: bool,
    times: Vec<f64>,
    dt: Vec<f64>,
    sqrt_dt: Vec<f64>,
}

/// Below this rate magnitude the exact-variance term degenerates
/// numerically and the driftless scheme is used instead.
const SMALL_RATE: f64 = 1.0e-4;

impl Bachelier {
    pub fn new(spot: f64, vol: f64, rate: f64) -> Self {
        Self {
            spot,
            vol,
            rate,
            time0: false,
            times: Vec::new(),
            dt: Vec::new(),
            sqrt_dt: Vec::new(),
        }
    }

    fn step_vol(&self, dt: f64) -> f64 {
        self.vol * ((2.0 * self.rate * dt).exp_m1() / (2.0 * self.rate)).sqrt()
    }
}

impl SimulModel for Bachelier {
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

        if self.rate.abs() < SMALL_RATE {
            spots[0] = if self.time0 {
                self.spot
            } else {
                let g = gauss[step];
                step += 1;
                self.spot + self.vol * self.sqrt_dt[0] * g
            };
            for i in 1..self.times.len() {
                let g = gauss[step];
                step += 1;
                spots[i] = spots[i - 1] + self.vol * self.sqrt_dt[i] * g;
            }
        } else {
            spots[0] = if self.time0 {
                self.spot
            } else {
                let g = gauss[step];
                step += 1;
                self.spot * (self.rate * self.dt[0]).exp() + self.step_vol(self.dt[0]) * g
            };
            for i in 1..self.times.len() {
                let g = gauss[step];
                step += 1;
                spots[i] =
                    spots[i - 1] * (self.rate * self.dt[i]).exp() + self.step_vol(self.dt[i]) * g;
            }
        }
    }
}
