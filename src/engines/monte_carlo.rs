//! Monte-Carlo driver for scripted products.
//!
//! One `(product, evaluator, scenario)` triple is a self-contained,
//! single-threaded unit of work. Parallelism comes from cloning: the
//! preprocessed (and optionally compiled) product is shared by reference
//! across workers, and each worker owns its evaluator state, scenario
//! buffer and a skip-ahead partition of the random stream. Partial sums
//! reduce after all paths complete, so results are reproducible for a
//! given seed, path count and chunking.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;
use tracing::debug;

use chrono::NaiveDate;

use crate::core::{ScriptError, ScriptResult};
use crate::math::fast_rng::{sample_standard_normal, FastRng, FastRngKind};
use crate::models::SimulModel;
use crate::script::{PathEvaluator, Product};

/// Gaussian vector source for path generation.
pub trait RandomGen: Send {
    /// Set the per-path dimension. Must be called before drawing.
    fn init(&mut self, dim: usize);

    /// Generate the next path's Gaussian vector.
    fn next_normal_vec(&mut self) -> &[f64];

    /// Jump the stream forward by `paths` whole paths, for deterministic
    /// partitioning across workers. Generators that cannot jump refuse.
    fn skip_ahead(&mut self, paths: u64) -> ScriptResult<()>;
}

/// Plain generator on top of the standard library RNG. Cannot skip ahead,
/// so it is rejected by the parallel driver.
#[derive(Debug, Clone)]
pub struct BasicRanGen {
    rng: StdRng,
    norm_vec: Vec<f64>,
}

impl BasicRanGen {
    pub fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed), norm_vec: Vec::new() }
    }
}

impl RandomGen for BasicRanGen {
    fn init(&mut self, dim: usize) {
        self.norm_vec.resize(dim, 0.0);
    }

    fn next_normal_vec(&mut self) -> &[f64] {
        for slot in &mut self.norm_vec {
            *slot = self.rng.sample(StandardNormal);
        }
        &self.norm_vec
    }

    fn skip_ahead(&mut self, _paths: u64) -> ScriptResult<()> {
        Err(ScriptError::NotSkippable)
    }
}

/// Generator over the hand-rolled uniform kinds, mapping one uniform to one
/// Gaussian through the inverse normal CDF, so a path costs exactly `dim`
/// draws. Skip-ahead delegates to the kind: PCG64 jumps in O(log n), the
/// other kinds refuse.
#[derive(Debug, Clone)]
pub struct FastRanGen {
    rng: FastRng,
    norm_vec: Vec<f64>,
}

impl FastRanGen {
    pub fn new(kind: FastRngKind, seed: u64) -> Self {
        Self { rng: FastRng::from_seed(kind, seed), norm_vec: Vec::new() }
    }

    /// The default skippable kind (PCG64).
    pub fn skippable(seed: u64) -> Self {
        Self::new(FastRngKind::Pcg64, seed)
    }
}

impl RandomGen for FastRanGen {
    fn init(&mut self, dim: usize) {
        self.norm_vec.resize(dim, 0.0);
    }

    fn next_normal_vec(&mut self) -> &[f64] {
        for slot in &mut self.norm_vec {
            *slot = sample_standard_normal(&mut self.rng);
        }
        &self.norm_vec
    }

    fn skip_ahead(&mut self, paths: u64) -> ScriptResult<()> {
        if self.rng.skip_ahead(paths * self.norm_vec.len() as u64) {
            Ok(())
        } else {
            Err(ScriptError::NotSkippable)
        }
    }
}

/// Which evaluation regime the engine runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EvalRegime {
    /// Sharp tree evaluator.
    Sharp,
    /// Fuzzy tree evaluator with the given default smoothing width.
    Fuzzy { def_eps: f64 },
    /// Compiled bytecode executor; the product must be compiled.
    Compiled,
}

/// Aggregated valuation output: per-variable path averages.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptValue {
    /// Names in index order, from the product.
    pub var_names: Vec<String>,
    /// Mean of each variable across paths.
    pub var_vals: Vec<f64>,
}

/// Monte-Carlo engine for preprocessed scripted products.
#[derive(Debug, Clone)]
pub struct ScriptEngine {
    pub num_paths: usize,
    pub seed: u64,
    pub regime: EvalRegime,
}

impl ScriptEngine {
    pub fn new(num_paths: usize, seed: u64) -> Self {
        Self { num_paths, seed, regime: EvalRegime::Sharp }
    }

    pub fn with_regime(num_paths: usize, seed: u64, regime: EvalRegime) -> Self {
        Self { num_paths, seed, regime }
    }

    fn validate(&self, today: NaiveDate, product: &Product) -> ScriptResult<()> {
        if self.num_paths == 0 {
            return Err(ScriptError::Invalid("num_paths must be > 0".to_string()));
        }
        if product.var_names().is_empty() {
            return Err(ScriptError::Invalid(
                "product must be preprocessed before valuation".to_string(),
            ));
        }
        if product.event_dates().first().is_some_and(|&d| d < today) {
            return Err(ScriptError::EventInPast);
        }
        if self.regime == EvalRegime::Compiled && !product.is_compiled() {
            return Err(ScriptError::Invalid(
                "compiled regime requires Product::compile".to_string(),
            ));
        }
        Ok(())
    }

    /// Sequential valuation with the default skippable generator.
    pub fn value<M: SimulModel>(
        &self,
        today: NaiveDate,
        model: &mut M,
        product: &Product,
    ) -> ScriptResult<ScriptValue> {
        let mut gen = FastRanGen::skippable(self.seed);
        self.value_with_gen(today, model, product, &mut gen)
    }

    /// Sequential valuation with a caller-supplied generator.
    pub fn value_with_gen<M: SimulModel>(
        &self,
        today: NaiveDate,
        model: &mut M,
        product: &Product,
        gen: &mut dyn RandomGen,
    ) -> ScriptResult<ScriptValue> {
        self.validate(today, product)?;

        model.init_sim_dates(today, product.event_dates());
        gen.init(model.dim());

        let sums = run_paths(product, &*model, gen, self.num_paths, self.regime);
        Ok(self.average(product, sums))
    }

    /// Parallel valuation. Paths are split into per-worker chunks; each
    /// worker clones the generator and skips ahead to its partition, so
    /// the union of chunks replays exactly the sequential stream.
    pub fn value_parallel<M, G>(
        &self,
        today: NaiveDate,
        model: &M,
        product: &Product,
        gen: &G,
    ) -> ScriptResult<ScriptValue>
    where
        M: SimulModel + Clone + Sync,
        G: RandomGen + Clone + Sync,
    {
        self.validate(today, product)?;

        let mut model = model.clone();
        model.init_sim_dates(today, product.event_dates());
        let dim = model.dim();

        let chunks = split_paths(self.num_paths, rayon::current_num_threads());
        let starts: Vec<(usize, usize)> = chunks
            .iter()
            .scan(0usize, |start, &n| {
                let s = *start;
                *start += n;
                Some((s, n))
            })
            .collect();
        debug!(paths = self.num_paths, chunks = starts.len(), "parallel valuation");

        let partials: Vec<Vec<f64>> = starts
            .par_iter()
            .map(|&(start, count)| -> ScriptResult<Vec<f64>> {
                let mut local_gen = gen.clone();
                local_gen.init(dim);
                local_gen.skip_ahead(start as u64)?;
                Ok(run_paths(product, &model, &mut local_gen, count, self.regime))
            })
            .collect::<ScriptResult<_>>()?;

        let mut sums = vec![0.0; product.num_vars()];
        for partial in partials {
            for (acc, v) in sums.iter_mut().zip(partial) {
                *acc += v;
            }
        }
        Ok(self.average(product, sums))
    }

    fn average(&self, product: &Product, mut sums: Vec<f64>) -> ScriptValue {
        let n = self.num_paths as f64;
        for v in &mut sums {
            *v /= n;
        }
        ScriptValue { var_names: product.var_names().to_vec(), var_vals: sums }
    }
}

/// Evaluate `num_paths` consecutive paths and return per-variable sums.
fn run_paths(
    product: &Product,
    model: &dyn SimulModel,
    gen: &mut dyn RandomGen,
    num_paths: usize,
    regime: EvalRegime,
) -> Vec<f64> {
    let n_events = product.event_dates().len();
    let mut spots = vec![0.0; n_events];
    let mut numeraires = vec![0.0; n_events];
    let mut scenario = product.build_scenario::<f64>();
    let mut sums = vec![0.0; product.num_vars()];

    let accumulate = |vals: &[f64], sums: &mut Vec<f64>| {
        for (acc, v) in sums.iter_mut().zip(vals) {
            *acc += v;
        }
    };

    match regime {
        EvalRegime::Sharp => {
            let mut eval = product.build_evaluator::<f64>();
            for _ in 0..num_paths {
                next_scenario(model, gen, &mut spots, &mut numeraires, &mut scenario);
                product.evaluate(&scenario, &mut eval);
                accumulate(eval.var_vals(), &mut sums);
            }
        }
        EvalRegime::Fuzzy { def_eps } => {
            let mut eval = product.build_fuzzy_evaluator::<f64>(def_eps);
            for _ in 0..num_paths {
                next_scenario(model, gen, &mut spots, &mut numeraires, &mut scenario);
                product.evaluate(&scenario, &mut eval);
                accumulate(eval.var_vals(), &mut sums);
            }
        }
        EvalRegime::Compiled => {
            let mut state = product.build_eval_state::<f64>();
            for _ in 0..num_paths {
                next_scenario(model, gen, &mut spots, &mut numeraires, &mut scenario);
                product.evaluate_compiled(&scenario, &mut state);
                accumulate(&state.variables, &mut sums);
            }
        }
    }

    sums
}

fn next_scenario(
    model: &dyn SimulModel,
    gen: &mut dyn RandomGen,
    spots: &mut [f64],
    numeraires: &mut [f64],
    scenario: &mut [crate::script::SimulData<f64>],
) {
    let gauss = gen.next_normal_vec();
    model.apply_sde(gauss, spots, numeraires);
    for (slot, (&s, &n)) in scenario.iter_mut().zip(spots.iter().zip(numeraires.iter())) {
        slot.spot = s;
        slot.numeraire = n;
    }
}

/// Near-even split of `n_paths` over at most `n_chunks` workers.
fn split_paths(n_paths: usize, n_chunks: usize) -> Vec<usize> {
    let chunks = n_chunks.max(1);
    let base = n_paths / chunks;
    let rem = n_paths % chunks;
    (0..chunks)
        .map(|i| if i < rem { base + 1 } else { base })
        .filter(|&n| n > 0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BlackScholes;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn forward_product() -> Product {
        let mut prd =
            Product::new([(date(2028, 1, 1), "x = spot")]).unwrap();
        prd.pre_process(false, false).unwrap();
        prd
    }

    #[test]
    fn split_paths_covers_everything() {
        assert_eq!(split_paths(10, 3), [4, 3, 3]);
        assert_eq!(split_paths(2, 8), [1, 1]);
        assert_eq!(split_paths(0, 4), Vec::<usize>::new());
        assert_eq!(split_paths(7, 1), [7]);
    }

    #[test]
    fn event_in_past_is_rejected() {
        let prd = forward_product();
        let mut model = BlackScholes::new(100.0, 0.2, 0.0);
        let engine = ScriptEngine::new(100, 1);
        let err = engine.value(date(2030, 1, 1), &mut model, &prd).unwrap_err();
        assert_eq!(err, ScriptError::EventInPast);
    }

    #[test]
    fn unpreprocessed_product_is_rejected() {
        let prd = Product::new([(date(2028, 1, 1), "x = spot")]).unwrap();
        let mut model = BlackScholes::new(100.0, 0.2, 0.0);
        let engine = ScriptEngine::new(100, 1);
        let err = engine.value(date(2027, 1, 1), &mut model, &prd).unwrap_err();
        assert!(matches!(err, ScriptError::Invalid(_)));
    }

    #[test]
    fn compiled_regime_requires_compilation() {
        let prd = forward_product();
        let mut model = BlackScholes::new(100.0, 0.2, 0.0);
        let engine = ScriptEngine::with_regime(10, 1, EvalRegime::Compiled);
        let err = engine.value(date(2027, 1, 1), &mut model, &prd).unwrap_err();
        assert!(matches!(err, ScriptError::Invalid(_)));
    }

    #[test]
    fn basic_generator_refuses_parallel() {
        let prd = forward_product();
        let model = BlackScholes::new(100.0, 0.2, 0.0);
        let engine = ScriptEngine::new(64, 1);
        let gen = BasicRanGen::new(1);
        let err = engine
            .value_parallel(date(2027, 1, 1), &model, &prd, &gen)
            .unwrap_err();
        assert_eq!(err, ScriptError::NotSkippable);
    }

    #[test]
    fn non_skippable_kind_refuses_parallel() {
        let prd = forward_product();
        let model = BlackScholes::new(100.0, 0.2, 0.0);
        let engine = ScriptEngine::new(64, 1);
        let gen = FastRanGen::new(FastRngKind::Xoshiro256PlusPlus, 1);
        let err = engine
            .value_parallel(date(2027, 1, 1), &model, &prd, &gen)
            .unwrap_err();
        assert_eq!(err, ScriptError::NotSkippable);
    }

    #[test]
    fn forward_prices_near_spot_at_zero_rate() {
        let prd = forward_product();
        let mut model = BlackScholes::new(100.0, 0.2, 0.0);
        let engine = ScriptEngine::new(50_000, 1);
        let value = engine.value(date(2027, 1, 1), &mut model, &prd).unwrap();
        assert_eq!(value.var_names, ["X"]);
        assert!(
            (value.var_vals[0] - 100.0).abs() < 0.5,
            "forward {}",
            value.var_vals[0]
        );
    }

    #[test]
    fn parallel_matches_sequential_stream() {
        let prd = forward_product();
        let mut model = BlackScholes::new(100.0, 0.2, 0.0);
        let engine = ScriptEngine::new(10_000, 42);

        let seq = engine.value(date(2027, 1, 1), &mut model, &prd).unwrap();
        let par = engine
            .value_parallel(date(2027, 1, 1), &model, &prd, &FastRanGen::skippable(42))
            .unwrap();

        // Same paths, different summation order.
        assert!(
            (seq.var_vals[0] - par.var_vals[0]).abs() < 1.0e-9,
            "seq {} vs par {}",
            seq.var_vals[0],
            par.var_vals[0]
        );
    }

    #[test]
    fn regimes_agree_on_forward() {
        let mut prd = forward_product();
        prd.compile();
        let today = date(2027, 1, 1);

        let mut vals = Vec::new();
        for regime in [EvalRegime::Sharp, EvalRegime::Compiled] {
            let mut model = BlackScholes::new(100.0, 0.2, 0.0);
            let engine = ScriptEngine::with_regime(5_000, 7, regime);
            vals.push(engine.value(today, &mut model, &prd).unwrap().var_vals[0]);
        }
        assert_eq!(vals[0], vals[1], "same stream, same semantics");
    }
}
