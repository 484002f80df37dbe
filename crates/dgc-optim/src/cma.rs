//! CPU-based CMA-ES with full covariance adaptation and box bounds.
//!
//! Sampling: `x = m + sigma * B * (D .* z)`, `z ~ N(0, I)`, clamped into the
//! box. The covariance is re-decomposed every generation.

use dgc_core::{ContinuousOptimizer, DgcError, OptimizerFactory, OptimizerSetup, Result, StopReason};
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::params::{CmaOptions, CmaParams};

/// Observable optimizer state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmaState {
    pub best_solution: Vec<f64>,
    pub best_fitness: f64,
    pub covariance_condition: f64,
    pub generation: u64,
    pub sigma: f64,
    pub mean_fitness: f64,
}

impl CmaState {
    pub fn new(dimension: usize, sigma: f64) -> Self {
        Self {
            best_solution: vec![0.0; dimension],
            best_fitness: f64::INFINITY,
            covariance_condition: 1.0,
            generation: 0,
            sigma,
            mean_fitness: 0.0,
        }
    }
}

/// CMA-ES optimizer for one restart.
pub struct CmaOptimizer {
    params: CmaParams,
    options: CmaOptions,

    lower: Vec<f64>,
    upper: Vec<f64>,

    // Distribution
    mean: DVector<f64>,
    sigma: f64,
    covariance: DMatrix<f64>,
    basis: DMatrix<f64>,
    scales: DVector<f64>,

    // Evolution paths
    ps: DVector<f64>,
    pc: DVector<f64>,

    // Bookkeeping
    pending: Option<Vec<DVector<f64>>>,
    last_fitness: Vec<f64>,
    history: VecDeque<f64>,
    history_length: usize,
    count_eval: u64,
    max_generations: u64,
    max_evaluations: Option<u64>,
    tol_x: f64,

    state: CmaState,
    rng: ChaCha8Rng,
}

impl CmaOptimizer {
    /// Builds an optimizer from a restart setup.
    ///
    /// # Errors
    /// [`DgcError::ConfigError`] for a zero dimension, a population below 2,
    /// bounds of the wrong length or an inverted bound pair.
    pub fn new(setup: &OptimizerSetup, options: CmaOptions) -> Result<Self> {
        let n = setup.dimension;
        if n == 0 {
            return Err(DgcError::config("CMA-ES dimension must be positive"));
        }
        if setup.population_size < 2 {
            return Err(DgcError::config(format!(
                "CMA-ES population size must be at least 2, got {}",
                setup.population_size
            )));
        }
        if setup.lower.len() != n || setup.upper.len() != n {
            return Err(DgcError::config(format!(
                "bounds have {}/{} entries, dimension is {}",
                setup.lower.len(),
                setup.upper.len(),
                n
            )));
        }
        if let Some(i) = (0..n).find(|&i| setup.lower[i] > setup.upper[i]) {
            return Err(DgcError::config(format!(
                "lower bound {} exceeds upper bound {} at coordinate {}",
                setup.lower[i], setup.upper[i], i
            )));
        }
        if !(options.initial_sigma > 0.0) {
            return Err(DgcError::config(format!(
                "initial step size must be positive, got {}",
                options.initial_sigma
            )));
        }

        let params = CmaParams::new(n, setup.population_size);
        let max_generations = setup
            .max_generations
            .unwrap_or_else(|| params.default_max_generations());
        let history_length = params.history_length();
        let mean = DVector::from_iterator(
            n,
            (0..n).map(|i| options.initial_x.clamp(setup.lower[i], setup.upper[i])),
        );

        Ok(Self {
            lower: setup.lower.clone(),
            upper: setup.upper.clone(),
            mean,
            sigma: options.initial_sigma,
            covariance: DMatrix::identity(n, n),
            basis: DMatrix::identity(n, n),
            scales: DVector::from_element(n, 1.0),
            ps: DVector::zeros(n),
            pc: DVector::zeros(n),
            pending: None,
            last_fitness: Vec::new(),
            history: VecDeque::with_capacity(history_length),
            history_length,
            count_eval: setup.initial_evaluations,
            max_generations,
            max_evaluations: setup.max_evaluations,
            tol_x: options.stop_tol_x_factor * options.initial_sigma,
            state: CmaState::new(n, options.initial_sigma),
            rng: ChaCha8Rng::seed_from_u64(setup.seed),
            params,
            options,
        })
    }

    pub fn params(&self) -> &CmaParams {
        &self.params
    }

    pub fn get_state(&self) -> &CmaState {
        &self.state
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    fn sample_one(&mut self) -> DVector<f64> {
        let n = self.params.dimension;
        let z: DVector<f64> =
            DVector::from_iterator(n, (0..n).map(|_| StandardNormal.sample(&mut self.rng)));
        let y = &self.basis * z.component_mul(&self.scales);
        let mut x = &self.mean + y * self.sigma;
        for i in 0..n {
            x[i] = x[i].clamp(self.lower[i], self.upper[i]);
        }
        x
    }

    fn record_best(&mut self, x: &[f64], fitness: f64) {
        if fitness < self.state.best_fitness {
            self.state.best_fitness = fitness;
            self.state.best_solution = x.to_vec();
        }
    }

    /// Re-decomposes `C = B D^2 B^T`.
    fn decompose(&mut self) {
        let n = self.params.dimension;
        let symmetric = (&self.covariance + self.covariance.transpose()) * 0.5;
        let eigen = SymmetricEigen::new(symmetric.clone());
        self.covariance = symmetric;
        self.basis = eigen.eigenvectors;
        self.scales = eigen.eigenvalues.map(|v| v.max(1e-300).sqrt());

        let (mut max_d, mut min_d) = (0.0_f64, f64::INFINITY);
        for i in 0..n {
            max_d = max_d.max(self.scales[i]);
            min_d = min_d.min(self.scales[i]);
        }
        self.state.covariance_condition = (max_d / min_d).powi(2);
    }

    /// Emit telemetry metrics
    pub fn emit_telemetry(&self) -> HashMap<String, serde_json::Value> {
        use serde_json::json;

        let mut telemetry = HashMap::new();
        telemetry.insert("cma_generation".to_string(), json!(self.state.generation));
        telemetry.insert("cma_best_fitness".to_string(), json!(self.state.best_fitness));
        telemetry.insert("cma_mean_fitness".to_string(), json!(self.state.mean_fitness));
        telemetry.insert("cma_sigma".to_string(), json!(self.sigma));
        telemetry.insert(
            "cma_condition".to_string(),
            json!(self.state.covariance_condition),
        );
        telemetry.insert("cma_evaluations".to_string(), json!(self.count_eval));

        telemetry
    }
}

fn range(values: impl IntoIterator<Item = f64>) -> f64 {
    let (lo, hi) = values
        .into_iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo > hi {
        0.0
    } else {
        hi - lo
    }
}

impl ContinuousOptimizer for CmaOptimizer {
    fn init(&mut self) -> Result<Vec<f64>> {
        log::debug!(
            "CMA-ES init: n={}, lambda={}, mu={}, mu_eff={:.3}, max_generations={}",
            self.params.dimension,
            self.params.population_size,
            self.params.parent_size,
            self.params.mu_eff,
            self.max_generations
        );
        Ok(vec![0.0; self.params.population_size])
    }

    fn sample_population(&mut self) -> Vec<Vec<f64>> {
        let population: Vec<DVector<f64>> = (0..self.params.population_size)
            .map(|_| self.sample_one())
            .collect();
        let out = population.iter().map(|x| x.as_slice().to_vec()).collect();
        self.pending = Some(population);
        out
    }

    fn update_distribution(&mut self, fitness: &[f64]) -> Result<()> {
        let population = self
            .pending
            .take()
            .ok_or_else(|| DgcError::optimizer("update_distribution called before sample_population"))?;
        if fitness.len() != population.len() {
            let expected = population.len();
            self.pending = Some(population);
            return Err(DgcError::optimizer(format!(
                "expected {} fitness values, got {}",
                expected,
                fitness.len()
            )));
        }

        let n = self.params.dimension;
        let lambda = self.params.population_size;
        self.count_eval += lambda as u64;

        // Sort by fitness (NaN values sort last)
        let mut indices: Vec<usize> = (0..lambda).collect();
        indices.sort_by(|&a, &b| fitness[a].total_cmp(&fitness[b]));

        let best = indices[0];
        self.record_best(population[best].as_slice(), fitness[best]);
        self.history.push_back(fitness[best]);
        while self.history.len() > self.history_length {
            self.history.pop_front();
        }
        self.last_fitness = indices.iter().map(|&i| fitness[i]).collect();
        self.state.mean_fitness = self.last_fitness.iter().sum::<f64>() / lambda as f64;

        // Weighted recombination
        let old_mean = self.mean.clone();
        let mut new_mean: DVector<f64> = DVector::zeros(n);
        for (w, &idx) in self.params.weights.iter().zip(&indices) {
            new_mean += &population[idx] * *w;
        }
        self.mean = new_mean;
        let y_w = (&self.mean - &old_mean) / self.sigma;

        // C^{-1/2} y_w = B D^{-1} B^T y_w
        let inv_sqrt_y = &self.basis * (self.basis.transpose() * &y_w).component_div(&self.scales);

        let p = &self.params;
        self.ps = &self.ps * (1.0 - p.c_sigma)
            + inv_sqrt_y * (p.c_sigma * (2.0 - p.c_sigma) * p.mu_eff).sqrt();

        let generation = self.state.generation + 1;
        let ps_norm = self.ps.norm();
        let hsig_norm = ps_norm
            / (1.0 - (1.0 - p.c_sigma).powf(2.0 * generation as f64)).sqrt()
            / p.chi_n;
        let hsig = if hsig_norm < 1.4 + 2.0 / (n as f64 + 1.0) { 1.0 } else { 0.0 };

        self.pc = &self.pc * (1.0 - p.c_c) + &y_w * (hsig * (p.c_c * (2.0 - p.c_c) * p.mu_eff).sqrt());

        // Rank-one and rank-mu update
        let c1a = p.c_1 * (1.0 - (1.0 - hsig * hsig) * p.c_c * (2.0 - p.c_c));
        let mut rank_mu: DMatrix<f64> = DMatrix::zeros(n, n);
        for (w, &idx) in p.weights.iter().zip(&indices) {
            let y = (&population[idx] - &old_mean) / self.sigma;
            rank_mu += &y * y.transpose() * *w;
        }
        self.covariance = &self.covariance * (1.0 - c1a - p.c_mu)
            + &self.pc * self.pc.transpose() * p.c_1
            + rank_mu * p.c_mu;

        // Step size
        self.sigma *= ((p.c_sigma / p.d_sigma) * (ps_norm / p.chi_n - 1.0)).min(1.0).exp();

        self.decompose();

        self.state.generation = generation;
        self.state.sigma = self.sigma;

        log::debug!(
            "CMA-ES generation {}: best={:.6}, mean={:.6}, sigma={:.3e}, cond={:.2e}",
            generation,
            self.state.best_fitness,
            self.state.mean_fitness,
            self.sigma,
            self.state.covariance_condition
        );

        Ok(())
    }

    fn stop_reasons(&self) -> Vec<StopReason> {
        let mut reasons = Vec::new();
        let generation = self.state.generation;

        if let Some(target) = self.options.stop_fitness {
            if self.state.best_fitness <= target {
                reasons.push(StopReason::TargetFitness {
                    fitness: self.state.best_fitness,
                    target,
                });
            }
        }

        if let Some(limit) = self.max_evaluations {
            if self.count_eval >= limit {
                reasons.push(StopReason::MaxFunEvals {
                    evaluations: self.count_eval,
                    limit,
                });
            }
        }

        if generation >= self.max_generations {
            reasons.push(StopReason::MaxIter {
                generations: generation,
                limit: self.max_generations,
            });
        }

        if generation > 1 {
            let fun_range = range(self.last_fitness.iter().copied())
                .max(range(self.history.iter().copied()));
            if fun_range <= self.options.stop_tol_fun {
                reasons.push(StopReason::TolFun {
                    range: fun_range,
                    tolerance: self.options.stop_tol_fun,
                });
            }
        }

        if self.history.len() >= self.history_length {
            let hist_range = range(self.history.iter().copied());
            if hist_range <= self.options.stop_tol_fun_hist {
                reasons.push(StopReason::TolFunHist {
                    range: hist_range,
                    tolerance: self.options.stop_tol_fun_hist,
                });
            }
        }

        if generation > 0 {
            let spread = (0..self.params.dimension)
                .map(|i| self.sigma * self.pc[i].abs().max(self.covariance[(i, i)].sqrt()))
                .fold(0.0_f64, f64::max);
            if spread < self.tol_x {
                reasons.push(StopReason::TolX {
                    spread,
                    tolerance: self.tol_x,
                });
            }
        }

        if self.state.covariance_condition > self.options.max_condition {
            reasons.push(StopReason::ConditionCov {
                condition: self.state.covariance_condition,
                limit: self.options.max_condition,
            });
        }

        reasons
    }

    fn mean_x(&self) -> Vec<f64> {
        self.mean.as_slice().to_vec()
    }

    fn set_fitness_of_mean_x(&mut self, fitness: f64) {
        self.count_eval += 1;
        let mean = self.mean_x();
        self.record_best(&mean, fitness);
    }

    fn count_evaluations(&self) -> u64 {
        self.count_eval
    }

    fn generation(&self) -> u64 {
        self.state.generation
    }

    fn telemetry(&self) -> HashMap<String, serde_json::Value> {
        self.emit_telemetry()
    }
}

/// Builds a fresh [`CmaOptimizer`] per restart with shared options.
#[derive(Debug, Clone, Default)]
pub struct CmaFactory {
    options: CmaOptions,
}

impl CmaFactory {
    pub fn new(options: CmaOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CmaOptions {
        &self.options
    }
}

impl OptimizerFactory for CmaFactory {
    fn create(&self, setup: &OptimizerSetup) -> Result<Box<dyn ContinuousOptimizer>> {
        Ok(Box::new(CmaOptimizer::new(setup, self.options.clone())?))
    }
}
