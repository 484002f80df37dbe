//! Strategy parameters and run options.

use serde::{Deserialize, Serialize};

/// Learning rates and selection weights derived from dimension and population size.
#[derive(Debug, Clone, PartialEq)]
pub struct CmaParams {
    pub dimension: usize,
    pub population_size: usize,
    pub parent_size: usize,

    /// Positive recombination weights, summing to 1
    pub weights: Vec<f64>,

    /// Variance effective selection mass
    pub mu_eff: f64,

    /// Cumulation for step size control
    pub c_sigma: f64,

    /// Damping for step size
    pub d_sigma: f64,

    /// Cumulation for the rank-one path
    pub c_c: f64,

    /// Rank-one learning rate
    pub c_1: f64,

    /// Rank-mu learning rate
    pub c_mu: f64,

    /// Expected norm of N(0, I)
    pub chi_n: f64,
}

impl CmaParams {
    pub fn new(dimension: usize, population_size: usize) -> Self {
        let dim = dimension as f64;
        let parent_size = (population_size / 2).max(1);

        let mut weights: Vec<f64> = (0..parent_size)
            .map(|i| ((parent_size as f64 + 0.5).ln() - ((i + 1) as f64).ln()).max(0.0))
            .collect();
        let weights_sum: f64 = weights.iter().sum();
        for w in &mut weights {
            *w /= weights_sum;
        }
        let mu_eff = 1.0 / weights.iter().map(|w| w * w).sum::<f64>();

        let c_sigma = (mu_eff + 2.0) / (dim + mu_eff + 5.0);
        let d_sigma = 1.0 + 2.0 * (((mu_eff - 1.0) / (dim + 1.0)).sqrt() - 1.0).max(0.0) + c_sigma;

        let c_c = (4.0 + mu_eff / dim) / (dim + 4.0 + 2.0 * mu_eff / dim);
        let c_1 = 2.0 / ((dim + 1.3).powi(2) + mu_eff);
        let c_mu = (1.0 - c_1)
            .min(2.0 * (mu_eff - 2.0 + 1.0 / mu_eff) / ((dim + 2.0).powi(2) + mu_eff))
            .max(0.0);

        let chi_n = dim.sqrt() * (1.0 - 1.0 / (4.0 * dim) + 1.0 / (21.0 * dim * dim));

        Self {
            dimension,
            population_size,
            parent_size,
            weights,
            mu_eff,
            c_sigma,
            d_sigma,
            c_c,
            c_1,
            c_mu,
            chi_n,
        }
    }

    /// Length of the best-fitness history used by the TolFunHist criterion.
    pub fn history_length(&self) -> usize {
        10 + (30.0 * self.dimension as f64 / self.population_size as f64).ceil() as usize
    }

    /// Generation budget used when none is configured: `100 + 200 n^2 sqrt(lambda)`.
    pub fn default_max_generations(&self) -> u64 {
        let n = self.dimension as f64;
        (100.0 + 200.0 * n * n * (self.population_size as f64).sqrt()) as u64
    }
}

/// Population size used when none is configured: `ceil(4 ln(dimension^2))`.
pub fn default_population_size(dimension: usize) -> usize {
    let d = dimension as f64;
    (4.0 * (d * d).ln()).ceil().max(0.0) as usize
}

/// User-facing optimizer options (`[cma]` table of the run configuration).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CmaOptions {
    /// Initial mean on every coordinate
    pub initial_x: f64,

    /// Initial step size
    pub initial_sigma: f64,

    /// Fitness range within a generation and recent history
    pub stop_tol_fun: f64,

    /// Fitness range of the best-per-generation history
    pub stop_tol_fun_hist: f64,

    /// TolX threshold as a multiple of the initial step size
    pub stop_tol_x_factor: f64,

    /// Stop every restart once the best fitness reaches this value
    pub stop_fitness: Option<f64>,

    /// Upper bound on the covariance condition number
    pub max_condition: f64,
}

impl Default for CmaOptions {
    fn default() -> Self {
        Self {
            initial_x: 0.5,
            initial_sigma: 0.3,
            stop_tol_fun: 1e-12,
            stop_tol_fun_hist: 1e-13,
            stop_tol_x_factor: 1e-11,
            stop_fitness: Some(0.0),
            max_condition: 1e14,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_weights_normalized_and_decreasing() {
        let params = CmaParams::new(10, 14);
        assert_eq!(params.parent_size, 7);
        assert_relative_eq!(params.weights.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert!(params.weights.windows(2).all(|w| w[0] > w[1]));
        assert!(params.mu_eff > 1.0 && params.mu_eff < 7.0);
    }

    #[test]
    fn test_learning_rates_in_range() {
        let params = CmaParams::new(4, 12);
        assert!(params.c_1 + params.c_mu <= 1.0);
        assert!(params.c_sigma > 0.0 && params.c_sigma < 1.0);
        assert!(params.d_sigma >= 1.0);
        assert_relative_eq!(params.chi_n, 2.0 * (1.0 - 1.0 / 16.0 + 1.0 / 336.0));
    }

    #[test]
    fn test_default_population_size() {
        // A = 2, C = 2: ceil(4 ln 16) = ceil(11.09)
        assert_eq!(default_population_size(4), 12);
        assert_eq!(default_population_size(1), 0);
    }

    #[test]
    fn test_default_budgets() {
        let params = CmaParams::new(2, 4);
        assert_eq!(params.default_max_generations(), 100 + 200 * 4 * 2);
        assert_eq!(params.history_length(), 10 + 15);
    }
}
