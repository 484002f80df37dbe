//! Candidate solutions and best-of selection.

use dgc_core::{DgcError, Result};
use serde::{Deserialize, Serialize};

/// One scored weight vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    /// Weight vector (`A * C`)
    pub x: Vec<f64>,

    /// Fitness, lower is better
    pub fitness: f64,

    /// Normalized geometric mean of `x`, the tie-breaker
    pub geomean: f64,
}

impl Solution {
    pub fn new(x: Vec<f64>, fitness: f64) -> Self {
        let geomean = normalized_geometric_mean(&x);
        Self { x, fitness, geomean }
    }

    /// True if `self` should replace `incumbent`: strictly lower fitness, or
    /// equal fitness and strictly larger geometric mean.
    pub fn improves_on(&self, incumbent: &Solution) -> bool {
        self.fitness < incumbent.fitness
            || (self.fitness == incumbent.fitness && self.geomean > incumbent.geomean)
    }
}

/// `Π (w_i / max_j w_j)` with the maximum taken from 0 upward.
///
/// All-zero (or empty) vectors give 0. Favours solutions that spread weight
/// over many attributes rather than concentrating it on a few.
pub fn normalized_geometric_mean(x: &[f64]) -> f64 {
    let max = x.iter().fold(0.0_f64, |acc, &w| if w > acc { w } else { acc });
    if max == 0.0 {
        return 0.0;
    }
    x.iter().map(|&w| w / max).product()
}

/// Picks the best candidate of one generation.
///
/// The first candidate seeds the incumbent; later candidates replace it only
/// per [`Solution::improves_on`], so ties in both fitness and geometric mean
/// keep the earlier index.
///
/// # Errors
/// [`DgcError::OptimizerError`] if the population is empty or the fitness
/// slice length differs from the population size.
pub fn best_solution(population: &[Vec<f64>], fitness: &[f64]) -> Result<Solution> {
    if population.len() != fitness.len() {
        return Err(DgcError::optimizer(format!(
            "population has {} candidates but {} fitness values",
            population.len(),
            fitness.len()
        )));
    }
    let (first_x, rest) = population
        .split_first()
        .ok_or_else(|| DgcError::optimizer("cannot select the best of an empty population"))?;

    let mut best = Solution::new(first_x.clone(), fitness[0]);
    for (x, &f) in rest.iter().zip(&fitness[1..]) {
        let candidate = Solution::new(x.clone(), f);
        if candidate.improves_on(&best) {
            best = candidate;
        }
    }
    Ok(best)
}

/// Best of several already-scored solutions, same ordering as [`best_solution`].
pub fn best_of(solutions: &[Solution]) -> Option<Solution> {
    let (first, rest) = solutions.split_first()?;
    let mut best = first;
    for candidate in rest {
        if candidate.improves_on(best) {
            best = candidate;
        }
    }
    Some(best.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_geomean_normalizes_by_max() {
        assert_relative_eq!(normalized_geometric_mean(&[0.5, 1.0, 0.25]), 0.5 * 0.25);
        assert_relative_eq!(normalized_geometric_mean(&[0.4, 0.4]), 1.0);
        assert_eq!(normalized_geometric_mean(&[0.0, 0.0, 0.0]), 0.0);
        assert_eq!(normalized_geometric_mean(&[]), 0.0);
    }

    #[test]
    fn test_lower_fitness_wins() {
        let pop = vec![vec![1.0, 1.0], vec![0.1, 1.0], vec![0.5, 0.5]];
        let best = best_solution(&pop, &[0.3, 0.2, 0.25]).unwrap();
        assert_eq!(best.x, vec![0.1, 1.0]);
        assert_eq!(best.fitness, 0.2);
    }

    #[test]
    fn test_tie_broken_by_geomean() {
        let pop = vec![vec![1.0, 0.1], vec![1.0, 0.9]];
        let best = best_solution(&pop, &[0.1, 0.1]).unwrap();
        assert_eq!(best.x, vec![1.0, 0.9]);
    }

    #[test]
    fn test_full_tie_keeps_first() {
        let pop = vec![vec![0.3, 0.6], vec![0.5, 1.0]];
        let best = best_solution(&pop, &[0.2, 0.2]).unwrap();
        assert_eq!(best.x, vec![0.3, 0.6]);
    }

    #[test]
    fn test_rejects_mismatched_lengths() {
        let pop = vec![vec![1.0]];
        assert!(best_solution(&pop, &[0.1, 0.2]).is_err());
        assert!(best_solution(&[], &[]).is_err());
    }

    #[test]
    fn test_best_of_restarts() {
        let solutions = vec![
            Solution::new(vec![1.0, 0.5], 0.2),
            Solution::new(vec![1.0, 1.0], 0.1),
            Solution::new(vec![1.0, 0.2], 0.1),
        ];
        let best = best_of(&solutions).unwrap();
        assert_eq!(best.x, vec![1.0, 1.0]);
        assert!(best_of(&[]).is_none());
    }
}
