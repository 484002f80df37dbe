//! CMA-ES convergence test - verifies the algorithm actually optimizes
//!
//! Run with: cargo test -p dgc-optim --test cma_convergence_test

use anyhow::Result;
use dgc_core::{ContinuousOptimizer, OptimizerFactory, OptimizerSetup, StopReason};
use dgc_optim::{CmaFactory, CmaOptimizer, CmaOptions};

fn boxed_setup(dimension: usize, population_size: usize, seed: u64) -> OptimizerSetup {
    OptimizerSetup {
        dimension,
        population_size,
        lower: vec![0.0; dimension],
        upper: vec![1.0; dimension],
        seed,
        initial_evaluations: 0,
        max_generations: Some(400),
        max_evaluations: None,
    }
}

/// Shifted sphere inside the unit box: f(x) = sum((x_i - 0.2)^2)
/// Optimal solution: x* = [0.2, ..., 0.2], f(x*) = 0
#[test]
fn test_cma_es_shifted_sphere() -> Result<()> {
    env_logger::builder().is_test(true).try_init().ok();

    let options = CmaOptions {
        stop_fitness: Some(1e-10),
        ..CmaOptions::default()
    };
    let mut optimizer = CmaOptimizer::new(&boxed_setup(6, 12, 42), options)?;
    let sphere = |x: &[f64]| -> f64 { x.iter().map(|v| (v - 0.2) * (v - 0.2)).sum() };

    optimizer.init()?;
    while optimizer.should_continue() {
        let population = optimizer.sample_population();
        let fitness: Vec<f64> = population.iter().map(|x| sphere(x)).collect();
        optimizer.update_distribution(&fitness)?;
    }
    let mean = optimizer.mean_x();
    optimizer.set_fitness_of_mean_x(sphere(&mean));

    let state = optimizer.get_state();
    println!("Final generation: {}", state.generation);
    println!("Best fitness: {:.6e}", state.best_fitness);
    println!("Stop: {:?}", optimizer.stop_reasons());

    assert!(
        state.best_fitness < 1e-8,
        "Failed to minimize sphere function: fitness = {}",
        state.best_fitness
    );
    for &x in &state.best_solution {
        assert!((x - 0.2).abs() < 1e-3, "Solution component too far from optimum: {}", x);
    }
    Ok(())
}

/// Optimum on the boundary: f(x) = sum(x_i), minimum at the lower corner.
#[test]
fn test_cma_es_boundary_optimum() -> Result<()> {
    let factory = CmaFactory::new(CmaOptions {
        stop_fitness: Some(1e-9),
        ..CmaOptions::default()
    });
    let mut optimizer = factory.create(&boxed_setup(4, 10, 7))?;

    optimizer.init()?;
    let mut best = f64::INFINITY;
    while optimizer.should_continue() {
        let population = optimizer.sample_population();
        let fitness: Vec<f64> = population.iter().map(|x| x.iter().sum()).collect();
        best = fitness.iter().copied().fold(best, f64::min);
        optimizer.update_distribution(&fitness)?;
    }

    assert!(best < 1e-6, "best fitness {}", best);
    assert!(optimizer
        .stop_reasons()
        .iter()
        .any(|r| matches!(r, StopReason::TargetFitness { .. })));
    Ok(())
}

#[test]
fn test_restart_seeds_are_reproducible() -> Result<()> {
    let factory = CmaFactory::default();
    let run = |seed: u64| -> Result<Vec<f64>> {
        let mut optimizer = factory.create(&boxed_setup(3, 8, seed))?;
        optimizer.init()?;
        for _ in 0..5 {
            let population = optimizer.sample_population();
            let fitness: Vec<f64> = population.iter().map(|x| x[0] - x[1] + x[2]).collect();
            optimizer.update_distribution(&fitness)?;
        }
        Ok(optimizer.mean_x())
    };

    assert_eq!(run(123456789)?, run(123456789)?);
    assert_ne!(run(123456789)?, run(123456790)?);
    Ok(())
}
