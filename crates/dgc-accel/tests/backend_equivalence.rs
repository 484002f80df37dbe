//! Accelerator vs host evaluator equivalence.
//!
//! Run with: cargo test -p dgc-accel --test backend_equivalence

use anyhow::Result;
use dgc_accel::{AcceleratedEvaluator, AcceleratorConfig};
use dgc_core::{Attribute, Dataset, DgcError, FitnessEvaluator, FitnessMetric, Instance, Metadata};
use dgc_gravity::{CpuEvaluator, NormalizationModel};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

fn mixed_model(rng: &mut ChaCha8Rng, classes: usize, per_class: usize) -> Result<Arc<NormalizationModel>> {
    let labels: Vec<String> = (0..classes).map(|c| format!("c{}", c)).collect();
    let metadata = Metadata::new(
        vec![
            Attribute::numerical("x", 0.0, 10.0),
            Attribute::categorical("colour", ["red", "green", "blue"]),
            Attribute::integer("n", 0, 5),
        ],
        "class",
        labels,
    );
    let mut instances = Vec::new();
    for class in 0..classes {
        for _ in 0..per_class {
            instances.push(Instance::new(
                vec![
                    class as f64 * 3.0 + rng.gen_range(0.0..4.0),
                    rng.gen_range(0..3) as f64,
                    rng.gen_range(0..=5) as f64,
                ],
                class,
            ));
        }
    }
    Ok(Arc::new(NormalizationModel::prepare(Dataset::new(metadata, instances)?, None)?))
}

fn population(rng: &mut ChaCha8Rng, size: usize, dimension: usize) -> Vec<Vec<f64>> {
    (0..size)
        .map(|_| (0..dimension).map(|_| rng.gen_range(0.0..1.0)).collect())
        .collect()
}

#[test]
fn test_accelerator_matches_cpu_error_rate() -> Result<()> {
    env_logger::builder().is_test(true).try_init().ok();
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let model = mixed_model(&mut rng, 3, 20)?;

    let cpu = CpuEvaluator::new(model.clone(), FitnessMetric::ErrorRate)?.with_worker_threads(3);
    let config = AcceleratorConfig {
        worker_units: 4,
        block_size: 5,
    };
    let mut accel = AcceleratedEvaluator::new(model.clone(), FitnessMetric::ErrorRate, 40, &config)?;

    for size in [1, 5, 17, 40] {
        let pop = population(&mut rng, size, model.dimension());
        assert_eq!(cpu.values_of(&pop)?, accel.values_of(&pop)?, "population of {}", size);
    }

    let single = population(&mut rng, 1, model.dimension()).remove(0);
    assert_eq!(cpu.value_of(&single)?, accel.value_of(&single)?);

    accel.release()?;
    assert!(accel.is_released());
    Ok(())
}

#[test]
fn test_accelerator_matches_cpu_auc() -> Result<()> {
    let mut rng = ChaCha8Rng::seed_from_u64(77);
    let model = mixed_model(&mut rng, 2, 15)?;

    let cpu = CpuEvaluator::new(model.clone(), FitnessMetric::Auc)?;
    let mut accel =
        AcceleratedEvaluator::new(model.clone(), FitnessMetric::Auc, 16, &AcceleratorConfig::default())?;

    let pop = population(&mut rng, 16, model.dimension());
    assert_eq!(cpu.values_of(&pop)?, accel.values_of(&pop)?);

    accel.release()?;
    Ok(())
}

#[test]
fn test_population_over_capacity_is_rejected() -> Result<()> {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let model = mixed_model(&mut rng, 2, 4)?;
    let mut accel =
        AcceleratedEvaluator::new(model.clone(), FitnessMetric::ErrorRate, 2, &AcceleratorConfig::default())?;

    let pop = population(&mut rng, 3, model.dimension());
    assert!(matches!(accel.values_of(&pop), Err(DgcError::ResourceExhausted(_))));

    accel.release()?;
    assert!(matches!(accel.release(), Err(DgcError::AcceleratorError { .. })));
    assert!(accel.values_of(&pop[..1]).is_err());
    Ok(())
}

#[test]
fn test_auc_on_multiclass_rejected_before_prepare() -> Result<()> {
    let mut rng = ChaCha8Rng::seed_from_u64(9);
    let model = mixed_model(&mut rng, 3, 4)?;
    let result = AcceleratedEvaluator::new(model, FitnessMetric::Auc, 8, &AcceleratorConfig::default());
    assert!(matches!(result, Err(DgcError::ConfigError(_))));
    Ok(())
}
