use crate::models::PredictionRequest;
use crate::predictor::Predictor;
use crate::scenario;
use anyhow::{Context, Result};
use log::info;

pub fn run(
    predictor: &Predictor,
    base: &PredictionRequest,
    min_factor: f64,
    max_factor: f64,
    steps: usize,
) -> Result<()> {
    info!(
        "Simulating {steps} price points in [{min_factor:.2}, {max_factor:.2}] for product {}",
        base.product_id
    );

    let scenarios = scenario::simulate(predictor, base, min_factor, max_factor, steps)
        .context("scenario simulation failed")?;

    println!("{}", serde_json::to_string_pretty(&scenarios)?);
    Ok(())
}
