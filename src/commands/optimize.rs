use crate::models::{OptimizationMetric, PredictionRequest};
use crate::predictor::Predictor;
use crate::scenario;
use anyhow::{Context, Result};
use log::info;

pub fn run(
    predictor: &Predictor,
    base: &PredictionRequest,
    metric: OptimizationMetric,
    min_factor: f64,
    max_factor: f64,
    steps: usize,
) -> Result<()> {
    info!(
        "Optimizing {} over {steps} price points for product {}",
        metric.label(),
        base.product_id
    );

    let outcome = scenario::optimize(predictor, base, metric, min_factor, max_factor, steps)
        .context("price optimization failed")?;

    info!(
        "Best price {:.2} ({:+.1}% vs current), {} improvement {:+.1}%",
        outcome.optimal_price,
        outcome.price_change_pct,
        metric.label(),
        outcome.improvement_pct
    );
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
