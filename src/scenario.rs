use crate::errors::{PredictionError, Result};
use crate::models::{
    OptimizationMetric, OptimizationOutcome, PredictionRequest, PredictionResult, ScenarioPoint,
};
use crate::predictor::Predictor;
use crate::quantity::QuantityRounding;
use log::{info, warn};

fn metric_score(result: &PredictionResult, metric: OptimizationMetric) -> f64 {
    let score = match metric {
        OptimizationMetric::Revenue => result.predicted_revenue,
        OptimizationMetric::Profit => result.profit,
    };
    if score.is_finite() {
        score
    } else {
        f64::NEG_INFINITY
    }
}

/// Evenly spaced factors from `min` to `max`, both inclusive.
fn linspace(min: f64, max: f64, steps: usize) -> Vec<f64> {
    let span = max - min;
    let last = (steps - 1) as f64;
    (0..steps).map(|i| min + span * i as f64 / last).collect()
}

/// Price-scenario sweep: scales the base request's unit price by each
/// factor and predicts, producing the elasticity curve consumed by the
/// optimizer. A failing factor is skipped and logged.
pub fn simulate(
    predictor: &Predictor,
    base: &PredictionRequest,
    min_factor: f64,
    max_factor: f64,
    steps: usize,
) -> Result<Vec<ScenarioPoint>> {
    if !min_factor.is_finite() || min_factor <= 0.0 {
        return Err(PredictionError::validation(format!(
            "min_factor must be positive (value: {min_factor})"
        )));
    }
    if !max_factor.is_finite() || max_factor <= min_factor {
        return Err(PredictionError::validation(format!(
            "max_factor ({max_factor}) must exceed min_factor ({min_factor})"
        )));
    }
    if steps < 2 {
        return Err(PredictionError::validation(format!(
            "steps must be at least 2 (value: {steps})"
        )));
    }

    let mut scenarios = Vec::with_capacity(steps);
    for factor in linspace(min_factor, max_factor, steps) {
        let scaled = base.with_price_factor(factor);
        match predictor.predict(&scaled, QuantityRounding::Display) {
            Ok(result) => scenarios.push(ScenarioPoint {
                price_factor: factor,
                unit_price: scaled.unit_price,
                result,
            }),
            Err(err) => {
                warn!("Skipping price factor {factor:.3}: {err}");
            }
        }
    }
    if scenarios.is_empty() {
        return Err(PredictionError::validation(
            "every price scenario failed to predict".to_string(),
        ));
    }
    Ok(scenarios)
}

/// Sweeps price factors and picks the one maximizing the metric,
/// reporting the price move and improvement against a baseline
/// prediction at the unmodified price.
pub fn optimize(
    predictor: &Predictor,
    base: &PredictionRequest,
    metric: OptimizationMetric,
    min_factor: f64,
    max_factor: f64,
    steps: usize,
) -> Result<OptimizationOutcome> {
    let baseline = predictor.predict(base, QuantityRounding::Display)?;
    let scenarios = simulate(predictor, base, min_factor, max_factor, steps)?;

    let best = scenarios
        .iter()
        .max_by(|a, b| {
            metric_score(&a.result, metric)
                .partial_cmp(&metric_score(&b.result, metric))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .cloned()
        .ok_or(PredictionError::EmptyForecast)?;

    let baseline_score = metric_score(&baseline, metric);
    let best_score = metric_score(&best.result, metric);
    // Normalize by magnitude so a gain over a money-losing baseline
    // still reports as a positive improvement.
    let improvement_pct = if baseline_score.abs() > f64::EPSILON {
        (best_score - baseline_score) / baseline_score.abs() * 100.0
    } else {
        0.0
    };
    let price_change_pct = (best.price_factor - 1.0) * 100.0;

    info!(
        "Optimal {} at factor {:.3} (price {:.2}): {:.2} vs baseline {:.2}",
        metric.label(),
        best.price_factor,
        best.unit_price,
        best_score,
        baseline_score
    );

    Ok(OptimizationOutcome {
        metric,
        optimal_price: best.unit_price,
        optimal_factor: best.price_factor,
        price_change_pct,
        improvement_pct,
        baseline,
        best: best.result,
        scenarios,
    })
}
