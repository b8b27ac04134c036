use crate::forecaster::Forecaster;
use crate::models::{Frequency, PredictionRequest};
use crate::predictor::Predictor;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

pub fn run(
    predictor: &Predictor,
    template: &PredictionRequest,
    start: NaiveDate,
    end: NaiveDate,
    frequency: Frequency,
    confidence_level: f64,
) -> Result<()> {
    info!(
        "Forecasting product {} at {} from {start} to {end} ({})",
        template.product_id,
        template.location,
        frequency.label()
    );

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let forecaster = Forecaster::new(predictor);
    let series = forecaster
        .forecast_with_progress(template, start, end, frequency, confidence_level, Some(&pb))
        .context("forecast failed")?;

    info!(
        "{} periods, total revenue {:.2}",
        series.periods.len(),
        series.summary.total_revenue
    );
    println!("{}", serde_json::to_string_pretty(&series)?);
    Ok(())
}
