use crate::models::PredictionRequest;
use crate::predictor::Predictor;
use crate::quantity::QuantityRounding;
use anyhow::{Context, Result};
use log::info;

pub fn run(predictor: &Predictor, request: &PredictionRequest) -> Result<()> {
    info!(
        "Predicting product {} at {} for {:.2}",
        request.product_id, request.location, request.unit_price
    );

    let result = predictor
        .predict(request, QuantityRounding::Display)
        .context("prediction failed")?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
