use crate::artifacts::Artifacts;
use crate::elasticity;
use crate::errors::{PredictionError, Result};
use crate::features::{self, EngineeredFeatures};
use crate::models::{PredictionRequest, PredictionResult, Season, ValidatedRequest};
use crate::quantity::{self, QuantityRounding};
use chrono::Datelike;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Batch output entry, tagged with the position of the originating
/// request so callers can line results back up with their input.
#[derive(Debug, Clone)]
pub struct IndexedPrediction {
    pub index: usize,
    pub result: PredictionResult,
}

/// Orchestrates feature engineering, model inference, elasticity
/// adjustment and financial derivation over loaded artifacts.
pub struct Predictor {
    artifacts: Arc<Artifacts>,
}

impl Predictor {
    pub fn new(artifacts: Arc<Artifacts>) -> Self {
        Self { artifacts }
    }

    pub fn artifacts(&self) -> &Artifacts {
        &self.artifacts
    }

    /// Predicts one request. An "All" location fans out across every
    /// known location and sums. Sub-step errors propagate unchanged.
    pub fn predict(
        &self,
        request: &PredictionRequest,
        rounding: QuantityRounding,
    ) -> Result<PredictionResult> {
        if request.is_all_locations() {
            return self.aggregate_locations(request, rounding);
        }
        let validated = request.validate()?;
        self.predict_validated(&validated, rounding)
    }

    fn predict_validated(
        &self,
        request: &ValidatedRequest,
        rounding: QuantityRounding,
    ) -> Result<PredictionResult> {
        let engineered =
            features::build_features(request, &self.artifacts.encoders, &self.artifacts.reference)?;
        let vector = engineered.to_schema_vector(self.artifacts.schema());
        let raw = self.artifacts.booster.predict(&vector.values);
        Ok(self.finish_row(request, &engineered, raw, rounding))
    }

    /// Shared tail of the single and batch paths. Keeping one code path
    /// here is what makes the batch/single equivalence contract exact.
    fn finish_row(
        &self,
        request: &ValidatedRequest,
        engineered: &EngineeredFeatures,
        raw_output: f64,
        rounding: QuantityRounding,
    ) -> PredictionResult {
        let adjusted = elasticity::adjust(
            raw_output,
            request.unit_price,
            &request.product_id,
            &self.artifacts.reference,
        );
        let derived = quantity::derive(
            adjusted.revenue,
            request.unit_price,
            request.unit_cost,
            adjusted.price_ratio,
            rounding,
        );
        PredictionResult {
            predicted_revenue: adjusted.revenue,
            estimated_quantity: derived.quantity,
            total_cost: derived.cost,
            profit: derived.profit,
            profit_margin_pct: derived.margin_pct,
            price_ratio: adjusted.price_ratio,
            season: Season::from_month(request.date.month()).as_str().to_string(),
            location_count: None,
            time_features: engineered.time_features.clone(),
        }
    }

    /// Fans one request out across every known location and sums the
    /// results. A failing location is skipped; only total failure is an
    /// error. Margin is recomputed from the summed totals, not averaged.
    pub fn aggregate_locations(
        &self,
        request: &PredictionRequest,
        rounding: QuantityRounding,
    ) -> Result<PredictionResult> {
        let locations: Vec<String> = self
            .artifacts
            .encoders
            .known_locations()?
            .to_vec();

        let mut aggregate: Option<PredictionResult> = None;
        let mut succeeded = 0usize;
        for location in &locations {
            let per_location = request.with_location(location);
            match per_location
                .validate()
                .and_then(|validated| self.predict_validated(&validated, rounding))
            {
                Ok(result) => {
                    succeeded += 1;
                    match aggregate.as_mut() {
                        None => aggregate = Some(result),
                        Some(total) => {
                            total.predicted_revenue += result.predicted_revenue;
                            total.estimated_quantity += result.estimated_quantity;
                            total.total_cost += result.total_cost;
                            total.profit += result.profit;
                        }
                    }
                }
                Err(err) => {
                    warn!("Skipping location {location} in aggregate: {err}");
                }
            }
        }

        let mut total = aggregate.ok_or(PredictionError::NoLocationsAvailable)?;
        total.profit_margin_pct = if total.predicted_revenue > 0.0 {
            total.profit / total.predicted_revenue * 100.0
        } else {
            0.0
        };
        total.location_count = Some(succeeded);
        debug!(
            "Aggregated {} of {} location(s): revenue {:.2}",
            succeeded,
            locations.len(),
            total.predicted_revenue
        );
        Ok(total)
    }

    /// Vectorized batch prediction: one feature matrix, one model
    /// inference call. "All"-location inputs are expanded to one row per
    /// known location here (not via [`Self::aggregate_locations`]) and
    /// summed back by original index after inference, so the output
    /// length never exceeds the input length. Rows that fail validation
    /// or feature building are warned about and dropped; an input whose
    /// rows all fail simply has no output entry.
    pub fn predict_batch(
        &self,
        requests: &[PredictionRequest],
        rounding: QuantityRounding,
    ) -> Result<Vec<IndexedPrediction>> {
        struct PendingRow {
            input_index: usize,
            request: ValidatedRequest,
            engineered: EngineeredFeatures,
        }

        let known_locations: Vec<String> = self
            .artifacts
            .encoders
            .known_locations()?
            .to_vec();

        let mut rows: Vec<PendingRow> = Vec::with_capacity(requests.len());
        let mut expanded: Vec<bool> = vec![false; requests.len()];
        let mut matrix: Vec<Vec<f64>> = Vec::with_capacity(requests.len());

        for (input_index, request) in requests.iter().enumerate() {
            let fanout: Vec<PredictionRequest> = if request.is_all_locations() {
                expanded[input_index] = true;
                known_locations
                    .iter()
                    .map(|location| request.with_location(location))
                    .collect()
            } else {
                vec![request.clone()]
            };

            for concrete in fanout {
                let validated = match concrete.validate() {
                    Ok(validated) => validated,
                    Err(err) => {
                        warn!("Dropping batch row {input_index}: {err}");
                        continue;
                    }
                };
                let engineered = match features::build_features(
                    &validated,
                    &self.artifacts.encoders,
                    &self.artifacts.reference,
                ) {
                    Ok(engineered) => engineered,
                    Err(err) => {
                        warn!(
                            "Dropping batch row {input_index} ({}): {err}",
                            validated.location
                        );
                        continue;
                    }
                };
                matrix.push(engineered.to_schema_vector(self.artifacts.schema()).values);
                rows.push(PendingRow {
                    input_index,
                    request: validated,
                    engineered,
                });
            }
        }

        // The single inference call for the whole batch.
        let raw_outputs = self.artifacts.booster.predict_matrix(&matrix);

        let mut by_index: BTreeMap<usize, (PredictionResult, usize)> = BTreeMap::new();
        for (row, raw) in rows.iter().zip(raw_outputs.iter()) {
            let result = self.finish_row(&row.request, &row.engineered, *raw, rounding);
            match by_index.get_mut(&row.input_index) {
                None => {
                    by_index.insert(row.input_index, (result, 1));
                }
                Some((total, count)) => {
                    total.predicted_revenue += result.predicted_revenue;
                    total.estimated_quantity += result.estimated_quantity;
                    total.total_cost += result.total_cost;
                    total.profit += result.profit;
                    *count += 1;
                }
            }
        }

        let mut output = Vec::with_capacity(by_index.len());
        for (input_index, (mut result, row_count)) in by_index {
            if expanded[input_index] {
                result.profit_margin_pct = if result.predicted_revenue > 0.0 {
                    result.profit / result.predicted_revenue * 100.0
                } else {
                    0.0
                };
                result.location_count = Some(row_count);
            }
            output.push(IndexedPrediction {
                index: input_index,
                result,
            });
        }
        Ok(output)
    }
}
