use revenue_engine::artifacts::{Artifacts, ENCODERS_FILE, MODEL_FILE, REFERENCE_FILE};
use revenue_engine::booster::RegressionBooster;
use revenue_engine::encoders::EncoderSet;
use revenue_engine::errors::PredictionError;
use revenue_engine::forecaster::Forecaster;
use revenue_engine::models::{Frequency, OptimizationMetric, PredictionRequest};
use revenue_engine::predictor::Predictor;
use revenue_engine::quantity::QuantityRounding;
use revenue_engine::reference::{
    PriceStats, ReferenceSnapshot, ReferenceStatistics, REFERENCE_SNAPSHOT_VERSION,
};
use revenue_engine::scenario;
use std::sync::Arc;

use chrono::NaiveDate;

const MODEL_TEXT: &str = "\
objective=regression
max_feature_idx=2
feature_names=Unit_Price Month Is_Weekend

Tree=0
num_leaves=2
split_feature=1
threshold=6.5
left_child=-1
right_child=-2
leaf_value=4.8 5.2
shrinkage=1

Tree=1
num_leaves=2
split_feature=2
threshold=0.5
left_child=-1
right_child=-2
leaf_value=0.0 0.3
shrinkage=0.5
";

fn reference_stats() -> ReferenceStatistics {
    let mut stats = ReferenceStatistics::default();
    stats.products.insert(
        "1".to_string(),
        PriceStats {
            avg_price: 100.0,
            avg_cost: 50.0,
        },
    );
    stats.locations.insert(
        "North".to_string(),
        PriceStats {
            avg_price: 95.0,
            avg_cost: 48.0,
        },
    );
    stats.locations.insert(
        "South".to_string(),
        PriceStats {
            avg_price: 110.0,
            avg_cost: 55.0,
        },
    );
    stats
}

fn build_predictor() -> Predictor {
    let booster = RegressionBooster::from_model_text(MODEL_TEXT).unwrap();
    let encoders = EncoderSet::new(
        vec!["1".to_string()],
        vec!["North".to_string(), "South".to_string()],
    );
    let artifacts = Artifacts::from_parts(booster, encoders, reference_stats()).unwrap();
    Predictor::new(Arc::new(artifacts))
}

fn base_request() -> PredictionRequest {
    PredictionRequest {
        unit_price: 100.0,
        unit_cost: 50.0,
        product_id: "1".to_string(),
        location: "North".to_string(),
        year: 2023,
        month: 6,
        day: 15,
        weekday: "Friday".to_string(),
    }
}

#[test]
fn summer_friday_prediction_has_sane_financials() {
    let predictor = build_predictor();
    let result = predictor
        .predict(&base_request(), QuantityRounding::Display)
        .unwrap();

    assert!(result.predicted_revenue > 0.0);
    assert!(result.estimated_quantity >= 0.0);
    assert!(result.profit_margin_pct >= 0.0 && result.profit_margin_pct <= 100.0);
    assert_eq!(result.season, "Summer");
    assert!(result.location_count.is_none());
    assert!((result.price_ratio - 1.0).abs() < 1e-9);
}

#[test]
fn quantity_does_not_rise_as_price_climbs() {
    let predictor = build_predictor();
    let mut last_quantity = f64::INFINITY;
    for factor in [0.5, 1.0, 2.0] {
        let request = base_request().with_price_factor(factor);
        let result = predictor
            .predict(&request, QuantityRounding::Exact)
            .unwrap();
        assert!(
            result.estimated_quantity <= last_quantity + 1e-9,
            "quantity rose at factor {factor}"
        );
        last_quantity = result.estimated_quantity;
    }
}

#[test]
fn extreme_price_collapses_to_zero() {
    let predictor = build_predictor();
    let mut request = base_request();
    request.unit_price = 150_000.0;
    request.unit_cost = 10.0;
    let result = predictor
        .predict(&request, QuantityRounding::Display)
        .unwrap();
    assert_eq!(result.predicted_revenue, 0.0);
    assert_eq!(result.estimated_quantity, 0.0);
    assert_eq!(result.profit_margin_pct, 0.0);
}

#[test]
fn unknown_product_is_rejected() {
    let predictor = build_predictor();
    let mut request = base_request();
    request.product_id = "999".to_string();
    let err = predictor
        .predict(&request, QuantityRounding::Display)
        .unwrap_err();
    assert!(matches!(
        err,
        PredictionError::UnknownCategory {
            field: "product_id",
            ..
        }
    ));
}

#[test]
fn batch_matches_single_predictions() {
    let predictor = build_predictor();
    let requests = vec![
        base_request(),
        base_request().with_price_factor(1.3),
        base_request().with_location("South"),
    ];
    let batch = predictor
        .predict_batch(&requests, QuantityRounding::Exact)
        .unwrap();
    assert_eq!(batch.len(), requests.len());

    for entry in &batch {
        let single = predictor
            .predict(&requests[entry.index], QuantityRounding::Exact)
            .unwrap();
        assert!(
            (entry.result.predicted_revenue - single.predicted_revenue).abs() < 1e-6,
            "revenue diverged at index {}",
            entry.index
        );
        assert!((entry.result.profit - single.profit).abs() < 1e-6);
    }
}

#[test]
fn all_locations_aggregates_known_stores() {
    let predictor = build_predictor();
    let north = predictor
        .predict(&base_request(), QuantityRounding::Exact)
        .unwrap();
    let south = predictor
        .predict(&base_request().with_location("South"), QuantityRounding::Exact)
        .unwrap();

    let all = predictor
        .predict(&base_request().with_location("All"), QuantityRounding::Exact)
        .unwrap();

    assert_eq!(all.location_count, Some(2));
    let expected_revenue = north.predicted_revenue + south.predicted_revenue;
    assert!((all.predicted_revenue - expected_revenue).abs() < 1e-6);
    let expected_profit = north.profit + south.profit;
    assert!((all.profit - expected_profit).abs() < 1e-6);
    // Margin is recomputed from the sums, not averaged.
    let expected_margin = expected_profit / expected_revenue * 100.0;
    assert!((all.profit_margin_pct - expected_margin).abs() < 1e-9);
}

#[test]
fn daily_forecast_covers_every_day_once() {
    let predictor = build_predictor();
    let forecaster = Forecaster::new(&predictor);
    let start = NaiveDate::from_ymd_opt(2023, 6, 12).unwrap();
    let end = NaiveDate::from_ymd_opt(2023, 6, 18).unwrap();

    let series = forecaster
        .forecast(&base_request(), start, end, Frequency::Daily, 0.95)
        .unwrap();

    assert_eq!(series.periods.len(), 7);
    let mut expected = start;
    for period in &series.periods {
        assert_eq!(period.period_start, expected);
        assert_eq!(period.period_end, expected);
        expected = expected.succ_opt().unwrap();
    }
    assert_eq!(series.summary.period_count, 7);
    assert!(series.summary.total_revenue > 0.0);

    let bounds = series.confidence.unwrap();
    assert_eq!(bounds.lower.len(), 7);
    assert_eq!(bounds.upper.len(), 7);
    for (lower, upper) in bounds.lower.iter().zip(bounds.upper.iter()) {
        assert!(*lower >= 0.0);
        assert!(upper >= lower);
    }
}

#[test]
fn weekly_breakdown_sums_to_period_totals() {
    let predictor = build_predictor();
    let forecaster = Forecaster::new(&predictor);
    let start = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2023, 6, 20).unwrap();

    let series = forecaster
        .forecast(&base_request(), start, end, Frequency::Weekly, 0.95)
        .unwrap();

    assert_eq!(series.periods.len(), 3);
    for period in &series.periods {
        let breakdown = period.daily_breakdown.as_ref().unwrap();
        let revenue_sum: f64 = breakdown.iter().map(|d| d.revenue).sum();
        let profit_sum: f64 = breakdown.iter().map(|d| d.profit).sum();
        assert!((revenue_sum - period.revenue).abs() < 1e-9);
        assert!((profit_sum - period.profit).abs() < 1e-9);
    }
}

#[test]
fn forecast_progress_hook_ticks_once_per_period() {
    let predictor = build_predictor();
    let forecaster = Forecaster::new(&predictor);
    let start = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2023, 6, 20).unwrap();

    let bar = indicatif::ProgressBar::hidden();
    let series = forecaster
        .forecast_with_progress(
            &base_request(),
            start,
            end,
            Frequency::Weekly,
            0.95,
            Some(&bar),
        )
        .unwrap();

    assert_eq!(bar.position(), series.periods.len() as u64);
    assert_eq!(bar.length(), Some(series.periods.len() as u64));
}

#[test]
fn optimizer_never_picks_a_worse_price_than_baseline() {
    let predictor = build_predictor();
    let outcome = scenario::optimize(
        &predictor,
        &base_request(),
        OptimizationMetric::Profit,
        0.5,
        2.0,
        16,
    )
    .unwrap();

    assert_eq!(outcome.scenarios.len(), 16);
    assert!(outcome.best.profit + 1e-9 >= outcome.baseline.profit);
    assert!(outcome.optimal_price > 0.0);
}

#[test]
fn artifacts_round_trip_through_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(MODEL_FILE), MODEL_TEXT).unwrap();

    let encoders = EncoderSet::new(
        vec!["1".to_string()],
        vec!["North".to_string(), "South".to_string()],
    );
    std::fs::write(
        dir.path().join(ENCODERS_FILE),
        serde_json::to_string(&encoders).unwrap(),
    )
    .unwrap();

    let snapshot = ReferenceSnapshot {
        version: REFERENCE_SNAPSHOT_VERSION,
        stats: reference_stats(),
    };
    std::fs::write(
        dir.path().join(REFERENCE_FILE),
        bincode::serialize(&snapshot).unwrap(),
    )
    .unwrap();

    let loaded = Artifacts::load_from_dir(dir.path()).unwrap();
    let from_files = Predictor::new(Arc::new(loaded));
    let in_memory = build_predictor();

    let a = from_files
        .predict(&base_request(), QuantityRounding::Exact)
        .unwrap();
    let b = in_memory
        .predict(&base_request(), QuantityRounding::Exact)
        .unwrap();
    assert!((a.predicted_revenue - b.predicted_revenue).abs() < 1e-12);
    assert!((a.profit - b.profit).abs() < 1e-12);
}
